use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::connector::{TelemetryConnector, TelemetrySession};
use super::types::{ChannelState, TelemetryEvent, TelemetryHandler};
use crate::gateway::EndpointAddress;

pub const DEFAULT_TELEMETRY_PORT: u16 = 81;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

type Subscribers = Arc<RwLock<Vec<Arc<dyn TelemetryHandler>>>>;

/// Long-lived push channel from the controller.
///
/// At most one session is open at a time. When a session ends for any reason the
/// channel waits a fixed delay and reconnects, forever, until [`TelemetryChannel::stop`].
pub struct TelemetryChannel {
    connector: Arc<dyn TelemetryConnector>,
    url: String,
    reconnect_delay: Duration,
    subscribers: Subscribers,
    state: Arc<watch::Sender<ChannelState>>,
    running: Mutex<Option<RunningLoop>>,
}

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RunningLoop {
    async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!("Telemetry loop ended abnormally: {}", e);
        }
    }
}

impl TelemetryChannel {
    pub fn new(
        connector: Arc<dyn TelemetryConnector>,
        url: impl Into<String>,
        reconnect_delay: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ChannelState::Closed);
        Self {
            connector,
            url: url.into(),
            reconnect_delay,
            subscribers: Arc::new(RwLock::new(Vec::new())),
            state: Arc::new(state),
            running: Mutex::new(None),
        }
    }

    /// `ws://<controller host>:<port>`
    pub fn url_for(controller: &EndpointAddress, port: u16) -> String {
        format!("ws://{}:{}", controller.host(), port)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Registers a handler. Handlers run in registration order.
    pub fn subscribe(&self, handler: Arc<dyn TelemetryHandler>) {
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.push(handler);
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Starts the connect/reconnect loop. A loop that is already running is shut
    /// down (and its session closed) before the new one opens.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            debug!("Restarting telemetry loop");
            previous.stop().await;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = LoopWorker {
            connector: self.connector.clone(),
            url: self.url.clone(),
            reconnect_delay: self.reconnect_delay,
            subscribers: self.subscribers.clone(),
            state: self.state.clone(),
        };
        let handle = tokio::spawn(worker.run(shutdown_rx));
        *running = Some(RunningLoop { shutdown, handle });
    }

    pub async fn stop(&self) {
        if let Some(running) = self.running.lock().await.take() {
            running.stop().await;
            info!("Telemetry stopped");
        }
    }
}

struct LoopWorker {
    connector: Arc<dyn TelemetryConnector>,
    url: String,
    reconnect_delay: Duration,
    subscribers: Subscribers,
    state: Arc<watch::Sender<ChannelState>>,
}

impl LoopWorker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            self.set_state(ChannelState::Connecting);
            info!("Connecting to telemetry: {}", self.url);

            let connected = tokio::select! {
                res = self.connector.connect(&self.url) => res,
                _ = shutdown.changed() => {
                    self.set_state(ChannelState::Closed);
                    return;
                }
            };

            match connected {
                Ok(mut session) => {
                    let session_id = Uuid::new_v4();
                    info!("[{}] Telemetry connected", session_id);
                    self.set_state(ChannelState::Open);

                    let stop_requested = self.pump(session.as_mut(), session_id, &mut shutdown).await;
                    session.close().await;
                    self.set_state(ChannelState::Closed);
                    if stop_requested {
                        return;
                    }
                    info!(
                        "[{}] Telemetry closed, retrying in {:?}",
                        session_id, self.reconnect_delay
                    );
                }
                Err(e) => {
                    warn!("Telemetry error: {}", e);
                    self.set_state(ChannelState::Closed);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.changed() => return,
            }
        }
    }

    /// Reads until the session ends. Returns true when the stop came from us.
    async fn pump(
        &self,
        session: &mut dyn TelemetrySession,
        session_id: Uuid,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            let frame = tokio::select! {
                frame = session.next_text() => frame,
                _ = shutdown.changed() => return true,
            };
            match frame {
                Some(Ok(text)) => self.dispatch(&text, session_id),
                Some(Err(e)) => {
                    warn!("[{}] Telemetry error: {}", session_id, e);
                    return false;
                }
                None => return false,
            }
        }
    }

    fn dispatch(&self, text: &str, session_id: Uuid) {
        let event: TelemetryEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                warn!("[{}] Dropping unparseable telemetry message: {}", session_id, e);
                return;
            }
        };
        debug!("[{}] {:?}", session_id, event);
        for handler in self.handlers() {
            handler.on_message(&event);
        }
    }

    fn set_state(&self, next: ChannelState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            for handler in self.handlers() {
                handler.on_state_change(next);
            }
        }
    }

    /// Snapshot so handlers may subscribe further handlers without deadlocking.
    fn handlers(&self) -> Vec<Arc<dyn TelemetryHandler>> {
        self.subscribers
            .read()
            .map(|subscribers| subscribers.clone())
            .unwrap_or_default()
    }
}
