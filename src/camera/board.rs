use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};

use super::liveness::LivenessProbe;
use super::types::{CameraId, CameraState, PowerState, StreamState, CAMERA_COUNT};
use crate::controller::address_book::AddressBook;
use crate::error_handling::types::{CameraError, GatewayError};
use crate::gateway::{RequestGateway, RequestOptions};

pub const POWER_TIMEOUT: Duration = Duration::from_secs(5);
pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(8);
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy)]
struct Slot {
    state: CameraState,
    /// Bumped whenever a stream attempt is started or cut off.
    stream_generation: u64,
}

/// Power and stream bookkeeping for the four cameras.
///
/// Power toggles are optimistic: the board flips first and then asks the camera to
/// follow. A camera that does not confirm keeps the board's state.
pub struct CameraBoard {
    gateway: Arc<RequestGateway>,
    addresses: Arc<AddressBook>,
    probe: Arc<dyn LivenessProbe>,
    stream_timeout: Duration,
    slots: Mutex<[Slot; CAMERA_COUNT]>,
}

impl CameraBoard {
    pub fn new(
        gateway: Arc<RequestGateway>,
        addresses: Arc<AddressBook>,
        probe: Arc<dyn LivenessProbe>,
    ) -> Self {
        let slots = CameraId::ALL.map(|id| Slot {
            state: CameraState::initial(id),
            stream_generation: 0,
        });
        Self {
            gateway,
            addresses,
            probe,
            stream_timeout: STREAM_TIMEOUT,
            slots: Mutex::new(slots),
        }
    }

    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    fn slots(&self) -> MutexGuard<'_, [Slot; CAMERA_COUNT]> {
        match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn state(&self, cam: CameraId) -> CameraState {
        self.slots()[cam.index()].state
    }

    pub fn states(&self) -> Vec<CameraState> {
        self.slots().iter().map(|slot| slot.state).collect()
    }

    /// Flips the power state and returns the new one.
    pub async fn toggle_power(&self, cam: CameraId) -> Result<PowerState, CameraError> {
        let (previous, next) = {
            let mut slots = self.slots();
            let slot = &mut slots[cam.index()];
            let previous = slot.state.power;
            let next = previous.toggled();
            slot.state.power = next;
            if !next.is_on() {
                // Powering off cuts any stream in progress
                slot.state.stream = StreamState::Idle;
                slot.stream_generation += 1;
            }
            (previous, next)
        };

        let Some(address) = self.addresses.camera(cam) else {
            warn!("Camera {} not configured, reverting power toggle", cam);
            self.slots()[cam.index()].state.power = previous;
            return Err(CameraError::NotConfigured(cam.get()));
        };

        let state = if next.is_on() { 1 } else { 0 };
        let url = address.url(&format!("/camera/power?state={}", state));
        match self.gateway.call(&url, RequestOptions::post(), POWER_TIMEOUT).await {
            Ok(response) if response.is_success() => {
                debug!("Camera {} confirmed power {:?}", cam, next);
            }
            Ok(response) => warn!(
                "Camera {} power endpoint answered HTTP {}, keeping dashboard state",
                cam, response.status
            ),
            Err(e) => warn!(
                "Camera {} power endpoint failed ({}), keeping dashboard state",
                cam, e
            ),
        }

        info!("Camera {} power {:?}", cam, next);
        Ok(next)
    }

    pub async fn set_power(&self, cam: CameraId, desired: PowerState) -> Result<PowerState, CameraError> {
        if self.state(cam).power == desired {
            return Ok(desired);
        }
        self.toggle_power(cam).await
    }

    /// `http://<camera>/stream`
    pub fn stream_url(&self, cam: CameraId) -> Option<String> {
        self.addresses.camera(cam).map(|address| address.url("/stream"))
    }

    /// Connects a camera's stream: `Connecting`, then `Live` once the liveness probe
    /// fires or `Failed` after the stream timeout. Rejected without any call when the
    /// camera is powered off. A failed stream may simply be loaded again.
    pub async fn load_stream(&self, cam: CameraId) -> Result<StreamState, CameraError> {
        let stream_url = self.stream_url(cam);
        let (generation, url) = {
            let mut slots = self.slots();
            let slot = &mut slots[cam.index()];
            if !slot.state.power.is_on() {
                return Err(CameraError::PoweredOff(cam.get()));
            }
            match slot.state.stream {
                StreamState::Live | StreamState::Connecting => return Ok(slot.state.stream),
                StreamState::Failed => {
                    debug!("Camera {} retrying after failed stream", cam);
                    slot.state.stream = StreamState::Idle;
                }
                StreamState::Idle => {}
            }
            let Some(url) = stream_url else {
                return Err(CameraError::NotConfigured(cam.get()));
            };
            slot.state.stream = StreamState::Connecting;
            slot.stream_generation += 1;
            (slot.stream_generation, url)
        };

        debug!("Camera {} connecting to {}", cam, url);

        let live = tokio::select! {
            live = self.probe.wait_until_live(&url) => live,
            _ = tokio::time::sleep(self.stream_timeout) => false,
        };

        let mut slots = self.slots();
        let slot = &mut slots[cam.index()];
        if slot.stream_generation != generation {
            // Powered off (or restarted) while connecting
            return Ok(slot.state.stream);
        }
        slot.state.stream = if live {
            info!("Camera {} live", cam);
            StreamState::Live
        } else {
            warn!("Camera {} connection timeout ({:?}), camera may be offline", cam, self.stream_timeout);
            StreamState::Failed
        };
        Ok(slot.state.stream)
    }

    /// Clears a failed stream back to `Idle`. Any other state is left alone.
    pub fn acknowledge_failure(&self, cam: CameraId) -> StreamState {
        let mut slots = self.slots();
        let slot = &mut slots[cam.index()];
        if slot.state.stream == StreamState::Failed {
            slot.state.stream = StreamState::Idle;
        }
        slot.state.stream
    }

    /// Asks the camera for a still image.
    pub async fn capture(&self, cam: CameraId) -> Result<Vec<u8>, CameraError> {
        let address = self
            .addresses
            .camera(cam)
            .ok_or(CameraError::NotConfigured(cam.get()))?;
        let response = self
            .gateway
            .call(&address.url("/capture"), RequestOptions::post(), CAPTURE_TIMEOUT)
            .await?;
        if !response.is_success() {
            return Err(GatewayError::UnexpectedStatus(response.status).into());
        }
        if response.body.is_empty() {
            return Err(GatewayError::MalformedResponse("empty image".into()).into());
        }
        Ok(response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::liveness::FixedDelayProbe;
    use crate::controller::address_book::Addresses;
    use crate::gateway::EndpointAddress;
    use crate::storage::settings_store::MemorySettings;
    use crate::test_support::{address_book, gateway, StubTransport};
    use futures_util::future::BoxFuture;

    struct NeverLive;

    impl LivenessProbe for NeverLive {
        fn wait_until_live<'a>(&'a self, _stream_url: &'a str) -> BoxFuture<'a, bool> {
            Box::pin(std::future::pending())
        }
    }

    fn cam(id: i64) -> CameraId {
        CameraId::new(id).unwrap()
    }

    fn board(transport: Arc<StubTransport>, probe: Arc<dyn LivenessProbe>) -> Arc<CameraBoard> {
        Arc::new(CameraBoard::new(gateway(transport), address_book(), probe))
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_power_toggle_keeps_optimistic_state() {
        let transport = Arc::new(StubTransport::new());
        let board = board(transport.clone(), Arc::new(FixedDelayProbe::default()));

        assert_eq!(board.toggle_power(cam(2)).await, Ok(PowerState::Off));
        assert_eq!(board.state(cam(2)).power, PowerState::Off);
        assert_eq!(transport.urls(), vec!["http://192.168.4.3:80/camera/power?state=0"]);

        assert_eq!(board.toggle_power(cam(2)).await, Ok(PowerState::On));
    }

    #[tokio::test(start_paused = true)]
    async fn unconfigured_camera_reverts_toggle() {
        let controller = EndpointAddress::parse("192.168.4.1").unwrap();
        let mut addresses = Addresses::derived_from(controller);
        addresses.cameras.remove(&cam(3));
        let book = Arc::new(AddressBook::load(Arc::new(MemorySettings::new()), addresses));
        let transport = Arc::new(StubTransport::new());
        let board = CameraBoard::new(gateway(transport.clone()), book, Arc::new(FixedDelayProbe::default()));

        assert_eq!(board.toggle_power(cam(3)).await, Err(CameraError::NotConfigured(3)));
        assert_eq!(board.state(cam(3)).power, PowerState::On);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn powered_off_camera_rejects_stream_without_calls() {
        let transport = Arc::new(StubTransport::new().route("/camera/power", 200, "OK"));
        let board = board(transport.clone(), Arc::new(FixedDelayProbe::default()));
        board.set_power(cam(1), PowerState::Off).await.unwrap();
        let calls = transport.calls();

        assert_eq!(board.load_stream(cam(1)).await, Err(CameraError::PoweredOff(1)));
        assert_eq!(transport.calls(), calls);
        assert_eq!(board.state(cam(1)).stream, StreamState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_goes_live_after_probe() {
        let board = board(Arc::new(StubTransport::new()), Arc::new(FixedDelayProbe::default()));

        let loading = tokio::spawn({
            let board = board.clone();
            async move { board.load_stream(cam(4)).await }
        });
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(board.state(cam(4)).stream, StreamState::Connecting);

        assert_eq!(loading.await.unwrap(), Ok(StreamState::Live));
        assert_eq!(board.load_stream(cam(4)).await, Ok(StreamState::Live));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_fails_after_timeout_and_may_retry() {
        let board = board(Arc::new(StubTransport::new()), Arc::new(NeverLive));

        let started = tokio::time::Instant::now();
        assert_eq!(board.load_stream(cam(1)).await, Ok(StreamState::Failed));
        assert!(started.elapsed() >= STREAM_TIMEOUT);
        assert!(started.elapsed() < STREAM_TIMEOUT + Duration::from_secs(1));

        let retry = tokio::spawn({
            let board = board.clone();
            async move { board.load_stream(cam(1)).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(board.state(cam(1)).stream, StreamState::Connecting);
        assert_eq!(retry.await.unwrap(), Ok(StreamState::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_stream_returns_to_idle_before_reconnecting() {
        let board = board(Arc::new(StubTransport::new()), Arc::new(NeverLive));

        assert_eq!(board.load_stream(cam(1)).await, Ok(StreamState::Failed));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(board.state(cam(1)).stream, StreamState::Failed);

        assert_eq!(board.acknowledge_failure(cam(1)), StreamState::Idle);
        assert_eq!(board.state(cam(1)).stream, StreamState::Idle);
        // Nothing to clear on a healthy slot
        assert_eq!(board.acknowledge_failure(cam(1)), StreamState::Idle);

        let retry = tokio::spawn({
            let board = board.clone();
            async move { board.load_stream(cam(1)).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(board.state(cam(1)).stream, StreamState::Connecting);
        assert_eq!(board.acknowledge_failure(cam(1)), StreamState::Connecting);
        assert_eq!(retry.await.unwrap(), Ok(StreamState::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn power_off_cuts_a_connecting_stream() {
        let board = board(Arc::new(StubTransport::new()), Arc::new(NeverLive));

        let loading = tokio::spawn({
            let board = board.clone();
            async move { board.load_stream(cam(2)).await }
        });
        tokio::time::sleep(Duration::from_secs(3)).await;
        board.toggle_power(cam(2)).await.unwrap();

        assert_eq!(loading.await.unwrap(), Ok(StreamState::Idle));
        let state = board.state(cam(2));
        assert_eq!(state.power, PowerState::Off);
        assert_eq!(state.stream, StreamState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_requires_a_non_empty_image() {
        let transport = Arc::new(
            StubTransport::new()
                .route("192.168.4.2:80/capture", 200, vec![0xFF, 0xD8, 0xFF])
                .route("192.168.4.3:80/capture", 200, Vec::new())
                .route("192.168.4.4:80/capture", 500, "busy"),
        );
        let board = board(transport, Arc::new(FixedDelayProbe::default()));

        assert_eq!(board.capture(cam(1)).await, Ok(vec![0xFF, 0xD8, 0xFF]));
        assert!(matches!(
            board.capture(cam(2)).await,
            Err(CameraError::Gateway(GatewayError::MalformedResponse(_)))
        ));
        assert_eq!(
            board.capture(cam(3)).await,
            Err(CameraError::Gateway(GatewayError::UnexpectedStatus(500)))
        );
        assert!(matches!(
            board.capture(cam(4)).await,
            Err(CameraError::Gateway(GatewayError::TransportFailure(_)))
        ));
    }
}
