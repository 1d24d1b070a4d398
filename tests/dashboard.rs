use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use pyramid::camera::types::CameraId;
use pyramid::camera::FixedDelayProbe;
use pyramid::configuration::Config;
use pyramid::dashboard::{ContextParts, DashboardContext};
use pyramid::error_handling::types::{GatewayError, TelemetryError};
use pyramid::gateway::{OutboundRequest, Transport, TransportResponse};
use pyramid::storage::{MemorySettings, SnapshotVault, VaultLimits};
use pyramid::telemetry::{ChannelState, TelemetryConnector, TelemetrySession};
use tokio::sync::mpsc;

/// Controller that answers `/status` and nothing else.
#[derive(Default)]
struct StatusOnly {
    urls: Mutex<Vec<String>>,
}

impl Transport for StatusOnly {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<TransportResponse, GatewayError>> {
        self.urls.lock().unwrap().push(request.url.clone());
        let answer = if request.url.ends_with("/status") {
            Ok(TransportResponse {
                status: 200,
                body: br#"{"armed":false,"log":"NONE","prox":0}"#.to_vec(),
            })
        } else {
            Err(GatewayError::TransportFailure("connection refused".into()))
        };
        Box::pin(async move { answer })
    }
}

struct Feed(mpsc::UnboundedReceiver<String>);

impl TelemetrySession for Feed {
    fn next_text(&mut self) -> BoxFuture<'_, Option<Result<String, TelemetryError>>> {
        Box::pin(async move { self.0.recv().await.map(Ok) })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

struct OneShot(Mutex<Option<Feed>>);

impl TelemetryConnector for OneShot {
    fn connect<'a>(
        &'a self,
        _url: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn TelemetrySession>, TelemetryError>> {
        let feed = self.0.lock().unwrap().take();
        Box::pin(async move {
            feed.map(|f| Box::new(f) as Box<dyn TelemetrySession>)
                .ok_or_else(|| TelemetryError::ConnectFailed("refused".into()))
        })
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assemble(transport: Arc<StatusOnly>, connector: OneShot) -> DashboardContext {
    let mut config = Config::default();
    config.rate.min_spacing_ms = 0;
    DashboardContext::assemble(
        &config,
        ContextParts {
            settings: Arc::new(MemorySettings::new()),
            transport,
            connector: Arc::new(connector),
            probe: Arc::new(FixedDelayProbe::default()),
            vault: SnapshotVault::unavailable(VaultLimits::default()),
        },
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn pushed_alerts_drive_detection_and_status() {
    init_logging();
    let transport = Arc::new(StatusOnly::default());
    let (feed, rx) = mpsc::unbounded_channel();
    let ctx = assemble(transport.clone(), OneShot(Mutex::new(Some(Feed(rx)))));

    assert_eq!(ctx.detection_summary().status, "Offline");
    assert_eq!(ctx.telemetry.url(), "ws://192.168.4.1:81");

    ctx.telemetry.start().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(ctx.telemetry.state(), ChannelState::Open);
    assert_eq!(ctx.status.tiles().header, "CONNECTED");
    assert_eq!(ctx.detection_summary().status, "Active");

    feed.send(r#"{"event":"alert","type":"HUMAN_TARGET","cam_id":2,"confidence":0.9}"#.into())
        .unwrap();
    feed.send(r#"{"event":"state_update","armed":true,"log":"HUMAN cam2","prox":40}"#.into())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let summary = ctx.detection_summary();
    assert_eq!(summary.status, "Detecting (1)");
    assert_eq!(summary.detections_today, 1);
    assert_eq!(summary.average_confidence, "90%");
    assert_eq!(summary.active_cameras, vec![CameraId::new(2).unwrap()]);

    let tiles = ctx.status.tiles();
    assert_eq!(tiles.system, "ARMED");
    assert_eq!(tiles.activity, "OBJ @ 40cm");

    // Polling is bypassed while the channel is open.
    assert_eq!(ctx.refresh_status().await, None);
    assert!(transport.urls.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(ctx.detection_summary().status, "Active");
    assert_eq!(ctx.detections.stats().lifetime_detections, 1);

    ctx.telemetry.stop().await;
    assert_eq!(ctx.telemetry.state(), ChannelState::Closed);

    let tiles = ctx.refresh_status().await.unwrap();
    assert_eq!(tiles.system, "DISARMED");
    assert_eq!(
        transport.urls.lock().unwrap().clone(),
        vec!["http://192.168.4.1/status".to_string()]
    );
}

#[tokio::test]
async fn unreachable_controller_reports_setup_needed() {
    init_logging();
    let ctx = assemble(Arc::new(StatusOnly::default()), OneShot(Mutex::new(None)));

    assert!(ctx.needs_setup().await);
    assert!(ctx.refresh_gallery().await.is_err());
    assert!(ctx.gallery().await.is_empty());
    assert!(ctx.take_snapshot(1).await.is_err());
}
