//! Operator intents: snapshots, arming, power, streams, logs, gallery, Wi-Fi setup.

use log::{debug, info, warn};
use serde::Serialize;

use super::context::DashboardContext;
use super::status_board::StatusTiles;
use crate::camera::types::{CameraId, PowerState, StreamState};
use crate::controller::types::{WifiConfig, WifiNetwork};
use crate::controller::Addresses;
use crate::detection::DetectionSummary;
use crate::error_handling::types::{CameraError, GatewayError, SetupError, StorageError};
use crate::storage::settings_store::{KEY_SETUP_SKIPPED, KEY_SIDEBAR_MINIMIZED};
use crate::storage::SnapshotRecord;

/// A file held by the controller's own storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteImage {
    pub name: String,
    pub url: String,
}

/// Local vault (most recent first) followed by the controller's files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryView {
    pub local: Vec<SnapshotRecord>,
    pub remote: Vec<RemoteImage>,
}

impl GalleryView {
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.remote.is_empty()
    }
}

impl DashboardContext {
    /// Polls `/status` unless the telemetry channel is open. Returns the refreshed
    /// tiles, or `None` when polling was skipped.
    pub async fn refresh_status(&self) -> Option<StatusTiles> {
        if self.telemetry.is_open() {
            debug!("Telemetry open, skipping status poll");
            return None;
        }
        if let Some(alert) = self.status.apply_poll(self.controller.status().await) {
            info!("New alert: {}", alert);
        }
        Some(self.status.tiles())
    }

    /// Reloads the controller log. On failure the previous log is kept.
    pub async fn refresh_logs(&self) -> Result<Vec<String>, GatewayError> {
        match self.controller.logs().await {
            Ok(logs) => {
                self.status.set_logs(logs.clone());
                Ok(logs)
            }
            Err(e) => {
                warn!("No connection to main controller: {}", e);
                Err(e)
            }
        }
    }

    /// Reloads the controller's file list. On failure the previous list is kept.
    /// Entries without a usable URL are left out.
    pub async fn refresh_gallery(&self) -> Result<usize, GatewayError> {
        let names = self.controller.gallery().await?;
        let mut images = Vec::with_capacity(names.len());
        for name in names {
            match self.controller.captured_url(&name) {
                Ok(url) => images.push(RemoteImage { name, url }),
                Err(e) => warn!("Skipping gallery entry {:?}: {}", name, e),
            }
        }
        let count = images.len();
        if let Ok(mut slot) = self.remote_gallery.write() {
            *slot = images;
        }
        Ok(count)
    }

    pub async fn gallery(&self) -> GalleryView {
        let local = match self.vault.list_all().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Vault offline: {}", e);
                Vec::new()
            }
        };
        let remote = self
            .remote_gallery
            .read()
            .map(|images| images.clone())
            .unwrap_or_default();
        GalleryView { local, remote }
    }

    /// Captures a still from a camera and archives it. `None` when the vault is
    /// unavailable and nothing was archived.
    pub async fn take_snapshot(&self, cam_id: i64) -> Result<Option<SnapshotRecord>, CameraError> {
        let cam = CameraId::new(cam_id)?;
        let image = self.cameras.capture(cam).await?;
        let record = self.vault.save(cam, &image).await?;
        if let Some(record) = &record {
            info!("Snapshot from camera {} saved to local vault (#{})", cam, record.id);
        }
        Ok(record)
    }

    pub async fn arm(&self) -> Result<Option<StatusTiles>, GatewayError> {
        self.controller.set_armed(true).await?;
        Ok(self.refresh_status().await)
    }

    pub async fn disarm(&self) -> Result<Option<StatusTiles>, GatewayError> {
        self.controller.set_armed(false).await?;
        Ok(self.refresh_status().await)
    }

    pub async fn toggle_power(&self, cam_id: i64) -> Result<PowerState, CameraError> {
        self.cameras.toggle_power(CameraId::new(cam_id)?).await
    }

    pub async fn set_power(&self, cam_id: i64, power: PowerState) -> Result<PowerState, CameraError> {
        self.cameras.set_power(CameraId::new(cam_id)?, power).await
    }

    pub async fn load_stream(&self, cam_id: i64) -> Result<StreamState, CameraError> {
        self.cameras.load_stream(CameraId::new(cam_id)?).await
    }

    pub fn detection_summary(&self) -> DetectionSummary {
        self.detections.summary()
    }

    /// True when the controller is unreachable or not yet joined to a network.
    pub async fn needs_setup(&self) -> bool {
        match self.controller.wifi_status().await {
            Ok(status) => status.needs_setup(),
            Err(e) => {
                debug!("Wi-Fi status unavailable: {}", e);
                true
            }
        }
    }

    pub async fn scan_networks(&self) -> Result<Vec<WifiNetwork>, GatewayError> {
        self.controller.scan_networks().await
    }

    pub async fn configure_wifi(&self, config: &WifiConfig) -> Result<Option<Addresses>, SetupError> {
        self.controller.configure_wifi(config).await
    }

    /// Dismisses the setup prompt. Remembered across runs.
    pub fn skip_setup(&self) -> Result<(), StorageError> {
        info!("Wi-Fi setup skipped");
        self.settings.set_flag(KEY_SETUP_SKIPPED, true)
    }

    pub fn setup_skipped(&self) -> bool {
        self.settings.flag(KEY_SETUP_SKIPPED)
    }

    pub fn sidebar_minimized(&self) -> bool {
        self.settings.flag(KEY_SIDEBAR_MINIMIZED)
    }

    pub fn set_sidebar_minimized(&self, minimized: bool) -> Result<(), StorageError> {
        self.settings.set_flag(KEY_SIDEBAR_MINIMIZED, minimized)
    }

    /// Flips the sidebar flag and returns the new value.
    pub fn toggle_sidebar(&self) -> Result<bool, StorageError> {
        let minimized = !self.sidebar_minimized();
        self.set_sidebar_minimized(minimized)?;
        Ok(minimized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FixedDelayProbe;
    use crate::configuration::Config;
    use crate::dashboard::context::ContextParts;
    use crate::error_handling::types::TelemetryError;
    use crate::storage::settings_store::MemorySettings;
    use crate::storage::SnapshotVault;
    use crate::telemetry::{TelemetryConnector, TelemetrySession};
    use crate::test_support::StubTransport;
    use futures_util::future::BoxFuture;
    use std::sync::Arc;

    struct Unreachable;

    impl TelemetryConnector for Unreachable {
        fn connect<'a>(
            &'a self,
            _url: &'a str,
        ) -> BoxFuture<'a, Result<Box<dyn TelemetrySession>, TelemetryError>> {
            Box::pin(async { Err(TelemetryError::ConnectFailed("offline".into())) })
        }
    }

    async fn context(transport: StubTransport) -> (DashboardContext, Arc<StubTransport>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let vault = SnapshotVault::open(dir.path().join("vault.sqlite3"), Default::default())
            .await
            .unwrap();
        let transport = Arc::new(transport);
        let mut config = Config::default();
        config.rate.min_spacing_ms = 0;
        let parts = ContextParts {
            settings: Arc::new(MemorySettings::new()),
            transport: transport.clone(),
            connector: Arc::new(Unreachable),
            probe: Arc::new(FixedDelayProbe::default()),
            vault,
        };
        (DashboardContext::assemble(&config, parts).unwrap(), transport, dir)
    }

    #[tokio::test]
    async fn snapshot_is_archived() {
        let (ctx, _, _dir) = context(
            StubTransport::new().route("192.168.4.4:80/capture", 200, vec![1u8, 2, 3, 4]),
        )
        .await;

        let record = ctx.take_snapshot(3).await.unwrap().unwrap();
        assert_eq!(record.cam_id.get(), 3);
        assert_eq!(record.image, vec![1, 2, 3, 4]);

        let gallery = ctx.gallery().await;
        assert_eq!(gallery.local.len(), 1);
        assert!(gallery.remote.is_empty());

        assert_eq!(ctx.take_snapshot(9).await, Err(CameraError::InvalidCamera(9)));
        assert!(ctx.take_snapshot(1).await.is_err());
        assert_eq!(ctx.vault.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn arm_refreshes_status_while_telemetry_is_down() {
        let (ctx, transport, _dir) = context(
            StubTransport::new()
                .route("/arm?state=1", 200, "OK")
                .route("/status", 200, r#"{"armed":true,"log":"NONE","prox":0}"#),
        )
        .await;

        let tiles = ctx.arm().await.unwrap().unwrap();
        assert_eq!(tiles.system, "ARMED");
        assert_eq!(
            transport.urls(),
            vec!["http://192.168.4.1/arm?state=1", "http://192.168.4.1/status"]
        );
    }

    #[tokio::test]
    async fn remote_gallery_failure_keeps_local_part() {
        let (ctx, _, _dir) = context(
            StubTransport::new().route("192.168.4.2:80/capture", 200, vec![9u8; 16]),
        )
        .await;
        ctx.take_snapshot(1).await.unwrap();

        assert!(ctx.refresh_gallery().await.is_err());
        let gallery = ctx.gallery().await;
        assert_eq!(gallery.local.len(), 1);
        assert!(gallery.remote.is_empty());
    }

    #[tokio::test]
    async fn remote_gallery_lists_encoded_urls() {
        let (ctx, _, _dir) = context(
            StubTransport::new().route("/gallery.json", 200, r#"["front door.jpg"]"#),
        )
        .await;

        assert_eq!(ctx.refresh_gallery().await, Ok(1));
        let gallery = ctx.gallery().await;
        assert_eq!(
            gallery.remote,
            vec![RemoteImage {
                name: "front door.jpg".into(),
                url: "http://192.168.4.1/captured/front%20door.jpg".into(),
            }]
        );
    }

    #[tokio::test]
    async fn bad_gallery_entries_are_skipped() {
        let (ctx, _, _dir) = context(
            StubTransport::new().route("/gallery.json", 200, r#"["a.jpg", "..", "", "b.jpg"]"#),
        )
        .await;

        assert_eq!(ctx.refresh_gallery().await, Ok(2));
        let names: Vec<_> = ctx.gallery().await.remote.into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[tokio::test]
    async fn ui_flags_are_kept_in_settings() {
        let (ctx, _, _dir) = context(StubTransport::new()).await;
        assert!(!ctx.setup_skipped());
        assert!(!ctx.sidebar_minimized());

        ctx.skip_setup().unwrap();
        assert!(ctx.setup_skipped());
        assert!(ctx.settings.flag(KEY_SETUP_SKIPPED));

        ctx.set_sidebar_minimized(true).unwrap();
        assert!(ctx.sidebar_minimized());
        assert_eq!(ctx.settings.get(KEY_SIDEBAR_MINIMIZED).as_deref(), Some("true"));
        assert_eq!(ctx.toggle_sidebar(), Ok(false));
        assert!(!ctx.sidebar_minimized());
    }

    #[tokio::test]
    async fn unreachable_controller_needs_setup() {
        let (ctx, _, _dir) = context(StubTransport::new()).await;
        assert!(ctx.needs_setup().await);
        assert!(ctx.refresh_logs().await.is_err());
    }
}
