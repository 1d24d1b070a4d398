use std::fs;
use std::sync::{Arc, RwLock};

use log::{error, info};

use crate::camera::{CameraBoard, FixedDelayProbe, LivenessProbe};
use crate::configuration::Config;
use crate::controller::{AddressBook, ControllerApi};
use crate::detection::DetectionAggregator;
use crate::error_handling::types::{StartupError, StorageError};
use crate::gateway::{HttpTransport, RequestGateway, SessionCredentials, Transport};
use crate::storage::{FileSettings, SettingsStore, SnapshotVault};
use crate::telemetry::{TelemetryChannel, TelemetryConnector, WsConnector};

use super::operations::RemoteImage;
use super::status_board::StatusBoard;

/// The collaborators a dashboard is assembled from. Production wires real network
/// and disk implementations; tests substitute fakes.
pub struct ContextParts {
    pub settings: Arc<dyn SettingsStore>,
    pub transport: Arc<dyn Transport>,
    pub connector: Arc<dyn TelemetryConnector>,
    pub probe: Arc<dyn LivenessProbe>,
    pub vault: SnapshotVault,
}

/// One dashboard session: every piece of process-wide state (credentials, rate window,
/// detection statistics, camera bookkeeping) lives here and nowhere else.
pub struct DashboardContext {
    pub settings: Arc<dyn SettingsStore>,
    pub gateway: Arc<RequestGateway>,
    pub addresses: Arc<AddressBook>,
    pub controller: ControllerApi,
    pub cameras: CameraBoard,
    pub vault: SnapshotVault,
    pub telemetry: TelemetryChannel,
    pub detections: Arc<DetectionAggregator>,
    pub status: Arc<StatusBoard>,
    pub(super) remote_gallery: RwLock<Vec<RemoteImage>>,
}

impl DashboardContext {
    /// Builds the production context: settings file and vault under `storage_path`,
    /// `reqwest` transport, WebSocket telemetry.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        fs::create_dir_all(&config.storage_path).map_err(|e| {
            error!(
                "Unable to create storage directory {}: {}",
                config.storage_path.display(),
                e
            );
            StorageError::ConnectionFailed
        })?;

        let settings: Arc<dyn SettingsStore> = Arc::new(FileSettings::in_dir(&config.storage_path)?);
        let vault = SnapshotVault::open_or_degraded(
            config.storage_path.join(SnapshotVault::DEFAULT_DB_FILE),
            config.vault_limits(),
        )
        .await;

        let parts = ContextParts {
            settings,
            transport: Arc::new(HttpTransport::new()?),
            connector: Arc::new(WsConnector),
            probe: Arc::new(FixedDelayProbe::default()),
            vault,
        };
        Self::assemble(config, parts)
    }

    /// Wires the parts together. Telemetry handlers are registered status board first,
    /// then the detection aggregator.
    pub fn assemble(config: &Config, parts: ContextParts) -> Result<Self, StartupError> {
        let ContextParts {
            settings,
            transport,
            connector,
            probe,
            vault,
        } = parts;

        let addresses = Arc::new(AddressBook::load(settings.clone(), config.default_addresses()?));
        let credentials = Arc::new(SessionCredentials::load(settings.clone()));
        let gateway = Arc::new(RequestGateway::new(transport, config.rate_governor(), credentials));

        let telemetry = TelemetryChannel::new(
            connector,
            TelemetryChannel::url_for(&addresses.controller(), config.telemetry.port),
            config.reconnect_delay(),
        );
        let status = Arc::new(StatusBoard::new());
        let detections = Arc::new(DetectionAggregator::load(settings.clone()));
        telemetry.subscribe(status.clone());
        telemetry.subscribe(detections.clone());

        info!(
            "Dashboard ready: controller {}, telemetry {}",
            addresses.controller(),
            telemetry.url()
        );

        Ok(Self {
            controller: ControllerApi::new(gateway.clone(), addresses.clone()),
            cameras: CameraBoard::new(gateway.clone(), addresses.clone(), probe),
            settings,
            gateway,
            addresses,
            vault,
            telemetry,
            detections,
            status,
            remote_gallery: RwLock::new(Vec::new()),
        })
    }
}
