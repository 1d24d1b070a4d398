use super::types::*;
use crate::camera::types::CameraId;
use crate::controller::address_book::Addresses;
use crate::error_handling::types::ConfigError;
use crate::gateway::{EndpointAddress, RateGovernor};
use crate::storage::types::VaultLimits;
use clap::ArgAction;
use log::{debug, info};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration structure that defines all runtime parameters.
///
/// This structure holds the complete configuration of the dashboard: where the controller
/// and the cameras live, where local data is stored, the vault capacity, the request rate
/// limits, the telemetry and polling cadence and the optional local web interface. It is
/// read from a TOML file with `toml` and then adjusted by the command-line [`Overrides`]
/// parsed with `clap`.
///
/// # Examples
///
/// ```
/// use pyramid::configuration::Config;
///
/// let config = Config::from_toml_str(r#"
///     controller_address = "192.168.4.1"
///     [vault]
///     capacity_mb = 500
/// "#).unwrap();
/// assert_eq!(config.vault.capacity_mb, 500);
/// assert_eq!(config.telemetry.port, 81);
/// ```
///
/// # Fields Overview
///
/// - `controller_address`: dotted-quad of the controller, optionally with a port
/// - `camera_addresses`: camera id (`"1"` to `"4"`) to `host:port`
/// - `storage_path`: directory holding the vault database and the settings file
/// - `vault`: capacity ceiling and eviction batch size
/// - `rate`: per-minute ceiling and minimum spacing of outbound requests
/// - `telemetry`: push channel port and reconnect delay
/// - `polling`: fallback status and gallery refresh intervals
/// - `web`: local web interface switch and port
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address of the controller.
    ///
    /// A previously persisted controller address (from a Wi-Fi setup) takes precedence
    /// over this value at start-up.
    pub controller_address: String,

    /// Per-camera addresses, keyed by camera id.
    ///
    /// Cameras missing from the map are derived from the controller address
    /// (`a.b.c.(d+N):80`).
    pub camera_addresses: BTreeMap<String, String>,

    /// File system path for local data.
    ///
    /// Created on start-up if missing.
    pub storage_path: PathBuf,

    pub vault: VaultSettings,
    pub rate: RateSettings,
    pub telemetry: TelemetrySettings,
    pub polling: PollingSettings,
    pub web: WebSettings,
}

impl Default for Config {
    fn default() -> Self {
        let camera_addresses = (1..=4)
            .map(|id| (id.to_string(), format!("192.168.4.{}:80", id + 1)))
            .collect();
        Self {
            controller_address: "192.168.4.1".to_string(),
            camera_addresses,
            storage_path: PathBuf::from("pyramid-data"),
            vault: VaultSettings::default(),
            rate: RateSettings::default(),
            telemetry: TelemetrySettings::default(),
            polling: PollingSettings::default(),
            web: WebSettings::default(),
        }
    }
}

/// Command-line adjustments applied on top of the configuration file.
///
/// # Command Line
/// Every field maps to a `--long-flag`; the address and storage flags can also come from
/// the `PYRAMID_CONTROLLER` and `PYRAMID_STORAGE_PATH` environment variables.
#[derive(clap::Args, Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    /// Controller address, e.g. `192.168.4.1`
    #[arg(long, env = "PYRAMID_CONTROLLER")]
    pub controller: Option<String>,

    /// Directory for the vault database and settings file
    #[arg(long, env = "PYRAMID_STORAGE_PATH")]
    pub storage_path: Option<PathBuf>,

    /// Serve the local web interface
    #[arg(long, action = ArgAction::SetTrue)]
    pub web: bool,

    /// Port for the local web interface
    #[arg(long)]
    pub web_port: Option<u16>,
}

impl Config {
    /// Reads, parses and validates a TOML configuration file.
    ///
    /// # Errors
    /// `IoError` when the file cannot be read, `TomlError` when it is not valid TOML for this
    /// structure, `BadIPFormatting` / `NotInRange` when a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Reading configuration from {}", path.display());
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies command-line overrides, then re-validates.
    pub fn apply(&mut self, overrides: &Overrides) -> Result<(), ConfigError> {
        if let Some(controller) = &overrides.controller {
            debug!("Controller address overridden: {}", controller);
            self.controller_address = controller.clone();
        }
        if let Some(path) = &overrides.storage_path {
            self.storage_path = path.clone();
        }
        if overrides.web {
            self.web.enabled = true;
        }
        if let Some(port) = overrides.web_port {
            self.web.port = port;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller()?;
        self.default_addresses()?;

        if self.vault.capacity_mb == 0 {
            return Err(ConfigError::NotInRange("vault.capacity_mb must be > 0".into()));
        }
        if self.vault.capacity_mb.checked_mul(VaultLimits::MEGABYTE).is_none() {
            return Err(ConfigError::NotInRange(format!(
                "vault.capacity_mb too large: {}",
                self.vault.capacity_mb
            )));
        }
        if self.vault.eviction_batch == 0 {
            return Err(ConfigError::NotInRange("vault.eviction_batch must be > 0".into()));
        }
        if self.rate.max_requests_per_minute == 0 {
            return Err(ConfigError::NotInRange(
                "rate.max_requests_per_minute must be > 0".into(),
            ));
        }
        if self.telemetry.port == 0 {
            return Err(ConfigError::NotInRange("telemetry.port must be > 0".into()));
        }
        if self.polling.status_interval_secs == 0 || self.polling.gallery_interval_secs == 0 {
            return Err(ConfigError::NotInRange("polling intervals must be > 0".into()));
        }
        if self.web.enabled && self.web.port == 0 {
            return Err(ConfigError::NotInRange("web.port must be > 0".into()));
        }
        Ok(())
    }

    pub fn controller(&self) -> Result<EndpointAddress, ConfigError> {
        EndpointAddress::parse(&self.controller_address)
            .map_err(|_| ConfigError::BadIPFormatting(self.controller_address.clone()))
    }

    /// Configured addresses, before any persisted override.
    pub fn default_addresses(&self) -> Result<Addresses, ConfigError> {
        let mut addresses = Addresses::derived_from(self.controller()?);
        for (id, raw) in &self.camera_addresses {
            let cam = id
                .parse::<i64>()
                .ok()
                .and_then(|id| CameraId::new(id).ok())
                .ok_or_else(|| ConfigError::NotInRange(format!("camera id {}", id)))?;
            let address = EndpointAddress::parse(raw)
                .map_err(|_| ConfigError::BadIPFormatting(raw.clone()))?;
            addresses.cameras.insert(cam, address);
        }
        Ok(addresses)
    }

    pub fn vault_limits(&self) -> VaultLimits {
        VaultLimits::from_megabytes(self.vault.capacity_mb, self.vault.eviction_batch)
    }

    pub fn rate_governor(&self) -> RateGovernor {
        RateGovernor::new(
            self.rate.max_requests_per_minute,
            Duration::from_millis(self.rate.min_spacing_ms),
        )
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.telemetry.reconnect_delay_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.polling.status_interval_secs)
    }

    pub fn gallery_interval(&self) -> Duration {
        Duration::from_secs(self.polling.gallery_interval_secs)
    }
}
