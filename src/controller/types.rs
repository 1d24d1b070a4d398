use serde::{Deserialize, Serialize};

use crate::error_handling::types::SetupError;

pub const MIN_AP_PASSWORD_LEN: usize = 8;

/// `GET /wifi/status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WifiStatus {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

impl WifiStatus {
    /// Access-point mode, or no mode reported at all.
    pub fn needs_setup(&self) -> bool {
        matches!(self.mode.as_deref(), None | Some("") | Some("ap"))
    }
}

/// One entry of `POST /wifi/scan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiNetwork {
    pub ssid: String,
    #[serde(default)]
    pub rssi: i32,
    #[serde(default)]
    pub encrypted: bool,
}

/// Body of `POST /wifi/config`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode")]
pub enum WifiConfig {
    #[serde(rename = "ap")]
    AccessPoint {
        ssid: String,
        password: String,
        ip: String,
    },
    #[serde(rename = "station")]
    Station { ssid: String, password: String },
}

impl WifiConfig {
    pub fn validate(&self) -> Result<(), SetupError> {
        match self {
            WifiConfig::AccessPoint { ssid, password, .. } => {
                if ssid.trim().is_empty() || password.chars().count() < MIN_AP_PASSWORD_LEN {
                    return Err(SetupError::Invalid(format!(
                        "AP SSID and password (min {} chars) required",
                        MIN_AP_PASSWORD_LEN
                    )));
                }
            }
            WifiConfig::Station { ssid, .. } => {
                if ssid.trim().is_empty() {
                    return Err(SetupError::Invalid("WiFi SSID required".into()));
                }
            }
        }
        Ok(())
    }
}

/// Answer to `POST /wifi/config`; `ip` is the controller's address after restart.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WifiConfigResult {
    #[serde(default)]
    pub ip: Option<String>,
}
