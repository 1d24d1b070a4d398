use serde::{Deserialize, Serialize};

use crate::camera::types::{CameraId, PowerState};
use crate::dashboard::StatusTiles;
use crate::storage::SnapshotRecord;
use crate::telemetry::ChannelState;

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub tiles: StatusTiles,
    pub telemetry: ChannelState,
    pub logs: Vec<String>,
}

/// `?state=on|off`; absent means toggle.
#[derive(Debug, Default, Deserialize)]
pub struct PowerQuery {
    pub state: Option<String>,
}

impl PowerQuery {
    pub fn desired(&self) -> Result<Option<PowerState>, String> {
        match self.state.as_deref() {
            None => Ok(None),
            Some("on") | Some("1") => Ok(Some(PowerState::On)),
            Some("off") | Some("0") => Ok(Some(PowerState::Off)),
            Some(other) => Err(format!("Unknown power state '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PowerResponse {
    pub cam_id: CameraId,
    pub power: PowerState,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    /// False when the capture succeeded but the vault is offline
    pub archived: bool,
    pub record: Option<SnapshotRecord>,
}
