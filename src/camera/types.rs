use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error_handling::types::CameraError;

pub const CAMERA_COUNT: usize = 4;

/// Camera identifier, always within `1..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct CameraId(u8);

impl CameraId {
    pub const ALL: [CameraId; CAMERA_COUNT] = [CameraId(1), CameraId(2), CameraId(3), CameraId(4)];

    pub fn new(id: i64) -> Result<Self, CameraError> {
        if (1..=CAMERA_COUNT as i64).contains(&id) {
            Ok(CameraId(id as u8))
        } else {
            Err(CameraError::InvalidCamera(id))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based slot, for fixed-size per-camera arrays.
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl TryFrom<i64> for CameraId {
    type Error = CameraError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        CameraId::new(id)
    }
}

impl From<CameraId> for u8 {
    fn from(id: CameraId) -> Self {
        id.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn is_on(self) -> bool {
        self == PowerState::On
    }

    pub fn toggled(self) -> Self {
        match self {
            PowerState::On => PowerState::Off,
            PowerState::Off => PowerState::On,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Idle,
    Connecting,
    Live,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraState {
    pub id: CameraId,
    pub power: PowerState,
    pub stream: StreamState,
}

impl CameraState {
    /// Cameras start powered on and idle, matching the dashboard's initial bookkeeping.
    pub fn initial(id: CameraId) -> Self {
        Self {
            id,
            power: PowerState::On,
            stream: StreamState::Idle,
        }
    }
}
