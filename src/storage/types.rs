use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::camera::types::CameraId;

pub const DEFAULT_CAPACITY_MB: u64 = 1000;
pub const DEFAULT_EVICTION_BATCH: u64 = 10;

/// One archived capture. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    pub id: i64,
    pub cam_id: CameraId,
    /// Epoch milliseconds
    pub timestamp: i64,
    #[serde(skip_serializing)]
    pub image: Vec<u8>,
}

impl SnapshotRecord {
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    pub fn size(&self) -> usize {
        self.image.len()
    }
}

/// Capacity policy of the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultLimits {
    /// Usage above this many bytes triggers eviction
    pub capacity_bytes: u64,
    /// Records removed per eviction round
    pub eviction_batch: u64,
}

impl VaultLimits {
    pub const MEGABYTE: u64 = 1024 * 1024;

    /// Saturates at `u64::MAX`; `Config::validate` rejects capacities that would.
    pub fn from_megabytes(capacity_mb: u64, eviction_batch: u64) -> Self {
        Self {
            capacity_bytes: capacity_mb.saturating_mul(Self::MEGABYTE),
            eviction_batch,
        }
    }
}

impl Default for VaultLimits {
    fn default() -> Self {
        Self::from_megabytes(DEFAULT_CAPACITY_MB, DEFAULT_EVICTION_BATCH)
    }
}
