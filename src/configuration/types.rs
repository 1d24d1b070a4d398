use serde::Deserialize;

use crate::storage::types::{DEFAULT_CAPACITY_MB, DEFAULT_EVICTION_BATCH};

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    pub capacity_mb: u64,
    pub eviction_batch: u64,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            capacity_mb: DEFAULT_CAPACITY_MB,
            eviction_batch: DEFAULT_EVICTION_BATCH,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct RateSettings {
    pub max_requests_per_minute: u32,
    pub min_spacing_ms: u64,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 60,
            min_spacing_ms: 1000,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub port: u16,
    pub reconnect_delay_secs: u64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            port: 81,
            reconnect_delay_secs: 5,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub status_interval_secs: u64,
    pub gallery_interval_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            status_interval_secs: 5,
            gallery_interval_secs: 30,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub enabled: bool,
    pub port: u16,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}
