pub mod config;
pub mod types;

pub use config::{Config, Overrides};
pub use types::{PollingSettings, RateSettings, TelemetrySettings, VaultSettings, WebSettings};
