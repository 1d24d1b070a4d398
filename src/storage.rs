//! Storage subsystem
//!
//! Local persistence for the dashboard.
//!
//! Components:
//! - `snapshot_vault`: capacity-bounded SQLite archive of captured images (SeaORM).
//! - `db_entities`: SeaORM entity model for the `snapshots` table.
//! - `settings_store`: scalar key/value settings (addresses, credentials, counters, UI flags).
//! - `types`: records and capacity limits shared by the vault and its callers.

pub mod db_entities;
pub mod settings_store;
pub mod snapshot_vault;
pub mod types;

pub use settings_store::{FileSettings, MemorySettings, SettingsStore};
pub use snapshot_vault::SnapshotVault;
pub use types::{SnapshotRecord, VaultLimits};
