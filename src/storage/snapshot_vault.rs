//! Local snapshot vault.
//!
//! Capacity-bounded archive of captured images on SQLite through SeaORM. Writers
//! (save, eviction, purge) are serialized by one async lock and each step runs inside
//! a transaction, so a reader never observes a half-written record and the store never
//! exceeds its capacity by more than the one insert that crossed it.
//!
//! When the database cannot be opened the vault degrades: reads return nothing and
//! writes are no-ops, and the rest of the dashboard keeps working.

use std::path::Path;

use chrono::Utc;
use log::{debug, error, info, warn};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DbBackend, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
    TransactionTrait,
};
use tokio::sync::Mutex;

use super::db_entities as snapshots;
use super::types::{SnapshotRecord, VaultLimits};
use crate::camera::types::CameraId;
use crate::error_handling::types::StorageError;

#[derive(Debug)]
pub struct SnapshotVault {
    db: Option<DatabaseConnection>,
    limits: VaultLimits,
    write_lock: Mutex<()>,
}

impl SnapshotVault {
    /// Default database filename inside the storage directory
    pub const DEFAULT_DB_FILE: &'static str = "vault.sqlite3";

    /// Opens (or creates) the vault database at `path`.
    pub async fn open<P: AsRef<Path>>(path: P, limits: VaultLimits) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                error!("Failed to create vault dir {}: {}", parent.display(), e);
                StorageError::ConnectionFailed
            })?;
        }

        let mut opts = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.map_err(|e| {
            error!("Failed to open vault {}: {}", path.display(), e);
            StorageError::ConnectionFailed
        })?;

        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                cam_id INTEGER NOT NULL,
                image BLOB NOT NULL
            );",
        )
        .await
        .map_err(|e| {
            error!("Failed to create snapshots table: {}", e);
            StorageError::WriteFailed
        })?;
        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_snapshots_timestamp ON snapshots (timestamp);",
        )
        .await
        .map_err(|e| {
            error!("Failed to create timestamp index: {}", e);
            StorageError::WriteFailed
        })?;

        info!(
            "Snapshot vault active at {} ({} MB cap)",
            path.display(),
            limits.capacity_bytes / (1024 * 1024)
        );
        Ok(Self {
            db: Some(db),
            limits,
            write_lock: Mutex::new(()),
        })
    }

    /// Like [`open`](Self::open), but falls back to a degraded vault on failure.
    pub async fn open_or_degraded<P: AsRef<Path>>(path: P, limits: VaultLimits) -> Self {
        match Self::open(path, limits).await {
            Ok(vault) => vault,
            Err(e) => {
                error!("Vault unavailable ({}), archive runs read-empty/write-no-op", e);
                Self::unavailable(limits)
            }
        }
    }

    /// A vault without backing store.
    pub fn unavailable(limits: VaultLimits) -> Self {
        Self {
            db: None,
            limits,
            write_lock: Mutex::new(()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.db.is_some()
    }

    pub fn limits(&self) -> VaultLimits {
        self.limits
    }

    /// Total bytes of image payload currently persisted.
    pub async fn usage_bytes(&self) -> Result<u64, StorageError> {
        match &self.db {
            Some(db) => usage_on(db).await,
            None => Ok(0),
        }
    }

    /// Evicts one batch of the oldest records if usage exceeds the capacity.
    ///
    /// Returns the number of records removed.
    pub async fn capacity_check(&self) -> Result<u64, StorageError> {
        let Some(db) = &self.db else {
            return Ok(0);
        };
        let _guard = self.write_lock.lock().await;
        self.check_and_evict(db).await
    }

    /// Deletes the `n` records with the smallest timestamps.
    pub async fn evict_oldest(&self, n: u64) -> Result<u64, StorageError> {
        let Some(db) = &self.db else {
            return Ok(0);
        };
        let _guard = self.write_lock.lock().await;
        let txn = db.begin().await.map_err(|_| StorageError::WriteFailed)?;
        let removed = evict_on(&txn, n).await?;
        txn.commit().await.map_err(|_| StorageError::WriteFailed)?;
        Ok(removed)
    }

    /// Runs the capacity check, then appends a new record.
    ///
    /// Returns `None` when the vault is unavailable.
    pub async fn save(
        &self,
        cam_id: CameraId,
        image: &[u8],
    ) -> Result<Option<SnapshotRecord>, StorageError> {
        let Some(db) = &self.db else {
            warn!("Vault unavailable, snapshot from camera {} not archived", cam_id);
            return Ok(None);
        };
        let _guard = self.write_lock.lock().await;
        self.check_and_evict(db).await?;

        let txn = db.begin().await.map_err(|_| StorageError::WriteFailed)?;
        let latest = latest_timestamp_on(&txn).await?;
        let now = Utc::now().timestamp_millis();
        let timestamp = match latest {
            Some(latest) if latest >= now => latest + 1,
            _ => now,
        };

        let entry = snapshots::ActiveModel {
            id: NotSet,
            timestamp: Set(timestamp),
            cam_id: Set(i32::from(cam_id.get())),
            image: Set(image.to_vec()),
        };
        let model = entry.insert(&txn).await.map_err(|e| {
            error!("Failed to insert snapshot: {}", e);
            StorageError::WriteFailed
        })?;
        txn.commit().await.map_err(|_| StorageError::WriteFailed)?;

        debug!(
            "Snapshot {} from camera {} archived ({} bytes)",
            model.id,
            cam_id,
            image.len()
        );
        into_record(model).map(Some)
    }

    /// Every record, most recent first.
    pub async fn list_all(&self) -> Result<Vec<SnapshotRecord>, StorageError> {
        let Some(db) = &self.db else {
            return Ok(Vec::new());
        };
        let rows = snapshots::Entity::find()
            .order_by_desc(snapshots::Column::Timestamp)
            .order_by_desc(snapshots::Column::Id)
            .all(db)
            .await
            .map_err(|e| {
                error!("Failed to list snapshots: {}", e);
                StorageError::ReadFailed
            })?;
        rows.into_iter().map(into_record).collect()
    }

    pub async fn get(&self, id: i64) -> Result<Option<SnapshotRecord>, StorageError> {
        let Some(db) = &self.db else {
            return Ok(None);
        };
        let row = snapshots::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(|_| StorageError::ReadFailed)?;
        row.map(into_record).transpose()
    }

    pub async fn count(&self) -> Result<u64, StorageError> {
        let Some(db) = &self.db else {
            return Ok(0);
        };
        snapshots::Entity::find()
            .count(db)
            .await
            .map_err(|_| StorageError::ReadFailed)
    }

    /// Removes every record.
    pub async fn purge(&self) -> Result<u64, StorageError> {
        let Some(db) = &self.db else {
            return Ok(0);
        };
        let _guard = self.write_lock.lock().await;
        let result = snapshots::Entity::delete_many()
            .exec(db)
            .await
            .map_err(|_| StorageError::WriteFailed)?;
        info!("Vault purged ({} records)", result.rows_affected);
        Ok(result.rows_affected)
    }

    async fn check_and_evict(&self, db: &DatabaseConnection) -> Result<u64, StorageError> {
        let txn = db.begin().await.map_err(|_| StorageError::WriteFailed)?;
        let usage = usage_on(&txn).await?;
        let removed = if usage > self.limits.capacity_bytes {
            warn!(
                "Storage limit reached ({:.2}MB / {}MB). Pruning old records...",
                usage as f64 / (1024.0 * 1024.0),
                self.limits.capacity_bytes / (1024 * 1024)
            );
            evict_on(&txn, self.limits.eviction_batch).await?
        } else {
            0
        };
        txn.commit().await.map_err(|_| StorageError::WriteFailed)?;
        Ok(removed)
    }
}

async fn usage_on<C: ConnectionTrait>(conn: &C) -> Result<u64, StorageError> {
    let row = conn
        .query_one(Statement::from_string(
            DbBackend::Sqlite,
            "SELECT COALESCE(SUM(LENGTH(image)), 0) AS usage FROM snapshots",
        ))
        .await
        .map_err(|_| StorageError::ReadFailed)?;
    let usage: i64 = match row {
        Some(row) => row
            .try_get("", "usage")
            .map_err(|_| StorageError::ReadFailed)?,
        None => 0,
    };
    Ok(usage.max(0) as u64)
}

async fn latest_timestamp_on<C: ConnectionTrait>(conn: &C) -> Result<Option<i64>, StorageError> {
    let row = conn
        .query_one(Statement::from_string(
            DbBackend::Sqlite,
            "SELECT MAX(timestamp) AS latest FROM snapshots",
        ))
        .await
        .map_err(|_| StorageError::ReadFailed)?;
    match row {
        Some(row) => row
            .try_get::<Option<i64>>("", "latest")
            .map_err(|_| StorageError::ReadFailed),
        None => Ok(None),
    }
}

async fn evict_on<C: ConnectionTrait>(conn: &C, n: u64) -> Result<u64, StorageError> {
    let victims: Vec<i64> = snapshots::Entity::find()
        .select_only()
        .column(snapshots::Column::Id)
        .order_by_asc(snapshots::Column::Timestamp)
        .order_by_asc(snapshots::Column::Id)
        .limit(n)
        .into_tuple()
        .all(conn)
        .await
        .map_err(|_| StorageError::ReadFailed)?;
    if victims.is_empty() {
        return Ok(0);
    }

    let result = snapshots::Entity::delete_many()
        .filter(snapshots::Column::Id.is_in(victims))
        .exec(conn)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
    info!("Evicted {} oldest snapshots", result.rows_affected);
    Ok(result.rows_affected)
}

fn into_record(model: snapshots::Model) -> Result<SnapshotRecord, StorageError> {
    let cam_id = CameraId::new(i64::from(model.cam_id)).map_err(|_| {
        error!("Snapshot {} has out-of-range camera {}", model.id, model.cam_id);
        StorageError::ReadFailed
    })?;
    Ok(SnapshotRecord {
        id: model.id,
        cam_id,
        timestamp: model.timestamp,
        image: model.image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn cam(id: i64) -> CameraId {
        CameraId::new(id).unwrap()
    }

    async fn temp_vault(limits: VaultLimits) -> (TempDir, SnapshotVault) {
        let dir = TempDir::new().unwrap();
        let vault = SnapshotVault::open(dir.path().join("test.sqlite3"), limits)
            .await
            .unwrap();
        (dir, vault)
    }

    fn small_limits() -> VaultLimits {
        VaultLimits {
            capacity_bytes: 1500,
            eviction_batch: 10,
        }
    }

    #[tokio::test]
    async fn save_then_list_returns_the_record() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (_dir, vault) = temp_vault(VaultLimits::default()).await;

        let before = Utc::now().timestamp_millis();
        vault.save(cam(3), b"\xff\xd8jpeg").await.unwrap();
        let after = Utc::now().timestamp_millis();

        let all = vault.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].cam_id, cam(3));
        assert!(all[0].timestamp >= before && all[0].timestamp <= after);
        assert_eq!(all[0].image, b"\xff\xd8jpeg");
    }

    #[tokio::test]
    async fn save_over_capacity_evicts_the_ten_oldest() {
        let (_dir, vault) = temp_vault(small_limits()).await;
        let mut ids = Vec::new();
        for i in 0..16i64 {
            let rec = vault.save(cam(1 + i % 4), &[0u8; 100]).await.unwrap().unwrap();
            ids.push(rec.id);
        }
        assert_eq!(vault.usage_bytes().await.unwrap(), 1600);

        let newest = vault.save(cam(2), &[1u8; 100]).await.unwrap().unwrap();

        let remaining: Vec<i64> = vault.list_all().await.unwrap().iter().map(|r| r.id).collect();
        for old in &ids[..10] {
            assert!(!remaining.contains(old), "record {old} should be evicted");
        }
        for kept in &ids[10..] {
            assert!(remaining.contains(kept));
        }
        assert_eq!(remaining[0], newest.id);
        assert_eq!(remaining.len(), 7);
    }

    #[tokio::test]
    async fn capacity_check_is_idempotent() {
        let (_dir, vault) = temp_vault(small_limits()).await;
        for _ in 0..16 {
            vault.save(cam(1), &[0u8; 100]).await.unwrap();
        }
        assert_eq!(vault.capacity_check().await.unwrap(), 10);
        assert_eq!(vault.capacity_check().await.unwrap(), 0);
        assert_eq!(vault.count().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn list_all_is_stable_and_strictly_descending() {
        let (_dir, vault) = temp_vault(VaultLimits::default()).await;
        for i in 0..8i64 {
            vault.save(cam(1 + i % 4), &[i as u8; 8]).await.unwrap();
        }
        let first = vault.list_all().await.unwrap();
        let second = vault.list_all().await.unwrap();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
        assert!(first.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[tokio::test]
    async fn evict_oldest_removes_by_timestamp() {
        let (_dir, vault) = temp_vault(VaultLimits::default()).await;
        for _ in 0..5 {
            vault.save(cam(4), b"x").await.unwrap();
        }
        let oldest = vault.list_all().await.unwrap().last().unwrap().id;
        assert_eq!(vault.evict_oldest(2).await.unwrap(), 2);
        assert!(vault.get(oldest).await.unwrap().is_none());
        assert_eq!(vault.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn concurrent_saves_stay_within_one_record_of_capacity() {
        let dir = TempDir::new().unwrap();
        let limits = VaultLimits {
            capacity_bytes: 1000,
            eviction_batch: 10,
        };
        let vault = Arc::new(
            SnapshotVault::open(dir.path().join("test.sqlite3"), limits)
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..30i64 {
            let vault = vault.clone();
            handles.push(tokio::spawn(async move {
                vault.save(cam(1 + i % 4), &[0u8; 100]).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert!(vault.usage_bytes().await.unwrap() <= 1100);

        let ids: Vec<i64> = vault.list_all().await.unwrap().iter().map(|r| r.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn purge_and_lookup() {
        let (_dir, vault) = temp_vault(VaultLimits::default()).await;
        let rec = vault.save(cam(2), b"img").await.unwrap().unwrap();
        assert_eq!(vault.get(rec.id).await.unwrap().unwrap().cam_id, cam(2));
        assert_eq!(vault.purge().await.unwrap(), 1);
        assert!(vault.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_vault_reads_empty_and_ignores_writes() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a dir").unwrap();

        let vault =
            SnapshotVault::open_or_degraded(blocker.join("vault.sqlite3"), VaultLimits::default())
                .await;
        assert!(!vault.is_available());
        assert_eq!(vault.save(cam(1), b"img").await.unwrap(), None);
        assert!(vault.list_all().await.unwrap().is_empty());
        assert_eq!(vault.capacity_check().await.unwrap(), 0);
    }
}
