//! SeaORM entity model used by the snapshot vault.
//!
//! Maps to the SQLite table created by `snapshot_vault`:
//! - `snapshots`: one captured image per row, ordered by `timestamp`

use sea_orm::entity::prelude::*;

/// Snapshots table entity model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "snapshots")]
pub struct Model {
    /// Store-assigned, strictly increasing identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Capture time in epoch milliseconds
    pub timestamp: i64,
    /// Camera the image came from (1..=4)
    pub cam_id: i32,
    /// Raw image payload
    pub image: Vec<u8>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
