//! Transactional soft delete and restore.
//!
//! The engine in `entity_api::soft_delete` walks the ownership graph on any
//! connection. Here every walk runs in its own transaction, so a cascade that
//! fails part way leaves nothing marked and reports `CascadeFailure`.
use crate::error::Error;
use crate::Id;
use entity::ownership::EntityKind;
use entity_api::soft_delete as engine;
use log::*;
use sea_orm::{DatabaseConnection, TransactionTrait};

/// Soft-deletes the row and, with `cascade`, everything it owns.
/// Returns the number of rows marked.
pub async fn soft_delete(
    db: &DatabaseConnection,
    kind: EntityKind,
    id: Id,
    cascade: bool,
) -> Result<u64, Error> {
    let txn = db.begin().await?;
    match engine::soft_delete(&txn, kind, id, cascade).await {
        Ok(marked) => {
            txn.commit().await?;
            info!("Soft-deleted {kind:?} {id} and {} dependent row(s)", marked.saturating_sub(1));
            Ok(marked)
        }
        Err(err) => {
            txn.rollback().await?;
            Err(err.into())
        }
    }
}

/// Restores the row. With `cascade` its deleted owners come back too, and
/// with `restore_children` also the rows it owns.
pub async fn restore(
    db: &DatabaseConnection,
    kind: EntityKind,
    id: Id,
    cascade: bool,
    restore_children: bool,
) -> Result<u64, Error> {
    let txn = db.begin().await?;
    match engine::restore(&txn, kind, id, cascade, restore_children).await {
        Ok(restored) => {
            txn.commit().await?;
            info!("Restored {kind:?} {id}, {restored} row(s) in total");
            Ok(restored)
        }
        Err(err) => {
            txn.rollback().await?;
            Err(err.into())
        }
    }
}
