//! Soft-delete engine.
//!
//! Rows are never removed. Deleting marks `is_deleted` and, when cascading,
//! walks the ownership graph from [`entity::ownership`] marking every live
//! descendant. Restoring clears the flag, pulls deleted owners back with it,
//! and optionally brings back deleted children.
//!
//! Every read path must start from [`filtered_query`] so deleted rows stay
//! invisible unless a caller asks for them explicitly.
//!
//! The functions here take any [`ConnectionTrait`] so callers can run a whole
//! cascade inside one transaction and roll it back if a branch fails.

use crate::error::{EntityApiErrorKind, Error};
use chrono::Utc;
use entity::ownership::{EntityKind, Ownership};
use entity::Id;
use log::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Alias, Expr, Order, Query};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Select};
use std::collections::HashSet;

const ID: &str = "id";
const IS_DELETED: &str = "is_deleted";
const UPDATED_AT: &str = "updated_at";

/// An entity whose rows carry an `is_deleted` flag.
pub trait SoftDeletable: EntityTrait {
    const KIND: EntityKind;

    fn id_column() -> Self::Column;

    fn is_deleted_column() -> Self::Column;
}

macro_rules! soft_deletable {
    ($($module:ident => $kind:ident),+ $(,)?) => {
        $(
            impl SoftDeletable for entity::$module::Entity {
                const KIND: EntityKind = EntityKind::$kind;

                fn id_column() -> Self::Column {
                    entity::$module::Column::Id
                }

                fn is_deleted_column() -> Self::Column {
                    entity::$module::Column::IsDeleted
                }
            }
        )+
    };
}

soft_deletable!(
    companies => Company,
    users => User,
    documents => Document,
    analysis_results => AnalysisResult,
    conversations => Conversation,
    messages => Message,
    policies => Policy,
    policy_rules => PolicyRule,
    checklists => Checklist,
    embeddings => Embedding,
);

/// Starts a query over `E`, hiding soft-deleted rows unless `include_deleted`.
pub fn filtered_query<E: SoftDeletable>(include_deleted: bool) -> Select<E> {
    let query = E::find();
    if include_deleted {
        query
    } else {
        query.filter(E::is_deleted_column().eq(false))
    }
}

/// Finds a live row by id, treating soft-deleted rows as missing.
pub async fn find_live_by_id<E, C>(db: &C, id: Id) -> Result<E::Model, Error>
where
    E: SoftDeletable,
    C: ConnectionTrait,
{
    filtered_query::<E>(false)
        .filter(E::id_column().eq(id))
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Finds a row by id whether or not it is soft-deleted.
pub async fn find_any_by_id<E, C>(db: &C, id: Id) -> Result<E::Model, Error>
where
    E: SoftDeletable,
    C: ConnectionTrait,
{
    filtered_query::<E>(true)
        .filter(E::id_column().eq(id))
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Marks a row deleted and, with `cascade`, every live row it transitively owns.
///
/// Children that are already deleted are skipped and not descended into, so
/// repeating a cascade changes nothing. Deleting a child never touches its
/// owner. Returns the number of rows marked.
pub async fn soft_delete<C: ConnectionTrait>(
    db: &C,
    kind: EntityKind,
    id: Id,
    cascade: bool,
) -> Result<u64, Error> {
    debug!("Soft deleting {kind} {id} (cascade: {cascade})");

    if deleted_state(db, kind, id).await?.is_none() {
        return Err(Error::not_found());
    }

    let mut marked = set_deleted(db, kind, &[id], true).await?;
    if !cascade {
        return Ok(marked);
    }

    let mut pending = vec![(kind, id)];
    while let Some((owner, owner_id)) = pending.pop() {
        for edge in owner.owned() {
            let children = child_ids(db, edge, owner_id, false)
                .await
                .map_err(|err| cascade_failure("delete", edge, owner_id, err))?;
            marked += set_deleted(db, edge.child, &children, true)
                .await
                .map_err(|err| cascade_failure("delete", edge, owner_id, err))?;
            pending.extend(children.into_iter().map(|child| (edge.child, child)));
        }
    }

    Ok(marked)
}

/// Clears a row's deleted flag.
///
/// With `cascade`, deleted owners are restored as well, recursively. Owned
/// children are restored only when `restore_children` is set, and only along
/// edges that restore with their owner. Returns the number of rows restored.
pub async fn restore<C: ConnectionTrait>(
    db: &C,
    kind: EntityKind,
    id: Id,
    cascade: bool,
    restore_children: bool,
) -> Result<u64, Error> {
    debug!(
        "Restoring {kind} {id} (cascade: {cascade}, restore_children: {restore_children})"
    );

    if deleted_state(db, kind, id).await?.is_none() {
        return Err(Error::not_found());
    }

    let mut restored = set_deleted(db, kind, &[id], false).await?;
    if !cascade {
        return Ok(restored);
    }

    let mut visited = HashSet::from([(kind, id)]);
    let mut pending = vec![(kind, id)];
    while let Some((current, current_id)) = pending.pop() {
        for edge in current.owners() {
            let failed = |err| cascade_failure("restore", edge, current_id, err);

            let Some(owner_id) = owner_id(db, edge, current_id).await.map_err(failed)? else {
                continue;
            };
            if !visited.insert((edge.owner, owner_id)) {
                continue;
            }
            if deleted_state(db, edge.owner, owner_id).await.map_err(failed)? == Some(true) {
                restored += set_deleted(db, edge.owner, &[owner_id], false)
                    .await
                    .map_err(failed)?;
                pending.push((edge.owner, owner_id));
            }
        }

        if !restore_children {
            continue;
        }

        for edge in current.owned().filter(|edge| edge.restores_with_owner) {
            let failed = |err| cascade_failure("restore", edge, current_id, err);

            let children: Vec<Id> = child_ids(db, edge, current_id, true)
                .await
                .map_err(failed)?
                .into_iter()
                .filter(|child| visited.insert((edge.child, *child)))
                .collect();
            restored += set_deleted(db, edge.child, &children, false)
                .await
                .map_err(failed)?;
            pending.extend(children.into_iter().map(|child| (edge.child, child)));
        }
    }

    Ok(restored)
}

fn cascade_failure(action: &str, edge: &Ownership, id: Id, err: DbErr) -> Error {
    warn!(
        "Cascading {action} through {} failed at {} {id}: {err}",
        edge.name, edge.owner
    );
    Error {
        source: Some(err),
        error_kind: EntityApiErrorKind::CascadeFailure(edge.name.to_string()),
    }
}

/// `Some(is_deleted)` for an existing row, `None` when there is no such row.
async fn deleted_state<C: ConnectionTrait>(
    db: &C,
    kind: EntityKind,
    id: Id,
) -> Result<Option<bool>, DbErr> {
    let mut stmt = Query::select();
    stmt.column(Alias::new(IS_DELETED))
        .from(Alias::new(kind.table_name()))
        .and_where(Expr::col(Alias::new(ID)).eq(id));

    let row = db.query_one(db.get_database_backend().build(&stmt)).await?;
    row.map(|row| row.try_get::<bool>("", IS_DELETED))
        .transpose()
}

async fn set_deleted<C: ConnectionTrait>(
    db: &C,
    kind: EntityKind,
    ids: &[Id],
    deleted: bool,
) -> Result<u64, DbErr> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut stmt = Query::update();
    stmt.table(Alias::new(kind.table_name()))
        .value(Alias::new(IS_DELETED), deleted)
        .and_where(Expr::col(Alias::new(ID)).is_in(ids.iter().copied()));
    if kind.has_updated_at() {
        let now: DateTimeWithTimeZone = Utc::now().into();
        stmt.value(Alias::new(UPDATED_AT), now);
    }

    let result = db.execute(db.get_database_backend().build(&stmt)).await?;
    Ok(result.rows_affected())
}

/// Ids of the children on `edge` owned by `owner_id` whose flag equals `deleted`.
async fn child_ids<C: ConnectionTrait>(
    db: &C,
    edge: &Ownership,
    owner_id: Id,
    deleted: bool,
) -> Result<Vec<Id>, DbErr> {
    let mut stmt = Query::select();
    stmt.column(Alias::new(ID))
        .from(Alias::new(edge.child.table_name()))
        .and_where(Expr::col(Alias::new(edge.foreign_key)).eq(owner_id))
        .and_where(Expr::col(Alias::new(IS_DELETED)).eq(deleted))
        .order_by(Alias::new(ID), Order::Asc);
    if let Some((column, value)) = edge.discriminator {
        stmt.and_where(Expr::col(Alias::new(column)).eq(value));
    }

    let rows = db.query_all(db.get_database_backend().build(&stmt)).await?;
    rows.iter().map(|row| row.try_get::<Id>("", ID)).collect()
}

/// The owner id `child_id` points at along `edge`, if it has one.
async fn owner_id<C: ConnectionTrait>(
    db: &C,
    edge: &Ownership,
    child_id: Id,
) -> Result<Option<Id>, DbErr> {
    let mut stmt = Query::select();
    stmt.column(Alias::new(edge.foreign_key))
        .from(Alias::new(edge.child.table_name()))
        .and_where(Expr::col(Alias::new(ID)).eq(child_id));
    if let Some((column, value)) = edge.discriminator {
        stmt.and_where(Expr::col(Alias::new(column)).eq(value));
    }

    let row = db.query_one(db.get_database_backend().build(&stmt)).await?;
    Ok(row
        .map(|row| row.try_get::<Option<Id>>("", edge.foreign_key))
        .transpose()?
        .flatten())
}
