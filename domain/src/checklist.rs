//! Checklists: named, ordered selections of rules that scope an analysis run.
//!
//! A checklist belongs to exactly one company or one user. Its ruleset is
//! validated against live rules whenever it is written, and resolved leniently
//! when read, since rules may be deleted afterwards.
use crate::error::Error;
use crate::{checklists, lifecycle, users, Id, IntoUpdateMap, PolicyWithRules, UpdateMap};
use chrono::Utc;
use entity::ownership::EntityKind;
use entity::ruleset::Ruleset;
use entity_api::{checklist, company, mutate, policy_rule, user};
use log::*;
use sea_orm::{DatabaseConnection, IntoActiveModel, Value};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecklistType {
    Company,
    User,
}

impl ChecklistType {
    pub fn of(checklist: &checklists::Model) -> Self {
        if checklist.company_id.is_some() {
            Self::Company
        } else {
            Self::User
        }
    }
}

/// A checklist to create. With a type, the missing owner defaults to the
/// actor's company or the actor.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewChecklist {
    pub name: String,
    #[serde(rename = "type")]
    pub checklist_type: Option<ChecklistType>,
    pub company_id: Option<Id>,
    pub user_id: Option<Id>,
    pub ruleset: Vec<Id>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChecklistChanges {
    pub name: Option<String>,
    pub ruleset: Option<Vec<Id>>,
}

impl IntoUpdateMap for ChecklistChanges {
    fn into_update_map(self) -> UpdateMap {
        let mut update_map = UpdateMap::new();
        update_map.insert("name".to_string(), self.name.map(Value::from));
        update_map.insert(
            "ruleset".to_string(),
            self.ruleset.map(|ids| {
                let ruleset = Ruleset::new(ids);
                Value::Json(Some(Box::new(serde_json::Value::from(ruleset.ids().to_vec()))))
            }),
        );
        update_map
    }
}

/// Superusers see every checklist, everyone else their company's and their own.
pub async fn list_for(
    db: &DatabaseConnection,
    actor: &users::Model,
) -> Result<Vec<checklists::Model>, Error> {
    if actor.is_superuser {
        Ok(checklist::find_all(db).await?)
    } else {
        Ok(checklist::find_by_company_or_user(db, actor.company_id, actor.id).await?)
    }
}

pub async fn find(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
) -> Result<checklists::Model, Error> {
    let checklist = checklist::find_by_id(db, id).await?;
    if !can_manage(actor, &checklist) {
        return Err(Error::forbidden(
            "You don't have permission to view this checklist",
        ));
    }
    Ok(checklist)
}

pub async fn create(
    db: &DatabaseConnection,
    actor: &users::Model,
    new_checklist: NewChecklist,
) -> Result<checklists::Model, Error> {
    policy_rule::ensure_exist(db, &new_checklist.ruleset).await?;

    let NewChecklist {
        name,
        checklist_type,
        mut company_id,
        mut user_id,
        ruleset,
    } = new_checklist;

    match checklist_type {
        Some(ChecklistType::Company) => {
            user_id = None;
            company_id = company_id.or(actor.company_id);
        }
        Some(ChecklistType::User) => {
            company_id = None;
            user_id = user_id.or(Some(actor.id));
        }
        None => {}
    }

    if actor.is_superuser {
        if checklist_type.is_none() && company_id.is_none() && user_id.is_none() {
            return Err(Error::invalid(
                "You must specify a type, company or user for the checklist",
            ));
        }
        if company_id.is_none() && user_id.is_none() {
            return Err(Error::invalid(
                "You must specify either a company or user for the checklist",
            ));
        }
        if company_id.is_some() && user_id.is_some() {
            return Err(Error::invalid(
                "You can only specify either a company or user for the checklist",
            ));
        }
    } else {
        if checklist_type.is_none() {
            return Err(Error::invalid("You must specify a type for the checklist"));
        }
        if company_id.is_some() && company_id != actor.company_id {
            return Err(Error::forbidden(
                "You can only create checklists for your own company",
            ));
        }
        if user_id.is_some() && user_id != Some(actor.id) {
            return Err(Error::forbidden("You can only create checklists for yourself"));
        }
        if company_id.is_none() && user_id.is_none() {
            return Err(Error::invalid(
                "You must belong to a company to create a company checklist",
            ));
        }
    }

    if let Some(user_id) = user_id {
        user::find_by_id(db, user_id).await?;
    }
    if let Some(company_id) = company_id {
        company::find_by_id(db, company_id).await?;
    }

    let now = Utc::now();
    let created = checklist::create(
        db,
        checklists::Model {
            id: 0,
            name,
            user_id,
            company_id,
            ruleset: Ruleset::new(ruleset),
            is_deleted: false,
            created_at: now.into(),
            updated_at: now.into(),
        },
    )
    .await?;
    info!(
        "Created checklist {} with {} rules",
        created.id,
        created.ruleset.len()
    );
    Ok(created)
}

/// Renames the checklist or replaces its ruleset, validating a new ruleset.
pub async fn update(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
    changes: ChecklistChanges,
) -> Result<checklists::Model, Error> {
    let existing = checklist::find_by_id(db, id).await?;
    ensure_can_edit(actor, &existing)?;
    debug!("Updating checklist {id} with {changes:?}");

    if let Some(ruleset) = &changes.ruleset {
        policy_rule::ensure_exist(db, ruleset).await?;
    }

    Ok(
        mutate::update::<checklists::ActiveModel, checklists::Column>(
            db,
            existing.into_active_model(),
            changes.into_update_map(),
        )
        .await?,
    )
}

pub async fn delete(db: &DatabaseConnection, actor: &users::Model, id: Id) -> Result<u64, Error> {
    let existing = checklist::find_by_id(db, id).await?;
    ensure_can_edit(actor, &existing)?;

    lifecycle::soft_delete(db, EntityKind::Checklist, id, true).await
}

/// The checklist's live rules grouped under their policies, in ruleset order.
pub async fn resolve(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
) -> Result<Vec<PolicyWithRules>, Error> {
    let checklist = find(db, actor, id).await?;
    Ok(checklist::resolve_rules(db, checklist.id).await?)
}

fn can_manage(actor: &users::Model, checklist: &checklists::Model) -> bool {
    actor.is_superuser
        || checklist.user_id == Some(actor.id)
        || (checklist.company_id.is_some() && checklist.company_id == actor.company_id)
}

fn ensure_can_edit(actor: &users::Model, checklist: &checklists::Model) -> Result<(), Error> {
    if can_manage(actor, checklist) {
        Ok(())
    } else {
        Err(Error::forbidden(
            "You don't have permission to edit this checklist",
        ))
    }
}
