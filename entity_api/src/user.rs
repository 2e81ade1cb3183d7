use super::error::Error;
use crate::soft_delete::{filtered_query, find_live_by_id};
use chrono::Utc;
use entity::{users::*, Id};
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder};

use log::*;

pub async fn create(db: &DatabaseConnection, user_model: Model) -> Result<Model, Error> {
    debug!("New User Model to be inserted: {user_model:?}");

    let now = Utc::now();

    let user_active_model: ActiveModel = ActiveModel {
        company_id: Set(user_model.company_id),
        email: Set(user_model.email.to_lowercase()),
        first_name: Set(user_model.first_name),
        last_name: Set(user_model.last_name),
        is_superuser: Set(user_model.is_superuser),
        is_active: Set(user_model.is_active),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(user_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    find_live_by_id::<Entity, _>(db, id).await
}

/// Looks up a live user by email, ignoring case.
pub async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .filter(Column::Email.eq(email.to_lowercase()))
        .one(db)
        .await?)
}

pub async fn find_by_company(db: &DatabaseConnection, company_id: Id) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .filter(Column::CompanyId.eq(company_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

/// Fails with a validation error when a live user already uses `email`.
pub async fn ensure_email_available(db: &DatabaseConnection, email: &str) -> Result<(), Error> {
    match find_by_email(db, email).await? {
        Some(_) => Err(Error::validation(format!(
            "A user with email {email} already exists"
        ))),
        None => Ok(()),
    }
}
