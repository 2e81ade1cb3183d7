use crate::error::Error;
use crate::{users, Id};
use chrono::Utc;
use entity_api::error::EntityApiErrorKind;
use entity_api::{company, user};
use log::*;
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub use entity_api::user::{find_by_company, find_by_email, find_by_id};

/// A self-registration request. Credentials are handled outside this crate.
#[derive(Clone, Debug, Deserialize)]
pub struct Registration {
    pub invite_code: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Creates a user in the company whose invite code was presented.
pub async fn register(db: &DatabaseConnection, registration: Registration) -> Result<users::Model, Error> {
    let company = match company::find_by_invite_code(db, &registration.invite_code).await {
        Ok(company) => company,
        Err(err) if err.error_kind == EntityApiErrorKind::RecordNotFound => {
            warn!("Registration for {} with an unknown invite code", registration.email);
            return Err(Error::forbidden("Invalid invite code"));
        }
        Err(err) => return Err(err.into()),
    };

    user::ensure_email_available(db, &registration.email).await?;

    let now = Utc::now();
    let created = user::create(
        db,
        users::Model {
            id: 0,
            company_id: Some(company.id),
            email: registration.email,
            first_name: registration.first_name,
            last_name: registration.last_name,
            is_superuser: false,
            is_active: true,
            is_deleted: false,
            created_at: now.into(),
            updated_at: now.into(),
        },
    )
    .await?;
    info!("Registered user {} in company {}", created.id, company.id);
    Ok(created)
}

/// Whether the user belongs to the company, superusers belonging everywhere.
pub fn is_member(actor: &users::Model, company_id: Option<Id>) -> bool {
    actor.is_superuser || (company_id.is_some() && actor.company_id == company_id)
}
