use super::error::{EntityApiErrorKind, Error};
use crate::soft_delete::{filtered_query, find_live_by_id};
use chrono::Utc;
use entity::{companies::*, Id};
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, ActiveValue::Unchanged, DatabaseConnection, QueryOrder,
    QuerySelect,
};

use log::*;

pub async fn create(db: &DatabaseConnection, company_model: Model) -> Result<Model, Error> {
    debug!("New Company Model to be inserted: {company_model:?}");

    let now = Utc::now();

    let company_active_model: ActiveModel = ActiveModel {
        name: Set(company_model.name),
        registration_number: Set(company_model.registration_number),
        country: Set(company_model.country),
        address: Set(company_model.address),
        invite_code: Set(company_model.invite_code),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(company_active_model.insert(db).await?)
}

pub async fn update(db: &DatabaseConnection, id: Id, model: Model) -> Result<Model, Error> {
    let company = find_by_id(db, id).await?;
    debug!("Existing Company model to be Updated: {company:?}");

    let active_model: ActiveModel = ActiveModel {
        id: Unchanged(company.id),
        name: Set(model.name),
        registration_number: Set(model.registration_number),
        country: Set(model.country),
        address: Set(model.address),
        invite_code: Unchanged(company.invite_code),
        is_deleted: Unchanged(company.is_deleted),
        created_at: Unchanged(company.created_at),
        updated_at: Set(Utc::now().into()),
    };

    Ok(active_model.update(db).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    find_live_by_id::<Entity, _>(db, id).await
}

pub async fn find_by_invite_code(db: &DatabaseConnection, invite_code: &str) -> Result<Model, Error> {
    filtered_query::<Entity>(false)
        .filter(Column::InviteCode.eq(invite_code))
        .one(db)
        .await?
        .ok_or_else(|| Error {
            source: None,
            error_kind: EntityApiErrorKind::RecordNotFound,
        })
}

pub async fn find_all(db: &DatabaseConnection, offset: u64, limit: u64) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .order_by_asc(Column::Id)
        .offset(offset)
        .limit(limit)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soft_delete::soft_delete;
    use crate::test_db::{self, fixtures};
    use entity::ownership::EntityKind;

    fn new_company(name: &str, invite_code: Option<&str>) -> Model {
        let now = Utc::now();
        Model {
            id: 0,
            name: name.to_owned(),
            registration_number: Some("HRB 1234".to_owned()),
            country: Some("DE".to_owned()),
            address: None,
            invite_code: invite_code.map(str::to_owned),
            is_deleted: false,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[tokio::test]
    async fn create_then_find_by_invite_code() -> Result<(), Error> {
        let db = test_db::connect().await?;

        let created = create(&db, new_company("Acme", Some("join-acme"))).await?;
        let found = find_by_invite_code(&db, "join-acme").await?;

        assert_eq!(found, created);
        assert!(!found.is_deleted);
        Ok(())
    }

    #[tokio::test]
    async fn deleted_company_invite_code_no_longer_resolves() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let created = create(&db, new_company("Acme", Some("join-acme"))).await?;
        soft_delete(&db, EntityKind::Company, created.id, true).await?;

        let result = find_by_invite_code(&db, "join-acme").await;

        assert_eq!(result.unwrap_err().error_kind, EntityApiErrorKind::RecordNotFound);
        Ok(())
    }

    #[tokio::test]
    async fn update_keeps_invite_code() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let created = create(&db, new_company("Acme", Some("join-acme"))).await?;

        let updated = update(&db, created.id, new_company("Acme GmbH", Some("other"))).await?;

        assert_eq!(updated.name, "Acme GmbH");
        assert_eq!(updated.invite_code.as_deref(), Some("join-acme"));
        Ok(())
    }

    #[tokio::test]
    async fn find_all_pages_through_live_companies() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let first = fixtures::company(&db, "A").await;
        let second = fixtures::company(&db, "B").await;
        let third = fixtures::company(&db, "C").await;
        soft_delete(&db, EntityKind::Company, second.id, false).await?;

        assert_eq!(find_all(&db, 0, 10).await?, vec![first, third.clone()]);
        assert_eq!(find_all(&db, 1, 1).await?, vec![third]);
        Ok(())
    }
}
