//! Errors of the data-access layer.
use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;

use sea_orm::error::DbErr;

use entity::Id;

/// A failed query or mutation, with the SeaORM error behind it when there is one.
///
/// `error_kind` separates problems with the data (a missing row, a ruleset
/// naming unknown rules) from problems reaching the database.
#[derive(Debug, PartialEq)]
pub struct Error {
    pub source: Option<DbErr>,
    pub error_kind: EntityApiErrorKind,
}

#[derive(Debug, PartialEq, Serialize)]
pub enum EntityApiErrorKind {
    /// Absent, or soft-deleted where only live rows count
    RecordNotFound,
    RecordNotUpdated,
    /// Rule ids that do not exist or are soft-deleted
    MissingRules(Vec<Id>),
    ValidationError(String),
    /// Names the ownership edge where a cascade stopped
    CascadeFailure(String),
    /// Connection, pool or statement failures
    SystemError,
}

impl Error {
    pub(crate) fn not_found() -> Self {
        Error {
            source: None,
            error_kind: EntityApiErrorKind::RecordNotFound,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: EntityApiErrorKind::ValidationError(message.into()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            EntityApiErrorKind::RecordNotFound => write!(f, "record not found"),
            EntityApiErrorKind::RecordNotUpdated => write!(f, "record not updated"),
            EntityApiErrorKind::MissingRules(ids) => write!(f, "unknown rule ids {ids:?}"),
            EntityApiErrorKind::ValidationError(message) => write!(f, "{message}"),
            EntityApiErrorKind::CascadeFailure(edge) => write!(f, "cascade failed at {edge}"),
            EntityApiErrorKind::SystemError => match &self.source {
                Some(err) => write!(f, "database error: {err}"),
                None => write!(f, "database error"),
            },
        }
    }
}

impl StdError for Error {}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        let error_kind = match err {
            DbErr::RecordNotFound(_) => EntityApiErrorKind::RecordNotFound,
            DbErr::RecordNotUpdated => EntityApiErrorKind::RecordNotUpdated,
            _ => EntityApiErrorKind::SystemError,
        };
        Error {
            source: Some(err),
            error_kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_are_classified() {
        let missing: Error = DbErr::RecordNotFound("companies".to_string()).into();
        assert_eq!(missing.error_kind, EntityApiErrorKind::RecordNotFound);

        let down: Error = DbErr::Conn(sea_orm::RuntimeErr::Internal("refused".to_string())).into();
        assert_eq!(down.error_kind, EntityApiErrorKind::SystemError);
        assert!(down.to_string().contains("refused"));
    }
}
