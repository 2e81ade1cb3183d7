//! Error types for the `domain` layer.
use entity::Id;
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use review_ai::Error as AiError;
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. Each layer translates the errors of the layer below it, so a
/// caller of `domain` never needs to depend on `entity_api` or `review-ai` to decide
/// how to respond; [`Error::classification`] reduces any error to the four outcomes
/// a boundary has to distinguish.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Entity(EntityErrorKind),
    Config,
    Other(String),
}

/// Errors about the records an operation touches, whether detected here or
/// translated from `entity_api`.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    /// Absent or soft-deleted
    NotFound,
    /// The actor may not act on the record's tenant or owner
    Forbidden(String),
    Invalid(String),
    /// A ruleset names rules that do not exist or are deleted
    UnknownRules(Vec<Id>),
    /// A cascading soft delete or restore failed on the named relation
    CascadeFailure(String),
    DbTransaction,
    Other(String),
}

/// Failures of the collaborators the domain calls out to.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Embedding,
    Analysis,
    TextExtraction,
    Timeout,
    Network,
    Other(String),
}

/// How a boundary should report an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    NotFound,
    Forbidden,
    BadRequest,
    ServerError,
}

impl Error {
    pub fn not_found() -> Self {
        Self::entity(EntityErrorKind::NotFound)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::entity(EntityErrorKind::Forbidden(message.into()))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::entity(EntityErrorKind::Invalid(message.into()))
    }

    pub fn config() -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }

    fn entity(kind: EntityErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(kind)),
        }
    }

    /// Translates a failure of the embedding provider.
    pub fn embedding(err: AiError) -> Self {
        Self::external(err, ExternalErrorKind::Embedding)
    }

    /// Translates a failure of the document analyzer.
    pub fn analysis(err: AiError) -> Self {
        Self::external(err, ExternalErrorKind::Analysis)
    }

    /// Translates a failure of the text extractor.
    pub fn extraction(err: AiError) -> Self {
        Self::external(err, ExternalErrorKind::TextExtraction)
    }

    fn external(err: AiError, kind: ExternalErrorKind) -> Self {
        let error_kind = match &err {
            AiError::Timeout(_) => DomainErrorKind::External(ExternalErrorKind::Timeout),
            AiError::Configuration(_) => DomainErrorKind::Internal(InternalErrorKind::Config),
            _ => DomainErrorKind::External(kind),
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }

    /// Reduces the error to the response class a boundary should use.
    pub fn classification(&self) -> Classification {
        match &self.error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Entity(kind)) => match kind {
                EntityErrorKind::NotFound => Classification::NotFound,
                EntityErrorKind::Forbidden(_) => Classification::Forbidden,
                EntityErrorKind::Invalid(_) | EntityErrorKind::UnknownRules(_) => {
                    Classification::BadRequest
                }
                EntityErrorKind::CascadeFailure(_)
                | EntityErrorKind::DbTransaction
                | EntityErrorKind::Other(_) => Classification::ServerError,
            },
            DomainErrorKind::Internal(_) | DomainErrorKind::External(_) => {
                Classification::ServerError
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::UnknownRules(
                ids,
            ))) => write!(f, "Rules with IDs {ids:?} don't exist"),
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Forbidden(
                message,
            )))
            | DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Invalid(
                message,
            ))) => write!(f, "{message}"),
            _ => write!(f, "Domain Error: {self:?}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the `entity_api` layer to the `domain` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let entity_error_kind = match &err.error_kind {
            EntityApiErrorKind::RecordNotFound => EntityErrorKind::NotFound,
            EntityApiErrorKind::ValidationError(message) => {
                EntityErrorKind::Invalid(message.clone())
            }
            EntityApiErrorKind::MissingRules(ids) => EntityErrorKind::UnknownRules(ids.clone()),
            EntityApiErrorKind::CascadeFailure(relation) => {
                EntityErrorKind::CascadeFailure(relation.clone())
            }
            EntityApiErrorKind::SystemError => EntityErrorKind::DbTransaction,
            EntityApiErrorKind::RecordNotUpdated => {
                EntityErrorKind::Other("Record not updated".to_string())
            }
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(entity_error_kind)),
        }
    }
}

// Transactions are opened in the domain layer, so their errors arrive unwrapped.
impl From<sea_orm::DbErr> for Error {
    fn from(err: sea_orm::DbErr) -> Self {
        Error::from(EntityApiError::from(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "Document storage error".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_api_errors_keep_their_meaning() {
        let missing: Error = EntityApiError {
            source: None,
            error_kind: EntityApiErrorKind::MissingRules(vec![4, 9]),
        }
        .into();
        assert_eq!(
            missing.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::UnknownRules(
                vec![4, 9]
            )))
        );
        assert_eq!(missing.classification(), Classification::BadRequest);
        assert_eq!(missing.to_string(), "Rules with IDs [4, 9] don't exist");

        let cascade: Error = EntityApiError {
            source: None,
            error_kind: EntityApiErrorKind::CascadeFailure("company.documents".to_string()),
        }
        .into();
        assert_eq!(cascade.classification(), Classification::ServerError);
    }

    #[test]
    fn classification_covers_the_taxonomy() {
        assert_eq!(Error::not_found().classification(), Classification::NotFound);
        assert_eq!(
            Error::forbidden("You don't have permission to edit this checklist").classification(),
            Classification::Forbidden
        );
        assert_eq!(Error::invalid("bad").classification(), Classification::BadRequest);
        assert_eq!(
            Error::embedding(AiError::Network("reset".to_string())).classification(),
            Classification::ServerError
        );
    }

    #[test]
    fn collaborator_timeouts_are_reported_as_timeouts() {
        let err = Error::analysis(AiError::Timeout("60s".to_string()));
        assert_eq!(
            err.error_kind,
            DomainErrorKind::External(ExternalErrorKind::Timeout)
        );

        let err = Error::embedding(AiError::Provider("quota".to_string()));
        assert_eq!(
            err.error_kind,
            DomainErrorKind::External(ExternalErrorKind::Embedding)
        );

        let err = Error::embedding(AiError::Configuration("no key".to_string()));
        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Config)
        );
    }
}
