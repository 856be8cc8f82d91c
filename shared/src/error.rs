use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

pub type Result<T, E = CommerceError> = std::result::Result<T, E>;

/// Failures surfaced by the inventory and order operations.
///
/// `BadRequest` and `NotFound` carry a message that is safe to show to the
/// caller. `Internal` keeps the underlying store error for logging only.
#[derive(Debug, Error)]
pub enum CommerceError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unique violation")]
    UniqueViolation,

    #[error("error {operation}: {source}")]
    Internal {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl CommerceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        CommerceError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CommerceError::NotFound(message.into())
    }

    pub fn internal(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        CommerceError::Internal {
            operation,
            source: source.into(),
        }
    }
}

impl From<DieselError> for CommerceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                CommerceError::UniqueViolation
            }
            DieselError::NotFound => CommerceError::not_found("record not found"),
            other => CommerceError::internal("database", other),
        }
    }
}

/// Maps a diesel failure, keeping unique violations distinguishable from
/// other write failures.
pub fn db_error(operation: &'static str) -> impl FnOnce(DieselError) -> CommerceError {
    move |err| match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            CommerceError::UniqueViolation
        }
        other => CommerceError::internal(operation, other),
    }
}

/// Tags a foreign error with the operation that failed.
pub trait OperationContext<T> {
    fn during(self, operation: &'static str) -> Result<T>;
}

impl<T, E> OperationContext<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn during(self, operation: &'static str) -> Result<T> {
        self.map_err(|err| CommerceError::internal(operation, err))
    }
}
