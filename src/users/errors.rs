//! Error taxonomy of the user repository.
//!
//! Raw `sqlx::Error`s go through [`classify`] before they reach a caller, so
//! constraint violations and connectivity problems can be told apart without
//! string matching on driver messages.

use sqlx::error::ErrorKind;
use thiserror::Error;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// A database failure after classification.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("unique constraint violated ({})", .constraint.as_deref().unwrap_or("unknown"))]
    UniqueViolation { constraint: Option<String>, message: String },
    #[error("foreign key constraint violated ({})", .constraint.as_deref().unwrap_or("unknown"))]
    ForeignKeyViolation { constraint: Option<String>, message: String },
    #[error("not-null constraint violated ({})", .constraint.as_deref().unwrap_or("unknown"))]
    NotNullViolation { constraint: Option<String>, message: String },
    #[error("check constraint violated ({})", .constraint.as_deref().unwrap_or("unknown"))]
    CheckViolation { constraint: Option<String>, message: String },
    #[error("database unavailable: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::Connection(_))
    }

    fn is_constraint(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::NotNullViolation { .. }
                | DbError::CheckViolation { .. }
        )
    }
}

/// Map a raw driver error onto [`DbError`].
pub fn classify(err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::Database(db) => {
            let constraint = db.constraint().map(str::to_owned);
            let message = db.message().to_owned();
            match db.kind() {
                ErrorKind::UniqueViolation => DbError::UniqueViolation { constraint, message },
                ErrorKind::ForeignKeyViolation => {
                    DbError::ForeignKeyViolation { constraint, message }
                }
                ErrorKind::NotNullViolation => DbError::NotNullViolation { constraint, message },
                ErrorKind::CheckViolation => DbError::CheckViolation { constraint, message },
                _ => DbError::Query(sqlx::Error::Database(db)),
            }
        }
        e @ (sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed) => DbError::Connection(e),
        other => DbError::Query(other),
    }
}

/// Errors returned by `UserRepository`.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("no user found with id: {id}")]
    NotFound { id: Uuid },
    #[error("no user found with email: {email}")]
    NotFoundByEmail { email: String },
    #[error(transparent)]
    Database(#[from] DbError),
    /// The statement ran but its result could not be read back.
    #[error("{context}: {source}")]
    Infrastructure {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("user id {got} does not match update target {expected}")]
    IdentifierMismatch { expected: Uuid, got: Uuid },
}

impl RepoError {
    /// Route a driver error either to the classifier or, for result-decoding
    /// failures, to `Infrastructure`.
    pub(crate) fn from_sqlx(err: sqlx::Error, context: &'static str) -> Self {
        match err {
            e @ (sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::TypeNotFound { .. }) => RepoError::Infrastructure { context, source: e },
            e => RepoError::Database(classify(e)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound { .. } | RepoError::NotFoundByEmail { .. })
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, RepoError::Database(db) if db.is_unique_violation())
    }

    /// HTTP-class status a caller should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            RepoError::NotFound { .. } | RepoError::NotFoundByEmail { .. } => 404,
            RepoError::Database(db) if db.is_unique_violation() => 409,
            RepoError::Database(db) if db.is_constraint() => 400,
            RepoError::Database(db) if db.is_connection() => 503,
            RepoError::IdentifierMismatch { .. } => 400,
            RepoError::Database(_) | RepoError::Infrastructure { .. } => 500,
        }
    }
}
