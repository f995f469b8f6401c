//! Error handler for the user directory.

use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, StoreError>;

/// What kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    /// No user matches the id, email or username.
    Account,
    /// No user matches the `(auth_data, auth_service)` pair.
    AuthAccount,
    Team,
    Channel,
    Bot,
    Group,
    Status,
    Membership,
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            NotFoundKind::Account => write!(f, "account"),
            NotFoundKind::AuthAccount => write!(f, "auth account"),
            NotFoundKind::Team => write!(f, "team"),
            NotFoundKind::Channel => write!(f, "channel"),
            NotFoundKind::Bot => write!(f, "bot"),
            NotFoundKind::Group => write!(f, "group"),
            NotFoundKind::Status => write!(f, "status"),
            NotFoundKind::Membership => write!(f, "membership"),
        }
    }
}

/// Enum representing store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: NotFoundKind, key: String },

    #[error("duplicate value for `{field}`")]
    DuplicateKey { field: String },

    #[error("invalid argument `{field}`: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("SQL request failed: {0}")]
    StorageFailure(SQLxError),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("props serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Build a [`StoreError::NotFound`].
    pub fn not_found(kind: NotFoundKind, key: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Build a [`StoreError::InvalidArgument`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        StoreError::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the error is a missing record of the given kind.
    pub fn is_not_found(&self, expected: NotFoundKind) -> bool {
        matches!(self, StoreError::NotFound { kind, .. } if *kind == expected)
    }
}

impl From<SQLxError> for StoreError {
    fn from(err: SQLxError) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::DuplicateKey {
                    field: duplicated_field(db_err.message()),
                };
            }
        }

        StoreError::StorageFailure(err)
    }
}

/// Extract the column from an engine message such as
/// `UNIQUE constraint failed: users.email`.
fn duplicated_field(message: &str) -> String {
    let columns = message.rsplit(':').next().unwrap_or(message);

    columns
        .split(',')
        .map(|column| column.trim())
        .map(|column| column.rsplit('.').next().unwrap_or(column))
        .find(|column| *column != "auth_service")
        .unwrap_or("unknown")
        .to_owned()
}
