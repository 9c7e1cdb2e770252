use crate::db;

/// Every failure a domain operation can report. Each one is scoped to a
/// single request.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{field} is already registered")]
    DuplicateIdentity { field: &'static str },

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("login required")]
    Unauthenticated,

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("not permitted to {action}")]
    Forbidden { action: &'static str },

    #[error("already enrolled in this class")]
    AlreadyEnrolled,

    #[error("conflicting write on {0}")]
    Conflict(&'static str),

    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error(transparent)]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        DomainError::NotFound { entity }
    }

    pub fn forbidden(action: &'static str) -> Self {
        DomainError::Forbidden { action }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Stable machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::DuplicateIdentity { .. } => "duplicate_identity",
            DomainError::InvalidCredentials => "invalid_credentials",
            DomainError::Unauthenticated => "unauthenticated",
            DomainError::NotFound { .. } => "not_found",
            DomainError::Forbidden { .. } => "forbidden",
            DomainError::AlreadyEnrolled => "already_enrolled",
            DomainError::Conflict(_) => "conflict",
            DomainError::Validation { .. } => "bad_params",
            DomainError::Store(_) => "db_query_failed",
            DomainError::Internal(_) => "internal",
        }
    }

    /// Reclassifies a uniqueness violation; any other store error passes through.
    pub fn on_unique_violation(e: rusqlite::Error, mapped: DomainError) -> DomainError {
        if db::is_unique_violation(&e) {
            mapped
        } else {
            DomainError::Store(e)
        }
    }
}
