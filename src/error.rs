use crate::provider::ProviderError;
use thiserror::Error;

/// Errors surfaced by the phrase pipeline.
#[derive(Debug, Error)]
pub enum PhraseError {
    /// A project, phrase or translation entry does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Input rejected before any write happened
    #[error("validation failed: {0}")]
    Validation(String),

    /// A write collided with the (project, source hash) or (project, key) constraint
    #[error("conflict: {0}")]
    Conflict(String),

    /// Upstream translation provider failure
    #[error("translation provider failed: {0}")]
    Provider(#[from] ProviderError),

    /// Backing store failure
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Export encoding failure (no partial payload is produced)
    #[error("export failed: {0}")]
    Export(String),
}

impl PhraseError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<sqlx::Error> for PhraseError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() {
                return Self::Conflict(db_error.message().to_string());
            }
        }
        Self::Storage(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PhraseError>;
