use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AutosaveError {
    #[error("Remote write failed for '{entity_id}': {message}")]
    RemoteWrite { entity_id: String, message: String },

    #[error("Validation failed on '{field}' at row {index}")]
    Validation { field: String, index: usize },

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl AutosaveError {
    pub fn remote_write(entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteWrite {
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AutosaveError>;

impl<T> From<std::sync::PoisonError<T>> for AutosaveError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<serde_json::Error> for AutosaveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
