use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("stored `{entity}` document `{id}` could not be decoded: {message}")]
    Decode {
        entity: &'static str,
        id: String,
        message: String,
    },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn decode(entity: &'static str, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            entity,
            id: id.into(),
            message: message.into(),
        }
    }
}
