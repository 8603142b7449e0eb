use thiserror::Error;
use ulid::Ulid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Ulid },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub(crate) fn facility_not_found(id: Ulid) -> Self {
        EngineError::NotFound { entity: "facility", id }
    }

    pub(crate) fn slot_not_found(id: Ulid) -> Self {
        EngineError::NotFound { entity: "slot", id }
    }

    pub(crate) fn booking_not_found(id: Ulid) -> Self {
        EngineError::NotFound { entity: "booking", id }
    }

    pub(crate) fn member_not_found(id: Ulid) -> Self {
        EngineError::NotFound { entity: "member", id }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "not_found",
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::InvalidState(_) => "invalid_state",
            EngineError::Conflict(_) => "conflict",
            EngineError::Storage(_) => "storage",
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}
