use thiserror::Error;

use crate::engine::EngineError;

/// Errors surfaced by the authorization and navigation layer.
///
/// Nothing here is retried; engine failures are handed back as they came.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("user '{user_id}' is not allowed to act on task '{task_id}'")]
    Unauthorized { user_id: String, task_id: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Engine(EngineError),
}

impl GateError {
    pub fn task_not_found(task_id: &str) -> Self {
        GateError::NotFound {
            entity: "task",
            id: task_id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GateError::NotFound { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GateError::Unauthorized { .. })
    }
}

impl From<EngineError> for GateError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::TaskNotFound { task_id } => GateError::task_not_found(&task_id),
            EngineError::InstanceNotFound { instance_id } => GateError::NotFound {
                entity: "process instance",
                id: instance_id,
            },
            other => GateError::Engine(other),
        }
    }
}

pub type GateResult<T> = Result<T, GateError>;

/// Reject blank user ids before any engine round trip
pub(crate) fn require_user(user_id: &str) -> GateResult<()> {
    if user_id.trim().is_empty() {
        return Err(GateError::InvalidArgument(
            "a user id is required".to_string(),
        ));
    }
    Ok(())
}
