//! Workflow engine abstraction
//!
//! The engine owns process definitions, token execution and persistence.
//! This crate only talks to it through [`EngineFacade`], which keeps the
//! authorization layer testable without a running engine.

pub mod memory;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::{InMemoryEngine, ProcessDefinition, UserTaskDefinition};
pub use types::*;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: TaskId },
    #[error("process instance not found: {instance_id}")]
    InstanceNotFound { instance_id: InstanceId },
    #[error("no deployed process definition with key '{key}'")]
    DefinitionNotFound { key: String },
    #[error("invalid process definition: {message}")]
    InvalidDefinition { message: String },
    #[error("engine backend error: {message}")]
    Backend { message: String },
}

/// Query and command surface of the workflow engine.
///
/// Implementations are expected to serialize their own state changes; the
/// callers in this crate issue one request at a time and never retry.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EngineFacade: Send + Sync {
    async fn query_tasks(&self, filter: TaskFilter, order: TaskOrder)
        -> Result<Vec<Task>, EngineError>;

    async fn query_instances(
        &self,
        filter: InstanceFilter,
        order: InstanceOrder,
    ) -> Result<Vec<ProcessInstance>, EngineError>;

    async fn query_historic_tasks(
        &self,
        filter: HistoricTaskFilter,
        order: TaskOrder,
    ) -> Result<Vec<HistoricTaskInstance>, EngineError>;

    async fn query_historic_variables(
        &self,
        filter: HistoricVariableFilter,
    ) -> Result<Vec<HistoricVariable>, EngineError>;

    /// All identity links of a task, in link enumeration order
    async fn query_identity_links(&self, task_id: &str) -> Result<Vec<IdentityLink>, EngineError>;

    async fn start_instance(
        &self,
        definition_key: &str,
        business_key: Option<String>,
        variables: Option<Variables>,
    ) -> Result<ProcessInstance, EngineError>;

    /// Make `user_id` the assignee of the task
    async fn claim(&self, task_id: &str, user_id: &str) -> Result<(), EngineError>;

    /// Complete an open task. With `local_scope` the variables are bound to
    /// the task instead of the owning instance.
    async fn complete(
        &self,
        task_id: &str,
        variables: Option<Variables>,
        local_scope: bool,
    ) -> Result<(), EngineError>;

    async fn set_local_variables(&self, task_id: &str, variables: Variables)
        -> Result<(), EngineError>;

    async fn delete_instance(&self, instance_id: &str, reason: &str) -> Result<(), EngineError>;

    async fn deploy(
        &self,
        resources: Vec<DeploymentResource>,
        name: &str,
    ) -> Result<Deployment, EngineError>;
}
