// Flowgate Library - authorization and navigation for workflow engine tasks
// This exposes the core components for embedding and testing

pub mod authorization;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod navigator;
pub mod observability;
pub mod resolver;
pub mod telemetry;
pub mod trail;
pub mod transitions;

// Re-export key types for easy access
pub use authorization::AuthorizationEngine;
pub use config::{AuthorizationConfig, GateConfig, TelemetryConfig};
pub use engine::{
    DeploymentResource, EngineError, EngineFacade, HistoricTaskInstance, InMemoryEngine,
    ProcessDefinition, ProcessInstance, Task, Variables,
};
pub use error::{GateError, GateResult};
pub use gate::ApprovalGate;
pub use navigator::InstanceNavigator;
pub use observability::{GateMetrics, GateStats, OperationTimer};
pub use resolver::TaskResolver;
pub use telemetry::{create_operation_span, generate_correlation_id, init_telemetry};
pub use trail::{TrailReport, TrailReporter};
pub use transitions::TransitionController;
