use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::TelemetryConfig;

/// Install the global tracing subscriber.
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    if config.json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .try_init()?;
    }

    tracing::info!("flowgate telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking the engine calls of one operation
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping one gate operation
pub fn create_operation_span(
    operation: &str,
    user_id: Option<&str>,
    task_id: Option<&str>,
    instance_id: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "gate_operation",
        operation = operation,
        user.id = user_id,
        task.id = task_id,
        instance.id = instance_id,
        correlation.id = %generate_correlation_id(),
    )
}
