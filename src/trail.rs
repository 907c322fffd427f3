use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::engine::{
    EngineFacade, HistoricTaskFilter, HistoricTaskInstance, HistoricVariableFilter, SortOrder,
    Task, TaskOrder, Variables,
};
use crate::error::GateResult;
use crate::resolver::TaskResolver;

/// What happened to an instance so far and what is still open
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailReport {
    pub instance_id: String,
    pub history: Vec<HistoricTaskInstance>,
    pub current: Vec<Task>,
}

#[derive(Clone)]
pub struct TrailReporter {
    engine: Arc<dyn EngineFacade>,
    resolver: TaskResolver,
}

impl TrailReporter {
    pub fn new(engine: Arc<dyn EngineFacade>) -> Self {
        Self {
            resolver: TaskResolver::new(Arc::clone(&engine)),
            engine,
        }
    }

    /// Finished tasks of the instance, oldest first
    pub async fn history_of(&self, instance_id: &str) -> GateResult<Vec<HistoricTaskInstance>> {
        Ok(self
            .engine
            .query_historic_tasks(
                HistoricTaskFilter::by_instance(instance_id),
                TaskOrder::CreateTime(SortOrder::Asc),
            )
            .await?)
    }

    pub async fn report(&self, instance_id: &str) -> GateResult<TrailReport> {
        let history = self.history_of(instance_id).await?;
        let current = self.resolver.current_tasks(instance_id).await?;
        Ok(TrailReport {
            instance_id: instance_id.to_string(),
            history,
            current,
        })
    }

    /// Variables recorded in the local scope of a task, read from history
    pub async fn task_variables(&self, task_id: &str) -> GateResult<Variables> {
        let variables = self
            .engine
            .query_historic_variables(HistoricVariableFilter::by_task(task_id))
            .await?;
        Ok(variables
            .into_iter()
            .map(|var| (var.name, var.value))
            .collect())
    }

    /// Emit the trail as log events: finished tasks, then open ones
    pub async fn log_report(&self, instance_id: &str) -> GateResult<TrailReport> {
        let report = self.report(instance_id).await?;
        info!(instance_id, "process instance trail");
        for task in &report.history {
            info!(
                task_id = %task.id,
                task_name = %task.name,
                approver = task.assignee.as_deref().unwrap_or("-"),
                delete_reason = task.delete_reason.as_deref(),
                "historic task"
            );
        }
        for task in &report.current {
            info!(
                task_id = %task.id,
                task_name = %task.name,
                assignee = task.assignee.as_deref().unwrap_or("-"),
                "current task"
            );
        }
        Ok(report)
    }
}
