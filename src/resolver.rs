// Task resolution: read-only lookups of the open work of an instance

use std::sync::Arc;

use crate::engine::{
    EngineFacade, InstanceFilter, InstanceOrder, ProcessInstance, SortOrder, Task, TaskFilter,
    TaskOrder,
};
use crate::error::GateResult;

#[derive(Clone)]
pub struct TaskResolver {
    engine: Arc<dyn EngineFacade>,
}

impl TaskResolver {
    pub fn new(engine: Arc<dyn EngineFacade>) -> Self {
        Self { engine }
    }

    /// Most recently created open task of the instance
    pub async fn last_task(&self, instance_id: &str) -> GateResult<Option<Task>> {
        let tasks = self
            .engine
            .query_tasks(
                TaskFilter::by_instance(instance_id),
                TaskOrder::CreateTime(SortOrder::Desc),
            )
            .await?;
        Ok(tasks.into_iter().next())
    }

    /// All open tasks of the instance, in engine order
    pub async fn current_tasks(&self, instance_id: &str) -> GateResult<Vec<Task>> {
        Ok(self
            .engine
            .query_tasks(TaskFilter::by_instance(instance_id), TaskOrder::Unordered)
            .await?)
    }

    /// First open task whose name matches exactly. An empty name matches nothing.
    pub async fn current_task_by_name(&self, instance_id: &str, name: &str) -> GateResult<Option<Task>> {
        if name.is_empty() {
            return Ok(None);
        }
        let tasks = self.current_tasks(instance_id).await?;
        Ok(tasks.into_iter().find(|task| task.name == name))
    }

    pub async fn is_current_task(&self, instance_id: &str, name: &str) -> GateResult<bool> {
        Ok(self.current_task_by_name(instance_id, name).await?.is_some())
    }

    /// Active instance of the definition with the highest id
    pub async fn last_process_instance(&self, definition_key: &str) -> GateResult<Option<ProcessInstance>> {
        let instances = self
            .engine
            .query_instances(
                InstanceFilter::active_of_definition(definition_key),
                InstanceOrder::InstanceId(SortOrder::Desc),
            )
            .await?;
        Ok(instances.into_iter().next())
    }

    /// Open task by id
    pub(crate) async fn find_task(&self, task_id: &str) -> GateResult<Option<Task>> {
        let tasks = self
            .engine
            .query_tasks(TaskFilter::by_id(task_id), TaskOrder::Unordered)
            .await?;
        Ok(tasks.into_iter().next())
    }
}
