// In-process workflow engine with linear process definitions.
// Used by the integration tests and by embedders that do not run a
// dedicated engine.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::types::*;
use super::{EngineError, EngineFacade};

/// A process made of user tasks executed one after another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub tasks: Vec<UserTaskDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTaskDefinition {
    pub name: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub candidates: Vec<String>,
}

impl ProcessDefinition {
    pub fn from_toml(source: &str) -> Result<Self, EngineError> {
        let definition: ProcessDefinition =
            toml::from_str(source).map_err(|e| EngineError::InvalidDefinition {
                message: e.to_string(),
            })?;
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.key.trim().is_empty() {
            return Err(EngineError::InvalidDefinition {
                message: "process definition key must not be empty".to_string(),
            });
        }
        if self.tasks.is_empty() {
            return Err(EngineError::InvalidDefinition {
                message: format!("process '{}' declares no tasks", self.key),
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
struct InstanceRecord {
    instance: ProcessInstance,
    definition: ProcessDefinition,
    step: usize,
    variables: Variables,
}

#[derive(Debug)]
struct TaskRecord {
    task: Task,
    links: Vec<IdentityLink>,
    local_variables: Variables,
}

#[derive(Debug, Default)]
struct EngineState {
    next_id: u64,
    definitions: HashMap<String, ProcessDefinition>,
    deployments: Vec<Deployment>,
    instances: BTreeMap<InstanceId, InstanceRecord>,
    tasks: Vec<TaskRecord>,
    historic_tasks: Vec<HistoricTaskInstance>,
    historic_variables: Vec<HistoricVariable>,
}

impl EngineState {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn task_index(&self, task_id: &str) -> Result<usize, EngineError> {
        self.tasks
            .iter()
            .position(|record| record.task.id == task_id)
            .ok_or_else(|| EngineError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    fn create_task(&mut self, instance_id: &str) -> Result<(), EngineError> {
        let id = self.next_id();
        let record = self
            .instances
            .get(instance_id)
            .ok_or_else(|| EngineError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })?;
        let Some(step) = record.definition.tasks.get(record.step) else {
            return Err(EngineError::InvalidDefinition {
                message: format!(
                    "process '{}' has no task at step {}",
                    record.definition.key, record.step
                ),
            });
        };
        let task = Task {
            id,
            name: step.name.clone(),
            assignee: step.assignee.clone(),
            process_instance_id: instance_id.to_string(),
            process_definition_key: record.definition.key.clone(),
            created_at: Utc::now(),
        };
        let links = step
            .candidates
            .iter()
            .map(|user| IdentityLink::candidate_user(user))
            .collect();
        tracing::debug!(task_id = %task.id, task_name = %task.name, instance_id, "task created");
        self.tasks.push(TaskRecord {
            task,
            links,
            local_variables: Variables::new(),
        });
        Ok(())
    }

    fn close_task(&mut self, index: usize, delete_reason: Option<&str>) {
        let record = self.tasks.remove(index);
        self.historic_tasks.push(HistoricTaskInstance {
            id: record.task.id.clone(),
            name: record.task.name.clone(),
            assignee: record.task.assignee.clone(),
            process_instance_id: record.task.process_instance_id.clone(),
            created_at: record.task.created_at,
            ended_at: Some(Utc::now()),
            delete_reason: delete_reason.map(str::to_string),
        });
    }

    fn record_variable(&mut self, instance_id: &str, task_id: Option<&str>, name: &str, value: &serde_json::Value) {
        let existing = self.historic_variables.iter_mut().find(|var| {
            var.name == name
                && var.process_instance_id == instance_id
                && var.task_id.as_deref() == task_id
        });
        match existing {
            Some(var) => var.value = value.clone(),
            None => self.historic_variables.push(HistoricVariable {
                name: name.to_string(),
                value: value.clone(),
                task_id: task_id.map(str::to_string),
                process_instance_id: instance_id.to_string(),
            }),
        }
    }

    fn write_local_variables(&mut self, index: usize, variables: &Variables) {
        let task_id = self.tasks[index].task.id.clone();
        let instance_id = self.tasks[index].task.process_instance_id.clone();
        for (name, value) in variables {
            self.tasks[index]
                .local_variables
                .insert(name.clone(), value.clone());
            self.record_variable(&instance_id, Some(&task_id), name, value);
        }
    }

    fn matches_task(record: &TaskRecord, filter: &TaskFilter) -> bool {
        let task = &record.task;
        if filter.task_id.as_ref().is_some_and(|id| *id != task.id) {
            return false;
        }
        if filter
            .process_instance_id
            .as_ref()
            .is_some_and(|id| *id != task.process_instance_id)
        {
            return false;
        }
        if filter
            .process_definition_key
            .as_ref()
            .is_some_and(|key| *key != task.process_definition_key)
        {
            return false;
        }
        if let Some(user) = &filter.candidate_or_assigned {
            let link_type = filter
                .candidate_link_type
                .as_deref()
                .unwrap_or(CANDIDATE_LINK_TYPE);
            let assigned = task.is_assigned_to(user);
            let candidate = task.assignee.is_none()
                && record.links.iter().any(|link| {
                    link.link_type == link_type
                        && link.user_id.as_deref() == Some(user.as_str())
                });
            if !assigned && !candidate {
                return false;
            }
        }
        true
    }
}

/// Order ids produced by a numeric counter numerically, anything else lexically
pub(crate) fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn apply_order<T>(items: &mut [T], order: SortOrder, cmp: impl Fn(&T, &T) -> Ordering) {
    match order {
        SortOrder::Asc => items.sort_by(|a, b| cmp(a, b)),
        SortOrder::Desc => items.sort_by(|a, b| cmp(b, a)),
    }
}

/// Engine that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: RwLock<EngineState>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition without going through a deployment
    pub async fn register_definition(&self, definition: ProcessDefinition) -> Result<(), EngineError> {
        definition.validate()?;
        let mut state = self.state.write().await;
        state.definitions.insert(definition.key.clone(), definition);
        Ok(())
    }

    pub async fn deployments(&self) -> Vec<Deployment> {
        self.state.read().await.deployments.clone()
    }

    /// Variables in the instance scope of an active instance
    pub async fn instance_variables(&self, instance_id: &str) -> Result<Variables, EngineError> {
        let state = self.state.read().await;
        state
            .instances
            .get(instance_id)
            .map(|record| record.variables.clone())
            .ok_or_else(|| EngineError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })
    }

    /// Local variables of an open task
    pub async fn task_local_variables(&self, task_id: &str) -> Result<Variables, EngineError> {
        let state = self.state.read().await;
        let index = state.task_index(task_id)?;
        Ok(state.tasks[index].local_variables.clone())
    }

    /// Add an identity link to an open task
    pub async fn add_identity_link(&self, task_id: &str, link: IdentityLink) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let index = state.task_index(task_id)?;
        state.tasks[index].links.push(link);
        Ok(())
    }
}

#[async_trait]
impl EngineFacade for InMemoryEngine {
    async fn query_tasks(&self, filter: TaskFilter, order: TaskOrder) -> Result<Vec<Task>, EngineError> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .filter(|record| EngineState::matches_task(record, &filter))
            .map(|record| record.task.clone())
            .collect();
        if let TaskOrder::CreateTime(direction) = order {
            apply_order(&mut tasks, direction, |a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| compare_ids(&a.id, &b.id))
            });
        }
        Ok(tasks)
    }

    async fn query_instances(
        &self,
        filter: InstanceFilter,
        order: InstanceOrder,
    ) -> Result<Vec<ProcessInstance>, EngineError> {
        // Every instance kept here is active; ended and deleted ones are dropped.
        let state = self.state.read().await;
        let mut instances: Vec<ProcessInstance> = state
            .instances
            .values()
            .map(|record| &record.instance)
            .filter(|instance| {
                filter.instance_id.as_ref().is_none_or(|id| *id == instance.id)
                    && filter
                        .instance_ids
                        .as_ref()
                        .is_none_or(|ids| ids.contains(&instance.id))
                    && filter
                        .process_definition_key
                        .as_ref()
                        .is_none_or(|key| *key == instance.process_definition_key)
            })
            .cloned()
            .collect();
        if let InstanceOrder::InstanceId(direction) = order {
            apply_order(&mut instances, direction, |a, b| compare_ids(&a.id, &b.id));
        }
        Ok(instances)
    }

    async fn query_historic_tasks(
        &self,
        filter: HistoricTaskFilter,
        order: TaskOrder,
    ) -> Result<Vec<HistoricTaskInstance>, EngineError> {
        let state = self.state.read().await;
        let mut tasks: Vec<HistoricTaskInstance> = state
            .historic_tasks
            .iter()
            .filter(|task| {
                filter
                    .process_instance_id
                    .as_ref()
                    .is_none_or(|id| *id == task.process_instance_id)
            })
            .cloned()
            .collect();
        if let TaskOrder::CreateTime(direction) = order {
            apply_order(&mut tasks, direction, |a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| compare_ids(&a.id, &b.id))
            });
        }
        Ok(tasks)
    }

    async fn query_historic_variables(
        &self,
        filter: HistoricVariableFilter,
    ) -> Result<Vec<HistoricVariable>, EngineError> {
        let state = self.state.read().await;
        Ok(state
            .historic_variables
            .iter()
            .filter(|var| {
                filter
                    .task_id
                    .as_ref()
                    .is_none_or(|id| var.task_id.as_ref() == Some(id))
                    && filter
                        .process_instance_id
                        .as_ref()
                        .is_none_or(|id| *id == var.process_instance_id)
            })
            .cloned()
            .collect())
    }

    async fn query_identity_links(&self, task_id: &str) -> Result<Vec<IdentityLink>, EngineError> {
        let state = self.state.read().await;
        let index = state.task_index(task_id)?;
        Ok(state.tasks[index].links.clone())
    }

    async fn start_instance(
        &self,
        definition_key: &str,
        business_key: Option<String>,
        variables: Option<Variables>,
    ) -> Result<ProcessInstance, EngineError> {
        let mut state = self.state.write().await;
        let definition = state
            .definitions
            .get(definition_key)
            .cloned()
            .ok_or_else(|| EngineError::DefinitionNotFound {
                key: definition_key.to_string(),
            })?;
        let instance = ProcessInstance {
            id: state.next_id(),
            process_definition_key: definition.key.clone(),
            business_key,
            started_at: Utc::now(),
        };
        let variables = variables.unwrap_or_default();
        for (name, value) in &variables {
            state.record_variable(&instance.id, None, name, value);
        }
        state.instances.insert(
            instance.id.clone(),
            InstanceRecord {
                instance: instance.clone(),
                definition,
                step: 0,
                variables,
            },
        );
        state.create_task(&instance.id)?;
        tracing::debug!(instance_id = %instance.id, definition_key, "process instance started");
        Ok(instance)
    }

    async fn claim(&self, task_id: &str, user_id: &str) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let index = state.task_index(task_id)?;
        state.tasks[index].task.assignee = Some(user_id.to_string());
        Ok(())
    }

    async fn complete(
        &self,
        task_id: &str,
        variables: Option<Variables>,
        local_scope: bool,
    ) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let index = state.task_index(task_id)?;
        let instance_id = state.tasks[index].task.process_instance_id.clone();

        if let Some(variables) = &variables {
            if local_scope {
                state.write_local_variables(index, variables);
            } else {
                for (name, value) in variables {
                    state.record_variable(&instance_id, None, name, value);
                }
                if let Some(record) = state.instances.get_mut(&instance_id) {
                    record.variables.extend(variables.clone());
                }
            }
        }

        state.close_task(index, None);

        let finished = {
            let record = state
                .instances
                .get_mut(&instance_id)
                .ok_or_else(|| EngineError::InstanceNotFound {
                    instance_id: instance_id.clone(),
                })?;
            record.step += 1;
            record.step >= record.definition.tasks.len()
        };
        if finished {
            state.instances.remove(&instance_id);
            tracing::debug!(instance_id = %instance_id, "process instance ended");
        } else {
            state.create_task(&instance_id)?;
        }
        Ok(())
    }

    async fn set_local_variables(&self, task_id: &str, variables: Variables) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let index = state.task_index(task_id)?;
        state.write_local_variables(index, &variables);
        Ok(())
    }

    async fn delete_instance(&self, instance_id: &str, reason: &str) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        if state.instances.remove(instance_id).is_none() {
            return Err(EngineError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            });
        }
        while let Some(index) = state
            .tasks
            .iter()
            .position(|record| record.task.process_instance_id == instance_id)
        {
            state.close_task(index, Some(reason));
        }
        tracing::debug!(instance_id, reason, "process instance deleted");
        Ok(())
    }

    async fn deploy(&self, resources: Vec<DeploymentResource>, name: &str) -> Result<Deployment, EngineError> {
        let mut definitions = Vec::new();
        for resource in resources.iter().filter(|r| r.name.ends_with(".toml")) {
            let source = std::str::from_utf8(&resource.bytes).map_err(|e| {
                EngineError::InvalidDefinition {
                    message: format!("{}: {e}", resource.name),
                }
            })?;
            definitions.push(ProcessDefinition::from_toml(source)?);
        }
        if definitions.is_empty() {
            return Err(EngineError::InvalidDefinition {
                message: format!("deployment '{name}' contains no process definition"),
            });
        }

        let mut state = self.state.write().await;
        let deployment = Deployment {
            id: state.next_id(),
            name: name.to_string(),
            resource_names: resources.iter().map(|r| r.name.clone()).collect(),
            deployed_at: Utc::now(),
        };
        for definition in definitions {
            state.definitions.insert(definition.key.clone(), definition);
        }
        state.deployments.push(deployment.clone());
        Ok(deployment)
    }
}
