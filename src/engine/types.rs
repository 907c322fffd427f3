// Records exchanged with the workflow engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub type TaskId = String;
pub type InstanceId = String;
pub type UserId = String;

/// Variable scope contents. Values are engine-defined, so they stay opaque JSON.
pub type Variables = HashMap<String, serde_json::Value>;

/// Identity link type that marks a user as a candidate for a task
pub const CANDIDATE_LINK_TYPE: &str = "candidate";

/// An open unit of human work inside one process instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub assignee: Option<UserId>,
    pub process_instance_id: InstanceId,
    pub process_definition_key: String,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.assignee.as_deref() == Some(user_id)
    }
}

/// A running execution of a process definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub id: InstanceId,
    pub process_definition_key: String,
    pub business_key: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Read-only record of a task that is no longer open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricTaskInstance {
    pub id: TaskId,
    pub name: String,
    pub assignee: Option<UserId>,
    pub process_instance_id: InstanceId,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Set when the task ended because its instance was deleted
    pub delete_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricVariable {
    pub name: String,
    pub value: serde_json::Value,
    pub task_id: Option<TaskId>,
    pub process_instance_id: InstanceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLink {
    pub link_type: String,
    pub user_id: Option<UserId>,
    pub group_id: Option<String>,
}

impl IdentityLink {
    pub fn candidate_user(user_id: &str) -> Self {
        Self {
            link_type: CANDIDATE_LINK_TYPE.to_string(),
            user_id: Some(user_id.to_string()),
            group_id: None,
        }
    }
}

/// One named file handed to the engine at deployment time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl DeploymentResource {
    pub fn new(name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    pub resource_names: Vec<String>,
    pub deployed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskOrder {
    /// Whatever order the engine returns
    #[default]
    Unordered,
    CreateTime(SortOrder),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceOrder {
    #[default]
    Unordered,
    InstanceId(SortOrder),
}

/// Filter for open tasks. Unset fields do not restrict the result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskFilter {
    pub task_id: Option<TaskId>,
    pub process_instance_id: Option<InstanceId>,
    pub process_definition_key: Option<String>,
    /// Tasks assigned to this user, or unassigned tasks naming the user as candidate
    pub candidate_or_assigned: Option<UserId>,
    /// Link type that counts as candidacy for `candidate_or_assigned`
    pub candidate_link_type: Option<String>,
}

impl TaskFilter {
    pub fn by_id(task_id: &str) -> Self {
        Self {
            task_id: Some(task_id.to_string()),
            ..Self::default()
        }
    }

    pub fn by_instance(instance_id: &str) -> Self {
        Self {
            process_instance_id: Some(instance_id.to_string()),
            ..Self::default()
        }
    }

    pub fn candidate_or_assigned(user_id: &str) -> Self {
        Self {
            candidate_or_assigned: Some(user_id.to_string()),
            candidate_link_type: Some(CANDIDATE_LINK_TYPE.to_string()),
            ..Self::default()
        }
    }

    pub fn with_definition_key(mut self, key: &str) -> Self {
        self.process_definition_key = Some(key.to_string());
        self
    }

    pub fn with_candidate_link_type(mut self, link_type: &str) -> Self {
        self.candidate_link_type = Some(link_type.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstanceFilter {
    pub instance_id: Option<InstanceId>,
    pub instance_ids: Option<BTreeSet<InstanceId>>,
    pub process_definition_key: Option<String>,
    pub active_only: bool,
}

impl InstanceFilter {
    pub fn by_id(instance_id: &str) -> Self {
        Self {
            instance_id: Some(instance_id.to_string()),
            ..Self::default()
        }
    }

    pub fn by_ids(instance_ids: BTreeSet<InstanceId>) -> Self {
        Self {
            instance_ids: Some(instance_ids),
            ..Self::default()
        }
    }

    pub fn active_of_definition(key: &str) -> Self {
        Self {
            process_definition_key: Some(key.to_string()),
            active_only: true,
            ..Self::default()
        }
    }

    pub fn active(mut self) -> Self {
        self.active_only = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoricTaskFilter {
    pub process_instance_id: Option<InstanceId>,
}

impl HistoricTaskFilter {
    pub fn by_instance(instance_id: &str) -> Self {
        Self {
            process_instance_id: Some(instance_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoricVariableFilter {
    pub task_id: Option<TaskId>,
    pub process_instance_id: Option<InstanceId>,
}

impl HistoricVariableFilter {
    pub fn by_task(task_id: &str) -> Self {
        Self {
            task_id: Some(task_id.to_string()),
            ..Self::default()
        }
    }
}
