// Instance navigation: starting instances, pushing them to their next
// activity and finding the instances waiting on a user.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, Instrument};

use crate::authorization::AuthorizationEngine;
use crate::engine::{
    Deployment, DeploymentResource, EngineFacade, InstanceFilter, InstanceOrder, ProcessInstance,
    SortOrder, Task, TaskFilter, TaskOrder, Variables,
};
use crate::error::{require_user, GateError, GateResult};
use crate::observability::{GateMetrics, OperationTimer};
use crate::resolver::TaskResolver;
use crate::telemetry::create_operation_span;
use crate::transitions::TransitionController;

#[derive(Clone)]
pub struct InstanceNavigator {
    engine: Arc<dyn EngineFacade>,
    resolver: TaskResolver,
    authorization: AuthorizationEngine,
    transitions: TransitionController,
    metrics: Arc<GateMetrics>,
}

impl InstanceNavigator {
    pub fn new(
        engine: Arc<dyn EngineFacade>,
        authorization: AuthorizationEngine,
        transitions: TransitionController,
        metrics: Arc<GateMetrics>,
    ) -> Self {
        Self {
            resolver: TaskResolver::new(Arc::clone(&engine)),
            engine,
            authorization,
            transitions,
            metrics,
        }
    }

    pub async fn deploy(&self, resources: Vec<DeploymentResource>, name: &str) -> GateResult<Deployment> {
        let deployment = self.engine.deploy(resources, name).await?;
        info!(
            deployment_id = %deployment.id,
            name,
            resources = deployment.resource_names.len(),
            "process definitions deployed"
        );
        Ok(deployment)
    }

    /// Start an instance and leave it at its first task
    pub async fn start(
        &self,
        definition_key: &str,
        business_key: Option<&str>,
        variables: Option<Variables>,
    ) -> GateResult<ProcessInstance> {
        let instance = self
            .engine
            .start_instance(definition_key, business_key.map(str::to_string), variables)
            .await?;
        info!(instance_id = %instance.id, definition_key, "process instance started");
        Ok(instance)
    }

    /// Start an instance and complete its opening task, which every process
    /// passes through without a human decision.
    pub async fn start_and_advance(
        &self,
        definition_key: &str,
        business_key: Option<&str>,
        variables: Option<Variables>,
    ) -> GateResult<ProcessInstance> {
        let span = create_operation_span("start_and_advance", None, None, None);
        self.start_then_complete_first(definition_key, business_key, variables)
            .instrument(span)
            .await
    }

    /// Complete the newest open task of the instance as its executor.
    /// An instance without open tasks is left alone.
    pub async fn advance(&self, instance_id: &str) -> GateResult<()> {
        let span = create_operation_span("advance", None, None, Some(instance_id));
        self.advance_last_task(instance_id).instrument(span).await
    }

    /// Active instances holding at least one task the user is assignee or
    /// candidate of, newest instance id first
    pub async fn pending_approvals(&self, user_id: &str) -> GateResult<Vec<ProcessInstance>> {
        let tasks = self.completable_tasks(user_id, None).await?;
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let instance_ids: BTreeSet<String> = tasks
            .into_iter()
            .map(|task| task.process_instance_id)
            .collect();
        Ok(self
            .engine
            .query_instances(
                InstanceFilter::by_ids(instance_ids).active(),
                InstanceOrder::InstanceId(SortOrder::Desc),
            )
            .await?)
    }

    /// Tasks the user may complete, optionally limited to one process definition
    pub async fn completable_tasks(
        &self,
        user_id: &str,
        definition_key: Option<&str>,
    ) -> GateResult<Vec<Task>> {
        require_user(user_id)?;
        let mut filter = TaskFilter::candidate_or_assigned(user_id)
            .with_candidate_link_type(self.authorization.candidate_link_type());
        if let Some(key) = definition_key {
            filter = filter.with_definition_key(key);
        }
        Ok(self.engine.query_tasks(filter, TaskOrder::Unordered).await?)
    }

    async fn start_then_complete_first(
        &self,
        definition_key: &str,
        business_key: Option<&str>,
        variables: Option<Variables>,
    ) -> GateResult<ProcessInstance> {
        let timer = OperationTimer::new("start_and_advance");
        let instance = self.start(definition_key, business_key, variables).await?;
        let first = self.resolver.last_task(&instance.id).await?.ok_or_else(|| {
            GateError::InvalidState(format!(
                "process instance '{}' of '{definition_key}' has no task to complete after start",
                instance.id
            ))
        })?;
        self.engine.complete(&first.id, None, false).await?;
        self.metrics.record_auto_advance();
        info!(
            instance_id = %instance.id,
            task_id = %first.id,
            task_name = %first.name,
            "opening task completed"
        );
        timer.finish();
        Ok(instance)
    }

    async fn advance_last_task(&self, instance_id: &str) -> GateResult<()> {
        let Some(task) = self.resolver.last_task(instance_id).await? else {
            info!(instance_id, "no open task, nothing to advance");
            return Ok(());
        };
        let executor = self
            .authorization
            .executor_of_task(&task)
            .await?
            .ok_or_else(|| {
                GateError::InvalidState(format!(
                    "task '{}' has neither assignee nor candidate",
                    task.id
                ))
            })?;
        self.transitions
            .complete_with_check(&executor, &task.id, None)
            .await?;
        self.metrics.record_auto_advance();
        Ok(())
    }
}
