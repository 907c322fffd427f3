// Task transitions: the only writes this crate issues against the engine.
//
// Claim-then-complete is two engine calls. A concurrent claim by another
// caller between them is left to the engine to arbitrate.

use std::sync::Arc;
use tracing::{info, warn, Instrument};

use crate::authorization::AuthorizationEngine;
use crate::engine::{EngineFacade, InstanceFilter, InstanceOrder, Task, Variables};
use crate::error::{require_user, GateError, GateResult};
use crate::observability::GateMetrics;
use crate::resolver::TaskResolver;
use crate::telemetry::create_operation_span;

#[derive(Clone)]
pub struct TransitionController {
    engine: Arc<dyn EngineFacade>,
    resolver: TaskResolver,
    authorization: AuthorizationEngine,
    metrics: Arc<GateMetrics>,
}

impl TransitionController {
    pub fn new(
        engine: Arc<dyn EngineFacade>,
        authorization: AuthorizationEngine,
        metrics: Arc<GateMetrics>,
    ) -> Self {
        Self {
            resolver: TaskResolver::new(Arc::clone(&engine)),
            engine,
            authorization,
            metrics,
        }
    }

    /// Complete a task on behalf of `user_id`, claiming it first when the
    /// user is a candidate rather than the assignee. `variables` go into the
    /// task's local scope.
    pub async fn complete_with_check(
        &self,
        user_id: &str,
        task_id: &str,
        variables: Option<Variables>,
    ) -> GateResult<()> {
        let span = create_operation_span("complete_with_check", Some(user_id), Some(task_id), None);
        self.claim_and_complete(user_id, task_id, variables)
            .instrument(span)
            .await
    }

    /// Reject a task by deleting its whole process instance.
    ///
    /// A failure after the variables were written or the claim went through
    /// is not rolled back.
    pub async fn reject_task(
        &self,
        task_id: &str,
        user_id: &str,
        reason: &str,
        variables: Variables,
    ) -> GateResult<()> {
        let span = create_operation_span("reject_task", Some(user_id), Some(task_id), None);
        self.claim_and_delete_instance(task_id, user_id, reason, variables)
            .instrument(span)
            .await
    }

    /// Complete the open task called `task_name` without any user check.
    /// Meant for trusted callers that advance an instance by activity name.
    pub async fn complete_task_by_name(&self, instance_id: &str, task_name: &str) -> GateResult<()> {
        let span = create_operation_span("complete_task_by_name", None, None, Some(instance_id));
        self.complete_named(instance_id, task_name)
            .instrument(span)
            .await
    }

    async fn claim_and_complete(
        &self,
        user_id: &str,
        task_id: &str,
        variables: Option<Variables>,
    ) -> GateResult<()> {
        require_user(user_id)?;
        let task = self.authorization.require_task(task_id).await?;
        self.authorize(user_id, &task).await?;

        if !task.is_assigned_to(user_id) {
            self.engine.claim(task_id, user_id).await?;
            info!(user_id, task_id, "task claimed");
        }
        self.engine.complete(task_id, variables, true).await?;
        self.metrics.record_completion();
        info!(
            user_id,
            task_id,
            task_name = %task.name,
            instance_id = %task.process_instance_id,
            "task completed"
        );
        Ok(())
    }

    async fn claim_and_delete_instance(
        &self,
        task_id: &str,
        user_id: &str,
        reason: &str,
        variables: Variables,
    ) -> GateResult<()> {
        require_user(user_id)?;
        let task = self.authorization.require_task(task_id).await?;
        self.authorize(user_id, &task).await?;

        self.engine.set_local_variables(task_id, variables).await?;
        self.engine.claim(task_id, user_id).await?;

        let instance_id = task.process_instance_id.as_str();
        let still_running = self
            .engine
            .query_instances(InstanceFilter::by_id(instance_id), InstanceOrder::Unordered)
            .await?;
        if still_running.is_empty() {
            info!(instance_id, "process instance already gone, nothing to delete");
        } else {
            self.engine.delete_instance(instance_id, reason).await?;
            info!(user_id, task_id, instance_id, reason, "process instance rejected");
        }
        self.metrics.record_rejection();
        Ok(())
    }

    async fn complete_named(&self, instance_id: &str, task_name: &str) -> GateResult<()> {
        let task = self
            .resolver
            .current_task_by_name(instance_id, task_name)
            .await?
            .ok_or_else(|| {
                GateError::InvalidState(format!(
                    "task '{task_name}' is not a current task of process instance '{instance_id}'"
                ))
            })?;
        self.engine.complete(&task.id, None, false).await?;
        self.metrics.record_completion();
        info!(instance_id, task_id = %task.id, task_name, "task completed by name");
        Ok(())
    }

    async fn authorize(&self, user_id: &str, task: &Task) -> GateResult<()> {
        if self.authorization.can_act_on(user_id, task).await? {
            return Ok(());
        }
        self.metrics.record_denial();
        warn!(user_id, task_id = %task.id, "user is neither assignee nor candidate");
        Err(GateError::Unauthorized {
            user_id: user_id.to_string(),
            task_id: task.id.clone(),
        })
    }
}
