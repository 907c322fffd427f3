// One handle over the engine that wires every component together.

use std::sync::Arc;

use crate::authorization::AuthorizationEngine;
use crate::config::GateConfig;
use crate::engine::{
    Deployment, DeploymentResource, EngineFacade, HistoricTaskInstance, ProcessInstance, Task,
    UserId, Variables,
};
use crate::error::GateResult;
use crate::navigator::InstanceNavigator;
use crate::observability::{GateMetrics, GateStats};
use crate::resolver::TaskResolver;
use crate::trail::{TrailReport, TrailReporter};
use crate::transitions::TransitionController;

/// Entry point for callers: every read and write goes through here.
#[derive(Clone)]
pub struct ApprovalGate {
    resolver: TaskResolver,
    authorization: AuthorizationEngine,
    transitions: TransitionController,
    navigator: InstanceNavigator,
    trail: TrailReporter,
    metrics: Arc<GateMetrics>,
}

impl ApprovalGate {
    pub fn new(engine: Arc<dyn EngineFacade>, config: &GateConfig) -> Self {
        let metrics = Arc::new(GateMetrics::new());
        let authorization = AuthorizationEngine::with_candidate_link_type(
            Arc::clone(&engine),
            &config.authorization.candidate_link_type,
        );
        let transitions =
            TransitionController::new(Arc::clone(&engine), authorization.clone(), Arc::clone(&metrics));
        let navigator = InstanceNavigator::new(
            Arc::clone(&engine),
            authorization.clone(),
            transitions.clone(),
            Arc::clone(&metrics),
        );
        Self {
            resolver: TaskResolver::new(Arc::clone(&engine)),
            trail: TrailReporter::new(engine),
            authorization,
            transitions,
            navigator,
            metrics,
        }
    }

    pub fn resolver(&self) -> &TaskResolver {
        &self.resolver
    }

    pub fn authorization(&self) -> &AuthorizationEngine {
        &self.authorization
    }

    pub fn transitions(&self) -> &TransitionController {
        &self.transitions
    }

    pub fn navigator(&self) -> &InstanceNavigator {
        &self.navigator
    }

    pub fn trail(&self) -> &TrailReporter {
        &self.trail
    }

    pub fn stats(&self) -> GateStats {
        self.metrics.get_stats()
    }

    pub fn log_stats(&self) {
        self.metrics.log_stats();
    }

    pub async fn deploy(&self, resources: Vec<DeploymentResource>, name: &str) -> GateResult<Deployment> {
        self.navigator.deploy(resources, name).await
    }

    pub async fn start(
        &self,
        definition_key: &str,
        business_key: Option<&str>,
        variables: Option<Variables>,
    ) -> GateResult<ProcessInstance> {
        self.navigator.start(definition_key, business_key, variables).await
    }

    pub async fn start_and_advance(
        &self,
        definition_key: &str,
        business_key: Option<&str>,
        variables: Option<Variables>,
    ) -> GateResult<ProcessInstance> {
        self.navigator
            .start_and_advance(definition_key, business_key, variables)
            .await
    }

    pub async fn advance(&self, instance_id: &str) -> GateResult<()> {
        self.navigator.advance(instance_id).await
    }

    pub async fn last_task(&self, instance_id: &str) -> GateResult<Option<Task>> {
        self.resolver.last_task(instance_id).await
    }

    pub async fn current_tasks(&self, instance_id: &str) -> GateResult<Vec<Task>> {
        self.resolver.current_tasks(instance_id).await
    }

    pub async fn current_task_by_name(&self, instance_id: &str, name: &str) -> GateResult<Option<Task>> {
        self.resolver.current_task_by_name(instance_id, name).await
    }

    pub async fn is_current_task(&self, instance_id: &str, name: &str) -> GateResult<bool> {
        self.resolver.is_current_task(instance_id, name).await
    }

    pub async fn last_process_instance(&self, definition_key: &str) -> GateResult<Option<ProcessInstance>> {
        self.resolver.last_process_instance(definition_key).await
    }

    pub async fn candidates(&self, task_id: &str) -> GateResult<Vec<UserId>> {
        self.authorization.candidates(task_id).await
    }

    pub async fn can_approve(&self, user_id: &str, task_id: &str) -> GateResult<bool> {
        self.authorization.can_approve(user_id, task_id).await
    }

    pub async fn executor_of(&self, task_id: &str) -> GateResult<Option<UserId>> {
        self.authorization.executor_of(task_id).await
    }

    pub async fn complete_with_check(
        &self,
        user_id: &str,
        task_id: &str,
        variables: Option<Variables>,
    ) -> GateResult<()> {
        self.transitions
            .complete_with_check(user_id, task_id, variables)
            .await
    }

    pub async fn reject_task(
        &self,
        task_id: &str,
        user_id: &str,
        reason: &str,
        variables: Variables,
    ) -> GateResult<()> {
        self.transitions
            .reject_task(task_id, user_id, reason, variables)
            .await
    }

    pub async fn complete_task_by_name(&self, instance_id: &str, task_name: &str) -> GateResult<()> {
        self.transitions
            .complete_task_by_name(instance_id, task_name)
            .await
    }

    pub async fn pending_approvals(&self, user_id: &str) -> GateResult<Vec<ProcessInstance>> {
        self.navigator.pending_approvals(user_id).await
    }

    pub async fn completable_tasks(
        &self,
        user_id: &str,
        definition_key: Option<&str>,
    ) -> GateResult<Vec<Task>> {
        self.navigator.completable_tasks(user_id, definition_key).await
    }

    pub async fn history_of(&self, instance_id: &str) -> GateResult<Vec<HistoricTaskInstance>> {
        self.trail.history_of(instance_id).await
    }

    pub async fn report(&self, instance_id: &str) -> GateResult<TrailReport> {
        self.trail.report(instance_id).await
    }

    pub async fn log_report(&self, instance_id: &str) -> GateResult<TrailReport> {
        self.trail.log_report(instance_id).await
    }

    pub async fn task_variables(&self, task_id: &str) -> GateResult<Variables> {
        self.trail.task_variables(task_id).await
    }
}
