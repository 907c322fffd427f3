// Who may act on a task: its assignee or any of its candidate users.
// The engine does not enforce this; every write in this crate goes through here.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::engine::{EngineFacade, IdentityLink, Task, UserId, CANDIDATE_LINK_TYPE};
use crate::error::{GateError, GateResult};
use crate::resolver::TaskResolver;

/// Candidate user ids of a task in link enumeration order, without duplicates
pub fn candidate_users(links: &[IdentityLink], candidate_link_type: &str) -> Vec<UserId> {
    let mut seen = BTreeSet::new();
    links
        .iter()
        .filter(|link| link.link_type == candidate_link_type)
        .filter_map(|link| link.user_id.clone())
        .filter(|user| seen.insert(user.clone()))
        .collect()
}

/// Assignee if set, otherwise the first candidate
pub fn resolve_executor(assignee: Option<&str>, candidates: &[UserId]) -> Option<UserId> {
    assignee
        .map(str::to_string)
        .or_else(|| candidates.first().cloned())
}

pub fn is_permitted(user_id: &str, assignee: Option<&str>, candidates: &[UserId]) -> bool {
    assignee == Some(user_id) || candidates.iter().any(|candidate| candidate == user_id)
}

#[derive(Clone)]
pub struct AuthorizationEngine {
    engine: Arc<dyn EngineFacade>,
    resolver: TaskResolver,
    candidate_link_type: String,
}

impl AuthorizationEngine {
    pub fn new(engine: Arc<dyn EngineFacade>) -> Self {
        Self::with_candidate_link_type(engine, CANDIDATE_LINK_TYPE)
    }

    pub fn with_candidate_link_type(engine: Arc<dyn EngineFacade>, candidate_link_type: &str) -> Self {
        Self {
            resolver: TaskResolver::new(Arc::clone(&engine)),
            engine,
            candidate_link_type: candidate_link_type.to_string(),
        }
    }

    pub fn candidate_link_type(&self) -> &str {
        &self.candidate_link_type
    }

    /// Candidate users of the task
    pub async fn candidates(&self, task_id: &str) -> GateResult<Vec<UserId>> {
        let links = self.engine.query_identity_links(task_id).await?;
        Ok(candidate_users(&links, &self.candidate_link_type))
    }

    /// Whether `user_id` may claim, complete or reject the task
    pub async fn can_approve(&self, user_id: &str, task_id: &str) -> GateResult<bool> {
        let task = self.require_task(task_id).await?;
        self.can_act_on(user_id, &task).await
    }

    /// Responsible user for the task, if any
    pub async fn executor_of(&self, task_id: &str) -> GateResult<Option<UserId>> {
        let task = self.require_task(task_id).await?;
        self.executor_of_task(&task).await
    }

    pub(crate) async fn can_act_on(&self, user_id: &str, task: &Task) -> GateResult<bool> {
        if task.is_assigned_to(user_id) {
            return Ok(true);
        }
        let candidates = self.candidates(&task.id).await?;
        Ok(is_permitted(user_id, task.assignee.as_deref(), &candidates))
    }

    pub(crate) async fn executor_of_task(&self, task: &Task) -> GateResult<Option<UserId>> {
        if let Some(assignee) = &task.assignee {
            return Ok(Some(assignee.clone()));
        }
        let candidates = self.candidates(&task.id).await?;
        Ok(resolve_executor(None, &candidates))
    }

    pub(crate) async fn require_task(&self, task_id: &str) -> GateResult<Task> {
        self.resolver
            .find_task(task_id)
            .await?
            .ok_or_else(|| GateError::task_not_found(task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngineFacade, TaskFilter};
    use chrono::Utc;
    use mockall::predicate::eq;

    fn link(link_type: &str, user_id: Option<&str>) -> IdentityLink {
        IdentityLink {
            link_type: link_type.to_string(),
            user_id: user_id.map(str::to_string),
            group_id: None,
        }
    }

    fn task(assignee: Option<&str>) -> Task {
        Task {
            id: "2".to_string(),
            name: "manager approval".to_string(),
            assignee: assignee.map(str::to_string),
            process_instance_id: "1".to_string(),
            process_definition_key: "travel_apply".to_string(),
            created_at: Utc::now(),
        }
    }

    fn engine_with(task: Option<Task>, links: Vec<IdentityLink>) -> MockEngineFacade {
        let mut engine = MockEngineFacade::new();
        engine
            .expect_query_tasks()
            .returning(move |_, _| Ok(task.clone().into_iter().collect()));
        engine
            .expect_query_identity_links()
            .returning(move |_| Ok(links.clone()));
        engine
    }

    #[test]
    fn test_candidate_users_filters_and_dedups() {
        let links = vec![
            link("candidate", Some("ZhangSan")),
            link("participant", Some("Lisa")),
            link("candidate", None),
            link("candidate", Some("Jack")),
            link("candidate", Some("ZhangSan")),
        ];
        assert_eq!(candidate_users(&links, "candidate"), vec!["ZhangSan", "Jack"]);
        assert!(candidate_users(&links, "owner").is_empty());
    }

    #[test]
    fn test_resolve_executor() {
        let candidates = vec!["ZhangSan".to_string(), "Jack".to_string()];
        assert_eq!(resolve_executor(Some("Lisa"), &candidates).as_deref(), Some("Lisa"));
        assert_eq!(resolve_executor(None, &candidates).as_deref(), Some("ZhangSan"));
        assert_eq!(resolve_executor(None, &[]), None);
    }

    #[test]
    fn test_is_permitted() {
        let candidates = vec!["Jack".to_string()];
        assert!(is_permitted("Lisa", Some("Lisa"), &candidates));
        assert!(is_permitted("Jack", Some("Lisa"), &candidates));
        assert!(!is_permitted("Brus", Some("Lisa"), &candidates));
        assert!(!is_permitted("", None, &[]));
    }

    #[tokio::test]
    async fn test_assignee_can_approve_without_link_lookup() {
        let mut engine = MockEngineFacade::new();
        engine
            .expect_query_tasks()
            .with(eq(TaskFilter::by_id("2")), mockall::predicate::always())
            .returning(|_, _| Ok(vec![task(Some("Lisa"))]));
        engine.expect_query_identity_links().never();

        let auth = AuthorizationEngine::new(Arc::new(engine));
        assert!(auth.can_approve("Lisa", "2").await.unwrap());
    }

    #[tokio::test]
    async fn test_candidate_can_approve_and_stranger_cannot() {
        let engine = engine_with(
            Some(task(None)),
            vec![link("candidate", Some("ZhangSan")), link("candidate", Some("Jack"))],
        );
        let auth = AuthorizationEngine::new(Arc::new(engine));

        assert!(auth.can_approve("Jack", "2").await.unwrap());
        assert!(auth.can_approve("ZhangSan", "2").await.unwrap());
        assert!(!auth.can_approve("Brus", "2").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let engine = engine_with(None, vec![]);
        let auth = AuthorizationEngine::new(Arc::new(engine));

        assert!(auth.can_approve("Jack", "404").await.unwrap_err().is_not_found());
        assert!(auth.executor_of("404").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_executor_prefers_assignee() {
        let engine = engine_with(Some(task(Some("Lisa"))), vec![link("candidate", Some("Jack"))]);
        let auth = AuthorizationEngine::new(Arc::new(engine));
        assert_eq!(auth.executor_of("2").await.unwrap().as_deref(), Some("Lisa"));
    }

    #[tokio::test]
    async fn test_executor_falls_back_to_first_candidate() {
        let engine = engine_with(
            Some(task(None)),
            vec![link("candidate", Some("ZhangSan")), link("candidate", Some("Jack"))],
        );
        let auth = AuthorizationEngine::new(Arc::new(engine));
        assert_eq!(auth.executor_of("2").await.unwrap().as_deref(), Some("ZhangSan"));
    }

    #[tokio::test]
    async fn test_executor_none_without_assignee_or_candidates() {
        let engine = engine_with(Some(task(None)), vec![link("participant", Some("Jack"))]);
        let auth = AuthorizationEngine::new(Arc::new(engine));
        assert_eq!(auth.executor_of("2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_custom_candidate_link_type() {
        let engine = engine_with(Some(task(None)), vec![link("reviewer", Some("Jack"))]);
        let auth = AuthorizationEngine::with_candidate_link_type(Arc::new(engine), "reviewer");
        assert!(auth.can_approve("Jack", "2").await.unwrap());
    }
}
