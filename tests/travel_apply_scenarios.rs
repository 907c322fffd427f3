// Travel application walk-throughs against the in-memory engine
// Covers the full approval path, rejection, authorization refusals and
// the history left behind by each of them

use flowgate::engine::{EngineFacade, IdentityLink};
use flowgate::{
    ApprovalGate, DeploymentResource, GateConfig, GateError, InMemoryEngine, Variables,
};
use serde_json::{json, Value};
use std::sync::Arc;

const TRAVEL_APPLY: &str = include_str!("fixtures/travel_apply.toml");

fn vars(pairs: &[(&str, Value)]) -> Variables {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

async fn deployed_gate() -> (ApprovalGate, Arc<InMemoryEngine>) {
    let engine = Arc::new(InMemoryEngine::new());
    let gate = ApprovalGate::new(engine.clone(), &GateConfig::default());
    gate.deploy(
        vec![
            DeploymentResource::new("travel_apply.toml", TRAVEL_APPLY),
            DeploymentResource::new("travel_apply.png", vec![0x89, 0x50, 0x4e, 0x47]),
        ],
        "出差申请",
    )
    .await
    .unwrap();
    (gate, engine)
}

#[tokio::test]
async fn test_deployment_keeps_every_resource_name() {
    let (_, engine) = deployed_gate().await;
    let deployments = engine.deployments().await;
    assert_eq!(deployments.len(), 1);
    assert_eq!(
        deployments[0].resource_names,
        vec!["travel_apply.toml", "travel_apply.png"]
    );
}

#[tokio::test]
async fn test_manager_approval_by_candidate() {
    let (gate, engine) = deployed_gate().await;
    let instance = gate
        .start_and_advance("travel_apply", Some("TRIP-2025-001"), Some(vars(&[("days", json!(3))])))
        .await
        .unwrap();
    assert_eq!(instance.business_key.as_deref(), Some("TRIP-2025-001"));
    assert_eq!(engine.instance_variables(&instance.id).await.unwrap()["days"], json!(3));

    let task = gate.last_task(&instance.id).await.unwrap().unwrap();
    assert_eq!(task.name, "经理审批");
    assert_eq!(task.assignee, None);
    assert_eq!(gate.candidates(&task.id).await.unwrap(), vec!["ZhangSan", "Jack"]);
    assert_eq!(gate.executor_of(&task.id).await.unwrap().as_deref(), Some("ZhangSan"));

    let pending = gate.pending_approvals("Jack").await.unwrap();
    assert!(pending.iter().any(|p| p.id == instance.id));
    assert!(gate.pending_approvals("Brus").await.unwrap().is_empty());

    gate.complete_with_check("Jack", &task.id, Some(vars(&[("opinion", json!("同意"))])))
        .await
        .unwrap();

    let history = gate.history_of(&instance.id).await.unwrap();
    let names: Vec<_> = history.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["创建出差申请", "经理审批"]);
    assert_eq!(history[0].assignee.as_deref(), Some("ZhangSan"));
    assert_eq!(history[1].assignee.as_deref(), Some("Jack"));
    assert!(history.iter().all(|t| t.ended_at.is_some()));

    let recorded = gate.task_variables(&task.id).await.unwrap();
    assert_eq!(recorded["opinion"], json!("同意"));

    let next = gate.last_task(&instance.id).await.unwrap().unwrap();
    assert_eq!(next.name, "财务审批");
    assert_eq!(next.assignee.as_deref(), Some("Lisa"));
    assert!(gate.pending_approvals("Jack").await.unwrap().is_empty());

    let stats = gate.stats();
    assert_eq!(stats.completions, 1);
    assert_eq!(stats.auto_advances, 1);
}

#[tokio::test]
async fn test_stranger_cannot_approve() {
    let (gate, engine) = deployed_gate().await;
    let instance = gate.start_and_advance("travel_apply", None, None).await.unwrap();
    let task = gate.last_task(&instance.id).await.unwrap().unwrap();

    assert!(!gate.can_approve("Brus", &task.id).await.unwrap());
    for _ in 0..2 {
        let err = gate
            .complete_with_check("Brus", &task.id, None)
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    let err = gate
        .reject_task(&task.id, "Brus", "不同意", vars(&[("opinion", json!("不同意"))]))
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Unauthorized { .. }));
    assert!(engine.task_local_variables(&task.id).await.unwrap().is_empty());

    // Nothing moved
    let still_open = gate.last_task(&instance.id).await.unwrap().unwrap();
    assert_eq!(still_open.id, task.id);
    assert_eq!(still_open.assignee, None);
    assert_eq!(gate.stats().authorization_denials, 3);
}

#[tokio::test]
async fn test_finance_rejection_ends_instance() {
    let (gate, _) = deployed_gate().await;
    let instance = gate.start_and_advance("travel_apply", None, None).await.unwrap();
    let manager = gate.last_task(&instance.id).await.unwrap().unwrap();
    gate.complete_with_check("ZhangSan", &manager.id, None)
        .await
        .unwrap();

    let finance = gate.last_task(&instance.id).await.unwrap().unwrap();
    gate.reject_task(
        &finance.id,
        "Lisa",
        "预算超标",
        vars(&[("opinion", json!("驳回"))]),
    )
    .await
    .unwrap();

    assert!(gate.last_task(&instance.id).await.unwrap().is_none());
    assert!(gate
        .last_process_instance("travel_apply")
        .await
        .unwrap()
        .is_none());

    let history = gate.history_of(&instance.id).await.unwrap();
    assert_eq!(history.len(), 3);
    let last = &history[2];
    assert_eq!(last.name, "财务审批");
    assert_eq!(last.assignee.as_deref(), Some("Lisa"));
    assert_eq!(last.delete_reason.as_deref(), Some("预算超标"));
    assert_eq!(gate.task_variables(&finance.id).await.unwrap()["opinion"], json!("驳回"));

    // The task went away with its instance
    let err = gate
        .reject_task(&finance.id, "Lisa", "预算超标", Variables::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // Advancing an ended instance is a no-op
    gate.advance(&instance.id).await.unwrap();
    assert_eq!(gate.stats().rejections, 1);
}

#[tokio::test]
async fn test_advance_drives_instance_to_end() {
    let (gate, _) = deployed_gate().await;
    let instance = gate.start_and_advance("travel_apply", None, None).await.unwrap();

    gate.advance(&instance.id).await.unwrap();
    gate.advance(&instance.id).await.unwrap();
    assert!(gate.current_tasks(&instance.id).await.unwrap().is_empty());
    gate.advance(&instance.id).await.unwrap();

    let report = gate.log_report(&instance.id).await.unwrap();
    assert!(report.current.is_empty());
    let approvers: Vec<_> = report
        .history
        .iter()
        .map(|t| t.assignee.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(approvers, vec!["ZhangSan", "ZhangSan", "Lisa"]);

    let stats = gate.stats();
    assert_eq!(stats.auto_advances, 3);
    assert_eq!(stats.completions, 2);
}

#[tokio::test]
async fn test_complete_task_by_name_requires_current_task() {
    let (gate, _) = deployed_gate().await;
    let instance = gate.start("travel_apply", None, None).await.unwrap();
    assert!(gate.is_current_task(&instance.id, "创建出差申请").await.unwrap());
    assert!(gate
        .current_task_by_name(&instance.id, "")
        .await
        .unwrap()
        .is_none());

    let err = gate
        .complete_task_by_name(&instance.id, "经理审批")
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidState(_)));

    gate.complete_task_by_name(&instance.id, "创建出差申请")
        .await
        .unwrap();
    assert!(gate.is_current_task(&instance.id, "经理审批").await.unwrap());
    assert!(!gate.is_current_task(&instance.id, "创建出差申请").await.unwrap());
}

#[tokio::test]
async fn test_last_process_instance_is_newest_active() {
    let (gate, _) = deployed_gate().await;
    let first = gate.start_and_advance("travel_apply", None, None).await.unwrap();
    let second = gate.start_and_advance("travel_apply", None, None).await.unwrap();

    let last = gate.last_process_instance("travel_apply").await.unwrap().unwrap();
    assert_eq!(last.id, second.id);

    let task = gate.last_task(&second.id).await.unwrap().unwrap();
    gate.reject_task(&task.id, "Jack", "行程取消", Variables::new())
        .await
        .unwrap();
    let last = gate.last_process_instance("travel_apply").await.unwrap().unwrap();
    assert_eq!(last.id, first.id);

    assert!(gate.last_process_instance("leave").await.unwrap().is_none());
}

#[tokio::test]
async fn test_pending_approvals_lists_newest_first() {
    let (gate, _) = deployed_gate().await;
    let older = gate.start_and_advance("travel_apply", None, None).await.unwrap();
    let newer = gate.start_and_advance("travel_apply", None, None).await.unwrap();

    let pending = gate.pending_approvals("ZhangSan").await.unwrap();
    let ids: Vec<_> = pending.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, vec![newer.id, older.id]);

    let tasks = gate
        .completable_tasks("Jack", Some("travel_apply"))
        .await
        .unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(gate
        .completable_tasks("Jack", Some("leave"))
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        gate.pending_approvals("").await,
        Err(GateError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_custom_candidate_link_type() {
    let engine = Arc::new(InMemoryEngine::new());
    engine
        .deploy(
            vec![DeploymentResource::new("travel_apply.toml", TRAVEL_APPLY)],
            "出差申请",
        )
        .await
        .unwrap();
    let mut config = GateConfig::default();
    config.authorization.candidate_link_type = "approver".to_string();
    let gate = ApprovalGate::new(engine.clone(), &config);

    let instance = gate.start_and_advance("travel_apply", None, None).await.unwrap();
    let task = gate.last_task(&instance.id).await.unwrap().unwrap();
    assert!(gate.candidates(&task.id).await.unwrap().is_empty());
    assert!(!gate.can_approve("Jack", &task.id).await.unwrap());

    engine
        .add_identity_link(
            &task.id,
            IdentityLink {
                link_type: "approver".to_string(),
                user_id: Some("Rose".to_string()),
                group_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(gate.candidates(&task.id).await.unwrap(), vec!["Rose"]);
    assert!(gate.can_approve("Rose", &task.id).await.unwrap());

    // Views follow the same link type as the permission check
    let pending: Vec<_> = gate
        .pending_approvals("Rose")
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(pending, vec![instance.id.clone()]);
    assert!(gate.pending_approvals("Jack").await.unwrap().is_empty());
    assert!(gate.completable_tasks("ZhangSan", None).await.unwrap().is_empty());

    gate.complete_with_check("Rose", &task.id, None).await.unwrap();
}
