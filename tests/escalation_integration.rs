//! Tag audit integration tests
//!
//! Drives the escalation ladder end to end against the in-memory cloud:
//! counter persistence, compliance, dry-run gating, idempotent removal,
//! ledger entries, and adapter dispatch.

use a3s_inquisitor::adapter::database::InstanceStatus;
use a3s_inquisitor::adapter::memory::CloudCall;
use a3s_inquisitor::{
    Action, ActionLedger, ActionMode, AuditableResource, EscalationEngine, EscalationStore,
    FileEscalationStore, InquisitorConfig, InquisitorError, Invocation, MemoryActionLedger,
    MemoryCloud, MemoryEscalationStore, ProviderClients, ResourceAdapter, ResourceDescriptor,
    Tags, TagAuditPipeline,
};
use std::sync::Arc;

const ACCOUNT: &str = "111111111111";

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn engine(mode: ActionMode) -> EscalationEngine {
    EscalationEngine::new(vec!["Owner".to_string(), "CostCenter".to_string()], mode)
}

fn database(cloud: &Arc<MemoryCloud>, id: &str) -> AuditableResource {
    AuditableResource::from_service(
        "aws.rds",
        ResourceDescriptor::new(ACCOUNT, "us-east-1", id),
        &ProviderClients::memory(cloud.clone()),
    )
    .unwrap()
}

fn bucket(cloud: &Arc<MemoryCloud>, name: &str) -> AuditableResource {
    AuditableResource::from_service(
        "AWS_S3",
        ResourceDescriptor::new(ACCOUNT, "us-west-2", name),
        &ProviderClients::memory(cloud.clone()),
    )
    .unwrap()
}

struct Harness {
    pipeline: TagAuditPipeline,
    state: Arc<MemoryEscalationStore>,
    ledger: Arc<MemoryActionLedger>,
}

fn harness(mode: ActionMode) -> Harness {
    let state = Arc::new(MemoryEscalationStore::new());
    let ledger = Arc::new(MemoryActionLedger::default());
    Harness {
        pipeline: TagAuditPipeline::new(engine(mode), state.clone(), ledger.clone()),
        state,
        ledger,
    }
}

// ─── Ladder ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_ladder_climbs_and_restarts() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_instance("db-1", InstanceStatus::Available, false, Tags::new());
    let h = harness(ActionMode::DryRun);
    let ctx = Invocation::for_workflow("wf-ladder");

    let expected = [
        (Action::Notify, 1),
        (Action::Notify, 2),
        (Action::Notify, 3),
        (Action::Prevent, 4),
        (Action::Remove, 5),
        (Action::Error, 0),
        (Action::Notify, 1),
    ];

    for (i, (action, counter)) in expected.iter().enumerate() {
        let mut resource = database(&cloud, "db-1");
        let report = h.pipeline.run(&ctx, &mut resource).await.unwrap();
        assert_eq!(report.action, *action, "call {}", i + 1);
        assert_eq!(report.record.counter, *counter, "call {}", i + 1);
        assert_eq!(h.state.load("db-1").unwrap().counter, *counter);
    }

    // Dry run never reaches the provider
    assert!(cloud.calls().is_empty());
    assert_eq!(cloud.instance_status("db-1"), Some(InstanceStatus::Available));
    assert_eq!(h.ledger.count().await.unwrap(), 7);
}

#[tokio::test]
async fn test_error_rung_reports_finished() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_instance("db-1", InstanceStatus::Available, false, Tags::new());
    let h = harness(ActionMode::DryRun);
    h.state
        .save(&a3s_inquisitor::EscalationRecord::new("db-1").with_counter(5))
        .unwrap();

    let mut resource = database(&cloud, "db-1");
    let report = h
        .pipeline
        .run(&Invocation::new(), &mut resource)
        .await
        .unwrap();
    assert_eq!(report.action, Action::Error);
    assert!(report.finished);
    assert_eq!(report.record.counter, 0);
}

// ─── Compliance ──────────────────────────────────────────────────

#[tokio::test]
async fn test_fixed_by_user_clears_counter() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_instance("db-1", InstanceStatus::Available, false, Tags::new());
    let h = harness(ActionMode::Normal);
    let ctx = Invocation::new();

    for _ in 0..2 {
        let mut resource = database(&cloud, "db-1");
        h.pipeline.run(&ctx, &mut resource).await.unwrap();
    }
    assert_eq!(h.state.load("db-1").unwrap().counter, 2);

    cloud.set_tags("db-1", tags(&[("Owner", "alice"), ("CostCenter", "42")]));
    let mut resource = database(&cloud, "db-1");
    let report = h.pipeline.run(&ctx, &mut resource).await.unwrap();

    assert_eq!(report.action, Action::FixedByUser);
    assert!(report.finished);
    assert!(report.missing_tags.is_empty());
    assert_eq!(report.record.counter, 0);
    assert_eq!(h.state.load("db-1").unwrap().counter, 0);
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_regression_after_fix_restarts_at_notify() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_instance("db-1", InstanceStatus::Available, false, Tags::new());
    let h = harness(ActionMode::DryRun);
    let ctx = Invocation::new();

    for _ in 0..4 {
        let mut resource = database(&cloud, "db-1");
        h.pipeline.run(&ctx, &mut resource).await.unwrap();
    }
    assert_eq!(h.state.load("db-1").unwrap().counter, 4);

    cloud.set_tags("db-1", tags(&[("Owner", "alice"), ("CostCenter", "42")]));
    let mut resource = database(&cloud, "db-1");
    let report = h.pipeline.run(&ctx, &mut resource).await.unwrap();
    assert_eq!(report.action, Action::FixedByUser);

    // Tags removed again: the ladder starts over instead of jumping to REMOVE
    cloud.set_tags("db-1", Tags::new());
    let mut resource = database(&cloud, "db-1");
    let report = h.pipeline.run(&ctx, &mut resource).await.unwrap();
    assert_eq!(report.action, Action::Notify);
    assert_eq!(report.record.counter, 1);
    assert_eq!(h.state.load("db-1").unwrap().counter, 1);
    assert_eq!(cloud.instance_status("db-1"), Some(InstanceStatus::Available));
}

#[tokio::test]
async fn test_tag_keys_compare_case_insensitively() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_bucket(
        "assets",
        tags(&[("owner", "bob"), ("COSTCENTER", "7")]),
        &[],
    );
    let h = harness(ActionMode::Normal);

    let mut resource = bucket(&cloud, "assets");
    let report = h
        .pipeline
        .run(&Invocation::new(), &mut resource)
        .await
        .unwrap();
    assert_eq!(report.action, Action::FixedByUser);
}

#[tokio::test]
async fn test_missing_tags_reported_in_configured_order() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_bucket("assets", tags(&[("Team", "infra")]), &[]);
    let h = harness(ActionMode::DryRun);

    let mut resource = bucket(&cloud, "assets");
    let report = h
        .pipeline
        .run(&Invocation::new(), &mut resource)
        .await
        .unwrap();
    assert_eq!(report.action, Action::Notify);
    assert_eq!(report.missing_tags, vec!["Owner", "CostCenter"]);
}

// ─── Remediation ─────────────────────────────────────────────────

#[tokio::test]
async fn test_normal_mode_prevent_then_remove_database() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_instance("db-1", InstanceStatus::Available, true, Tags::new());
    let h = harness(ActionMode::Normal);
    let ctx = Invocation::new();

    for _ in 0..5 {
        let mut resource = database(&cloud, "db-1");
        h.pipeline.run(&ctx, &mut resource).await.unwrap();
    }

    let calls = cloud.calls();
    assert_eq!(calls[0], CloudCall::StopInstance("db-1".to_string()));
    assert_eq!(
        calls[1],
        CloudCall::SetDeletionProtection("db-1".to_string(), false)
    );
    assert!(matches!(&calls[2], CloudCall::DeleteInstance(id, snap)
        if id == "db-1" && snap.starts_with("inquisitor-snapshot-db-1-")));
    assert_eq!(calls.len(), 3);
    assert_eq!(cloud.instance_status("db-1"), None);
    assert_eq!(cloud.snapshots().len(), 1);
}

#[tokio::test]
async fn test_double_remove_is_idempotent() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_instance("db-1", InstanceStatus::Stopped, false, Tags::new());
    let engine = engine(ActionMode::Normal);
    let ctx = Invocation::new();
    let mut resource = database(&cloud, "db-1");

    engine
        .take_action(&ctx, Action::Remove, &mut resource)
        .await
        .unwrap();
    engine
        .take_action(&ctx, Action::Remove, &mut resource)
        .await
        .unwrap();

    let deletes = cloud
        .calls()
        .into_iter()
        .filter(|c| matches!(c, CloudCall::DeleteInstance(..)))
        .count();
    assert_eq!(deletes, 1);
}

#[tokio::test]
async fn test_bucket_prevent_and_remove() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_bucket("logs", Tags::new(), &["a.log", "b.log"]);
    let engine = engine(ActionMode::Normal);
    let ctx = Invocation::new();
    let mut resource = bucket(&cloud, "logs");
    resource.refresh_state(&ctx).await.unwrap();

    engine
        .take_action(&ctx, Action::Prevent, &mut resource)
        .await
        .unwrap();
    engine
        .take_action(&ctx, Action::Prevent, &mut resource)
        .await
        .unwrap();
    let policy = cloud.bucket_policy_of("logs").unwrap();
    assert!(policy.contains("InquisitorPrevent"));

    engine
        .take_action(&ctx, Action::Remove, &mut resource)
        .await
        .unwrap();
    engine
        .take_action(&ctx, Action::Remove, &mut resource)
        .await
        .unwrap();
    assert!(!cloud.has_bucket("logs"));

    let calls = cloud.calls();
    let puts = calls
        .iter()
        .filter(|c| matches!(c, CloudCall::PutBucketPolicy(_)))
        .count();
    let bucket_deletes = calls
        .iter()
        .filter(|c| matches!(c, CloudCall::DeleteBucket(_)))
        .count();
    assert_eq!(puts, 1);
    assert_eq!(bucket_deletes, 1);
}

#[tokio::test]
async fn test_dry_run_makes_no_provider_calls() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_instance("db-1", InstanceStatus::Available, false, Tags::new());
    let engine = engine(ActionMode::DryRun);
    let ctx = Invocation::new();
    let mut resource = database(&cloud, "db-1");

    for action in [Action::Notify, Action::Prevent, Action::Remove] {
        engine.take_action(&ctx, action, &mut resource).await.unwrap();
    }
    assert!(cloud.calls().is_empty());
    assert_eq!(cloud.instance_status("db-1"), Some(InstanceStatus::Available));
}

// ─── Failures ────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_action_is_ledgered_and_not_persisted() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_instance("db-1", InstanceStatus::Available, false, Tags::new());
    let h = harness(ActionMode::Normal);
    h.state
        .save(&a3s_inquisitor::EscalationRecord::new("db-1").with_counter(3))
        .unwrap();
    cloud.fail_on("db-1", "throttled");

    let ctx = Invocation::for_workflow("wf-fail");
    let mut resource = database(&cloud, "db-1");
    let err = h.pipeline.run(&ctx, &mut resource).await.unwrap_err();
    assert!(matches!(err, InquisitorError::Provider { .. }));

    // The rung is retried on the next invocation
    assert_eq!(h.state.load("db-1").unwrap().counter, 3);

    let entries = h.ledger.list(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, Action::Prevent);
    assert_eq!(entries[0].workflow_id, "wf-fail");
    assert!(!entries[0].succeeded());

    cloud.clear_failures();
    let mut resource = database(&cloud, "db-1");
    let report = h.pipeline.run(&ctx, &mut resource).await.unwrap();
    assert_eq!(report.action, Action::Prevent);
    assert_eq!(report.record.counter, 4);
}

#[tokio::test]
async fn test_cancelled_invocation_aborts() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_instance("db-1", InstanceStatus::Available, false, Tags::new());
    let h = harness(ActionMode::Normal);
    let ctx = Invocation::new();
    ctx.cancel();

    let mut resource = database(&cloud, "db-1");
    let err = h.pipeline.run(&ctx, &mut resource).await.unwrap_err();
    assert!(err.is_aborted());
    assert_eq!(h.ledger.count().await.unwrap(), 0);
}

#[test]
fn test_unsupported_service() {
    let clients = ProviderClients::memory(Arc::new(MemoryCloud::new()));
    let result = AuditableResource::from_service(
        "aws.lambda",
        ResourceDescriptor::new(ACCOUNT, "us-east-1", "fn-1"),
        &clients,
    );
    assert!(matches!(result, Err(InquisitorError::UnsupportedService(s)) if s == "aws.lambda"));
}

// ─── Configuration & Persistence ─────────────────────────────────

#[test]
fn test_pipeline_from_config_with_file_state() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("escalation.json");

    let config = InquisitorConfig::from_toml_str(
        r#"
        [auditing]
        required_tags = "Owner, CostCenter"

        [actions]
        mode = "dryrun"
        "#,
    )
    .unwrap();

    let cloud = Arc::new(MemoryCloud::new());
    cloud.add_bucket("assets", tags(&[("Owner", "carol")]), &[]);

    tokio_test::block_on(async {
        let pipeline = TagAuditPipeline::from_config(
            &config,
            Arc::new(FileEscalationStore::new(&state_path)),
            Arc::new(MemoryActionLedger::default()),
        )
        .unwrap();
        assert_eq!(pipeline.engine().mode(), ActionMode::DryRun);

        for _ in 0..2 {
            let mut resource = bucket(&cloud, "assets");
            pipeline
                .run(&Invocation::new(), &mut resource)
                .await
                .unwrap();
        }
    });

    // A fresh store sees the persisted counter
    let reopened = FileEscalationStore::new(&state_path);
    assert_eq!(reopened.load("assets").unwrap().counter, 2);
}

#[test]
fn test_pipeline_from_config_requires_mode() {
    let config = InquisitorConfig::from_toml_str(
        r#"
        [auditing]
        required_tags = ["Owner"]
        "#,
    )
    .unwrap();

    let result = TagAuditPipeline::from_config(
        &config,
        Arc::new(MemoryEscalationStore::new()),
        Arc::new(MemoryActionLedger::default()),
    );
    assert!(matches!(result, Err(InquisitorError::Config(_))));
}
