//! Tests for the bootstrap pipeline
//!
//! Covers `src/services/pipeline.rs` and `src/services/status.rs`:
//! ordering, idempotent re-runs, failure isolation, connectivity failures
//! and interruption between steps.

mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use zato_quickstart::error::BootstrapError;
use zato_quickstart::services::{
    BootstrapPipeline, ScriptCatalog, ScriptId, SqlActionRunner, StatusRecorder, Step,
    StepContext, StepOutcome,
};

// ============================================================================
// Happy path and idempotency
// ============================================================================

#[tokio::test]
async fn fresh_database_applies_every_step_in_order() {
    let dir = common::temp_dir();
    let config = common::test_config(dir.path());
    let runner = common::test_runner(&config);
    let ctx = StepContext::new(&config, &runner);

    let report = BootstrapPipeline::quickstart().run(&ctx).await;

    assert!(report.is_success());
    assert!(report.error().is_none());
    let order: Vec<Step> = report.results.iter().map(|r| r.step).collect();
    assert_eq!(order, Step::ALL.to_vec());
    assert_eq!(report.applied(), Step::ALL.to_vec());

    let status = StatusRecorder::new(common::connection(&runner).await)
        .get_status()
        .await
        .unwrap();
    assert_eq!(status.len(), 4);
    assert!(status.iter().all(|s| s.status == "applied"), "{:?}", status);
    assert_eq!(status[0].step, "admin-user");
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let dir = common::temp_dir();
    let config = common::test_config(dir.path());
    let runner = common::test_runner(&config);
    let ctx = StepContext::new(&config, &runner);
    let pipeline = BootstrapPipeline::quickstart();

    assert!(pipeline.run(&ctx).await.is_success());
    let report = pipeline.run(&ctx).await;

    assert!(report.is_success());
    assert!(report.applied().is_empty());
    assert!(report
        .results
        .iter()
        .all(|r| matches!(r.outcome, StepOutcome::AlreadySatisfied)));

    let db = common::connection(&runner).await;
    assert_eq!(common::count_admins(db).await, 1);
    assert_eq!(common::count_clusters(db).await, 1);
    assert_eq!(common::count_servers(db, common::CLUSTER_NAME).await, 1);
}

#[tokio::test]
async fn partially_provisioned_database_resumes() {
    let dir = common::temp_dir();
    let config = common::test_config(dir.path());
    let runner = common::test_runner(&config);
    let ctx = StepContext::new(&config, &runner);
    let executor = zato_quickstart::services::StepExecutor::new(&ctx);
    executor.execute(Step::AdminPrincipal).await;
    executor.execute(Step::OdbTables).await;

    let report = BootstrapPipeline::quickstart().run(&ctx).await;

    assert!(report.is_success());
    assert_eq!(report.applied(), vec![Step::OdbCluster, Step::ServerCluster]);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn failing_step_stops_the_pipeline() {
    let dir = common::temp_dir();
    let config = common::test_config(dir.path());
    let catalog = ScriptCatalog::bundled().with_override(
        ScriptId::OdbCluster,
        "INSERT INTO no_such_table (name) VALUES (:cluster_name);",
    );
    let runner = SqlActionRunner::with_catalog(config.database.clone(), catalog);
    let ctx = StepContext::new(&config, &runner);

    let report = BootstrapPipeline::quickstart().run(&ctx).await;

    assert!(!report.is_success());
    assert_eq!(report.results.len(), 3, "server-cluster must not run");
    let (step, _) = report.failure().expect("a failed step");
    assert_eq!(step, Step::OdbCluster);

    let err = report.error().expect("an error");
    assert!(matches!(
        err,
        BootstrapError::Action {
            step: "odb-cluster",
            ..
        }
    ));
    assert_eq!(err.exit_code(), 4);

    let db = common::connection(&runner).await;
    assert_eq!(common::count_servers(db, common::CLUSTER_NAME).await, 0);

    let status = StatusRecorder::new(db).get_status().await.unwrap();
    let by_step = |name: &str| {
        status
            .iter()
            .find(|s| s.step == name)
            .map(|s| s.status.clone())
            .unwrap()
    };
    assert_eq!(by_step("odb-tables"), "applied");
    assert_eq!(by_step("odb-cluster"), "failed");
    assert_eq!(by_step("server-cluster"), "pending");
}

#[tokio::test]
async fn unreachable_database_is_reported_against_first_step() {
    let dir = common::temp_dir();
    let missing = dir.path().join("absent").join("odb.db");
    let config = common::config_with(
        dir.path(),
        &[
            ("ZATO_ODB_SQLITE_PATH", missing.to_str().unwrap()),
            ("ZATO_DB_MAX_WAIT_SECS", "0.2"),
        ],
    );
    let runner = common::test_runner(&config);
    let ctx = StepContext::new(&config, &runner);

    let report = BootstrapPipeline::quickstart().run(&ctx).await;

    assert_eq!(report.results.len(), 1);
    let err = report.error().expect("an error");
    assert!(matches!(
        err,
        BootstrapError::Connectivity {
            step: "admin-user",
            ..
        }
    ));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn interruption_stops_before_next_step() {
    let dir = common::temp_dir();
    let config = common::test_config(dir.path());
    let runner = common::test_runner(&config);
    let ctx = StepContext::new(&config, &runner)
        .with_interrupt_flag(Arc::new(AtomicBool::new(true)));

    let report = BootstrapPipeline::quickstart().run(&ctx).await;

    assert!(report.results.is_empty());
    assert_eq!(report.interrupted_before, Some(Step::AdminPrincipal));
    let err = report.error().expect("an error");
    assert!(matches!(err, BootstrapError::Interrupted { step: "admin-user" }));
    assert_eq!(err.exit_code(), 130);
    assert!(!runner.has_table("admin_principal").await.unwrap());
}
