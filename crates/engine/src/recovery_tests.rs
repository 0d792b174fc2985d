// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::testing::{linear_plan, t0, Harness, PLAN_ID};
use std::collections::BTreeMap;
use std::time::Duration;
use weft_core::{EngineConfig, ExecutionMetadata, NodeExecutionUpdate, PlanNode, StepResult};
use weft_storage::{NodeExecutionStore, PlanExecutionStore};

fn force(h: &Harness, id: &str, expected: Status, update: NodeExecutionUpdate) {
    h.store
        .update_node_execution(id, &[expected], update)
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn recreates_successor_lost_after_next_id_was_written() {
    let h = Harness::new(linear_plan());
    let pe = h.start().await;
    let a = h.exec(&pe.id, "a");
    force(&h, &a.id, Status::Running, NodeExecutionUpdate::status(Status::Succeeded));
    force(
        &h,
        &a.id,
        Status::Succeeded,
        NodeExecutionUpdate::close(t0()).with_next("id-99"),
    );

    let report = h.engine.reconcile(&pe.id).await.unwrap();

    assert_eq!(report.successors_recreated, 1);
    let b = h.store.get_node_execution("id-99").unwrap();
    assert_eq!(b.node_id, "b");
    assert_eq!(b.previous_id.as_deref(), Some(a.id.as_str()));
    assert_eq!(b.status, Status::Running);
    assert_eq!(h.dispatcher.last_for("b"), Some("id-99".to_string()));
}

#[tokio::test]
async fn readvises_terminal_node_that_was_never_advised() {
    let h = Harness::new(linear_plan());
    let pe = h.start().await;
    let a = h.exec(&pe.id, "a");
    force(&h, &a.id, Status::Running, NodeExecutionUpdate::status(Status::Succeeded));

    let report = h.engine.reconcile(&pe.id).await.unwrap();

    assert_eq!(report.readvised, 1);
    assert!(h.exec(&pe.id, "a").is_closed());
    assert_eq!(h.exec(&pe.id, "b").status, Status::Running);
}

#[tokio::test]
async fn concluded_group_resumes_plan_end_instead_of_advising() {
    let plan = weft_core::Plan::new(PLAN_ID, "root", t0())
        .with_node(PlanNode::fork("root", vec!["left".into(), "right".into()]).with_next("deploy"))
        .with_node(PlanNode::step("left", "SHELL"))
        .with_node(PlanNode::step("right", "SHELL"))
        .with_node(PlanNode::step("deploy", "SHELL"));
    let h = Harness::new(plan);
    let pe = h.start().await;
    let left = h.exec(&pe.id, "left");
    let right = h.exec(&pe.id, "right");
    let root = h.exec(&pe.id, "root");
    force(&h, &left.id, Status::Running, NodeExecutionUpdate::status(Status::Succeeded));
    force(
        &h,
        &left.id,
        Status::Succeeded,
        NodeExecutionUpdate::close(t0()).mark_ended_plan(),
    );
    force(&h, &right.id, Status::Running, NodeExecutionUpdate::status(Status::Succeeded));
    force(&h, &right.id, Status::Succeeded, NodeExecutionUpdate::close(t0()));
    force(&h, &root.id, root.status, NodeExecutionUpdate::status(Status::Succeeded));

    let report = h.engine.reconcile(&pe.id).await.unwrap();

    assert_eq!(report.plan_ends_resumed, 1);
    assert_eq!(report.readvised, 0);
    let root = h.exec(&pe.id, "root");
    assert!(root.is_closed());
    assert!(root.ended_plan);
    assert_eq!(root.next_id, None);
    assert_eq!(h.dispatcher.dispatched_nodes(), vec!["left", "right"]);
    assert_eq!(h.plan_status(&pe.id), Status::Succeeded);
}

#[tokio::test]
async fn recreates_attempt_for_retried_node() {
    let h = Harness::new(linear_plan());
    let pe = h.start().await;
    let a = h.exec(&pe.id, "a");
    force(&h, &a.id, Status::Running, NodeExecutionUpdate::status(Status::Failed));
    force(
        &h,
        &a.id,
        Status::Failed,
        NodeExecutionUpdate::close(t0()).mark_old_retry(),
    );

    let report = h.engine.reconcile(&pe.id).await.unwrap();

    assert_eq!(report.retries_recreated, 1);
    let attempt = h.exec(&pe.id, "a");
    assert_eq!(attempt.retry_ids, vec![a.id]);
    assert_eq!(attempt.status, Status::Running);
}

#[tokio::test]
async fn starts_plan_execution_that_never_got_a_root() {
    let h = Harness::new(linear_plan());
    let pe = weft_core::PlanExecution::new(
        "pe-crashed",
        PLAN_ID,
        BTreeMap::new(),
        ExecutionMetadata::default(),
        t0(),
    );
    h.store.save_plan_execution(pe).unwrap();

    let report = h.engine.reconcile("pe-crashed").await.unwrap();

    assert_eq!(report.started, 1);
    assert_eq!(h.plan_status("pe-crashed"), Status::Running);
    assert_eq!(h.exec("pe-crashed", "a").status, Status::Running);
}

#[tokio::test]
async fn processes_interrupts_left_pending() {
    let h = Harness::new(linear_plan());
    let pe = h.start().await;
    let a = h.exec(&pe.id, "a");
    interrupts::register(
        h.store(),
        &h.engine.ids,
        &h.clock,
        InterruptPackage::for_node(&pe.id, &a.id, InterruptKind::Pause, Issuer::System),
    )
    .unwrap();

    let report = h.engine.reconcile(&pe.id).await.unwrap();

    assert_eq!(report.interrupt_targets, 1);
    assert_eq!(h.exec(&pe.id, "a").status, Status::Paused);
}

#[tokio::test]
async fn reconcile_of_healthy_execution_changes_nothing() {
    let mut h = Harness::new(linear_plan());
    let pe = h.start().await;
    h.finish(&pe.id, "a", StepResult::succeeded()).await;
    h.status_updates();

    let report = h.engine.reconcile(&pe.id).await.unwrap();

    // a is closed with a successor; b is running
    assert_eq!(report.successors_recreated, 0);
    assert_eq!(report.started, 0);
    assert_eq!(report.readvised, 0);
    assert_eq!(h.executions(&pe.id).len(), 2);
    assert!(h.status_updates().is_empty());
}

#[tokio::test]
async fn recover_skips_concluded_executions() {
    let h = Harness::new(linear_plan());
    let done = h.start().await;
    h.engine.error_out_active_nodes(&done.id).await.unwrap();
    let active = h.start().await;

    let reports = h.engine.recover().await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].plan_execution_id, active.id);
}

#[tokio::test]
async fn error_out_concludes_plan_as_errored() {
    let h = Harness::new(linear_plan());
    let pe = h.start().await;

    let errored = h.engine.error_out_active_nodes(&pe.id).await.unwrap();

    assert_eq!(errored, 1);
    let a = h.exec(&pe.id, "a");
    assert_eq!(a.status, Status::Errored);
    assert!(a.is_closed());
    assert_eq!(h.plan_status(&pe.id), Status::Errored);
    assert_eq!(h.engine.error_out_active_nodes(&pe.id).await.unwrap(), 0);
}

#[tokio::test]
async fn expires_steps_past_their_timeout() {
    let plan = weft_core::Plan::new(PLAN_ID, "a", t0())
        .with_node(PlanNode::step("a", "SHELL").with_timeout(Duration::from_secs(60)));
    let h = Harness::new(plan);
    let pe = h.start().await;

    h.clock.advance(Duration::from_secs(59));
    assert_eq!(h.engine.expire_timed_out().await.unwrap(), 0);

    h.clock.advance(Duration::from_secs(1));
    assert_eq!(h.engine.expire_timed_out().await.unwrap(), 1);
    let a = h.exec(&pe.id, "a");
    assert_eq!(a.status, Status::Expired);
    assert_eq!(h.plan_status(&pe.id), Status::Expired);
    assert_eq!(h.engine.expire_timed_out().await.unwrap(), 0);
}

#[tokio::test]
async fn sweep_applies_default_timeout() {
    let mut config = EngineConfig::default();
    config.timeouts.default_node_timeout = Some(Duration::from_secs(10));
    let h = Harness::with_config(linear_plan(), config);
    let pe = h.start().await;

    h.clock.advance(Duration::from_secs(30));
    assert_eq!(h.engine.tick().await.unwrap(), 1);

    assert_eq!(h.exec(&pe.id, "a").status, Status::Expired);
}
