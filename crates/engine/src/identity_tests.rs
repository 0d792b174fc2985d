// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::testing::{linear_plan, t0, Harness, PLAN_ID};
use std::collections::BTreeMap;
use weft_core::{
    AdviserConfig, ExecutionMetadata, ExecutionMode, NodeExecutionUpdate, Plan, PlanNode, Status,
    StepResult,
};
use weft_storage::{NodeExecutionStore, PlanExecutionStore, PlanStore};

fn succeed(h: &Harness, id: &str) -> NodeExecution {
    h.store
        .update_node_execution(id, &[Status::Running], NodeExecutionUpdate::status(Status::Succeeded))
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn first_visit_uses_the_target_itself() {
    let h = Harness::new(linear_plan());
    let pe = h.start().await;
    let a = succeed(&h, &h.exec(&pe.id, "a").id);

    let plan = h.store.get_plan(PLAN_ID).unwrap();
    let ctx = h.engine.handler_ctx(&plan, &pe);
    assert_eq!(resolve_target(&ctx, &a, "b").unwrap(), "b");
    assert_eq!(h.store.get_plan(PLAN_ID).unwrap().nodes.len(), 3);
}

#[tokio::test]
async fn re_entry_appends_an_identity_alias() {
    let h = Harness::new(linear_plan());
    let pe = h.start().await;
    h.finish(&pe.id, "a", StepResult::succeeded()).await;
    let a = h.exec(&pe.id, "a");
    let b = succeed(&h, &h.exec(&pe.id, "b").id);

    let plan = h.store.get_plan(PLAN_ID).unwrap();
    let ctx = h.engine.handler_ctx(&plan, &pe);
    let alias_id = resolve_target(&ctx, &b, "a").unwrap();

    assert_ne!(alias_id, "a");
    let plan = h.store.get_plan(PLAN_ID).unwrap();
    let Some(Node::Identity(alias)) = plan.node(&alias_id) else {
        panic!("expected identity node {alias_id}");
    };
    assert_eq!(alias.original_node_id, "a");
    assert_eq!(alias.original_node_execution_id.as_deref(), Some(a.id.as_str()));
    assert_eq!(alias.next_id.as_deref(), Some("b"));
    assert_eq!(plan.resolve(&alias_id).unwrap().id, "a");
}

#[tokio::test]
async fn alias_follows_retry_chain_to_latest_attempt() {
    let plan = Plan::new(PLAN_ID, "a", t0())
        .with_node(
            PlanNode::step("a", "SHELL")
                .with_next("b")
                .with_adviser(AdviserConfig::retry(3, Vec::new())),
        )
        .with_node(PlanNode::step("b", "SHELL"));
    let h = Harness::new(plan);
    let pe = h.start().await;
    let first = h.exec(&pe.id, "a");
    h.finish(&pe.id, "a", StepResult::failed("1")).await;
    h.finish(&pe.id, "a", StepResult::failed("2")).await;
    h.finish(&pe.id, "a", StepResult::succeeded()).await;
    let third = h.exec(&pe.id, "a");
    assert_eq!(third.retry_count(), 2);

    let latest = latest_attempt(h.store(), first.clone()).unwrap();
    assert_eq!(latest.id, third.id);

    // An alias of the first attempt resolves its successor through the third
    h.store
        .append_identity_node(
            PLAN_ID,
            IdentityPlanNode {
                id: "a-alias".to_string(),
                original_node_id: "a".to_string(),
                original_node_execution_id: Some(first.id.clone()),
                next_id: None,
            },
        )
        .unwrap();
    let b = succeed(&h, &h.exec(&pe.id, "b").id);
    let plan = h.store.get_plan(PLAN_ID).unwrap();
    let ctx = h.engine.handler_ctx(&plan, &pe);
    let alias_id = resolve_target(&ctx, &b, "a-alias").unwrap();

    let plan = h.store.get_plan(PLAN_ID).unwrap();
    let Some(Node::Identity(alias)) = plan.node(&alias_id) else {
        panic!("expected identity node {alias_id}");
    };
    assert_eq!(alias.original_node_id, "a");
    assert_eq!(alias.original_node_execution_id.as_deref(), Some(third.id.as_str()));
    assert_eq!(alias.next_id.as_deref(), Some("b"));
}

#[tokio::test]
async fn re_entered_plain_node_keeps_its_static_successor() {
    let plan = Plan::new(PLAN_ID, "a", t0())
        .with_node(PlanNode::step("a", "SHELL").with_next("b"))
        .with_node(PlanNode::step("b", "SHELL"));
    let h = Harness::new(plan);
    let pe = h.start().await;
    h.finish(&pe.id, "a", StepResult::succeeded()).await;
    h.finish(&pe.id, "b", StepResult::succeeded()).await;
    let b = h.exec(&pe.id, "b");

    let plan = h.store.get_plan(PLAN_ID).unwrap();
    let ctx = h.engine.handler_ctx(&plan, &pe);
    let alias_id = resolve_target(&ctx, &b, "b").unwrap();

    let plan = h.store.get_plan(PLAN_ID).unwrap();
    let Some(Node::Identity(alias)) = plan.node(&alias_id) else {
        panic!("expected identity node {alias_id}");
    };
    assert_eq!(alias.original_node_execution_id.as_deref(), Some(b.id.as_str()));
    assert_eq!(alias.next_id, None);
}

#[tokio::test]
async fn identity_without_execution_runs_as_authored() {
    let plan = linear_plan().with_node(IdentityPlanNode {
        id: "a-again".to_string(),
        original_node_id: "a".to_string(),
        original_node_execution_id: None,
        next_id: None,
    });
    let h = Harness::new(plan);
    let pe = h.start().await;
    let a = succeed(&h, &h.exec(&pe.id, "a").id);

    let plan = h.store.get_plan(PLAN_ID).unwrap();
    let ctx = h.engine.handler_ctx(&plan, &pe);
    assert_eq!(resolve_target(&ctx, &a, "a-again").unwrap(), "a-again");
}

#[tokio::test]
async fn rollback_reruns_preserved_nodes_directly() {
    let mut plan = linear_plan();
    if let Some(Node::Plan(node)) = plan.nodes.get_mut("a") {
        node.preserve_in_rollback = true;
    }
    let h = Harness::new(plan);
    let pe = h
        .engine
        .start_plan_execution(
            PLAN_ID,
            BTreeMap::new(),
            ExecutionMetadata {
                mode: ExecutionMode::Rollback,
                tags: Vec::new(),
            },
        )
        .await
        .unwrap();
    h.finish(&pe.id, "a", StepResult::succeeded()).await;
    let b = succeed(&h, &h.exec(&pe.id, "b").id);

    let pe = h.store.get_plan_execution(&pe.id).unwrap();
    let plan = h.store.get_plan(PLAN_ID).unwrap();
    let ctx = h.engine.handler_ctx(&plan, &pe);
    assert_eq!(resolve_target(&ctx, &b, "a").unwrap(), "a");
}

#[tokio::test]
async fn unknown_target_is_a_graph_error() {
    let h = Harness::new(linear_plan());
    let pe = h.start().await;
    let a = succeed(&h, &h.exec(&pe.id, "a").id);

    let plan = h.store.get_plan(PLAN_ID).unwrap();
    let ctx = h.engine.handler_ctx(&plan, &pe);
    assert!(matches!(
        resolve_target(&ctx, &a, "nope"),
        Err(EngineError::InvalidGraph(_))
    ));
}
