// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use std::collections::BTreeMap;
use weft_core::{IdentityPlanNode, PlanNode};

fn t(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, secs).unwrap()
}

fn plan() -> Plan {
    Plan::new("plan-1", "stage", t(0))
        .with_node(PlanNode::section("stage", "build"))
        .with_node(PlanNode::step("build", "SHELL").with_next("test"))
        .with_node(PlanNode::step("test", "SHELL"))
        .with_node(IdentityPlanNode {
            id: "build-again".to_string(),
            original_node_id: "build".to_string(),
            original_node_execution_id: Some("exec-2".to_string()),
            next_id: None,
        })
}

fn root_ambiance() -> Ambiance {
    Ambiance::for_plan("plan-1", "pe-1", BTreeMap::new())
}

#[test]
fn within_places_child_under_current_level() {
    let plan = plan();
    let root = root_ambiance();
    let stage = instantiate(&plan, "stage", "exec-1".into(), Placement::Within(&root), t(0)).unwrap();
    assert_eq!(stage.parent_id, None);
    assert_eq!(stage.ambiance.current_node_execution_id(), Some("exec-1"));

    let build = instantiate(&plan, "build", "exec-2".into(), Placement::Within(&stage.ambiance), t(1)).unwrap();
    assert_eq!(build.parent_id.as_deref(), Some("exec-1"));
    assert_eq!(build.ambiance.levels.len(), 2);
    assert_eq!(build.plan_execution_id, "pe-1");
    assert_eq!(build.node_type, NodeType::Plan);
}

#[test]
fn after_keeps_parent_and_links_previous() {
    let plan = plan();
    let root = root_ambiance();
    let stage = instantiate(&plan, "stage", "exec-1".into(), Placement::Within(&root), t(0)).unwrap();
    let build = instantiate(&plan, "build", "exec-2".into(), Placement::Within(&stage.ambiance), t(1)).unwrap();
    let test = instantiate(&plan, "test", "exec-3".into(), Placement::After(&build), t(2)).unwrap();

    assert_eq!(test.parent_id.as_deref(), Some("exec-1"));
    assert_eq!(test.previous_id.as_deref(), Some("exec-2"));
    assert_eq!(test.ambiance.levels.len(), 2);
    assert_eq!(test.ambiance.parent_node_execution_id(), Some("exec-1"));
}

#[test]
fn retry_extends_attempt_history() {
    let plan = plan();
    let build = instantiate(&plan, "build", "exec-2".into(), Placement::Within(&root_ambiance()), t(0)).unwrap();
    let second = instantiate(&plan, "build", "exec-3".into(), Placement::Retry(&build), t(1)).unwrap();
    let third = instantiate(&plan, "build", "exec-4".into(), Placement::Retry(&second), t(2)).unwrap();

    assert_eq!(third.original_node_execution_id.as_deref(), Some("exec-3"));
    assert_eq!(third.retry_ids, vec!["exec-2", "exec-3"]);
    assert_eq!(third.retry_count(), 2);
}

#[test]
fn identity_execution_points_at_aliased_execution() {
    let plan = plan();
    let exec = instantiate(&plan, "build-again", "exec-9".into(), Placement::Within(&root_ambiance()), t(0)).unwrap();
    assert_eq!(exec.node_type, NodeType::Identity);
    assert_eq!(exec.original_node_execution_id.as_deref(), Some("exec-2"));
    // Level identifier comes from the aliased configuration
    assert_eq!(exec.ambiance.levels[0].identifier, plan.resolve("build").unwrap().identifier);
}

#[test]
fn unknown_node_is_an_invalid_graph() {
    let err = instantiate(&plan(), "nope", "exec-1".into(), Placement::Within(&root_ambiance()), t(0)).unwrap_err();
    assert!(matches!(err, EngineError::InvalidGraph(_)));
}
