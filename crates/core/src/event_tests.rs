// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::execution::{ExecutionMetadata, NodeType};
use chrono::TimeZone;
use std::collections::BTreeMap;

fn t(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, secs).unwrap()
}

#[test]
fn node_status_event_carries_node_snapshot() {
    let mut exec = NodeExecution::new("exec-1", "pe-1", "build", NodeType::Plan, Ambiance::default(), t(0));
    exec.status = Status::Failed;
    let event = OrchestrationEvent::node_status(&exec, t(3));

    assert_eq!(event.name(), "node:status");
    assert!(event.is_status_update());
    assert_eq!(event.status, Status::Failed);
    assert_eq!(event.node_id.as_deref(), Some("build"));
}

#[test]
fn plan_events_have_no_node() {
    let pe = PlanExecution::new("pe-1", "plan-1", BTreeMap::new(), ExecutionMetadata::default(), t(0));
    assert_eq!(OrchestrationEvent::plan_start(&pe, t(0)).name(), "plan:start");
    let status = OrchestrationEvent::plan_status(&pe, t(1));
    assert_eq!(status.name(), "plan:status");
    assert_eq!(status.ambiance.plan_execution_id, "pe-1");
}

#[test]
fn dedup_key_ignores_ambiance() {
    let exec = NodeExecution::new("exec-1", "pe-1", "build", NodeType::Plan, Ambiance::default(), t(0));
    let a = OrchestrationEvent::node_status(&exec, t(1));
    let mut b = a.clone();
    b.ambiance.setup_context.insert("org".to_string(), "acme".to_string());
    assert_eq!(a.dedup_key(), b.dedup_key());
}
