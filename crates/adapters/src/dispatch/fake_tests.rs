// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::BTreeMap;
use weft_core::Level;

fn ambiance(exec_id: &str, node_id: &str) -> Ambiance {
    Ambiance::for_plan("plan-1", "pe-1", BTreeMap::new()).child(Level {
        node_id: node_id.to_string(),
        node_execution_id: exec_id.to_string(),
        identifier: node_id.to_string(),
    })
}

#[tokio::test]
async fn fake_dispatcher_records_calls() {
    let dispatcher = FakeDispatcher::new();
    let build = PlanNode::step("build", "SHELL");
    let test = PlanNode::step("test", "SHELL");

    dispatcher.dispatch(&build, &ambiance("exec-1", "build")).await.unwrap();
    dispatcher.dispatch(&test, &ambiance("exec-2", "test")).await.unwrap();
    dispatcher.dispatch(&build, &ambiance("exec-3", "build")).await.unwrap();

    assert_eq!(dispatcher.dispatched_nodes(), vec!["build", "test", "build"]);
    assert_eq!(dispatcher.last_for("build").as_deref(), Some("exec-3"));
    assert_eq!(
        dispatcher.calls()[1],
        DispatchCall {
            node_execution_id: "exec-2".to_string(),
            node_id: "test".to_string(),
            step_type: "SHELL".to_string(),
        }
    );
}

#[tokio::test]
async fn fake_dispatcher_fails_configured_step_types() {
    let dispatcher = FakeDispatcher::new();
    dispatcher.fail_step_type("HTTP");

    let result = dispatcher
        .dispatch(&PlanNode::step("call", "HTTP"), &ambiance("exec-1", "call"))
        .await;
    assert!(matches!(result, Err(DispatchError::UnknownStepType(t)) if t == "HTTP"));
    // Failed dispatches are still recorded
    assert_eq!(dispatcher.calls().len(), 1);
}

#[tokio::test]
async fn fake_dispatcher_rejects_empty_ambiance() {
    let dispatcher = FakeDispatcher::new();
    let empty = Ambiance::for_plan("plan-1", "pe-1", BTreeMap::new());
    let result = dispatcher.dispatch(&PlanNode::step("a", "SHELL"), &empty).await;
    assert!(matches!(result, Err(DispatchError::Rejected(_))));
    assert!(dispatcher.calls().is_empty());
}
