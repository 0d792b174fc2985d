// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::execution::{Ambiance, NodeType};
use crate::interrupt::{InterruptKind, InterruptPackage, Issuer};
use crate::status::Status;
use chrono::{TimeZone, Utc};

#[test]
fn update_operation_uses_external_tag() {
    let op = Operation::NodeExecutionUpdate {
        id: "exec-1".to_string(),
        update: NodeExecutionUpdate::status(Status::Succeeded),
    };
    let json = serde_json::to_string(&op).unwrap();
    assert_eq!(
        json,
        r#"{"NodeExecutionUpdate":{"id":"exec-1","update":{"status":"SUCCEEDED"}}}"#
    );
    let parsed: Operation = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, op);
}

#[test]
fn node_execution_save_survives_serialization() {
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut exec = NodeExecution::new("exec-2", "pe-1", "test", NodeType::Identity, Ambiance::default(), at);
    exec.retry_ids = vec!["exec-1".to_string()];
    exec.original_node_execution_id = Some("exec-1".to_string());
    let op = Operation::NodeExecutionSave { execution: exec };

    let parsed: Operation = serde_json::from_str(&serde_json::to_string(&op).unwrap()).unwrap();
    assert_eq!(parsed, op);
}

#[test]
fn traced_fields_describe_the_change() {
    let op = Operation::NodeExecutionUpdate {
        id: "exec-1".to_string(),
        update: NodeExecutionUpdate::default().mark_old_retry(),
    };
    assert_eq!(op.name(), "node_execution_update");
    assert!(op.fields().contains(&("old_retry", "true".to_string())));

    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let interrupt = Interrupt::from_package(
        "int-1",
        InterruptPackage::for_plan("pe-1", InterruptKind::Abort, Issuer::System),
        at,
    );
    let op = Operation::InterruptRegister { interrupt };
    assert!(op.fields().contains(&("target_id", "pe-1".to_string())));
    assert!(op.fields().contains(&("kind", "ABORT".to_string())));
}
