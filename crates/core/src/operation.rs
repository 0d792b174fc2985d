// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations for the write-ahead log
//!
//! Conditional updates are checked before they are logged, so replaying the
//! log re-applies exactly the updates that were accepted.

use crate::execution::{NodeExecution, NodeExecutionUpdate, PlanExecution, PlanExecutionUpdate};
use crate::interrupt::{Interrupt, InterruptOutcome};
use crate::plan::{IdentityPlanNode, Plan};
use crate::traced::TracedOperation;
use serde::{Deserialize, Serialize};

/// Operations that can be persisted to the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Store a new plan
    PlanSave { plan: Plan },

    /// Append an identity alias to an existing plan
    IdentityNodeAppend {
        plan_id: String,
        node: IdentityPlanNode,
    },

    /// Create a plan execution record
    PlanExecutionSave { execution: PlanExecution },

    /// Accepted partial update of a plan execution
    PlanExecutionUpdate {
        id: String,
        update: PlanExecutionUpdate,
    },

    /// Create a node execution record
    NodeExecutionSave { execution: NodeExecution },

    /// Accepted partial update of a node execution
    NodeExecutionUpdate {
        id: String,
        update: NodeExecutionUpdate,
    },

    /// Register an interrupt (sequence already assigned)
    InterruptRegister { interrupt: Interrupt },

    /// Record how an interrupt was processed
    InterruptOutcome { outcome: InterruptOutcome },
}

impl TracedOperation for Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::PlanSave { .. } => "plan_save",
            Operation::IdentityNodeAppend { .. } => "identity_node_append",
            Operation::PlanExecutionSave { .. } => "plan_execution_save",
            Operation::PlanExecutionUpdate { .. } => "plan_execution_update",
            Operation::NodeExecutionSave { .. } => "node_execution_save",
            Operation::NodeExecutionUpdate { .. } => "node_execution_update",
            Operation::InterruptRegister { .. } => "interrupt_register",
            Operation::InterruptOutcome { .. } => "interrupt_outcome",
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Operation::PlanSave { plan } => vec![
                ("plan_id", plan.id.clone()),
                ("nodes", plan.nodes.len().to_string()),
            ],
            Operation::IdentityNodeAppend { plan_id, node } => vec![
                ("plan_id", plan_id.clone()),
                ("node_id", node.id.clone()),
                ("original_node_id", node.original_node_id.clone()),
            ],
            Operation::PlanExecutionSave { execution } => vec![
                ("plan_execution_id", execution.id.clone()),
                ("plan_id", execution.plan_id.clone()),
            ],
            Operation::PlanExecutionUpdate { id, update } => {
                let mut fields = vec![("plan_execution_id", id.clone())];
                if let Some(status) = update.status {
                    fields.push(("status", status.to_string()));
                }
                fields
            }
            Operation::NodeExecutionSave { execution } => vec![
                ("node_execution_id", execution.id.clone()),
                ("node_id", execution.node_id.clone()),
                ("status", execution.status.to_string()),
            ],
            Operation::NodeExecutionUpdate { id, update } => {
                let mut fields = vec![("node_execution_id", id.clone())];
                if let Some(status) = update.status {
                    fields.push(("status", status.to_string()));
                }
                if let Some(next) = &update.next_id {
                    fields.push(("next_id", next.clone()));
                }
                if update.old_retry {
                    fields.push(("old_retry", "true".to_string()));
                }
                if update.ended_plan {
                    fields.push(("ended_plan", "true".to_string()));
                }
                fields
            }
            Operation::InterruptRegister { interrupt } => vec![
                ("interrupt_id", interrupt.id.clone()),
                ("kind", interrupt.kind.to_string()),
                ("target_id", interrupt.target_id().to_string()),
                ("sequence", interrupt.sequence.to_string()),
            ],
            Operation::InterruptOutcome { outcome } => vec![
                ("interrupt_id", outcome.interrupt_id.clone()),
                ("processed", outcome.is_processed().to_string()),
            ],
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
