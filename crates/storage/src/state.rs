// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

use std::collections::{BTreeMap, HashMap};
use weft_core::{Interrupt, InterruptOutcome, NodeExecution, Operation, Plan, PlanExecution};

/// Materialized state built from WAL operations
#[derive(Debug, Default, Clone)]
pub struct MaterializedState {
    pub plans: HashMap<String, Plan>,
    pub plan_executions: HashMap<String, PlanExecution>,
    pub node_executions: HashMap<String, NodeExecution>,
    /// Interrupts keyed by sequence
    pub interrupts: BTreeMap<u64, Interrupt>,
    /// Outcomes keyed by interrupt id
    pub outcomes: HashMap<String, InterruptOutcome>,
    /// Node execution ids in creation order
    node_order: Vec<String>,
    next_sequence: u64,
}

impl MaterializedState {
    /// Sequence number the next registered interrupt receives
    pub fn next_interrupt_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Node executions in creation order
    pub fn node_executions_ordered(&self) -> impl Iterator<Item = &NodeExecution> {
        self.node_order
            .iter()
            .filter_map(|id| self.node_executions.get(id))
    }

    /// Apply an operation to update the state
    ///
    /// Updates were checked before they were logged; one that no longer
    /// applies means the log and the state disagree, which is reported and
    /// skipped.
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::PlanSave { plan } => {
                self.plans.insert(plan.id.clone(), plan.clone());
            }

            Operation::IdentityNodeAppend { plan_id, node } => match self.plans.get_mut(plan_id) {
                Some(plan) => {
                    if let Err(e) = plan.append_identity(node.clone()) {
                        tracing::warn!(plan_id, error = %e, "skipping identity append");
                    }
                }
                None => tracing::warn!(plan_id, "identity append for unknown plan"),
            },

            Operation::PlanExecutionSave { execution } => {
                self.plan_executions
                    .insert(execution.id.clone(), execution.clone());
            }

            Operation::PlanExecutionUpdate { id, update } => {
                if let Some(execution) = self.plan_executions.get_mut(id) {
                    match execution.apply(update) {
                        Ok(next) => *execution = next,
                        Err(e) => tracing::warn!(id, error = %e, "skipping plan execution update"),
                    }
                }
            }

            Operation::NodeExecutionSave { execution } => {
                if !self.node_executions.contains_key(&execution.id) {
                    self.node_order.push(execution.id.clone());
                }
                self.node_executions
                    .insert(execution.id.clone(), execution.clone());
            }

            Operation::NodeExecutionUpdate { id, update } => {
                if let Some(execution) = self.node_executions.get_mut(id) {
                    match execution.apply(update) {
                        Ok(next) => *execution = next,
                        Err(e) => tracing::warn!(id, error = %e, "skipping node execution update"),
                    }
                }
            }

            Operation::InterruptRegister { interrupt } => {
                self.next_sequence = self.next_sequence.max(interrupt.sequence + 1);
                self.interrupts.insert(interrupt.sequence, interrupt.clone());
            }

            Operation::InterruptOutcome { outcome } => {
                self.outcomes
                    .entry(outcome.interrupt_id.clone())
                    .or_insert_with(|| outcome.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
