// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake step dispatcher for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{DispatchError, StepDispatcher};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use weft_core::{Ambiance, PlanNode};

/// Recorded dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchCall {
    pub node_execution_id: String,
    pub node_id: String,
    pub step_type: String,
}

/// Fake dispatcher that records every step it is handed
#[derive(Clone, Default)]
pub struct FakeDispatcher {
    calls: Arc<Mutex<Vec<DispatchCall>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FakeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every later dispatch of `step_type`
    pub fn fail_step_type(&self, step_type: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(step_type.to_string());
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<DispatchCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Node execution id of the most recent dispatch of `node_id`
    pub fn last_for(&self, node_id: &str) -> Option<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|c| c.node_id == node_id)
            .map(|c| c.node_execution_id.clone())
    }

    /// Node ids in dispatch order
    pub fn dispatched_nodes(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|c| c.node_id.clone())
            .collect()
    }
}

#[async_trait]
impl StepDispatcher for FakeDispatcher {
    async fn dispatch(&self, node: &PlanNode, ambiance: &Ambiance) -> Result<(), DispatchError> {
        let node_execution_id = ambiance
            .current_node_execution_id()
            .ok_or_else(|| DispatchError::Rejected("ambiance has no node execution".to_string()))?;

        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(DispatchCall {
                node_execution_id: node_execution_id.to_string(),
                node_id: node.id.clone(),
                step_type: node.step_type.clone(),
            });

        if self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&node.step_type)
        {
            return Err(DispatchError::UnknownStepType(node.step_type.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
