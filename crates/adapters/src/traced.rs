// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::dispatch::{DispatchError, StepDispatcher};
use async_trait::async_trait;
use tracing::Instrument;
use weft_core::{Ambiance, PlanNode};

/// Wrapper that adds tracing to any StepDispatcher
#[derive(Clone)]
pub struct TracedDispatcher<D> {
    inner: D,
}

impl<D> TracedDispatcher<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<D: StepDispatcher> StepDispatcher for TracedDispatcher<D> {
    async fn dispatch(&self, node: &PlanNode, ambiance: &Ambiance) -> Result<(), DispatchError> {
        let span = tracing::info_span!(
            "step.dispatch",
            node_id = %node.id,
            step_type = %node.step_type,
            plan_execution_id = %ambiance.plan_execution_id,
        );

        async move {
            // Precondition: the worker reports back by node execution id
            let Some(node_execution_id) = ambiance.current_node_execution_id() else {
                tracing::error!("ambiance has no node execution");
                return Err(DispatchError::Rejected(format!(
                    "ambiance for {} has no node execution",
                    node.id
                )));
            };
            tracing::info!(node_execution_id, depth = ambiance.levels.len(), "dispatching");

            let start = std::time::Instant::now();
            let result = self.inner.dispatch(node, ambiance).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "step dispatched"),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "dispatch failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
