// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step dispatch: handing a started step node to whatever runs it
//!
//! Dispatch is fire-and-forget. The worker reports back later through the
//! engine's `on_node_finish`; an `Ok` here only means the step was accepted.

mod noop;

pub use noop::NoOpDispatcher;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{DispatchCall, FakeDispatcher};

use async_trait::async_trait;
use thiserror::Error;
use weft_core::{Ambiance, PlanNode};

/// Errors from dispatching a step
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no worker for step type: {0}")]
    UnknownStepType(String),
    #[error("dispatch rejected: {0}")]
    Rejected(String),
    #[error("worker unavailable: {0}")]
    Unavailable(String),
}

/// Adapter that starts step nodes on external workers
#[async_trait]
pub trait StepDispatcher: Clone + Send + Sync + 'static {
    /// Hand a step to a worker; `ambiance` identifies the node execution
    async fn dispatch(&self, node: &PlanNode, ambiance: &Ambiance) -> Result<(), DispatchError>;
}
