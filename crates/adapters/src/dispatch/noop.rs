// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op dispatcher for embedding without workers.

use super::{DispatchError, StepDispatcher};
use async_trait::async_trait;
use weft_core::{Ambiance, PlanNode};

/// Dispatcher that accepts every step and runs nothing.
///
/// Used when results are reported by an out-of-band caller, such as a
/// host process that drives `on_node_finish` itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpDispatcher;

impl NoOpDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepDispatcher for NoOpDispatcher {
    async fn dispatch(&self, _node: &PlanNode, _ambiance: &Ambiance) -> Result<(), DispatchError> {
        Ok(())
    }
}
