// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{mismatch, Directive, HandlerCtx, ResponseHandler};
use crate::error::EngineError;
use weft_core::{AdviserKind, AdviserResponse, NodeExecution};

/// Ends the plan execution from this node
#[derive(Debug, Clone, Copy, Default)]
pub struct EndPlanHandler;

impl ResponseHandler for EndPlanHandler {
    fn handle(
        &self,
        _ctx: &HandlerCtx<'_>,
        finished: &NodeExecution,
        response: &AdviserResponse,
    ) -> Result<Directive, EngineError> {
        if !matches!(response, AdviserResponse::EndPlan) {
            return Err(mismatch(AdviserKind::EndPlan, response));
        }
        tracing::info!(node_execution_id = %finished.id, status = %finished.status, "ending plan");
        Ok(Directive::EndPlan)
    }
}
