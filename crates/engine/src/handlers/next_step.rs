// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{advance, mismatch, Directive, HandlerCtx, ResponseHandler};
use crate::error::EngineError;
use weft_core::{AdviserKind, AdviserResponse, NodeExecution};

/// Runs the next node, re-entering aliased nodes through identity nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct NextStepHandler;

impl ResponseHandler for NextStepHandler {
    fn handle(
        &self,
        ctx: &HandlerCtx<'_>,
        finished: &NodeExecution,
        response: &AdviserResponse,
    ) -> Result<Directive, EngineError> {
        let AdviserResponse::NextStep { next_node_id } = response else {
            return Err(mismatch(AdviserKind::NextStep, response));
        };
        advance(ctx, finished, next_node_id.as_deref())
    }
}
