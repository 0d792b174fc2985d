// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{advance, mismatch, Directive, HandlerCtx, ResponseHandler};
use crate::error::EngineError;
use weft_core::{AdviserKind, AdviserResponse, NodeExecution};

/// Continues past a failed node without changing its status
///
/// The failure stays on record and still counts toward the parent's
/// aggregate; the branch just does not stop here.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkAsFailureHandler;

impl ResponseHandler for MarkAsFailureHandler {
    fn handle(
        &self,
        ctx: &HandlerCtx<'_>,
        finished: &NodeExecution,
        response: &AdviserResponse,
    ) -> Result<Directive, EngineError> {
        let AdviserResponse::MarkAsFailure { next_node_id } = response else {
            return Err(mismatch(AdviserKind::MarkAsFailure, response));
        };
        tracing::info!(
            node_execution_id = %finished.id,
            status = %finished.status,
            next = ?next_node_id,
            "marked as failure"
        );
        advance(ctx, finished, next_node_id.as_deref())
    }
}
