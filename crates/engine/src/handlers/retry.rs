// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{mismatch, Directive, HandlerCtx, ResponseHandler};
use crate::error::EngineError;
use crate::interrupts;
use weft_core::clock::after;
use weft_core::{
    AdviserKind, AdviserResponse, InterruptKind, InterruptPackage, Issuer, NodeExecution,
};

/// Schedules a RETRY interrupt instead of re-running the node directly
///
/// The re-run happens when the interrupt is processed, so a crash between
/// the decision and the re-run cannot execute the node twice.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryHandler;

impl ResponseHandler for RetryHandler {
    fn handle(
        &self,
        ctx: &HandlerCtx<'_>,
        finished: &NodeExecution,
        response: &AdviserResponse,
    ) -> Result<Directive, EngineError> {
        let AdviserResponse::Retry { wait } = response else {
            return Err(mismatch(AdviserKind::Retry, response));
        };

        let package = InterruptPackage::for_node(
            &finished.plan_execution_id,
            &finished.id,
            InterruptKind::Retry,
            Issuer::Adviser {
                node_execution_id: finished.id.clone(),
            },
        )
        .not_before(after(ctx.clock.now(), *wait));
        let interrupt = interrupts::register_once(ctx.store, ctx.ids, ctx.clock, package)?;

        tracing::info!(
            node_execution_id = %finished.id,
            attempt = finished.retry_count() + 1,
            wait = ?wait,
            interrupt_id = %interrupt.id,
            "retry scheduled"
        );

        Ok(Directive::Await {
            target_id: finished.id.clone(),
        })
    }
}
