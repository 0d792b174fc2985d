// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{mismatch, Directive, HandlerCtx, ResponseHandler};
use crate::error::EngineError;
use crate::interrupts;
use weft_core::{AdviserKind, AdviserResponse, InterruptKind, InterruptPackage, Issuer, NodeExecution};

/// Registers a PROCEED_WITH_DEFAULT interrupt for a broke node
#[derive(Debug, Clone, Copy, Default)]
pub struct ProceedWithDefaultHandler;

impl ResponseHandler for ProceedWithDefaultHandler {
    fn handle(
        &self,
        ctx: &HandlerCtx<'_>,
        finished: &NodeExecution,
        response: &AdviserResponse,
    ) -> Result<Directive, EngineError> {
        if !matches!(response, AdviserResponse::ProceedWithDefault) {
            return Err(mismatch(AdviserKind::ProceedWithDefault, response));
        }

        let package = InterruptPackage::for_node(
            &finished.plan_execution_id,
            &finished.id,
            InterruptKind::ProceedWithDefault,
            Issuer::Adviser {
                node_execution_id: finished.id.clone(),
            },
        );
        interrupts::register_once(ctx.store, ctx.ids, ctx.clock, package)?;
        Ok(Directive::Await {
            target_id: finished.id.clone(),
        })
    }
}
