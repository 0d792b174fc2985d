// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adviser response handlers
//!
//! Each [`AdviserKind`] maps to one [`ResponseHandler`] in a
//! [`HandlerRegistry`]. A handler applies the decision to the store and
//! returns a [`Directive`] telling the engine how the branch continues; it
//! never dispatches work itself.

mod end_plan;
mod mark_as_failure;
mod next_step;
mod proceed_with_default;
mod retry;

pub use end_plan::EndPlanHandler;
pub use mark_as_failure::MarkAsFailureHandler;
pub use next_step::NextStepHandler;
pub use proceed_with_default::ProceedWithDefaultHandler;
pub use retry::RetryHandler;

use crate::error::EngineError;
use crate::identity;
use crate::spawn::{self, Placement};
use std::collections::HashMap;
use weft_core::{
    AdviserKind, AdviserResponse, Clock, EngineConfig, IdGen, NodeExecution, NodeExecutionUpdate,
    Plan, PlanError, PlanExecution,
};
use weft_storage::ExecutionStore;

/// What the engine does after a handler returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// A successor was created; start it
    Run { node_execution_id: String },
    /// Close the finished node and check whether its parent is done
    EndBranch,
    /// Close the finished node and its ancestors, then conclude the plan
    EndPlan,
    /// An interrupt was registered for `target_id`; process its queue
    Await { target_id: String },
    /// Another writer already decided for this node
    Lost,
}

/// Everything a handler may touch
pub struct HandlerCtx<'a> {
    pub store: &'a dyn ExecutionStore,
    pub ids: &'a dyn IdGen,
    pub clock: &'a dyn Clock,
    pub config: &'a EngineConfig,
    pub plan: &'a Plan,
    pub plan_execution: &'a PlanExecution,
}

/// Applies one kind of adviser response to a finished node
pub trait ResponseHandler: Send + Sync {
    fn handle(
        &self,
        ctx: &HandlerCtx<'_>,
        finished: &NodeExecution,
        response: &AdviserResponse,
    ) -> Result<Directive, EngineError>;
}

/// Lookup table from response kind to handler
pub struct HandlerRegistry {
    handlers: HashMap<AdviserKind, Box<dyn ResponseHandler>>,
}

impl HandlerRegistry {
    /// A registry with no handlers
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Replace the handler for `kind`
    pub fn register(&mut self, kind: AdviserKind, handler: impl ResponseHandler + 'static) {
        self.handlers.insert(kind, Box::new(handler));
    }

    pub fn get(&self, kind: AdviserKind) -> Option<&dyn ResponseHandler> {
        self.handlers.get(&kind).map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(AdviserKind::NextStep, NextStepHandler);
        registry.register(AdviserKind::Retry, RetryHandler);
        registry.register(AdviserKind::MarkAsFailure, MarkAsFailureHandler);
        registry.register(AdviserKind::ProceedWithDefault, ProceedWithDefaultHandler);
        registry.register(AdviserKind::EndPlan, EndPlanHandler);
        registry
    }
}

fn mismatch(handler: AdviserKind, response: &AdviserResponse) -> EngineError {
    EngineError::HandlerMismatch {
        handler,
        response: response.kind(),
    }
}

/// Move the branch from `finished` to `target`
///
/// Writes `next_id` and `end_ts` on the finished node in one conditional
/// update, then saves the successor under the id that was written. An empty
/// or missing target ends the branch instead. A target that is not in the
/// plan is an [`EngineError::InvalidGraph`], which errors the branch.
pub(crate) fn advance(
    ctx: &HandlerCtx<'_>,
    finished: &NodeExecution,
    target: Option<&str>,
) -> Result<Directive, EngineError> {
    let Some(target) = target.filter(|t| !t.is_empty()) else {
        return Ok(Directive::EndBranch);
    };
    if ctx.plan.node(target).is_none() {
        return Err(PlanError::NodeNotFound(target.to_string()).into());
    }

    let node_id = identity::resolve_target(ctx, finished, target)?;
    let next_id = ctx.ids.next();
    let now = ctx.clock.now();

    let update = NodeExecutionUpdate::close(now).with_next(&next_id);
    let Some(closed) = ctx
        .store
        .update_node_execution(&finished.id, &[finished.status], update)?
    else {
        tracing::debug!(node_execution_id = %finished.id, "successor already decided");
        return Ok(Directive::Lost);
    };

    let plan = if node_id == target {
        None
    } else {
        Some(ctx.store.get_plan(&ctx.plan.id)?)
    };
    let plan = plan.as_ref().unwrap_or(ctx.plan);
    let successor = spawn::instantiate(plan, &node_id, next_id, Placement::After(&closed), now)?;
    let successor = ctx.store.save_node_execution(successor)?;

    tracing::info!(
        node_execution_id = %closed.id,
        next_id = %successor.id,
        node_id = %successor.node_id,
        "advancing"
    );
    Ok(Directive::Run {
        node_execution_id: successor.id,
    })
}
