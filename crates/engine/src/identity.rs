// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity aliasing for re-entered nodes
//!
//! A node that has already run under the same parent, or an identity alias
//! of one, is not instantiated again directly. Instead a fresh identity node
//! is appended to the plan. It reuses the original configuration but carries
//! its own successor: a re-entered plain node keeps its static successor,
//! while re-entering an identity node follows the successor taken by the
//! latest non-superseded attempt of the execution it aliases.

use crate::error::EngineError;
use crate::handlers::HandlerCtx;
use weft_core::{IdentityPlanNode, Node, NodeExecution, PlanError};
use weft_storage::{ExecutionStore, NodeExecutionFilter};

/// Node id the successor of `finished` should instantiate for `target`
///
/// Appends an identity node to the stored plan when the target is being
/// re-entered.
pub(crate) fn resolve_target(
    ctx: &HandlerCtx<'_>,
    finished: &NodeExecution,
    target: &str,
) -> Result<String, EngineError> {
    let config = ctx.plan.resolve(target)?;
    if ctx.plan_execution.is_rollback() && config.preserve_in_rollback {
        return Ok(target.to_string());
    }

    let (original_node_id, latest, next_id) = match ctx.plan.node(target) {
        Some(Node::Identity(alias)) => {
            let Some(aliased) = alias.original_node_execution_id.as_deref() else {
                // Authored alias with no execution behind it runs as-is
                return Ok(target.to_string());
            };
            let latest = latest_attempt(ctx.store, ctx.store.get_node_execution(aliased)?)?;
            let next_id = successor_node(ctx.store, &latest)?.or_else(|| alias.next_id.clone());
            (alias.original_node_id.clone(), latest, next_id)
        }
        Some(Node::Plan(node)) => {
            let Some(previous) = last_run_under_parent(ctx, finished, target)? else {
                return Ok(target.to_string());
            };
            let latest = latest_attempt(ctx.store, previous)?;
            (node.id.clone(), latest, node.next_id.clone())
        }
        None => return Err(PlanError::NodeNotFound(target.to_string()).into()),
    };

    let identity = IdentityPlanNode {
        id: ctx.ids.next(),
        original_node_id,
        original_node_execution_id: Some(latest.id.clone()),
        next_id,
    };
    tracing::info!(
        plan_id = %ctx.plan.id,
        identity = %identity.id,
        target,
        aliases = %latest.id,
        next_id = ?identity.next_id,
        "appending identity node"
    );
    let id = identity.id.clone();
    ctx.store.append_identity_node(&ctx.plan.id, identity)?;
    Ok(id)
}

/// Most recent execution configured by `target` among the siblings of `finished`
fn last_run_under_parent(
    ctx: &HandlerCtx<'_>,
    finished: &NodeExecution,
    target: &str,
) -> Result<Option<NodeExecution>, EngineError> {
    let siblings = ctx.store.find_node_executions(
        &NodeExecutionFilter::for_plan_execution(&finished.plan_execution_id)
            .children_of(finished.parent_id.as_deref()),
    )?;
    Ok(siblings.into_iter().rfind(|e| {
        ctx.plan
            .resolve(&e.node_id)
            .is_ok_and(|config| config.id == target)
    }))
}

/// Follow the retry chain from `execution` to its newest attempt
pub(crate) fn latest_attempt(
    store: &dyn ExecutionStore,
    execution: NodeExecution,
) -> Result<NodeExecution, EngineError> {
    let mut current = execution;
    loop {
        let retries = store.find_node_executions(
            &NodeExecutionFilter::for_plan_execution(&current.plan_execution_id)
                .retry_of(&current.id)
                .with_old_retries(),
        )?;
        match retries.into_iter().next_back() {
            Some(next) => current = next,
            None => return Ok(current),
        }
    }
}

/// Node the execution's recorded successor instantiates, if it has one
fn successor_node(
    store: &dyn ExecutionStore,
    execution: &NodeExecution,
) -> Result<Option<String>, EngineError> {
    let Some(next_id) = execution.next_id.as_deref() else {
        return Ok(None);
    };
    match store.get_node_execution(next_id) {
        Ok(next) => Ok(Some(next.node_id)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
