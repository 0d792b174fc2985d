// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Building node execution records
//!
//! A node execution's ambiance, parent and predecessor all follow from where
//! it is placed relative to existing executions.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use weft_core::{Ambiance, Level, Node, NodeExecution, NodeType, Plan};

/// Where a new node execution sits
pub(crate) enum Placement<'a> {
    /// First node inside `ambiance`, whose last level (if any) is the parent
    Within(&'a Ambiance),
    /// Successor of a finished sibling
    After(&'a NodeExecution),
    /// Fresh attempt replacing a prior one
    Retry(&'a NodeExecution),
}

/// A queued execution of `node_id` with the given id
pub(crate) fn instantiate(
    plan: &Plan,
    node_id: &str,
    id: String,
    placement: Placement<'_>,
    now: DateTime<Utc>,
) -> Result<NodeExecution, EngineError> {
    let config = plan.resolve(node_id)?;
    let node_type = match plan.node(node_id) {
        Some(Node::Identity(_)) => NodeType::Identity,
        _ => NodeType::Plan,
    };
    let level = Level {
        node_id: node_id.to_string(),
        node_execution_id: id.clone(),
        identifier: config.identifier.clone(),
    };

    let (ambiance, parent_id, previous_id) = match &placement {
        Placement::Within(ambiance) => (
            ambiance.child(level),
            ambiance.current_node_execution_id().map(str::to_string),
            None,
        ),
        Placement::After(previous) => (
            previous.ambiance.sibling(level),
            previous.parent_id.clone(),
            Some(previous.id.clone()),
        ),
        Placement::Retry(prior) => (
            prior.ambiance.sibling(level),
            prior.parent_id.clone(),
            prior.previous_id.clone(),
        ),
    };

    let plan_execution_id = ambiance.plan_execution_id.clone();
    let mut execution = NodeExecution::new(id, plan_execution_id, node_id, node_type, ambiance, now);
    execution.parent_id = parent_id;
    execution.previous_id = previous_id;

    match placement {
        Placement::Retry(prior) => {
            execution.original_node_execution_id = Some(prior.id.clone());
            execution.retry_ids = prior.retry_ids.clone();
            execution.retry_ids.push(prior.id.clone());
        }
        _ => {
            if let Some(Node::Identity(alias)) = plan.node(node_id) {
                execution.original_node_execution_id = alias.original_node_execution_id.clone();
            }
        }
    }
    Ok(execution)
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
