// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan and node execution records
//!
//! Records are plain value snapshots. They change only through partial
//! updates ([`NodeExecutionUpdate`], [`PlanExecutionUpdate`]) applied by the
//! store under a status predicate. `apply` is pure and enforces the set-once
//! rules; the store enforces the status predicate.

use crate::status::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a partial update was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UpdateRejected {
    #[error("record is closed")]
    Closed,
    #[error("transition {from} -> {to} is not allowed")]
    InvalidTransition { from: Status, to: Status },
    #[error("next id is already set")]
    NextIdAlreadySet,
    #[error("next id requires a terminal status")]
    NextIdBeforeTerminal,
    #[error("end timestamp requires a terminal status")]
    EndBeforeTerminal,
    #[error("already marked as old retry")]
    AlreadyOldRetry,
}

/// One nesting level of the ambiance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub node_id: String,
    pub node_execution_id: String,
    pub identifier: String,
}

/// Context a node runs in: the run it belongs to and its nesting path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ambiance {
    pub plan_id: String,
    pub plan_execution_id: String,
    #[serde(default)]
    pub setup_context: BTreeMap<String, String>,
    #[serde(default)]
    pub levels: Vec<Level>,
}

impl Ambiance {
    pub fn for_plan(
        plan_id: impl Into<String>,
        plan_execution_id: impl Into<String>,
        setup_context: BTreeMap<String, String>,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            plan_execution_id: plan_execution_id.into(),
            setup_context,
            levels: Vec::new(),
        }
    }

    /// Ambiance one level deeper
    pub fn child(&self, level: Level) -> Self {
        let mut ambiance = self.clone();
        ambiance.levels.push(level);
        ambiance
    }

    /// Ambiance for a node at the same depth as the current one
    pub fn sibling(&self, level: Level) -> Self {
        let mut ambiance = self.clone();
        ambiance.levels.pop();
        ambiance.levels.push(level);
        ambiance
    }

    pub fn current_node_execution_id(&self) -> Option<&str> {
        self.levels.last().map(|l| l.node_execution_id.as_str())
    }

    pub fn parent_node_execution_id(&self) -> Option<&str> {
        let depth = self.levels.len();
        if depth < 2 {
            return None;
        }
        self.levels
            .get(depth - 2)
            .map(|l| l.node_execution_id.as_str())
    }
}

/// Whether an execution instantiates a plan node or an identity alias
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Plan,
    Identity,
}

/// Failure metadata reported with a broke status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl FailureInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}

/// Completion reported by a worker for a dispatched node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub status: Status,
    #[serde(default)]
    pub failure: Option<FailureInfo>,
}

impl StepResult {
    pub fn succeeded() -> Self {
        Self {
            status: Status::Succeeded,
            failure: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: Status::Skipped,
            failure: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            failure: Some(FailureInfo::new(message)),
        }
    }

    pub fn errored(message: impl Into<String>) -> Self {
        Self {
            status: Status::Errored,
            failure: Some(FailureInfo::new(message)),
        }
    }
}

/// One instance of a plan node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecution {
    pub id: String,
    pub plan_execution_id: String,
    pub node_id: String,
    pub node_type: NodeType,
    pub parent_id: Option<String>,
    pub previous_id: Option<String>,
    /// Successor instance, written together with `end_ts`
    pub next_id: Option<String>,
    /// Aliased instance (identity) or prior attempt (retry)
    pub original_node_execution_id: Option<String>,
    /// Prior attempts of this node, oldest first
    #[serde(default)]
    pub retry_ids: Vec<String>,
    #[serde(default)]
    pub old_retry: bool,
    /// Closed by an end-plan decision; its parent must not advance either
    #[serde(default)]
    pub ended_plan: bool,
    pub status: Status,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure: Option<FailureInfo>,
    pub ambiance: Ambiance,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl NodeExecution {
    /// A queued execution; `ambiance` must already include this execution's level
    pub fn new(
        id: impl Into<String>,
        plan_execution_id: impl Into<String>,
        node_id: impl Into<String>,
        node_type: NodeType,
        ambiance: Ambiance,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            plan_execution_id: plan_execution_id.into(),
            node_id: node_id.into(),
            node_type,
            parent_id: None,
            previous_id: None,
            next_id: None,
            original_node_execution_id: None,
            retry_ids: Vec::new(),
            old_retry: false,
            ended_plan: false,
            status: Status::Queued,
            start_ts: None,
            end_ts: None,
            failure: None,
            ambiance,
            created_at,
            version: 0,
        }
    }

    /// Closed executions have an end timestamp and accept no further updates
    pub fn is_closed(&self) -> bool {
        self.end_ts.is_some()
    }

    /// Number of attempts before this one
    pub fn retry_count(&self) -> usize {
        self.retry_ids.len()
    }

    /// Apply a partial update, returning the new snapshot
    pub fn apply(&self, update: &NodeExecutionUpdate) -> Result<Self, UpdateRejected> {
        if self.is_closed() {
            return Err(UpdateRejected::Closed);
        }

        let status = match update.status {
            Some(to) if to != self.status => {
                if !self.status.can_transition_to(to) {
                    return Err(UpdateRejected::InvalidTransition {
                        from: self.status,
                        to,
                    });
                }
                to
            }
            _ => self.status,
        };

        if update.next_id.is_some() {
            if self.next_id.is_some() {
                return Err(UpdateRejected::NextIdAlreadySet);
            }
            if !status.is_terminal() {
                return Err(UpdateRejected::NextIdBeforeTerminal);
            }
        }
        if update.end_ts.is_some() && !status.is_terminal() {
            return Err(UpdateRejected::EndBeforeTerminal);
        }
        if update.old_retry && self.old_retry {
            return Err(UpdateRejected::AlreadyOldRetry);
        }

        let mut next = self.clone();
        next.status = status;
        if let Some(ts) = update.start_ts {
            next.start_ts = Some(ts);
        }
        if let Some(ts) = update.end_ts {
            next.end_ts = Some(ts);
        }
        if let Some(id) = &update.next_id {
            next.next_id = Some(id.clone());
        }
        if let Some(failure) = &update.failure {
            next.failure = Some(failure.clone());
        }
        next.old_retry |= update.old_retry;
        next.ended_plan |= update.ended_plan;
        next.version += 1;
        Ok(next)
    }
}

/// Partial update of a node execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeExecutionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub old_retry: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ended_plan: bool,
}

impl NodeExecutionUpdate {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Close the record without changing its status
    pub fn close(at: DateTime<Utc>) -> Self {
        Self {
            end_ts: Some(at),
            ..Self::default()
        }
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.start_ts = Some(at);
        self
    }

    pub fn ended_at(mut self, at: DateTime<Utc>) -> Self {
        self.end_ts = Some(at);
        self
    }

    pub fn with_next(mut self, next_id: impl Into<String>) -> Self {
        self.next_id = Some(next_id.into());
        self
    }

    pub fn with_failure(mut self, failure: Option<FailureInfo>) -> Self {
        self.failure = failure;
        self
    }

    pub fn mark_old_retry(mut self) -> Self {
        self.old_retry = true;
        self
    }

    pub fn mark_ended_plan(mut self) -> Self {
        self.ended_plan = true;
        self
    }
}

/// Normal runs walk forward; rollback runs re-walk preserved nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Normal,
    Rollback,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Run-level record for one execution of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanExecution {
    pub id: String,
    pub plan_id: String,
    pub status: Status,
    #[serde(default)]
    pub setup_context: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: ExecutionMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl PlanExecution {
    pub fn new(
        id: impl Into<String>,
        plan_id: impl Into<String>,
        setup_context: BTreeMap<String, String>,
        metadata: ExecutionMetadata,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            plan_id: plan_id.into(),
            status: Status::Queued,
            setup_context,
            metadata,
            created_at,
            updated_at: created_at,
            start_ts: None,
            end_ts: None,
            version: 0,
        }
    }

    pub fn is_rollback(&self) -> bool {
        self.metadata.mode == ExecutionMode::Rollback
    }

    pub fn ambiance(&self) -> Ambiance {
        Ambiance::for_plan(&self.plan_id, &self.id, self.setup_context.clone())
    }

    pub fn apply(&self, update: &PlanExecutionUpdate) -> Result<Self, UpdateRejected> {
        if self.end_ts.is_some() {
            return Err(UpdateRejected::Closed);
        }
        let status = match update.status {
            Some(to) if to != self.status => {
                if !self.status.can_transition_to(to) {
                    return Err(UpdateRejected::InvalidTransition {
                        from: self.status,
                        to,
                    });
                }
                to
            }
            _ => self.status,
        };
        if update.end_ts.is_some() && !status.is_terminal() {
            return Err(UpdateRejected::EndBeforeTerminal);
        }

        let mut next = self.clone();
        next.status = status;
        if let Some(ts) = update.start_ts {
            next.start_ts = Some(ts);
        }
        if let Some(ts) = update.end_ts {
            next.end_ts = Some(ts);
        }
        next.updated_at = update.updated_at;
        next.version += 1;
        Ok(next)
    }
}

/// Partial update of a plan execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanExecutionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ts: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PlanExecutionUpdate {
    pub fn status(status: Status, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(status),
            start_ts: None,
            end_ts: None,
            updated_at: at,
        }
    }

    /// Move to `status` and close the record
    pub fn conclude(status: Status, at: DateTime<Utc>) -> Self {
        Self {
            end_ts: Some(at),
            ..Self::status(status, at)
        }
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.start_ts = Some(at);
        self
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
