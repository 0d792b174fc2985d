// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregate status calculation
//!
//! Pure functions over a set of node executions. Superseded retry attempts are
//! ignored, active work keeps the aggregate active, and once everything is
//! terminal the most severe outcome wins.

use crate::execution::NodeExecution;
use crate::status::Status;

/// Terminal precedence, most severe first
///
/// `Skipped` and `IgnoreFailed` rank as `Succeeded`.
pub const SEVERITY: [Status; 5] = [
    Status::Aborted,
    Status::Errored,
    Status::Failed,
    Status::Expired,
    Status::Succeeded,
];

/// Precedence among non-running active statuses, most advanced first
pub const ACTIVE_PRECEDENCE: [Status; 3] = [Status::Discontinuing, Status::Paused, Status::Queued];

/// Aggregate status of a set of node executions, ignoring old retries
pub fn calculate(executions: &[NodeExecution]) -> Status {
    calculate_statuses(
        executions
            .iter()
            .filter(|e| !e.old_retry)
            .map(|e| e.status),
    )
}

/// Like [`calculate`], but leaves out the execution with `excluded_id`
///
/// Used while a node is about to be superseded and must not drag the
/// aggregate with it.
pub fn calculate_excluding(executions: &[NodeExecution], excluded_id: &str) -> Status {
    calculate_statuses(
        executions
            .iter()
            .filter(|e| !e.old_retry && e.id != excluded_id)
            .map(|e| e.status),
    )
}

/// Aggregate a list of statuses
pub fn calculate_statuses(statuses: impl IntoIterator<Item = Status>) -> Status {
    let statuses: Vec<Status> = statuses.into_iter().collect();
    if statuses.is_empty() {
        return Status::Queued;
    }

    if statuses.iter().any(|s| !s.is_terminal()) {
        if statuses.contains(&Status::Running) {
            return Status::Running;
        }
        return ACTIVE_PRECEDENCE
            .into_iter()
            .find(|s| statuses.contains(s))
            .unwrap_or(Status::Running);
    }

    if statuses.iter().all(|s| *s == Status::Skipped) {
        return Status::Skipped;
    }

    statuses
        .iter()
        .map(|s| severity_rank(*s))
        .min()
        .and_then(|rank| SEVERITY.get(rank).copied())
        .unwrap_or(Status::Succeeded)
}

/// Status a plan execution records for an aggregate child status
pub fn plan_status(aggregate: Status) -> Status {
    if aggregate.is_positive() {
        Status::Succeeded
    } else {
        aggregate
    }
}

fn severity_rank(status: Status) -> usize {
    let normalized = if status.is_positive() {
        Status::Succeeded
    } else {
        status
    };
    SEVERITY
        .iter()
        .position(|s| *s == normalized)
        .unwrap_or(SEVERITY.len() - 1)
}

#[cfg(test)]
#[path = "calculator_tests.rs"]
mod tests;
