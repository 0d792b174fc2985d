// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution statuses and the allowed-predecessor transition table
//!
//! Every status change on a plan or node execution is a conditional update:
//! it is only applied when the record's current status is one of
//! [`allowed_predecessors`] for the requested status. Two writers racing to
//! move the same record therefore cannot both win.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status shared by plan executions and node executions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Queued,
    Running,
    Paused,
    /// An abort is being applied; only ABORTED may follow
    Discontinuing,
    Succeeded,
    Skipped,
    /// A broke node that was told to proceed with default output
    IgnoreFailed,
    Failed,
    Errored,
    Aborted,
    Expired,
}

const NONE: &[Status] = &[];
const FROM_ACTIVE: &[Status] = &[Status::Queued, Status::Running, Status::Paused];
const FROM_QUEUED_OR_PAUSED: &[Status] = &[Status::Queued, Status::Paused];
const FROM_QUEUED_OR_RUNNING: &[Status] = &[Status::Queued, Status::Running];
const FROM_QUEUED: &[Status] = &[Status::Queued];
const FROM_ACTIVE_OR_DISCONTINUING: &[Status] = &[
    Status::Queued,
    Status::Running,
    Status::Paused,
    Status::Discontinuing,
];
const FROM_BROKE: &[Status] = &[Status::Failed, Status::Errored, Status::Expired];
/// A finished node whose successor cannot be resolved is errored before it closes
const FROM_ACTIVE_OR_ADVISING: &[Status] = &[
    Status::Queued,
    Status::Running,
    Status::Paused,
    Status::Succeeded,
    Status::Skipped,
    Status::IgnoreFailed,
    Status::Failed,
    Status::Expired,
];

/// Statuses a record must currently hold for a move to `target` to be accepted
///
/// `Queued` has no predecessors: records are only ever created queued.
pub fn allowed_predecessors(target: Status) -> &'static [Status] {
    match target {
        Status::Queued => NONE,
        Status::Running => FROM_QUEUED_OR_PAUSED,
        Status::Paused => FROM_QUEUED_OR_RUNNING,
        Status::Discontinuing => FROM_ACTIVE,
        Status::Succeeded | Status::Failed => FROM_ACTIVE,
        Status::Errored => FROM_ACTIVE_OR_ADVISING,
        Status::Skipped => FROM_QUEUED,
        Status::Aborted | Status::Expired => FROM_ACTIVE_OR_DISCONTINUING,
        Status::IgnoreFailed => FROM_BROKE,
    }
}

impl Status {
    pub const ALL: [Status; 11] = [
        Status::Queued,
        Status::Running,
        Status::Paused,
        Status::Discontinuing,
        Status::Succeeded,
        Status::Skipped,
        Status::IgnoreFailed,
        Status::Failed,
        Status::Errored,
        Status::Aborted,
        Status::Expired,
    ];

    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            Status::Queued | Status::Running | Status::Paused | Status::Discontinuing
        )
    }

    /// Terminal statuses that count as success when aggregating
    pub fn is_positive(self) -> bool {
        matches!(
            self,
            Status::Succeeded | Status::Skipped | Status::IgnoreFailed
        )
    }

    /// Terminal failure statuses that a retry or proceed-with-default may act on
    pub fn is_broke(self) -> bool {
        matches!(self, Status::Failed | Status::Errored | Status::Expired)
    }

    /// Failure statuses as reported to users (includes user aborts)
    pub fn is_failure(self) -> bool {
        self.is_broke() || self == Status::Aborted
    }

    /// Whether a record in this status may be moved to `target`
    pub fn can_transition_to(self, target: Status) -> bool {
        allowed_predecessors(target).contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Queued => "QUEUED",
            Status::Running => "RUNNING",
            Status::Paused => "PAUSED",
            Status::Discontinuing => "DISCONTINUING",
            Status::Succeeded => "SUCCEEDED",
            Status::Skipped => "SKIPPED",
            Status::IgnoreFailed => "IGNORE_FAILED",
            Status::Failed => "FAILED",
            Status::Errored => "ERRORED",
            Status::Aborted => "ABORTED",
            Status::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
