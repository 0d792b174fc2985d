// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisers: post-execution decisions attached to plan nodes
//!
//! [`advise`] evaluates a node's advisers in declared order against the
//! finished execution and returns the first matching decision. It is pure so
//! that a decision can be recomputed after a crash and come out the same.

use crate::execution::NodeExecution;
use crate::plan::PlanNode;
use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Adviser configured on a plan node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviserConfig {
    /// Statuses that trigger this adviser; empty means the kind's default
    #[serde(default)]
    pub on: Vec<Status>,
    #[serde(flatten)]
    pub spec: AdviserSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdviserSpec {
    NextStep {
        #[serde(default)]
        next_node_id: Option<String>,
    },
    Retry {
        max_attempts: u32,
        #[serde(default, with = "wait_list")]
        waits: Vec<Duration>,
    },
    MarkAsFailure {
        #[serde(default)]
        next_node_id: Option<String>,
    },
    ProceedWithDefault,
    EndPlan,
}

impl AdviserConfig {
    pub fn new(spec: AdviserSpec) -> Self {
        Self {
            on: Vec::new(),
            spec,
        }
    }

    pub fn on(mut self, statuses: &[Status]) -> Self {
        self.on = statuses.to_vec();
        self
    }

    pub fn retry(max_attempts: u32, waits: Vec<Duration>) -> Self {
        Self::new(AdviserSpec::Retry {
            max_attempts,
            waits,
        })
    }

    pub fn next_step(next_node_id: Option<&str>) -> Self {
        Self::new(AdviserSpec::NextStep {
            next_node_id: next_node_id.map(str::to_string),
        })
    }

    pub fn mark_as_failure(next_node_id: Option<&str>) -> Self {
        Self::new(AdviserSpec::MarkAsFailure {
            next_node_id: next_node_id.map(str::to_string),
        })
    }

    /// Node this adviser routes to, when it names one
    pub fn target(&self) -> Option<&str> {
        match &self.spec {
            AdviserSpec::NextStep { next_node_id } | AdviserSpec::MarkAsFailure { next_node_id } => {
                next_node_id.as_deref()
            }
            AdviserSpec::Retry { .. } | AdviserSpec::ProceedWithDefault | AdviserSpec::EndPlan => {
                None
            }
        }
    }

    fn triggers_on(&self, status: Status) -> bool {
        if self.on.is_empty() {
            match self.spec {
                AdviserSpec::NextStep { .. } => status.is_positive(),
                AdviserSpec::Retry { .. }
                | AdviserSpec::MarkAsFailure { .. }
                | AdviserSpec::ProceedWithDefault => status.is_broke(),
                AdviserSpec::EndPlan => status.is_terminal(),
            }
        } else {
            self.on.contains(&status)
        }
    }
}

/// Decision produced for a finished node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdviserResponse {
    NextStep { next_node_id: Option<String> },
    Retry {
        #[serde(with = "humantime_serde")]
        wait: Duration,
    },
    MarkAsFailure { next_node_id: Option<String> },
    ProceedWithDefault,
    EndPlan,
}

/// Tag of an [`AdviserResponse`], used to look up its handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviserKind {
    NextStep,
    Retry,
    MarkAsFailure,
    ProceedWithDefault,
    EndPlan,
}

impl AdviserKind {
    pub const ALL: [AdviserKind; 5] = [
        AdviserKind::NextStep,
        AdviserKind::Retry,
        AdviserKind::MarkAsFailure,
        AdviserKind::ProceedWithDefault,
        AdviserKind::EndPlan,
    ];
}

impl fmt::Display for AdviserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdviserKind::NextStep => "NEXT_STEP",
            AdviserKind::Retry => "RETRY",
            AdviserKind::MarkAsFailure => "MARK_AS_FAILURE",
            AdviserKind::ProceedWithDefault => "PROCEED_WITH_DEFAULT",
            AdviserKind::EndPlan => "END_PLAN",
        })
    }
}

impl AdviserResponse {
    pub fn kind(&self) -> AdviserKind {
        match self {
            AdviserResponse::NextStep { .. } => AdviserKind::NextStep,
            AdviserResponse::Retry { .. } => AdviserKind::Retry,
            AdviserResponse::MarkAsFailure { .. } => AdviserKind::MarkAsFailure,
            AdviserResponse::ProceedWithDefault => AdviserKind::ProceedWithDefault,
            AdviserResponse::EndPlan => AdviserKind::EndPlan,
        }
    }
}

/// Decide what follows a finished execution
///
/// `static_next` is the node's own successor (identity nodes pass their
/// override). After the declared advisers, a positive status falls through
/// to the static successor. `None` means no adviser matched and the branch
/// ends with the node's status. Aborted executions are never advised.
pub fn advise(
    node: &PlanNode,
    static_next: Option<&str>,
    execution: &NodeExecution,
    default_wait: Duration,
) -> Option<AdviserResponse> {
    let status = execution.status;
    if !status.is_terminal() || status == Status::Aborted {
        return None;
    }

    for adviser in node.advisers.iter().filter(|a| a.triggers_on(status)) {
        let response = match &adviser.spec {
            AdviserSpec::NextStep { next_node_id } => AdviserResponse::NextStep {
                next_node_id: next_node_id.clone().or_else(|| static_next.map(str::to_string)),
            },
            AdviserSpec::Retry {
                max_attempts,
                waits,
            } => {
                let attempts = execution.retry_count();
                if attempts >= *max_attempts as usize {
                    continue;
                }
                let wait = waits
                    .get(attempts.min(waits.len().saturating_sub(1)))
                    .copied()
                    .unwrap_or(default_wait);
                AdviserResponse::Retry { wait }
            }
            AdviserSpec::MarkAsFailure { next_node_id } => AdviserResponse::MarkAsFailure {
                next_node_id: next_node_id.clone().or_else(|| static_next.map(str::to_string)),
            },
            AdviserSpec::ProceedWithDefault => AdviserResponse::ProceedWithDefault,
            AdviserSpec::EndPlan => AdviserResponse::EndPlan,
        };
        return Some(response);
    }

    if status.is_positive() {
        return Some(AdviserResponse::NextStep {
            next_node_id: static_next.map(str::to_string),
        });
    }
    None
}

/// Serde helper for a list of human-readable durations ("10s", "1m")
mod wait_list {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(waits: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(
            waits
                .iter()
                .map(|w| humantime::format_duration(*w).to_string()),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Duration>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| humantime::parse_duration(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
#[path = "adviser_tests.rs"]
mod tests;
