// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interrupts: out-of-band control signals for running executions
//!
//! Interrupts are appended with a per-store sequence number and never
//! mutated. Processing one records an [`InterruptOutcome`] alongside it, so
//! the pair forms the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptKind {
    Abort,
    Retry,
    Pause,
    Resume,
    ProceedWithDefault,
    MarkExpired,
}

impl fmt::Display for InterruptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InterruptKind::Abort => "ABORT",
            InterruptKind::Retry => "RETRY",
            InterruptKind::Pause => "PAUSE",
            InterruptKind::Resume => "RESUME",
            InterruptKind::ProceedWithDefault => "PROCEED_WITH_DEFAULT",
            InterruptKind::MarkExpired => "MARK_EXPIRED",
        })
    }
}

/// Who raised an interrupt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Issuer {
    User { id: String },
    Adviser { node_execution_id: String },
    Timeout,
    System,
}

/// Request to register an interrupt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptPackage {
    pub plan_execution_id: String,
    /// Target node execution; `None` targets the whole plan execution
    pub node_execution_id: Option<String>,
    pub kind: InterruptKind,
    pub issuer: Issuer,
    /// Earliest time the interrupt may be processed
    pub not_before: Option<DateTime<Utc>>,
}

impl InterruptPackage {
    pub fn for_node(
        plan_execution_id: impl Into<String>,
        node_execution_id: impl Into<String>,
        kind: InterruptKind,
        issuer: Issuer,
    ) -> Self {
        Self {
            plan_execution_id: plan_execution_id.into(),
            node_execution_id: Some(node_execution_id.into()),
            kind,
            issuer,
            not_before: None,
        }
    }

    pub fn for_plan(plan_execution_id: impl Into<String>, kind: InterruptKind, issuer: Issuer) -> Self {
        Self {
            plan_execution_id: plan_execution_id.into(),
            node_execution_id: None,
            kind,
            issuer,
            not_before: None,
        }
    }

    pub fn not_before(mut self, at: DateTime<Utc>) -> Self {
        self.not_before = Some(at);
        self
    }
}

/// A registered interrupt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interrupt {
    pub id: String,
    /// Registration order; assigned by the store
    pub sequence: u64,
    pub plan_execution_id: String,
    pub node_execution_id: Option<String>,
    pub kind: InterruptKind,
    pub issuer: Issuer,
    pub issued_at: DateTime<Utc>,
    pub not_before: Option<DateTime<Utc>>,
}

impl Interrupt {
    pub fn from_package(id: impl Into<String>, package: InterruptPackage, issued_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            sequence: 0,
            plan_execution_id: package.plan_execution_id,
            node_execution_id: package.node_execution_id,
            kind: package.kind,
            issuer: package.issuer,
            issued_at,
            not_before: package.not_before,
        }
    }

    /// Id interrupts are queued under: the node execution, else the plan execution
    pub fn target_id(&self) -> &str {
        self.node_execution_id
            .as_deref()
            .unwrap_or(self.plan_execution_id.as_str())
    }

    pub fn targets_plan(&self) -> bool {
        self.node_execution_id.is_none()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.not_before.map_or(true, |at| at <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OutcomeState {
    Processed,
    Dropped { reason: String },
}

/// Result of processing one interrupt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptOutcome {
    pub interrupt_id: String,
    pub target_id: String,
    pub kind: InterruptKind,
    pub state: OutcomeState,
    pub processed_at: DateTime<Utc>,
}

impl InterruptOutcome {
    pub fn processed(interrupt: &Interrupt, at: DateTime<Utc>) -> Self {
        Self::new(interrupt, OutcomeState::Processed, at)
    }

    pub fn dropped(interrupt: &Interrupt, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(
            interrupt,
            OutcomeState::Dropped {
                reason: reason.into(),
            },
            at,
        )
    }

    fn new(interrupt: &Interrupt, state: OutcomeState, at: DateTime<Utc>) -> Self {
        Self {
            interrupt_id: interrupt.id.clone(),
            target_id: interrupt.target_id().to_string(),
            kind: interrupt.kind,
            state,
            processed_at: at,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.state == OutcomeState::Processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, secs).unwrap()
    }

    #[test]
    fn node_interrupt_targets_node_execution() {
        let pkg = InterruptPackage::for_node("pe-1", "exec-3", InterruptKind::Abort, Issuer::System);
        let interrupt = Interrupt::from_package("int-1", pkg, t(0));
        assert_eq!(interrupt.target_id(), "exec-3");
        assert!(!interrupt.targets_plan());
    }

    #[test]
    fn plan_interrupt_targets_plan_execution() {
        let pkg = InterruptPackage::for_plan(
            "pe-1",
            InterruptKind::Pause,
            Issuer::User { id: "alice".to_string() },
        );
        let interrupt = Interrupt::from_package("int-1", pkg, t(0));
        assert_eq!(interrupt.target_id(), "pe-1");
        assert!(interrupt.targets_plan());
    }

    #[test]
    fn delayed_interrupt_is_due_at_not_before() {
        let pkg = InterruptPackage::for_node("pe-1", "exec-3", InterruptKind::Retry, Issuer::Timeout)
            .not_before(t(10));
        let interrupt = Interrupt::from_package("int-1", pkg, t(0));
        assert!(!interrupt.is_due(t(9)));
        assert!(interrupt.is_due(t(10)));
    }

    #[test]
    fn outcome_records_reason() {
        let pkg = InterruptPackage::for_node("pe-1", "exec-3", InterruptKind::Retry, Issuer::System);
        let interrupt = Interrupt::from_package("int-1", pkg, t(0));
        let outcome = InterruptOutcome::dropped(&interrupt, "node is ABORTED", t(1));
        assert!(!outcome.is_processed());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["state"]["state"], "dropped");
        assert_eq!(json["state"]["reason"], "node is ABORTED");
    }
}
