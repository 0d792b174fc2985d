// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration lifecycle events published to external listeners
//!
//! Delivery is at-least-once from a listener's point of view; consumers
//! de-duplicate with [`OrchestrationEvent::dedup_key`].

use crate::execution::{Ambiance, NodeExecution, PlanExecution};
use crate::status::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestrationEventType {
    PlanStart,
    NodeStart,
    StatusUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationEvent {
    pub plan_execution_id: String,
    pub event_type: OrchestrationEventType,
    /// `None` for plan-level events
    pub node_execution_id: Option<String>,
    pub node_id: Option<String>,
    pub status: Status,
    pub ambiance: Ambiance,
    pub emitted_at: DateTime<Utc>,
}

impl OrchestrationEvent {
    pub fn plan_start(execution: &PlanExecution, at: DateTime<Utc>) -> Self {
        Self::for_plan(execution, OrchestrationEventType::PlanStart, at)
    }

    pub fn plan_status(execution: &PlanExecution, at: DateTime<Utc>) -> Self {
        Self::for_plan(execution, OrchestrationEventType::StatusUpdate, at)
    }

    pub fn node_start(execution: &NodeExecution, at: DateTime<Utc>) -> Self {
        Self::for_node(execution, OrchestrationEventType::NodeStart, at)
    }

    pub fn node_status(execution: &NodeExecution, at: DateTime<Utc>) -> Self {
        Self::for_node(execution, OrchestrationEventType::StatusUpdate, at)
    }

    fn for_plan(execution: &PlanExecution, event_type: OrchestrationEventType, at: DateTime<Utc>) -> Self {
        Self {
            plan_execution_id: execution.id.clone(),
            event_type,
            node_execution_id: None,
            node_id: None,
            status: execution.status,
            ambiance: execution.ambiance(),
            emitted_at: at,
        }
    }

    fn for_node(execution: &NodeExecution, event_type: OrchestrationEventType, at: DateTime<Utc>) -> Self {
        Self {
            plan_execution_id: execution.plan_execution_id.clone(),
            event_type,
            node_execution_id: Some(execution.id.clone()),
            node_id: Some(execution.node_id.clone()),
            status: execution.status,
            ambiance: execution.ambiance.clone(),
            emitted_at: at,
        }
    }

    /// Event name used for subscription matching
    pub fn name(&self) -> &'static str {
        match (self.node_execution_id.is_some(), self.event_type) {
            (false, OrchestrationEventType::PlanStart) => "plan:start",
            (false, _) => "plan:status",
            (true, OrchestrationEventType::StatusUpdate) => "node:status",
            (true, _) => "node:start",
        }
    }

    pub fn is_status_update(&self) -> bool {
        self.event_type == OrchestrationEventType::StatusUpdate
    }

    /// Identity of the change this event reports
    pub fn dedup_key(&self) -> (String, Option<String>, Status, DateTime<Utc>) {
        (
            self.plan_execution_id.clone(),
            self.node_execution_id.clone(),
            self.status,
            self.emitted_at,
        )
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
