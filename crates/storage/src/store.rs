// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence contract
//!
//! Stores hand out value snapshots, never live references. Mutations of
//! execution records go through `update_*`, which applies a partial update
//! only if the record's current status is in `expected`. `Ok(None)` means the
//! predicate failed or the update was refused: another writer got there first
//! and the caller must not repeat the transition's side effects.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use weft_core::{
    IdentityPlanNode, Interrupt, InterruptOutcome, NodeExecution, NodeExecutionUpdate, Plan,
    PlanExecution, PlanExecutionUpdate, Status,
};

/// Which parent a node execution must have
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParentFilter {
    #[default]
    Any,
    /// Executions without a parent
    TopLevel,
    Is(String),
}

/// Filter for node execution scans
///
/// Old retries are excluded unless asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeExecutionFilter {
    pub plan_execution_id: Option<String>,
    pub parent: ParentFilter,
    /// Empty matches every status
    pub statuses: Vec<Status>,
    pub node_id: Option<String>,
    /// Executions whose most recent prior attempt is this id
    pub retry_of: Option<String>,
    pub include_old_retries: bool,
}

impl NodeExecutionFilter {
    pub fn for_plan_execution(plan_execution_id: &str) -> Self {
        Self {
            plan_execution_id: Some(plan_execution_id.to_string()),
            ..Self::default()
        }
    }

    pub fn children_of(mut self, parent_id: Option<&str>) -> Self {
        self.parent = match parent_id {
            Some(id) => ParentFilter::Is(id.to_string()),
            None => ParentFilter::TopLevel,
        };
        self
    }

    pub fn with_statuses(mut self, statuses: &[Status]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn for_node(mut self, node_id: &str) -> Self {
        self.node_id = Some(node_id.to_string());
        self
    }

    pub fn retry_of(mut self, node_execution_id: &str) -> Self {
        self.retry_of = Some(node_execution_id.to_string());
        self
    }

    pub fn with_old_retries(mut self) -> Self {
        self.include_old_retries = true;
        self
    }

    pub fn matches(&self, execution: &NodeExecution) -> bool {
        if execution.old_retry && !self.include_old_retries {
            return false;
        }
        if let Some(id) = &self.plan_execution_id {
            if &execution.plan_execution_id != id {
                return false;
            }
        }
        let parent_ok = match &self.parent {
            ParentFilter::Any => true,
            ParentFilter::TopLevel => execution.parent_id.is_none(),
            ParentFilter::Is(id) => execution.parent_id.as_ref() == Some(id),
        };
        if !parent_ok {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&execution.status) {
            return false;
        }
        if let Some(node_id) = &self.node_id {
            if &execution.node_id != node_id {
                return false;
            }
        }
        if let Some(prior) = &self.retry_of {
            if execution.retry_ids.last() != Some(prior) {
                return false;
            }
        }
        true
    }
}

/// Filter for plan execution scans, used by reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanExecutionFilter {
    pub statuses: Vec<Status>,
    pub tag: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl PlanExecutionFilter {
    pub fn matches(&self, execution: &PlanExecution) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&execution.status) {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !execution.metadata.tags.contains(tag) {
                return false;
            }
        }
        if self.created_after.is_some_and(|t| execution.created_at < t) {
            return false;
        }
        if self.created_before.is_some_and(|t| execution.created_at >= t) {
            return false;
        }
        true
    }
}

pub trait PlanStore: Send + Sync {
    fn get_plan(&self, id: &str) -> Result<Plan, StoreError>;

    /// Store a validated plan; ids must be fresh
    fn save_plan(&self, plan: Plan) -> Result<Plan, StoreError>;

    /// Append an identity alias; the only change a stored plan accepts
    fn append_identity_node(&self, plan_id: &str, node: IdentityPlanNode) -> Result<Plan, StoreError>;
}

pub trait PlanExecutionStore: Send + Sync {
    fn get_plan_execution(&self, id: &str) -> Result<PlanExecution, StoreError>;

    fn save_plan_execution(&self, execution: PlanExecution) -> Result<PlanExecution, StoreError>;

    fn update_plan_execution(
        &self,
        id: &str,
        expected: &[Status],
        update: PlanExecutionUpdate,
    ) -> Result<Option<PlanExecution>, StoreError>;

    fn find_plan_executions(&self, filter: &PlanExecutionFilter) -> Result<Vec<PlanExecution>, StoreError>;
}

pub trait NodeExecutionStore: Send + Sync {
    fn get_node_execution(&self, id: &str) -> Result<NodeExecution, StoreError>;

    fn save_node_execution(&self, execution: NodeExecution) -> Result<NodeExecution, StoreError>;

    fn update_node_execution(
        &self,
        id: &str,
        expected: &[Status],
        update: NodeExecutionUpdate,
    ) -> Result<Option<NodeExecution>, StoreError>;

    /// Matching executions in creation order
    fn find_node_executions(&self, filter: &NodeExecutionFilter) -> Result<Vec<NodeExecution>, StoreError>;

    /// Children of `parent_id` (or top-level executions), optionally all descendants
    fn find_children(
        &self,
        plan_execution_id: &str,
        parent_id: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<NodeExecution>, StoreError> {
        let direct = self.find_node_executions(
            &NodeExecutionFilter::for_plan_execution(plan_execution_id).children_of(parent_id),
        )?;
        if !recursive {
            return Ok(direct);
        }

        let mut found = Vec::new();
        let mut queue: VecDeque<NodeExecution> = direct.into();
        while let Some(execution) = queue.pop_front() {
            let children = self.find_node_executions(
                &NodeExecutionFilter::for_plan_execution(plan_execution_id)
                    .children_of(Some(&execution.id)),
            )?;
            queue.extend(children);
            found.push(execution);
        }
        Ok(found)
    }

    /// Active executions with no active children
    fn find_leaves(&self, plan_execution_id: &str) -> Result<Vec<NodeExecution>, StoreError> {
        let active: Vec<NodeExecution> = self
            .find_node_executions(&NodeExecutionFilter::for_plan_execution(plan_execution_id))?
            .into_iter()
            .filter(|e| !e.status.is_terminal())
            .collect();
        Ok(active
            .iter()
            .filter(|e| {
                !active
                    .iter()
                    .any(|other| other.parent_id.as_deref() == Some(e.id.as_str()))
            })
            .cloned()
            .collect())
    }

    fn count_by_parent_and_status(
        &self,
        plan_execution_id: &str,
        parent_id: Option<&str>,
        statuses: &[Status],
    ) -> Result<usize, StoreError> {
        Ok(self
            .find_node_executions(
                &NodeExecutionFilter::for_plan_execution(plan_execution_id)
                    .children_of(parent_id)
                    .with_statuses(statuses),
            )?
            .len())
    }
}

pub trait InterruptStore: Send + Sync {
    /// Append an interrupt, assigning the next sequence number
    fn register_interrupt(&self, interrupt: Interrupt) -> Result<Interrupt, StoreError>;

    /// Unprocessed interrupts for a target, oldest first
    fn pending_interrupts(&self, target_id: &str) -> Result<Vec<Interrupt>, StoreError>;

    /// Record an outcome; `false` if one was already recorded
    fn record_outcome(&self, outcome: InterruptOutcome) -> Result<bool, StoreError>;

    /// Outcomes for a target in registration order
    fn interrupt_outcomes(&self, target_id: &str) -> Result<Vec<InterruptOutcome>, StoreError>;

    /// Every interrupt registered for a plan execution, oldest first
    fn find_interrupts(&self, plan_execution_id: &str) -> Result<Vec<Interrupt>, StoreError>;
}

/// Everything the engine needs from persistence
pub trait ExecutionStore: PlanStore + PlanExecutionStore + NodeExecutionStore + InterruptStore {}

impl<T> ExecutionStore for T where T: PlanStore + PlanExecutionStore + NodeExecutionStore + InterruptStore {}
