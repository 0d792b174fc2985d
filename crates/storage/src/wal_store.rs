// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store backed by materialized state and an optional write-ahead log
//!
//! A single mutex serializes writers inside one process. The status
//! predicate is checked and the operation logged and applied while the lock
//! is held, so exactly one of several racing conditional updates wins.

use crate::error::StoreError;
use crate::state::MaterializedState;
use crate::store::{
    InterruptStore, NodeExecutionFilter, NodeExecutionStore, PlanExecutionFilter,
    PlanExecutionStore, PlanStore,
};
use crate::wal::Wal;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use weft_core::{
    EngineConfig, IdentityPlanNode, Interrupt, InterruptOutcome, NodeExecution,
    NodeExecutionUpdate, Operation, Plan, PlanExecution, PlanExecutionUpdate, Status,
    TracedOperation,
};

/// WAL file name inside the state directory
pub const WAL_FILE: &str = "orchestration.wal";

struct Inner {
    state: MaterializedState,
    wal: Option<Wal>,
}

impl Inner {
    fn commit(&mut self, op: Operation) -> Result<(), StoreError> {
        if let Some(wal) = self.wal.as_mut() {
            let sequence = wal.append(&op)?;
            tracing::trace!(op = op.name(), sequence, fields = ?op.fields(), "logged");
        }
        self.state.apply(&op);
        Ok(())
    }
}

pub struct WalStore {
    inner: Mutex<Inner>,
}

impl WalStore {
    /// Volatile store for tests and single-process embedding
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: MaterializedState::default(),
                wal: None,
            }),
        }
    }

    /// Open the durable store in `dir`, replaying its log
    ///
    /// A corrupt tail left by a crashed writer is truncated first.
    pub fn open(dir: &Path, machine_id: &str) -> Result<Self, StoreError> {
        let path = dir.join(WAL_FILE);
        Wal::repair(&path)?;

        let mut state = MaterializedState::default();
        let entries = Wal::replay(&path)?;
        for entry in &entries {
            state.apply(&entry.operation);
        }
        tracing::info!(
            path = %path.display(),
            entries = entries.len(),
            plan_executions = state.plan_executions.len(),
            node_executions = state.node_executions.len(),
            "replayed state"
        );

        let wal = Wal::open(&path, machine_id)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                state,
                wal: Some(wal),
            }),
        })
    }

    /// Durable store under `config.state_dir`, or a volatile one when unset
    pub fn from_config(config: &EngineConfig) -> Result<Self, StoreError> {
        match &config.state_dir {
            Some(dir) => Self::open(dir, &config.machine_id),
            None => Ok(Self::in_memory()),
        }
    }

    /// Copy of the current materialized state
    pub fn snapshot(&self) -> MaterializedState {
        self.lock().state.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PlanStore for WalStore {
    fn get_plan(&self, id: &str) -> Result<Plan, StoreError> {
        self.lock()
            .state
            .plans
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("plan", id))
    }

    fn save_plan(&self, plan: Plan) -> Result<Plan, StoreError> {
        plan.validate()?;
        let mut inner = self.lock();
        if inner.state.plans.contains_key(&plan.id) {
            return Err(StoreError::duplicate("plan", &plan.id));
        }
        inner.commit(Operation::PlanSave { plan: plan.clone() })?;
        Ok(plan)
    }

    fn append_identity_node(&self, plan_id: &str, node: IdentityPlanNode) -> Result<Plan, StoreError> {
        let mut inner = self.lock();
        let mut plan = inner
            .state
            .plans
            .get(plan_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("plan", plan_id))?;
        plan.append_identity(node.clone())?;
        inner.commit(Operation::IdentityNodeAppend {
            plan_id: plan_id.to_string(),
            node,
        })?;
        Ok(plan)
    }
}

impl PlanExecutionStore for WalStore {
    fn get_plan_execution(&self, id: &str) -> Result<PlanExecution, StoreError> {
        self.lock()
            .state
            .plan_executions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("plan execution", id))
    }

    fn save_plan_execution(&self, execution: PlanExecution) -> Result<PlanExecution, StoreError> {
        let mut inner = self.lock();
        if inner.state.plan_executions.contains_key(&execution.id) {
            return Err(StoreError::duplicate("plan execution", &execution.id));
        }
        inner.commit(Operation::PlanExecutionSave {
            execution: execution.clone(),
        })?;
        Ok(execution)
    }

    fn update_plan_execution(
        &self,
        id: &str,
        expected: &[Status],
        update: PlanExecutionUpdate,
    ) -> Result<Option<PlanExecution>, StoreError> {
        let mut inner = self.lock();
        let current = inner
            .state
            .plan_executions
            .get(id)
            .ok_or_else(|| StoreError::not_found("plan execution", id))?;

        if !expected.contains(&current.status) {
            tracing::debug!(id, current = %current.status, "plan execution predicate failed");
            return Ok(None);
        }
        let next = match current.apply(&update) {
            Ok(next) => next,
            Err(reason) => {
                tracing::debug!(id, %reason, "plan execution update refused");
                return Ok(None);
            }
        };

        inner.commit(Operation::PlanExecutionUpdate {
            id: id.to_string(),
            update,
        })?;
        Ok(Some(next))
    }

    fn find_plan_executions(&self, filter: &PlanExecutionFilter) -> Result<Vec<PlanExecution>, StoreError> {
        let inner = self.lock();
        let mut found: Vec<PlanExecution> = inner
            .state
            .plan_executions
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }
}

impl NodeExecutionStore for WalStore {
    fn get_node_execution(&self, id: &str) -> Result<NodeExecution, StoreError> {
        self.lock()
            .state
            .node_executions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("node execution", id))
    }

    fn save_node_execution(&self, execution: NodeExecution) -> Result<NodeExecution, StoreError> {
        let mut inner = self.lock();
        if inner.state.node_executions.contains_key(&execution.id) {
            return Err(StoreError::duplicate("node execution", &execution.id));
        }
        inner.commit(Operation::NodeExecutionSave {
            execution: execution.clone(),
        })?;
        Ok(execution)
    }

    fn update_node_execution(
        &self,
        id: &str,
        expected: &[Status],
        update: NodeExecutionUpdate,
    ) -> Result<Option<NodeExecution>, StoreError> {
        let mut inner = self.lock();
        let current = inner
            .state
            .node_executions
            .get(id)
            .ok_or_else(|| StoreError::not_found("node execution", id))?;

        if !expected.contains(&current.status) {
            tracing::debug!(id, current = %current.status, "node execution predicate failed");
            return Ok(None);
        }
        let next = match current.apply(&update) {
            Ok(next) => next,
            Err(reason) => {
                tracing::debug!(id, %reason, "node execution update refused");
                return Ok(None);
            }
        };

        inner.commit(Operation::NodeExecutionUpdate {
            id: id.to_string(),
            update,
        })?;
        Ok(Some(next))
    }

    fn find_node_executions(&self, filter: &NodeExecutionFilter) -> Result<Vec<NodeExecution>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .state
            .node_executions_ordered()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }
}

impl InterruptStore for WalStore {
    fn register_interrupt(&self, mut interrupt: Interrupt) -> Result<Interrupt, StoreError> {
        let mut inner = self.lock();
        if inner.state.interrupts.values().any(|i| i.id == interrupt.id) {
            return Err(StoreError::duplicate("interrupt", &interrupt.id));
        }
        interrupt.sequence = inner.state.next_interrupt_sequence();
        inner.commit(Operation::InterruptRegister {
            interrupt: interrupt.clone(),
        })?;
        Ok(interrupt)
    }

    fn pending_interrupts(&self, target_id: &str) -> Result<Vec<Interrupt>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .state
            .interrupts
            .values()
            .filter(|i| i.target_id() == target_id && !inner.state.outcomes.contains_key(&i.id))
            .cloned()
            .collect())
    }

    fn record_outcome(&self, outcome: InterruptOutcome) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if inner.state.outcomes.contains_key(&outcome.interrupt_id) {
            return Ok(false);
        }
        inner.commit(Operation::InterruptOutcome { outcome })?;
        Ok(true)
    }

    fn interrupt_outcomes(&self, target_id: &str) -> Result<Vec<InterruptOutcome>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .state
            .interrupts
            .values()
            .filter(|i| i.target_id() == target_id)
            .filter_map(|i| inner.state.outcomes.get(&i.id).cloned())
            .collect())
    }

    fn find_interrupts(&self, plan_execution_id: &str) -> Result<Vec<Interrupt>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .state
            .interrupts
            .values()
            .filter(|i| i.plan_execution_id == plan_execution_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "wal_store_tests.rs"]
mod tests;
