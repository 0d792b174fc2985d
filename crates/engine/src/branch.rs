// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closing branches and concluding groups and plans
//!
//! A group (or the plan) concludes once every child is closed and no closed
//! child points at a successor that has not been saved yet. The aggregate
//! status comes from the calculator, folded so positive outcomes conclude as
//! SUCCEEDED.
//!
//! An end-plan decision is stored on the node it closes. A group whose
//! children include such a node is never advised; the end-plan walk carries
//! on from it instead, whichever branch happened to finish last.

use crate::engine::{Engine, Followup};
use crate::error::EngineError;
use weft_adapters::StepDispatcher;
use weft_core::{
    calculate, plan_status, Clock, IdGen, NodeExecution, NodeExecutionUpdate, PlanExecution,
    PlanExecutionUpdate, Status,
};
use weft_storage::ExecutionStore;

const ACTIVE: &[Status] = &[Status::Queued, Status::Running, Status::Paused];

impl<S, D, C, I> Engine<S, D, C, I>
where
    S: ExecutionStore + 'static,
    D: StepDispatcher,
    C: Clock,
    I: IdGen,
{
    pub(crate) fn end_branch(&self, id: &str) -> Result<Vec<Followup>, EngineError> {
        let execution = self.store.get_node_execution(id)?;
        if !execution.status.is_terminal() {
            tracing::debug!(node_execution_id = id, status = %execution.status, "branch still active");
            return Ok(Vec::new());
        }

        let closed = self.close(execution)?;
        if closed.old_retry {
            return Ok(Vec::new());
        }
        match closed.parent_id.as_deref() {
            Some(parent_id) => self.conclude_group(&closed.plan_execution_id, parent_id),
            None => {
                self.conclude_plan(&closed.plan_execution_id)?;
                Ok(Vec::new())
            }
        }
    }

    /// Set `end_ts` on a terminal node, returning the stored record
    pub(crate) fn close(&self, execution: NodeExecution) -> Result<NodeExecution, EngineError> {
        let update = NodeExecutionUpdate::close(self.clock.now());
        self.close_with(execution, update)
    }

    fn close_with(
        &self,
        execution: NodeExecution,
        update: NodeExecutionUpdate,
    ) -> Result<NodeExecution, EngineError> {
        if execution.is_closed() {
            return Ok(execution);
        }
        match self
            .store
            .update_node_execution(&execution.id, &[execution.status], update)?
        {
            Some(closed) => {
                tracing::debug!(node_execution_id = %closed.id, status = %closed.status, "node closed");
                Ok(closed)
            }
            None => Ok(self.store.get_node_execution(&execution.id)?),
        }
    }

    /// Closed, and not waiting on a successor that was never saved
    fn settled(&self, executions: &[NodeExecution]) -> Result<bool, EngineError> {
        for execution in executions {
            if !execution.is_closed() {
                return Ok(false);
            }
            if let Some(next_id) = &execution.next_id {
                match self.store.get_node_execution(next_id) {
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => return Ok(false),
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(true)
    }

    fn conclude_group(
        &self,
        plan_execution_id: &str,
        group_id: &str,
    ) -> Result<Vec<Followup>, EngineError> {
        let children = self
            .store
            .find_children(plan_execution_id, Some(group_id), false)?;
        if !self.settled(&children)? {
            return Ok(Vec::new());
        }

        let status = plan_status(calculate(&children));
        let Some(group) = self.store.update_node_execution(
            group_id,
            ACTIVE,
            NodeExecutionUpdate::status(status),
        )?
        else {
            tracing::debug!(node_execution_id = group_id, "group already concluded");
            return Ok(Vec::new());
        };

        let ended_plan = children.iter().any(|c| c.ended_plan);
        tracing::info!(
            node_execution_id = group_id,
            %status,
            children = children.len(),
            ended_plan,
            "group concluded"
        );
        self.emit_node(&group);
        if ended_plan {
            return Ok(vec![Followup::EndPlan(group.id)]);
        }
        Ok(vec![Followup::Advise(group.id)])
    }

    /// Conclude the plan execution once every top-level branch has closed
    pub(crate) fn conclude_plan(
        &self,
        plan_execution_id: &str,
    ) -> Result<Option<PlanExecution>, EngineError> {
        let execution = self.store.get_plan_execution(plan_execution_id)?;
        if execution.end_ts.is_some() {
            return Ok(None);
        }
        let top_level = self.store.find_children(plan_execution_id, None, false)?;
        if !self.settled(&top_level)? {
            return Ok(None);
        }

        let status = plan_status(calculate(&top_level));
        let Some(concluded) = self.store.update_plan_execution(
            plan_execution_id,
            &[
                Status::Queued,
                Status::Running,
                Status::Paused,
                Status::Discontinuing,
            ],
            PlanExecutionUpdate::conclude(status, self.clock.now()),
        )?
        else {
            return Ok(None);
        };

        tracing::info!(plan_execution_id, %status, "plan execution concluded");
        self.emit_plan(&concluded);
        Ok(Some(concluded))
    }

    /// Close `id` and each ancestor whose other children are all closed
    ///
    /// Ancestors closed this way are not advised: the plan is ending. Every
    /// node closed here carries the end-plan mark, so when the walk stops at
    /// a parent with open branches, the last of them resumes it.
    pub(crate) fn end_plan(&self, id: &str) -> Result<Vec<Followup>, EngineError> {
        let update = NodeExecutionUpdate::close(self.clock.now()).mark_ended_plan();
        let mut current = self.close_with(self.store.get_node_execution(id)?, update)?;

        while let Some(parent_id) = current.parent_id.clone() {
            let siblings = self.store.find_children(
                &current.plan_execution_id,
                Some(&parent_id),
                false,
            )?;
            if siblings
                .iter()
                .any(|s| s.id != current.id && !s.is_closed())
            {
                tracing::info!(
                    node_execution_id = %current.id,
                    parent_id = %parent_id,
                    "other branches still running, plan end deferred to them"
                );
                return Ok(Vec::new());
            }

            let status = plan_status(calculate(&siblings));
            let update = NodeExecutionUpdate::status(status)
                .ended_at(self.clock.now())
                .mark_ended_plan();
            let Some(parent) = self
                .store
                .update_node_execution(&parent_id, ACTIVE, update)?
            else {
                return Ok(Vec::new());
            };
            self.emit_node(&parent);
            current = parent;
        }

        tracing::info!(node_execution_id = id, "plan ended by adviser");
        self.conclude_plan(&current.plan_execution_id)?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
#[path = "branch_tests.rs"]
mod tests;
