// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart reconciliation, timeouts and the operator escape hatch
//!
//! After a crash the store may hold decisions whose side effects never
//! happened: a `next_id` naming a record that was never saved, a terminal
//! node that was never advised, a retried attempt with no replacement.
//! Reconciliation finds each of these and queues the followup that was lost.

use crate::engine::{Engine, Followup};
use crate::error::EngineError;
use crate::identity;
use crate::interrupts;
use crate::spawn::{self, Placement};
use weft_adapters::StepDispatcher;
use weft_core::clock::after;
use weft_core::{
    advise, AdviserResponse, Clock, FailureInfo, IdGen, InterruptKind, InterruptPackage, Issuer,
    NodeExecution, OrchestrationEvent, Plan, PlanExecution, PlanExecutionUpdate, Status,
};
use weft_storage::{ExecutionStore, NodeExecutionFilter, PlanExecutionFilter, StoreError};

/// What reconciliation found for one plan execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub plan_execution_id: String,
    /// Successor records rebuilt under an already-written `next_id`
    pub successors_recreated: usize,
    /// Replacement attempts rebuilt for retried nodes
    pub retries_recreated: usize,
    /// Terminal nodes whose advisers were consulted again
    pub readvised: usize,
    /// Concluded groups whose plan end was carried on instead of advised
    pub plan_ends_resumed: usize,
    /// Queued nodes that were started
    pub started: usize,
    /// Closed nodes whose parent conclusion was re-checked
    pub branches_rechecked: usize,
    /// Targets with pending interrupts that were processed
    pub interrupt_targets: usize,
}

impl<S, D, C, I> Engine<S, D, C, I>
where
    S: ExecutionStore + 'static,
    D: StepDispatcher,
    C: Clock,
    I: IdGen,
{
    /// Reconcile every plan execution that has not concluded
    pub async fn recover(&self) -> Result<Vec<ReconcileReport>, EngineError> {
        let unfinished = self.store.find_plan_executions(&PlanExecutionFilter {
            statuses: vec![
                Status::Queued,
                Status::Running,
                Status::Paused,
                Status::Discontinuing,
            ],
            ..PlanExecutionFilter::default()
        })?;
        tracing::info!(count = unfinished.len(), "recovering plan executions");

        let mut reports = Vec::with_capacity(unfinished.len());
        for execution in unfinished {
            reports.push(self.reconcile(&execution.id).await?);
        }
        Ok(reports)
    }

    /// Re-derive and run the followups a crash may have lost
    pub async fn reconcile(&self, plan_execution_id: &str) -> Result<ReconcileReport, EngineError> {
        let mut report = ReconcileReport {
            plan_execution_id: plan_execution_id.to_string(),
            ..ReconcileReport::default()
        };
        let mut plan_execution = self.store.get_plan_execution(plan_execution_id)?;
        if plan_execution.end_ts.is_some() {
            return Ok(report);
        }
        let plan = self.store.get_plan(&plan_execution.plan_id)?;
        let now = self.clock.now();

        if plan_execution.status == Status::Queued {
            if let Some(running) = self.store.update_plan_execution(
                plan_execution_id,
                &[Status::Queued],
                PlanExecutionUpdate::status(Status::Running, now).started_at(now),
            )? {
                self.events
                    .publish(OrchestrationEvent::plan_start(&running, now));
                plan_execution = running;
            }
        }

        let all = self.store.find_node_executions(
            &NodeExecutionFilter::for_plan_execution(plan_execution_id).with_old_retries(),
        )?;
        let mut followups = Vec::new();

        if all.is_empty() && !plan_execution.status.is_terminal() {
            let root = spawn::instantiate(
                &plan,
                &plan.start_node_id,
                self.ids.next(),
                Placement::Within(&plan_execution.ambiance()),
                now,
            )?;
            let root = self.store.save_node_execution(root)?;
            followups.push(Followup::Start(root.id));
            report.started += 1;
        }

        for execution in &all {
            if execution.old_retry {
                let replaced = all
                    .iter()
                    .any(|e| e.retry_ids.last() == Some(&execution.id));
                if !replaced {
                    let attempt = spawn::instantiate(
                        &plan,
                        &execution.node_id,
                        self.ids.next(),
                        Placement::Retry(execution),
                        now,
                    )?;
                    let attempt = self.store.save_node_execution(attempt)?;
                    followups.push(Followup::Start(attempt.id));
                    report.retries_recreated += 1;
                }
                continue;
            }

            if let Some(next_id) = &execution.next_id {
                if !all.iter().any(|e| &e.id == next_id) {
                    if let Some(successor) =
                        self.recreate_successor(&plan, &plan_execution, execution, next_id)?
                    {
                        followups.push(Followup::Start(successor));
                        report.successors_recreated += 1;
                    }
                }
                continue;
            }

            match execution.status {
                Status::Queued => {
                    followups.push(Followup::Start(execution.id.clone()));
                    report.started += 1;
                }
                status if status.is_terminal() && !execution.is_closed() => {
                    let ended_by_child = all.iter().any(|child| {
                        child.parent_id.as_deref() == Some(execution.id.as_str())
                            && child.ended_plan
                    });
                    if ended_by_child {
                        followups.push(Followup::EndPlan(execution.id.clone()));
                        report.plan_ends_resumed += 1;
                    } else if self.store.pending_interrupts(&execution.id)?.is_empty() {
                        // A pending RETRY or PROCEED_WITH_DEFAULT already carries the decision
                        followups.push(Followup::Advise(execution.id.clone()));
                        report.readvised += 1;
                    }
                }
                status if status.is_terminal() => {
                    followups.push(Followup::EndBranch(execution.id.clone()));
                    report.branches_rechecked += 1;
                }
                _ => {}
            }
        }

        let mut targets: Vec<String> = Vec::new();
        for interrupt in self.store.find_interrupts(plan_execution_id)? {
            let target = interrupt.target_id().to_string();
            if !targets.contains(&target) && !self.store.pending_interrupts(&target)?.is_empty() {
                targets.push(target);
            }
        }
        report.interrupt_targets = targets.len();
        followups.extend(targets.into_iter().map(Followup::Interrupts));

        tracing::info!(
            plan_execution_id,
            successors = report.successors_recreated,
            retries = report.retries_recreated,
            readvised = report.readvised,
            plan_ends = report.plan_ends_resumed,
            started = report.started,
            rechecked = report.branches_rechecked,
            interrupt_targets = report.interrupt_targets,
            "plan execution reconciled"
        );
        self.drive(followups).await?;
        Ok(report)
    }

    /// Save the successor a crash lost, under the id already written
    fn recreate_successor(
        &self,
        plan: &Plan,
        plan_execution: &PlanExecution,
        finished: &NodeExecution,
        next_id: &str,
    ) -> Result<Option<String>, EngineError> {
        let node = plan.resolve(&finished.node_id)?;
        let static_next = plan.next_of(&finished.node_id);
        let target = match advise(node, static_next, finished, self.config.retry.default_wait) {
            Some(AdviserResponse::NextStep { next_node_id })
            | Some(AdviserResponse::MarkAsFailure { next_node_id }) => next_node_id,
            // PROCEED_WITH_DEFAULT moved to the static successor
            _ if finished.status == Status::IgnoreFailed => static_next.map(str::to_string),
            _ => None,
        };
        let Some(target) = target.filter(|t| plan.node(t).is_some()) else {
            tracing::warn!(
                node_execution_id = %finished.id,
                next_id,
                "successor target cannot be recomputed"
            );
            return Ok(None);
        };

        let ctx = self.handler_ctx(plan, plan_execution);
        let node_id = identity::resolve_target(&ctx, finished, &target)?;
        let reloaded;
        let plan = if node_id == target {
            plan
        } else {
            reloaded = self.store.get_plan(&plan.id)?;
            &reloaded
        };

        let successor = spawn::instantiate(
            plan,
            &node_id,
            next_id.to_string(),
            Placement::After(finished),
            self.clock.now(),
        )?;
        match self.store.save_node_execution(successor) {
            Ok(saved) => {
                tracing::info!(node_execution_id = %finished.id, next_id, "successor recreated");
                Ok(Some(saved.id))
            }
            Err(StoreError::Duplicate { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Register MARK_EXPIRED for running steps past their timeout
    pub async fn expire_timed_out(&self) -> Result<usize, EngineError> {
        let now = self.clock.now();
        let active = self.store.find_plan_executions(&PlanExecutionFilter {
            statuses: vec![Status::Running, Status::Paused],
            ..PlanExecutionFilter::default()
        })?;

        let mut expired = Vec::new();
        for plan_execution in active {
            let plan = self.store.get_plan(&plan_execution.plan_id)?;
            let running = self.store.find_node_executions(
                &NodeExecutionFilter::for_plan_execution(&plan_execution.id)
                    .with_statuses(&[Status::Running]),
            )?;
            for execution in running {
                let Ok(node) = plan.resolve(&execution.node_id) else {
                    continue;
                };
                if !node.is_step() {
                    continue;
                }
                let Some(timeout) = node.timeout.or(self.config.timeouts.default_node_timeout)
                else {
                    continue;
                };
                let Some(started) = execution.start_ts else {
                    continue;
                };
                if after(started, timeout) > now {
                    continue;
                }
                if self
                    .store
                    .pending_interrupts(&execution.id)?
                    .iter()
                    .any(|i| i.kind == InterruptKind::MarkExpired)
                {
                    continue;
                }

                tracing::warn!(
                    node_execution_id = %execution.id,
                    timeout = ?timeout,
                    "step timed out"
                );
                interrupts::register(
                    self.store.as_ref(),
                    &self.ids,
                    &self.clock,
                    InterruptPackage::for_node(
                        &plan_execution.id,
                        &execution.id,
                        InterruptKind::MarkExpired,
                        Issuer::Timeout,
                    ),
                )?;
                expired.push(execution.id);
            }
        }

        let count = expired.len();
        self.drive(expired.into_iter().map(Followup::Interrupts).collect())
            .await?;
        Ok(count)
    }

    /// Operator escape hatch: error every open node and conclude the plan
    pub async fn error_out_active_nodes(
        &self,
        plan_execution_id: &str,
    ) -> Result<usize, EngineError> {
        let plan_execution = self.store.get_plan_execution(plan_execution_id)?;
        if plan_execution.end_ts.is_some() {
            return Ok(0);
        }

        let open = self
            .store
            .find_node_executions(&NodeExecutionFilter::for_plan_execution(plan_execution_id))?;
        let mut errored = 0;
        for execution in open.iter().rev() {
            let failure = FailureInfo::new("errored out by operator");
            if self
                .terminate(execution, Status::Errored, Some(failure))?
                .is_some()
            {
                errored += 1;
            }
        }

        if let Some(concluded) = self.store.update_plan_execution(
            plan_execution_id,
            &[Status::Queued, Status::Running, Status::Paused],
            PlanExecutionUpdate::conclude(Status::Errored, self.clock.now()),
        )? {
            self.emit_plan(&concluded);
        }
        tracing::warn!(plan_execution_id, errored, "active nodes errored out");
        Ok(errored)
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
