// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interrupt registration and processing
//!
//! Interrupts for one target are processed strictly in registration order.
//! An interrupt that cannot apply to the target's current state is dropped
//! with a reason; either way its outcome is recorded exactly once.

use crate::engine::{followups_for, Engine, Followup};
use crate::error::EngineError;
use crate::handlers;
use crate::scheduler::ScheduledKind;
use crate::spawn::{self, Placement};
use weft_adapters::StepDispatcher;
use weft_core::{
    Clock, FailureInfo, IdGen, Interrupt, InterruptKind, InterruptOutcome, InterruptPackage,
    NodeExecution, NodeExecutionUpdate, PlanExecution, PlanExecutionUpdate, Status,
};
use weft_storage::{ExecutionStore, NodeExecutionFilter};

/// Store an interrupt under a fresh id
pub(crate) fn register(
    store: &dyn ExecutionStore,
    ids: &dyn IdGen,
    clock: &dyn Clock,
    package: InterruptPackage,
) -> Result<Interrupt, EngineError> {
    let interrupt = Interrupt::from_package(ids.next(), package, clock.now());
    let interrupt = store.register_interrupt(interrupt)?;
    tracing::info!(
        interrupt_id = %interrupt.id,
        kind = %interrupt.kind,
        target_id = interrupt.target_id(),
        sequence = interrupt.sequence,
        "interrupt registered"
    );
    Ok(interrupt)
}

/// Like [`register`], reusing a pending interrupt of the same kind and issuer
pub(crate) fn register_once(
    store: &dyn ExecutionStore,
    ids: &dyn IdGen,
    clock: &dyn Clock,
    package: InterruptPackage,
) -> Result<Interrupt, EngineError> {
    let target = package
        .node_execution_id
        .as_deref()
        .unwrap_or(&package.plan_execution_id);
    let existing = store
        .pending_interrupts(target)?
        .into_iter()
        .find(|i| i.kind == package.kind && i.issuer == package.issuer);
    match existing {
        Some(existing) => Ok(existing),
        None => register(store, ids, clock, package),
    }
}

/// Result of applying one interrupt
pub(crate) enum Applied {
    Processed(Vec<Followup>),
    Dropped(String),
}

fn dropped(reason: impl Into<String>) -> Result<Applied, EngineError> {
    Ok(Applied::Dropped(reason.into()))
}

impl<S, D, C, I> Engine<S, D, C, I>
where
    S: ExecutionStore + 'static,
    D: StepDispatcher,
    C: Clock,
    I: IdGen,
{
    /// Register an interrupt and process its target's queue
    pub async fn register_interrupt(
        &self,
        package: InterruptPackage,
    ) -> Result<Interrupt, EngineError> {
        self.store.get_plan_execution(&package.plan_execution_id)?;
        if let Some(node_execution_id) = &package.node_execution_id {
            self.store.get_node_execution(node_execution_id)?;
        }
        let interrupt = register(self.store.as_ref(), &self.ids, &self.clock, package)?;
        self.drive(vec![Followup::Interrupts(interrupt.target_id().to_string())])
            .await?;
        Ok(interrupt)
    }

    /// Process whatever is due in a target's interrupt queue
    pub async fn process_interrupts(&self, target_id: &str) -> Result<(), EngineError> {
        self.drive(vec![Followup::Interrupts(target_id.to_string())])
            .await
    }

    pub(crate) fn process_next_interrupt(
        &self,
        target_id: &str,
    ) -> Result<Vec<Followup>, EngineError> {
        let Some(interrupt) = self.store.pending_interrupts(target_id)?.into_iter().next() else {
            return Ok(Vec::new());
        };
        let now = self.clock.now();
        if !interrupt.is_due(now) {
            if let Some(not_before) = interrupt.not_before {
                tracing::debug!(interrupt_id = %interrupt.id, target_id, %not_before, "interrupt not due");
                self.schedule(
                    not_before,
                    ScheduledKind::Interrupts {
                        target_id: target_id.to_string(),
                    },
                );
            }
            return Ok(Vec::new());
        }

        let span = tracing::info_span!(
            "interrupt",
            interrupt_id = %interrupt.id,
            kind = %interrupt.kind,
            target_id,
        );
        let _guard = span.enter();

        let (outcome, mut followups) = match self.apply_interrupt(&interrupt)? {
            Applied::Processed(followups) => {
                tracing::info!("interrupt processed");
                (InterruptOutcome::processed(&interrupt, now), followups)
            }
            Applied::Dropped(reason) => {
                tracing::info!(%reason, "interrupt dropped");
                (InterruptOutcome::dropped(&interrupt, reason, now), Vec::new())
            }
        };
        if !self.store.record_outcome(outcome)? {
            tracing::debug!("outcome already recorded by another writer");
        }

        followups.push(Followup::Interrupts(target_id.to_string()));
        Ok(followups)
    }

    fn apply_interrupt(&self, interrupt: &Interrupt) -> Result<Applied, EngineError> {
        let plan_execution = match self.store.get_plan_execution(&interrupt.plan_execution_id) {
            Ok(found) => found,
            Err(e) if e.is_not_found() => return dropped("plan execution not found"),
            Err(e) => return Err(e.into()),
        };
        if plan_execution.status.is_terminal() {
            return dropped(format!("plan execution is {}", plan_execution.status));
        }

        let Some(node_execution_id) = &interrupt.node_execution_id else {
            return self.apply_to_plan(&plan_execution, interrupt.kind);
        };
        let execution = match self.store.get_node_execution(node_execution_id) {
            Ok(found) => found,
            Err(e) if e.is_not_found() => return dropped("node execution not found"),
            Err(e) => return Err(e.into()),
        };
        if execution.plan_execution_id != plan_execution.id {
            return dropped("node execution belongs to another plan execution");
        }
        if plan_execution.status == Status::Discontinuing {
            return dropped("plan execution is discontinuing");
        }

        match interrupt.kind {
            InterruptKind::Abort => self.abort_node(execution),
            InterruptKind::Retry => self.retry_node(&plan_execution, execution),
            InterruptKind::Pause => self.pause_node(execution),
            InterruptKind::Resume => self.resume_node(&plan_execution, execution),
            InterruptKind::ProceedWithDefault => {
                self.proceed_with_default(&plan_execution, execution)
            }
            InterruptKind::MarkExpired => self.expire_node(execution),
        }
    }

    /// Give an open node a final status, returning it if this call set it
    ///
    /// A node that is already terminal is only closed.
    pub(crate) fn terminate(
        &self,
        execution: &NodeExecution,
        status: Status,
        failure: Option<FailureInfo>,
    ) -> Result<Option<NodeExecution>, EngineError> {
        if execution.is_closed() {
            return Ok(None);
        }
        if execution.status.is_terminal() {
            self.close(execution.clone())?;
            return Ok(None);
        }
        let update = NodeExecutionUpdate::status(status)
            .ended_at(self.clock.now())
            .with_failure(failure);
        let terminated = self.store.update_node_execution(
            &execution.id,
            &[
                Status::Queued,
                Status::Running,
                Status::Paused,
                Status::Discontinuing,
            ],
            update,
        )?;
        if let Some(terminated) = &terminated {
            self.emit_node(terminated);
        }
        Ok(terminated)
    }

    fn terminate_descendants(
        &self,
        execution: &NodeExecution,
        status: Status,
    ) -> Result<(), EngineError> {
        let descendants =
            self.store
                .find_children(&execution.plan_execution_id, Some(&execution.id), true)?;
        // Deepest first so no child is left open under a closed parent
        for descendant in descendants.iter().rev() {
            self.terminate(descendant, status, None)?;
        }
        Ok(())
    }

    fn abort_node(&self, execution: NodeExecution) -> Result<Applied, EngineError> {
        if execution.is_closed() {
            return dropped("node execution is closed");
        }
        self.terminate_descendants(&execution, Status::Aborted)?;
        self.terminate(&execution, Status::Aborted, None)?;
        Ok(Applied::Processed(vec![Followup::EndBranch(execution.id)]))
    }

    fn retry_node(
        &self,
        plan_execution: &PlanExecution,
        execution: NodeExecution,
    ) -> Result<Applied, EngineError> {
        if execution.old_retry {
            return dropped("node execution was already retried");
        }
        if execution.is_closed() {
            return dropped("node execution is closed");
        }
        if !execution.status.is_broke() {
            return dropped(format!("node execution is {}", execution.status));
        }
        if let Some(parent_id) = &execution.parent_id {
            let parent = self.store.get_node_execution(parent_id)?;
            if parent.is_closed() || parent.status.is_terminal() {
                return dropped("parent is no longer running");
            }
        }

        let plan = self.store.get_plan(&plan_execution.plan_id)?;
        let now = self.clock.now();
        let Some(prior) = self.store.update_node_execution(
            &execution.id,
            &[execution.status],
            NodeExecutionUpdate::close(now).mark_old_retry(),
        )?
        else {
            return dropped("node execution changed concurrently");
        };

        let attempt = spawn::instantiate(
            &plan,
            &prior.node_id,
            self.ids.next(),
            Placement::Retry(&prior),
            now,
        )?;
        let attempt = self.store.save_node_execution(attempt)?;
        tracing::info!(
            node_execution_id = %attempt.id,
            retry_of = %prior.id,
            attempt = attempt.retry_count() + 1,
            "node retried"
        );
        Ok(Applied::Processed(vec![Followup::Start(attempt.id)]))
    }

    fn pause_node(&self, execution: NodeExecution) -> Result<Applied, EngineError> {
        if !matches!(execution.status, Status::Queued | Status::Running) {
            return dropped(format!("node execution is {}", execution.status));
        }
        match self.store.update_node_execution(
            &execution.id,
            &[Status::Queued, Status::Running],
            NodeExecutionUpdate::status(Status::Paused),
        )? {
            Some(paused) => {
                self.emit_node(&paused);
                Ok(Applied::Processed(Vec::new()))
            }
            None => dropped("node execution changed concurrently"),
        }
    }

    fn resume_node(
        &self,
        plan_execution: &PlanExecution,
        execution: NodeExecution,
    ) -> Result<Applied, EngineError> {
        if execution.status != Status::Paused {
            return dropped(format!("node execution is {}", execution.status));
        }
        if plan_execution.status == Status::Paused {
            return dropped("plan execution is paused");
        }

        let never_started = execution.start_ts.is_none();
        let mut update = NodeExecutionUpdate::status(Status::Running);
        if never_started {
            update = update.started_at(self.clock.now());
        }
        match self
            .store
            .update_node_execution(&execution.id, &[Status::Paused], update)?
        {
            Some(resumed) => {
                self.emit_node(&resumed);
                let followups = if never_started {
                    vec![Followup::Launch(resumed.id)]
                } else {
                    Vec::new()
                };
                Ok(Applied::Processed(followups))
            }
            None => dropped("node execution changed concurrently"),
        }
    }

    fn proceed_with_default(
        &self,
        plan_execution: &PlanExecution,
        execution: NodeExecution,
    ) -> Result<Applied, EngineError> {
        if execution.old_retry || execution.is_closed() {
            return dropped("node execution is closed");
        }
        if !execution.status.is_broke() {
            return dropped(format!("node execution is {}", execution.status));
        }
        let Some(ignored) = self.store.update_node_execution(
            &execution.id,
            &[execution.status],
            NodeExecutionUpdate::status(Status::IgnoreFailed),
        )?
        else {
            return dropped("node execution changed concurrently");
        };
        self.emit_node(&ignored);

        let plan = self.store.get_plan(&plan_execution.plan_id)?;
        let ctx = self.handler_ctx(&plan, plan_execution);
        let directive = handlers::advance(&ctx, &ignored, plan.next_of(&ignored.node_id))?;
        Ok(Applied::Processed(followups_for(&ignored.id, directive)))
    }

    fn expire_node(&self, execution: NodeExecution) -> Result<Applied, EngineError> {
        if execution.status.is_terminal() {
            return dropped(format!("node execution is already {}", execution.status));
        }
        self.terminate_descendants(&execution, Status::Expired)?;

        let update = NodeExecutionUpdate::status(Status::Expired)
            .with_failure(Some(FailureInfo::new("node execution timed out")));
        match self.store.update_node_execution(
            &execution.id,
            &[Status::Queued, Status::Running, Status::Paused],
            update,
        )? {
            Some(expired) => {
                self.emit_node(&expired);
                Ok(Applied::Processed(vec![Followup::Advise(expired.id)]))
            }
            None => dropped("node execution changed concurrently"),
        }
    }

    fn apply_to_plan(
        &self,
        plan_execution: &PlanExecution,
        kind: InterruptKind,
    ) -> Result<Applied, EngineError> {
        match kind {
            InterruptKind::Abort => self.discontinue(plan_execution, Status::Aborted),
            InterruptKind::MarkExpired => self.discontinue(plan_execution, Status::Expired),
            InterruptKind::Pause => self.pause_plan(plan_execution),
            InterruptKind::Resume => self.resume_plan(plan_execution),
            InterruptKind::Retry | InterruptKind::ProceedWithDefault => {
                dropped(format!("{kind} does not apply to a plan execution"))
            }
        }
    }

    /// Stop everything under a plan execution and conclude it with `status`
    fn discontinue(
        &self,
        plan_execution: &PlanExecution,
        status: Status,
    ) -> Result<Applied, EngineError> {
        let now = self.clock.now();
        if plan_execution.status != Status::Discontinuing
            && self
                .store
                .update_plan_execution(
                    &plan_execution.id,
                    &[Status::Queued, Status::Running, Status::Paused],
                    PlanExecutionUpdate::status(Status::Discontinuing, now),
                )?
                .is_none()
        {
            return dropped("plan execution changed concurrently");
        }

        let open = self
            .store
            .find_node_executions(&NodeExecutionFilter::for_plan_execution(&plan_execution.id))?;
        let mut stopped = 0;
        for execution in open.iter().rev() {
            if self.terminate(execution, status, None)?.is_some() {
                stopped += 1;
            }
        }

        let Some(concluded) = self.store.update_plan_execution(
            &plan_execution.id,
            &[Status::Discontinuing],
            PlanExecutionUpdate::conclude(status, self.clock.now()),
        )?
        else {
            return dropped("plan execution changed concurrently");
        };
        tracing::info!(
            plan_execution_id = %concluded.id,
            status = %concluded.status,
            stopped,
            "plan execution discontinued"
        );
        self.emit_plan(&concluded);
        Ok(Applied::Processed(Vec::new()))
    }

    fn pause_plan(&self, plan_execution: &PlanExecution) -> Result<Applied, EngineError> {
        if plan_execution.status != Status::Running {
            return dropped(format!("plan execution is {}", plan_execution.status));
        }
        match self.store.update_plan_execution(
            &plan_execution.id,
            &[Status::Running],
            PlanExecutionUpdate::status(Status::Paused, self.clock.now()),
        )? {
            Some(paused) => {
                self.emit_plan(&paused);
                Ok(Applied::Processed(Vec::new()))
            }
            None => dropped("plan execution changed concurrently"),
        }
    }

    /// Resume the plan and launch nodes that were held while it was paused
    fn resume_plan(&self, plan_execution: &PlanExecution) -> Result<Applied, EngineError> {
        if plan_execution.status != Status::Paused {
            return dropped(format!("plan execution is {}", plan_execution.status));
        }
        let now = self.clock.now();
        let Some(resumed) = self.store.update_plan_execution(
            &plan_execution.id,
            &[Status::Paused],
            PlanExecutionUpdate::status(Status::Running, now),
        )?
        else {
            return dropped("plan execution changed concurrently");
        };
        self.emit_plan(&resumed);

        let held = self.store.find_node_executions(
            &NodeExecutionFilter::for_plan_execution(&resumed.id).with_statuses(&[Status::Paused]),
        )?;
        let mut followups = Vec::new();
        for execution in held.into_iter().filter(|e| e.start_ts.is_none()) {
            if let Some(running) = self.store.update_node_execution(
                &execution.id,
                &[Status::Paused],
                NodeExecutionUpdate::status(Status::Running).started_at(now),
            )? {
                self.emit_node(&running);
                followups.push(Followup::Launch(running.id));
            }
        }
        Ok(Applied::Processed(followups))
    }
}

#[cfg(test)]
#[path = "interrupts_tests.rs"]
mod tests;
