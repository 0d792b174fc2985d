// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestration engine
//!
//! Every state change is a conditional update against the store. The engine
//! reacts to what it just changed by queueing [`Followup`]s and works through
//! them in a single drive loop, so a long chain of nodes never recurses.

use crate::error::EngineError;
use crate::handlers::{Directive, HandlerCtx, HandlerRegistry};
use crate::scheduler::{ScheduledKind, Scheduler};
use crate::spawn::{self, Placement};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::Instrument;
use weft_adapters::StepDispatcher;
use weft_core::{
    advise, Ambiance, Clock, EngineConfig, EventBus, ExecutionMetadata, FailureInfo, IdGen,
    NodeExecution, NodeExecutionUpdate, NodeKind, OrchestrationEvent, Plan, PlanExecution,
    PlanExecutionUpdate, Status, StepResult,
};
use weft_storage::ExecutionStore;

/// Everything the engine is built from
pub struct EngineDeps<S, D, C, I> {
    pub store: Arc<S>,
    pub dispatcher: D,
    pub events: EventBus,
    pub clock: C,
    pub ids: I,
}

/// What happened to a reported step result
#[derive(Debug, Clone, PartialEq)]
pub enum FinishOutcome {
    /// The result was recorded and the branch moved on
    Applied(NodeExecution),
    /// The node had already left an active status; nothing changed
    Ignored { current: Status },
}

/// Work queued by a state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Followup {
    /// Move a queued node to running (or paused/aborted per its plan)
    Start(String),
    /// Dispatch a running step, or instantiate a group's children
    Launch(String),
    /// Consult the advisers of a node that reached a terminal status
    Advise(String),
    /// Close a terminal node and conclude its parent if it was the last one
    EndBranch(String),
    /// Close a node and every ancestor, then conclude the plan
    EndPlan(String),
    /// Process the next pending interrupt for a target
    Interrupts(String),
}

impl Followup {
    fn target(&self) -> &str {
        match self {
            Followup::Start(id)
            | Followup::Launch(id)
            | Followup::Advise(id)
            | Followup::EndBranch(id)
            | Followup::EndPlan(id)
            | Followup::Interrupts(id) => id,
        }
    }
}

/// Drives plan executions against a store and a step dispatcher
pub struct Engine<S, D, C, I> {
    pub(crate) store: Arc<S>,
    pub(crate) dispatcher: D,
    pub(crate) events: EventBus,
    pub(crate) clock: C,
    pub(crate) ids: I,
    pub(crate) config: EngineConfig,
    pub(crate) handlers: HandlerRegistry,
    scheduler: Mutex<Scheduler>,
}

impl<S, D, C, I> Engine<S, D, C, I>
where
    S: ExecutionStore + 'static,
    D: StepDispatcher,
    C: Clock,
    I: IdGen,
{
    pub fn new(deps: EngineDeps<S, D, C, I>, config: EngineConfig) -> Self {
        let mut scheduler = Scheduler::new();
        scheduler.init_defaults(deps.clock.now(), config.timeouts.sweep_interval);
        Self {
            store: deps.store,
            dispatcher: deps.dispatcher,
            events: deps.events,
            clock: deps.clock,
            ids: deps.ids,
            config,
            handlers: HandlerRegistry::default(),
            scheduler: Mutex::new(scheduler),
        }
    }

    /// Replace the adviser response handlers
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// When [`Engine::tick`] next has work to do
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.scheduler().next_fire_time()
    }

    /// Create a plan execution and start its first node
    pub async fn start_plan_execution(
        &self,
        plan_id: &str,
        setup_context: BTreeMap<String, String>,
        metadata: ExecutionMetadata,
    ) -> Result<PlanExecution, EngineError> {
        let plan = self.store.get_plan(plan_id)?;
        plan.validate()?;

        let now = self.clock.now();
        let created = PlanExecution::new(self.ids.next(), plan_id, setup_context, metadata, now);
        let created = self.store.save_plan_execution(created)?;
        let Some(running) = self.store.update_plan_execution(
            &created.id,
            &[Status::Queued],
            PlanExecutionUpdate::status(Status::Running, now).started_at(now),
        )?
        else {
            return Ok(self.store.get_plan_execution(&created.id)?);
        };
        tracing::info!(
            plan_execution_id = %running.id,
            plan_id,
            mode = ?running.metadata.mode,
            "plan execution started"
        );
        self.events
            .publish(OrchestrationEvent::plan_start(&running, now));

        let root = spawn::instantiate(
            &plan,
            &plan.start_node_id,
            self.ids.next(),
            Placement::Within(&running.ambiance()),
            now,
        )?;
        let root = self.store.save_node_execution(root)?;
        self.drive(vec![Followup::Start(root.id)]).await?;

        Ok(self.store.get_plan_execution(&running.id)?)
    }

    /// Create and start an execution of `node_id`
    ///
    /// With `previous` the new execution is placed after that sibling;
    /// otherwise it is placed inside `ambiance`.
    pub async fn run_node(
        &self,
        ambiance: &Ambiance,
        node_id: &str,
        previous: Option<&NodeExecution>,
    ) -> Result<NodeExecution, EngineError> {
        let span = tracing::info_span!(
            "node.run",
            plan_execution_id = %ambiance.plan_execution_id,
            node_id,
        );
        async move {
            let plan = self.store.get_plan(&ambiance.plan_id)?;
            let placement = match previous {
                Some(previous) => Placement::After(previous),
                None => Placement::Within(ambiance),
            };
            let created =
                spawn::instantiate(&plan, node_id, self.ids.next(), placement, self.clock.now())?;
            let created = self.store.save_node_execution(created)?;
            tracing::debug!(node_execution_id = %created.id, "node execution created");

            self.drive(vec![Followup::Start(created.id.clone())]).await?;
            Ok::<_, EngineError>(self.store.get_node_execution(&created.id)?)
        }
        .instrument(span)
        .await
    }

    /// Record a worker's result for a running step
    ///
    /// Late or duplicate results lose the conditional update and are
    /// reported as [`FinishOutcome::Ignored`].
    pub async fn on_node_finish(
        &self,
        node_execution_id: &str,
        result: StepResult,
    ) -> Result<FinishOutcome, EngineError> {
        if !matches!(
            result.status,
            Status::Succeeded | Status::Failed | Status::Errored | Status::Skipped
        ) {
            return Err(EngineError::InvalidResult {
                node_execution_id: node_execution_id.to_string(),
                status: result.status,
            });
        }

        let span = tracing::info_span!("node.finish", node_execution_id, status = %result.status);
        async move {
            let reported = result.status;
            let update = NodeExecutionUpdate::status(reported).with_failure(result.failure);
            let applied = self.store.update_node_execution(
                node_execution_id,
                &[Status::Queued, Status::Running, Status::Paused],
                update,
            )?;
            let Some(finished) = applied else {
                let current = self.store.get_node_execution(node_execution_id)?.status;
                tracing::debug!(%current, %reported, "stale result ignored");
                return Ok(FinishOutcome::Ignored { current });
            };

            tracing::info!(plan_execution_id = %finished.plan_execution_id, "node finished");
            self.emit_node(&finished);
            self.drive(vec![Followup::Advise(finished.id.clone())]).await?;
            Ok::<_, EngineError>(FinishOutcome::Applied(finished))
        }
        .instrument(span)
        .await
    }

    /// Close the node named by `ambiance` and conclude its parent if possible
    pub async fn end_node_execution(&self, ambiance: &Ambiance) -> Result<(), EngineError> {
        let id = ambiance
            .current_node_execution_id()
            .ok_or(EngineError::MissingNodeExecution)?;
        self.drive(vec![Followup::EndBranch(id.to_string())]).await
    }

    /// Fire due timers: delayed interrupts and the timeout sweep
    pub async fn tick(&self) -> Result<usize, EngineError> {
        let ready = self.scheduler().poll(self.clock.now());
        let fired = ready.len();

        let mut followups = Vec::new();
        for item in ready {
            match item.kind {
                ScheduledKind::Interrupts { target_id } => {
                    followups.push(Followup::Interrupts(target_id))
                }
                ScheduledKind::TimeoutSweep => {
                    self.expire_timed_out().await?;
                }
            }
        }
        self.drive(followups).await?;
        Ok(fired)
    }

    pub(crate) fn scheduler(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn schedule(&self, fire_at: DateTime<Utc>, kind: ScheduledKind) {
        self.scheduler().schedule(fire_at, kind);
    }

    pub(crate) fn handler_ctx<'a>(
        &'a self,
        plan: &'a Plan,
        plan_execution: &'a PlanExecution,
    ) -> HandlerCtx<'a> {
        HandlerCtx {
            store: self.store.as_ref(),
            ids: &self.ids,
            clock: &self.clock,
            config: &self.config,
            plan,
            plan_execution,
        }
    }

    pub(crate) fn emit_node(&self, execution: &NodeExecution) {
        self.events
            .publish(OrchestrationEvent::node_status(execution, self.clock.now()));
    }

    pub(crate) fn emit_plan(&self, execution: &PlanExecution) {
        self.events
            .publish(OrchestrationEvent::plan_status(execution, self.clock.now()));
    }

    /// Work through `initial` and everything it causes
    pub(crate) async fn drive(&self, initial: Vec<Followup>) -> Result<(), EngineError> {
        let mut queue: VecDeque<Followup> = initial.into();
        let mut batches: HashMap<String, usize> = HashMap::new();

        while let Some(followup) = queue.pop_front() {
            if let Followup::Interrupts(target) = &followup {
                let processed = batches.entry(target.clone()).or_default();
                if *processed >= self.config.interrupts.max_batch {
                    tracing::debug!(target_id = %target, "interrupt batch limit reached, deferring");
                    self.schedule(
                        self.clock.now(),
                        ScheduledKind::Interrupts {
                            target_id: target.clone(),
                        },
                    );
                    continue;
                }
                *processed += 1;
            }

            match self.step(&followup).await {
                Ok(next) => queue.extend(next),
                Err(e) if e.is_transient() => {
                    tracing::error!(?followup, error = %e, "store unavailable");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(?followup, error = %e, "ending branch after error");
                    queue.extend(self.fail_branch(&followup, &e)?);
                }
            }
        }
        Ok(())
    }

    async fn step(&self, followup: &Followup) -> Result<Vec<Followup>, EngineError> {
        match followup {
            Followup::Start(id) => self.start(id),
            Followup::Launch(id) => self.launch(id).await,
            Followup::Advise(id) => self.advise_node(id),
            Followup::EndBranch(id) => self.end_branch(id),
            Followup::EndPlan(id) => self.end_plan(id),
            Followup::Interrupts(target) => self.process_next_interrupt(target),
        }
    }

    /// Errors a node whose followup failed so its branch still concludes
    fn fail_branch(
        &self,
        followup: &Followup,
        error: &EngineError,
    ) -> Result<Vec<Followup>, EngineError> {
        if !matches!(
            followup,
            Followup::Start(_) | Followup::Launch(_) | Followup::Advise(_)
        ) {
            return Ok(Vec::new());
        }

        let id = followup.target();
        // A node being advised has already finished but is not closed yet
        let expected: &[Status] = match followup {
            Followup::Advise(_) => &[
                Status::Queued,
                Status::Running,
                Status::Paused,
                Status::Succeeded,
                Status::Skipped,
                Status::IgnoreFailed,
                Status::Failed,
                Status::Expired,
            ],
            _ => &[Status::Queued, Status::Running, Status::Paused],
        };
        let update = NodeExecutionUpdate::status(Status::Errored)
            .with_failure(Some(FailureInfo::new(error.to_string())));
        match self.store.update_node_execution(id, expected, update) {
            Ok(Some(errored)) => {
                self.emit_node(&errored);
                Ok(vec![Followup::EndBranch(id.to_string())])
            }
            Ok(None) => Ok(vec![Followup::EndBranch(id.to_string())]),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn start(&self, id: &str) -> Result<Vec<Followup>, EngineError> {
        let queued = self.store.get_node_execution(id)?;
        if queued.status != Status::Queued {
            tracing::debug!(node_execution_id = id, status = %queued.status, "already started");
            return Ok(Vec::new());
        }

        let plan_execution = self.store.get_plan_execution(&queued.plan_execution_id)?;
        let now = self.clock.now();

        if plan_execution.status.is_terminal() || plan_execution.status == Status::Discontinuing {
            let aborted = self.store.update_node_execution(
                id,
                &[Status::Queued],
                NodeExecutionUpdate::status(Status::Aborted).ended_at(now),
            )?;
            return Ok(match aborted {
                Some(aborted) => {
                    tracing::info!(
                        node_execution_id = id,
                        plan_status = %plan_execution.status,
                        "plan is ending, node aborted"
                    );
                    self.emit_node(&aborted);
                    vec![Followup::EndBranch(aborted.id)]
                }
                None => Vec::new(),
            });
        }

        if plan_execution.status == Status::Paused {
            if let Some(paused) = self.store.update_node_execution(
                id,
                &[Status::Queued],
                NodeExecutionUpdate::status(Status::Paused),
            )? {
                tracing::info!(node_execution_id = id, "plan is paused, node held");
                self.emit_node(&paused);
            }
            return Ok(Vec::new());
        }

        let Some(running) = self.store.update_node_execution(
            id,
            &[Status::Queued],
            NodeExecutionUpdate::status(Status::Running).started_at(now),
        )?
        else {
            return Ok(Vec::new());
        };
        tracing::info!(
            node_execution_id = id,
            node_id = %running.node_id,
            depth = running.ambiance.levels.len(),
            "node started"
        );
        self.events
            .publish(OrchestrationEvent::node_start(&running, now));
        Ok(vec![Followup::Launch(running.id)])
    }

    async fn launch(&self, id: &str) -> Result<Vec<Followup>, EngineError> {
        let execution = self.store.get_node_execution(id)?;
        if execution.status != Status::Running {
            return Ok(Vec::new());
        }
        let plan = self.store.get_plan(&execution.ambiance.plan_id)?;
        let node = plan.resolve(&execution.node_id)?;

        let children: &[String] = match &node.kind {
            NodeKind::Step => {
                return match self.dispatcher.dispatch(node, &execution.ambiance).await {
                    Ok(()) => Ok(Vec::new()),
                    Err(e) => {
                        let update = NodeExecutionUpdate::status(Status::Errored)
                            .with_failure(Some(FailureInfo::new(e.to_string())));
                        match self
                            .store
                            .update_node_execution(id, &[Status::Running], update)?
                        {
                            Some(errored) => {
                                self.emit_node(&errored);
                                Ok(vec![Followup::Advise(errored.id)])
                            }
                            None => Ok(Vec::new()),
                        }
                    }
                };
            }
            NodeKind::Section { child } => std::slice::from_ref(child),
            NodeKind::Fork { children } => children,
        };

        // A relaunch after resume must not duplicate the group's children
        if !self
            .store
            .find_children(&execution.plan_execution_id, Some(id), false)?
            .is_empty()
        {
            return Ok(Vec::new());
        }

        if children.is_empty() {
            return Ok(
                match self.store.update_node_execution(
                    id,
                    &[Status::Running],
                    NodeExecutionUpdate::status(Status::Succeeded),
                )? {
                    Some(done) => {
                        self.emit_node(&done);
                        vec![Followup::Advise(done.id)]
                    }
                    None => Vec::new(),
                },
            );
        }

        let now = self.clock.now();
        let mut followups = Vec::with_capacity(children.len());
        for child in children {
            let created = spawn::instantiate(
                &plan,
                child,
                self.ids.next(),
                Placement::Within(&execution.ambiance),
                now,
            )?;
            let created = self.store.save_node_execution(created)?;
            followups.push(Followup::Start(created.id));
        }
        tracing::debug!(node_execution_id = id, children = followups.len(), "group launched");
        Ok(followups)
    }

    fn advise_node(&self, id: &str) -> Result<Vec<Followup>, EngineError> {
        let finished = self.store.get_node_execution(id)?;
        if finished.old_retry
            || finished.next_id.is_some()
            || finished.is_closed()
            || !finished.status.is_terminal()
        {
            return Ok(Vec::new());
        }
        if finished.status == Status::Aborted {
            return Ok(vec![Followup::EndBranch(finished.id)]);
        }

        let plan_execution = self.store.get_plan_execution(&finished.plan_execution_id)?;
        if plan_execution.end_ts.is_some() {
            return Ok(vec![Followup::EndBranch(finished.id)]);
        }
        let plan = self.store.get_plan(&plan_execution.plan_id)?;
        let node = plan.resolve(&finished.node_id)?;

        let Some(response) = advise(
            node,
            plan.next_of(&finished.node_id),
            &finished,
            self.config.retry.default_wait,
        ) else {
            tracing::debug!(node_execution_id = id, status = %finished.status, "no adviser applies");
            return Ok(vec![Followup::EndBranch(finished.id)]);
        };

        let kind = response.kind();
        let handler = self.handlers.get(kind).ok_or(EngineError::NoHandler(kind))?;
        tracing::debug!(node_execution_id = id, response = %kind, "adviser decided");
        let ctx = self.handler_ctx(&plan, &plan_execution);
        let directive = handler.handle(&ctx, &finished, &response)?;
        Ok(followups_for(&finished.id, directive))
    }
}

/// Translate a handler's directive into drive-loop work
pub(crate) fn followups_for(finished_id: &str, directive: Directive) -> Vec<Followup> {
    match directive {
        Directive::Run { node_execution_id } => vec![Followup::Start(node_execution_id)],
        Directive::EndBranch => vec![Followup::EndBranch(finished_id.to_string())],
        Directive::EndPlan => vec![Followup::EndPlan(finished_id.to_string())],
        Directive::Await { target_id } => vec![Followup::Interrupts(target_id)],
        Directive::Lost => Vec::new(),
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
