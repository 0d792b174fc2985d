// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine unit tests

use crate::engine::{Engine, EngineDeps, FinishOutcome};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use weft_adapters::FakeDispatcher;
use weft_core::{
    EngineConfig, EventBus, EventReceiver, ExecutionMetadata, FakeClock, NodeExecution,
    OrchestrationEvent, Plan, PlanExecution, PlanNode, SequentialIdGen, Status, StepResult,
};
use weft_storage::{
    ExecutionStore, NodeExecutionFilter, NodeExecutionStore, PlanExecutionStore, PlanStore,
    WalStore,
};

pub(crate) type TestEngine = Engine<WalStore, FakeDispatcher, FakeClock, SequentialIdGen>;

pub(crate) const PLAN_ID: &str = "plan-1";

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

/// a -> b -> c, all SHELL steps
pub(crate) fn linear_plan() -> Plan {
    Plan::new(PLAN_ID, "a", t0())
        .with_node(PlanNode::step("a", "SHELL").with_next("b"))
        .with_node(PlanNode::step("b", "SHELL").with_next("c"))
        .with_node(PlanNode::step("c", "SHELL"))
}

pub(crate) struct Harness {
    pub engine: TestEngine,
    pub store: Arc<WalStore>,
    pub dispatcher: FakeDispatcher,
    pub clock: FakeClock,
    pub audit: EventReceiver,
}

impl Harness {
    pub fn new(plan: Plan) -> Self {
        Self::with_config(plan, EngineConfig::default())
    }

    pub fn with_config(plan: Plan, config: EngineConfig) -> Self {
        let store = Arc::new(WalStore::in_memory());
        store.save_plan(plan).unwrap();
        let events = EventBus::new();
        let audit = events.set_audit_sink();
        let dispatcher = FakeDispatcher::new();
        let clock = FakeClock::new();
        let engine = Engine::new(
            EngineDeps {
                store: Arc::clone(&store),
                dispatcher: dispatcher.clone(),
                events,
                clock: clock.clone(),
                ids: SequentialIdGen::new("id"),
            },
            config,
        );
        Self {
            engine,
            store,
            dispatcher,
            clock,
            audit,
        }
    }

    pub async fn start(&self) -> PlanExecution {
        self.engine
            .start_plan_execution(PLAN_ID, BTreeMap::new(), ExecutionMetadata::default())
            .await
            .unwrap()
    }

    /// Latest current attempt of `node_id`
    pub fn exec(&self, plan_execution_id: &str, node_id: &str) -> NodeExecution {
        self.store
            .find_node_executions(
                &NodeExecutionFilter::for_plan_execution(plan_execution_id).for_node(node_id),
            )
            .unwrap()
            .pop()
            .unwrap_or_else(|| panic!("no execution of {node_id}"))
    }

    pub fn executions(&self, plan_execution_id: &str) -> Vec<NodeExecution> {
        self.store
            .find_node_executions(
                &NodeExecutionFilter::for_plan_execution(plan_execution_id).with_old_retries(),
            )
            .unwrap()
    }

    pub async fn finish(
        &self,
        plan_execution_id: &str,
        node_id: &str,
        result: StepResult,
    ) -> FinishOutcome {
        let id = self.exec(plan_execution_id, node_id).id;
        self.engine.on_node_finish(&id, result).await.unwrap()
    }

    pub fn plan_status(&self, plan_execution_id: &str) -> Status {
        self.store
            .get_plan_execution(plan_execution_id)
            .unwrap()
            .status
    }

    pub fn store(&self) -> &dyn ExecutionStore {
        self.store.as_ref()
    }

    /// Drain status updates published so far
    pub fn status_updates(&mut self) -> Vec<OrchestrationEvent> {
        let mut found = Vec::new();
        while let Ok(event) = self.audit.try_recv() {
            if event.is_status_update() {
                found.push(event);
            }
        }
        found
    }
}
