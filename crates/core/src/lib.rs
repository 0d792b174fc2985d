// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-core: domain model for the weft pipeline orchestration engine
//!
//! This crate provides:
//! - Plan graphs with identity aliasing
//! - Plan and node execution records with conditional partial updates
//! - The status transition table and aggregate status calculator
//! - Adviser configuration and decision logic
//! - Interrupts, orchestration events and the event bus
//! - WAL operations and engine configuration

pub mod adviser;
pub mod calculator;
pub mod clock;
pub mod config;
pub mod event;
pub mod events;
pub mod execution;
pub mod id;
pub mod interrupt;
pub mod operation;
pub mod plan;
pub mod status;
pub mod traced;

pub use adviser::{advise, AdviserConfig, AdviserKind, AdviserResponse, AdviserSpec};
pub use calculator::{calculate, calculate_excluding, calculate_statuses, plan_status};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use event::{OrchestrationEvent, OrchestrationEventType};
pub use events::{EventBus, EventPattern, EventReceiver, Subscription};
pub use execution::{
    Ambiance, ExecutionMetadata, ExecutionMode, FailureInfo, Level, NodeExecution,
    NodeExecutionUpdate, NodeType, PlanExecution, PlanExecutionUpdate, StepResult,
    UpdateRejected,
};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use interrupt::{
    Interrupt, InterruptKind, InterruptOutcome, InterruptPackage, Issuer, OutcomeState,
};
pub use operation::Operation;
pub use plan::{IdentityPlanNode, Node, NodeKind, Plan, PlanError, PlanNode};
pub use status::{allowed_predecessors, Status};
pub use traced::TracedOperation;
