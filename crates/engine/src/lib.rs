// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-engine: drives plan executions
//!
//! The [`Engine`] starts nodes, records worker results, consults advisers,
//! processes interrupts and concludes groups and plans. All coordination
//! goes through conditional updates on an [`weft_storage::ExecutionStore`],
//! so several engines may share one store.

mod branch;
mod engine;
mod error;
pub mod handlers;
mod identity;
mod interrupts;
mod recovery;
mod scheduler;
mod spawn;

#[cfg(test)]
mod testing;

pub use engine::{Engine, EngineDeps, FinishOutcome};
pub use error::EngineError;
pub use handlers::{Directive, HandlerCtx, HandlerRegistry, ResponseHandler};
pub use recovery::ReconcileReport;
pub use scheduler::{ScheduledItem, ScheduledKind, Scheduler};
