// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Persistence for plans, executions and interrupts
//!
//! Every mutation of an execution record is a conditional update keyed on the
//! record's current status. [`WalStore`] keeps the materialized state in memory
//! and, when opened on a directory, logs each accepted operation to a
//! checksummed write-ahead log before applying it.

mod error;
mod state;
mod store;
mod wal;
mod wal_store;

pub use error::StoreError;
pub use state::MaterializedState;
pub use store::{
    ExecutionStore, InterruptStore, NodeExecutionFilter, NodeExecutionStore, ParentFilter,
    PlanExecutionFilter, PlanExecutionStore, PlanStore,
};
pub use wal::{Wal, WalEntry, WalError};
pub use wal_store::WalStore;
