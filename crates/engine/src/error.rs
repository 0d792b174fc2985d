// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the orchestration engine

use thiserror::Error;
use weft_core::{AdviserKind, PlanError, Status};
use weft_storage::StoreError;

/// Errors that can occur while driving executions
///
/// Only [`EngineError::is_transient`] errors reach the hosting service from
/// inside a drive; everything else ends the affected branch.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid plan graph: {0}")]
    InvalidGraph(#[from] PlanError),
    #[error("{status} is not a completion status for {node_execution_id}")]
    InvalidResult {
        node_execution_id: String,
        status: Status,
    },
    #[error("no handler registered for {0}")]
    NoHandler(AdviserKind),
    #[error("{handler} handler received a {response} response")]
    HandlerMismatch {
        handler: AdviserKind,
        response: AdviserKind,
    },
    #[error("ambiance does not name a node execution")]
    MissingNodeExecution,
}

impl EngineError {
    /// Infrastructure faults the host should retry with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Store(e) if e.is_unavailable())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::Store(e) if e.is_not_found())
    }
}
