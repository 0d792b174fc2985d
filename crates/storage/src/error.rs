// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error types

use crate::wal::WalError;
use thiserror::Error;
use weft_core::PlanError;

/// Errors returned by store operations
///
/// A lost conditional update is not an error; it is reported as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} already exists: {id}")]
    Duplicate { kind: &'static str, id: String },
    #[error("invalid plan: {0}")]
    Plan(#[from] PlanError),
    #[error("store unavailable: {0}")]
    Unavailable(#[from] WalError),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn duplicate(kind: &'static str, id: &str) -> Self {
        StoreError::Duplicate {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Infrastructure failures the caller should retry with backoff
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
