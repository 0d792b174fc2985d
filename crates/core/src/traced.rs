// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing infrastructure for persisted operations

/// Trait for operations that should be traced
///
/// Provides consistent naming and structured fields for logging.
pub trait TracedOperation {
    /// Operation name for log spans (e.g., "node_execution_update")
    fn name(&self) -> &'static str;

    /// Key-value pairs for structured logging
    fn fields(&self) -> Vec<(&'static str, String)>;
}
