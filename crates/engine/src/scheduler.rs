// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer-based scheduling for delayed interrupts and periodic sweeps
//!
//! Timers are in-process hints only. Everything they trigger is derived from
//! persisted state, so a restart that loses the timers loses nothing that
//! reconciliation cannot rebuild.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;
use weft_core::clock::after;

/// Timer id of the periodic timeout sweep
pub const TIMEOUT_SWEEP: &str = "timeout-sweep";

/// A scheduled item
#[derive(Debug, Clone)]
pub struct ScheduledItem {
    pub id: String,
    pub fire_at: DateTime<Utc>,
    pub kind: ScheduledKind,
    pub repeat: Option<Duration>,
}

/// The kind of scheduled event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledKind {
    /// Process the interrupt queue of a target once its head is due
    Interrupts { target_id: String },
    /// Look for running steps past their timeout
    TimeoutSweep,
}

impl ScheduledKind {
    /// Timer id; one pending timer per id
    pub fn timer_id(&self) -> String {
        match self {
            ScheduledKind::Interrupts { target_id } => format!("interrupts:{target_id}"),
            ScheduledKind::TimeoutSweep => TIMEOUT_SWEEP.to_string(),
        }
    }
}

impl PartialEq for ScheduledItem {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.id == other.id
    }
}

impl Eq for ScheduledItem {}

impl PartialOrd for ScheduledItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap: earliest first
        Reverse(self.fire_at).cmp(&Reverse(other.fire_at))
    }
}

/// Manages scheduled events
///
/// Re-scheduling an id keeps whichever fire time is earlier; heap entries
/// superseded that way are skipped when they surface.
#[derive(Default)]
pub struct Scheduler {
    items: BinaryHeap<ScheduledItem>,
    /// Live fire time per id
    pending: HashMap<String, DateTime<Utc>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot timer
    pub fn schedule(&mut self, fire_at: DateTime<Utc>, kind: ScheduledKind) {
        self.push(kind.timer_id(), fire_at, kind, None);
    }

    /// Schedule a repeating timer
    ///
    /// A zero interval would fire again at the time it just fired, so it
    /// schedules a single firing instead.
    pub fn schedule_repeating(&mut self, fire_at: DateTime<Utc>, interval: Duration, kind: ScheduledKind) {
        if interval.is_zero() {
            tracing::warn!(timer_id = %kind.timer_id(), "zero repeat interval, firing once");
            self.schedule(fire_at, kind);
            return;
        }
        self.push(kind.timer_id(), fire_at, kind, Some(interval));
    }

    fn push(&mut self, id: String, fire_at: DateTime<Utc>, kind: ScheduledKind, repeat: Option<Duration>) {
        if self.pending.get(&id).is_some_and(|at| *at <= fire_at) {
            return;
        }
        self.pending.insert(id.clone(), fire_at);
        self.items.push(ScheduledItem {
            id,
            fire_at,
            kind,
            repeat,
        });
    }

    /// Cancel a scheduled item
    pub fn cancel(&mut self, id: &str) {
        self.pending.remove(id);
    }

    /// Get all items that should fire at or before the given time
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<ScheduledItem> {
        let mut ready = Vec::new();

        while let Some(item) = self.items.peek() {
            if item.fire_at > now {
                break;
            }

            let Some(item) = self.items.pop() else {
                break;
            };

            // Skip cancelled or superseded entries
            if self.pending.get(&item.id) != Some(&item.fire_at) {
                continue;
            }
            self.pending.remove(&item.id);

            // Re-schedule if repeating
            if let Some(interval) = item.repeat {
                self.push(
                    item.id.clone(),
                    after(item.fire_at, interval),
                    item.kind.clone(),
                    Some(interval),
                );
            }

            ready.push(item);
        }

        ready
    }

    /// Start the periodic timeout sweep
    pub fn init_defaults(&mut self, now: DateTime<Utc>, sweep_interval: Duration) {
        self.schedule_repeating(after(now, sweep_interval), sweep_interval, ScheduledKind::TimeoutSweep);
    }

    /// Check if scheduler has any pending items
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Get the next fire time, if any
    pub fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.pending.values().min().copied()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
