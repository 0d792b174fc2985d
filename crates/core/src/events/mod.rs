// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus for orchestration listeners
//!
//! This module provides:
//! - `EventBus` - Route events to matching subscribers using patterns
//! - `EventPattern` - Pattern matching for event subscriptions

mod bus;
mod subscription;

pub use bus::{EventBus, EventReceiver, EventSender};
pub use subscription::{EventPattern, SubscriberId, Subscription};
