// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    queued_to_running = { Status::Queued, Status::Running, true },
    paused_to_running = { Status::Paused, Status::Running, true },
    running_to_running = { Status::Running, Status::Running, false },
    running_to_succeeded = { Status::Running, Status::Succeeded, true },
    paused_to_failed = { Status::Paused, Status::Failed, true },
    succeeded_to_failed = { Status::Succeeded, Status::Failed, false },
    aborted_to_succeeded = { Status::Aborted, Status::Succeeded, false },
    running_to_skipped = { Status::Running, Status::Skipped, false },
    queued_to_skipped = { Status::Queued, Status::Skipped, true },
    discontinuing_to_aborted = { Status::Discontinuing, Status::Aborted, true },
    discontinuing_to_succeeded = { Status::Discontinuing, Status::Succeeded, false },
    failed_to_ignore_failed = { Status::Failed, Status::IgnoreFailed, true },
    expired_to_ignore_failed = { Status::Expired, Status::IgnoreFailed, true },
    aborted_to_ignore_failed = { Status::Aborted, Status::IgnoreFailed, false },
    succeeded_to_queued = { Status::Succeeded, Status::Queued, false },
    succeeded_to_errored = { Status::Succeeded, Status::Errored, true },
    failed_to_errored = { Status::Failed, Status::Errored, true },
    aborted_to_errored = { Status::Aborted, Status::Errored, false },
)]
fn transition_table(from: Status, to: Status, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn terminal_statuses_never_return_to_active() {
    let active = [Status::Queued, Status::Running, Status::Paused, Status::Discontinuing];
    for from in Status::ALL.into_iter().filter(|s| s.is_terminal()) {
        for to in active {
            assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
        }
    }
}

#[test]
fn terminal_statuses_only_move_to_ignore_failed_or_errored() {
    for from in Status::ALL.into_iter().filter(|s| s.is_terminal()) {
        for to in Status::ALL {
            if !from.can_transition_to(to) {
                continue;
            }
            match to {
                Status::IgnoreFailed => assert!(from.is_broke(), "{from} -> {to}"),
                Status::Errored => assert_ne!(from, Status::Aborted),
                _ => panic!("{from} -> {to} must be rejected"),
            }
        }
    }
}

#[parameterized(
    succeeded = { Status::Succeeded, true, false },
    skipped = { Status::Skipped, true, false },
    ignore_failed = { Status::IgnoreFailed, true, false },
    failed = { Status::Failed, false, true },
    errored = { Status::Errored, false, true },
    expired = { Status::Expired, false, true },
    aborted = { Status::Aborted, false, false },
)]
fn status_classes(status: Status, positive: bool, broke: bool) {
    assert!(status.is_terminal());
    assert_eq!(status.is_positive(), positive);
    assert_eq!(status.is_broke(), broke);
}

#[test]
fn serializes_as_screaming_snake_case() {
    let json = serde_json::to_string(&Status::IgnoreFailed).unwrap();
    assert_eq!(json, "\"IGNORE_FAILED\"");
    assert_eq!(Status::IgnoreFailed.to_string(), "IGNORE_FAILED");
}
