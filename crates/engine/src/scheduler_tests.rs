// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use weft_core::{Clock, FakeClock};

fn interrupts(target: &str) -> ScheduledKind {
    ScheduledKind::Interrupts {
        target_id: target.to_string(),
    }
}

#[test]
fn scheduler_fires_items_at_correct_time() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    let now = clock.now();
    scheduler.schedule(after(now, Duration::from_secs(10)), interrupts("exec-1"));
    scheduler.schedule(after(now, Duration::from_secs(5)), interrupts("exec-2"));

    // Nothing ready yet
    assert!(scheduler.poll(now).is_empty());

    // Advance 5 seconds - exec-2 should be ready
    clock.advance(Duration::from_secs(5));
    let ready = scheduler.poll(clock.now());
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].kind, interrupts("exec-2"));

    // Advance 5 more seconds - exec-1 should be ready
    clock.advance(Duration::from_secs(5));
    let ready = scheduler.poll(clock.now());
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, "interrupts:exec-1");
    assert!(scheduler.is_empty());
}

#[test]
fn rescheduling_keeps_the_earlier_time() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();
    let now = clock.now();

    scheduler.schedule(after(now, Duration::from_secs(30)), interrupts("exec-1"));
    scheduler.schedule(after(now, Duration::from_secs(10)), interrupts("exec-1"));
    scheduler.schedule(after(now, Duration::from_secs(20)), interrupts("exec-1"));
    assert_eq!(scheduler.next_fire_time(), Some(after(now, Duration::from_secs(10))));

    clock.advance(Duration::from_secs(40));
    let ready = scheduler.poll(clock.now());
    assert_eq!(ready.len(), 1, "superseded entries must not fire");
}

#[test]
fn scheduler_repeating_timers_reschedule() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();
    scheduler.init_defaults(clock.now(), Duration::from_secs(10));

    clock.advance(Duration::from_secs(10));
    let ready = scheduler.poll(clock.now());
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].kind, ScheduledKind::TimeoutSweep);
    assert!(!scheduler.is_empty());

    clock.advance(Duration::from_secs(10));
    assert_eq!(scheduler.poll(clock.now()).len(), 1);
}

#[test]
fn zero_interval_fires_once() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();
    scheduler.init_defaults(clock.now(), Duration::ZERO);

    let ready = scheduler.poll(clock.now());
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].repeat, None);
    assert!(scheduler.is_empty());

    clock.advance(Duration::from_secs(60));
    assert!(scheduler.poll(clock.now()).is_empty());
}

#[test]
fn scheduler_cancel_prevents_firing() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.schedule(after(clock.now(), Duration::from_secs(10)), interrupts("exec-1"));
    scheduler.cancel("interrupts:exec-1");

    clock.advance(Duration::from_secs(15));
    assert!(scheduler.poll(clock.now()).is_empty());
    assert!(scheduler.next_fire_time().is_none());
}

#[test]
fn scheduler_multiple_items_fire_in_order() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    let now = clock.now();
    scheduler.schedule(after(now, Duration::from_secs(30)), interrupts("a"));
    scheduler.schedule(after(now, Duration::from_secs(10)), interrupts("b"));
    scheduler.schedule(after(now, Duration::from_secs(20)), interrupts("c"));

    clock.advance(Duration::from_secs(35));
    let ids: Vec<String> = scheduler.poll(clock.now()).into_iter().map(|i| i.id).collect();
    assert_eq!(ids, vec!["interrupts:b", "interrupts:c", "interrupts:a"]);
}

#[test]
fn scheduler_cancel_repeating_stops_future_fires() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();
    scheduler.init_defaults(clock.now(), Duration::from_secs(10));

    clock.advance(Duration::from_secs(10));
    assert_eq!(scheduler.poll(clock.now()).len(), 1);

    scheduler.cancel(TIMEOUT_SWEEP);

    clock.advance(Duration::from_secs(10));
    assert!(scheduler.poll(clock.now()).is_empty());
}

proptest! {
    #[test]
    fn each_target_fires_once_at_its_earliest_time(
        timers in proptest::collection::vec((0u8..4, 1u64..120), 1..16),
        poll_at in 0u64..150,
    ) {
        let start = FakeClock::new().now();
        let mut scheduler = Scheduler::new();
        let mut earliest: HashMap<String, DateTime<Utc>> = HashMap::new();
        for (target, secs) in &timers {
            let kind = interrupts(&format!("exec-{target}"));
            let fire_at = after(start, Duration::from_secs(*secs));
            let slot = earliest.entry(kind.timer_id()).or_insert(fire_at);
            *slot = (*slot).min(fire_at);
            scheduler.schedule(fire_at, kind);
        }

        let now = after(start, Duration::from_secs(poll_at));
        let ready = scheduler.poll(now);
        let mut seen = std::collections::HashSet::new();
        for item in &ready {
            prop_assert!(item.fire_at <= now);
            prop_assert_eq!(Some(&item.fire_at), earliest.get(&item.id));
            prop_assert!(seen.insert(item.id.clone()));
        }
        let expected = earliest.values().filter(|at| **at <= now).count();
        prop_assert_eq!(ready.len(), expected);
    }
}
