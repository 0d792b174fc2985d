// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::execution::{Ambiance, NodeType};
use chrono::{TimeZone, Utc};
use yare::parameterized;

const DEFAULT_WAIT: Duration = Duration::from_secs(7);

fn finished(status: Status, prior_attempts: usize) -> NodeExecution {
    let mut e = NodeExecution::new(
        "exec-9",
        "pe-1",
        "deploy",
        NodeType::Plan,
        Ambiance::default(),
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    );
    e.status = status;
    e.retry_ids = (0..prior_attempts).map(|i| format!("exec-{i}")).collect();
    e
}

fn node(advisers: Vec<AdviserConfig>) -> PlanNode {
    let mut n = PlanNode::step("deploy", "HELM").with_next("verify");
    n.advisers = advisers;
    n
}

#[test]
fn success_without_advisers_follows_static_next() {
    let response = advise(&node(vec![]), Some("verify"), &finished(Status::Succeeded, 0), DEFAULT_WAIT);
    assert_eq!(
        response,
        Some(AdviserResponse::NextStep {
            next_node_id: Some("verify".to_string())
        })
    );
}

#[test]
fn failure_without_advisers_ends_branch() {
    assert_eq!(
        advise(&node(vec![]), Some("verify"), &finished(Status::Failed, 0), DEFAULT_WAIT),
        None
    );
}

#[test]
fn aborted_is_never_advised() {
    let n = node(vec![AdviserConfig::new(AdviserSpec::EndPlan)]);
    assert_eq!(advise(&n, None, &finished(Status::Aborted, 0), DEFAULT_WAIT), None);
}

#[parameterized(
    first_attempt = { 0, Some(Duration::from_secs(1)) },
    second_attempt = { 1, Some(Duration::from_secs(5)) },
    third_attempt_reuses_last_wait = { 2, Some(Duration::from_secs(5)) },
    exhausted = { 3, None },
)]
fn retry_counts_prior_attempts(prior: usize, expected_wait: Option<Duration>) {
    let n = node(vec![AdviserConfig::retry(
        3,
        vec![Duration::from_secs(1), Duration::from_secs(5)],
    )]);
    let response = advise(&n, Some("verify"), &finished(Status::Failed, prior), DEFAULT_WAIT);
    assert_eq!(response, expected_wait.map(|wait| AdviserResponse::Retry { wait }));
}

#[test]
fn retry_without_waits_uses_default() {
    let n = node(vec![AdviserConfig::retry(1, vec![])]);
    assert_eq!(
        advise(&n, None, &finished(Status::Errored, 0), DEFAULT_WAIT),
        Some(AdviserResponse::Retry { wait: DEFAULT_WAIT })
    );
}

#[test]
fn exhausted_retry_falls_through_to_next_adviser() {
    let n = node(vec![
        AdviserConfig::retry(1, vec![]),
        AdviserConfig::mark_as_failure(Some("notify")),
    ]);
    assert_eq!(
        advise(&n, Some("verify"), &finished(Status::Failed, 1), DEFAULT_WAIT),
        Some(AdviserResponse::MarkAsFailure {
            next_node_id: Some("notify".to_string())
        })
    );
}

#[test]
fn first_matching_adviser_wins() {
    let n = node(vec![
        AdviserConfig::new(AdviserSpec::ProceedWithDefault).on(&[Status::Expired]),
        AdviserConfig::new(AdviserSpec::EndPlan),
    ]);
    assert_eq!(
        advise(&n, None, &finished(Status::Expired, 0), DEFAULT_WAIT),
        Some(AdviserResponse::ProceedWithDefault)
    );
    assert_eq!(
        advise(&n, None, &finished(Status::Failed, 0), DEFAULT_WAIT),
        Some(AdviserResponse::EndPlan)
    );
}

#[test]
fn explicit_trigger_list_overrides_default() {
    let n = node(vec![AdviserConfig::next_step(Some("cleanup")).on(&[Status::Failed])]);
    assert_eq!(
        advise(&n, Some("verify"), &finished(Status::Failed, 0), DEFAULT_WAIT),
        Some(AdviserResponse::NextStep {
            next_node_id: Some("cleanup".to_string())
        })
    );
}

#[test]
fn mark_as_failure_defaults_to_static_next() {
    let n = node(vec![AdviserConfig::mark_as_failure(None)]);
    assert_eq!(
        advise(&n, Some("verify"), &finished(Status::Failed, 0), DEFAULT_WAIT),
        Some(AdviserResponse::MarkAsFailure {
            next_node_id: Some("verify".to_string())
        })
    );
}

#[test]
fn adviser_config_parses_from_toml() {
    let text = r#"
        type = "retry"
        on = ["FAILED", "EXPIRED"]
        max_attempts = 2
        waits = ["10s", "1m"]
    "#;
    let config: AdviserConfig = toml::from_str(text).unwrap();
    assert_eq!(config.on, vec![Status::Failed, Status::Expired]);
    assert_eq!(
        config.spec,
        AdviserSpec::Retry {
            max_attempts: 2,
            waits: vec![Duration::from_secs(10), Duration::from_secs(60)],
        }
    );
}

#[test]
fn response_kind_matches_variant() {
    assert_eq!(AdviserResponse::EndPlan.kind(), AdviserKind::EndPlan);
    assert_eq!(
        AdviserResponse::Retry { wait: Duration::ZERO }.kind().to_string(),
        "RETRY"
    );
}
