// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::target::{all, fst, one, opt};

const P: Target = Target::Param("p");
const P1: Target = Target::Param("p1");
const A: Target = Target::UserTarget("a");
const B: Target = Target::Checkpoint("b");
const C: Target = Target::Checkpoint("c");
const X: Target = Target::Service("x");
const S1: Target = Target::Service("s1");
const S2: Target = Target::Service("s2");

fn leaf() -> Clause {
    Clause::All(Vec::new())
}

#[test]
fn construction_rejects_wrong_kinds() {
    let rules = RuleBook::new(vec![]).unwrap();
    let err = Workflow::new(rules, [X], [A], []).unwrap_err();
    assert_eq!(err, WorkflowError::NotAParam(X));

    let rules = RuleBook::new(vec![]).unwrap();
    let err = Workflow::new(rules, [P], [X], []).unwrap_err();
    assert_eq!(err, WorkflowError::NotAUserTarget(X));

    let rules = RuleBook::new(vec![]).unwrap();
    let err = Workflow::new(rules, [P], [A], [P1]).unwrap_err();
    assert_eq!(err, WorkflowError::NotExcludable(P1));
}

#[test]
fn diamond_with_one() {
    // a = ALL(b, c); b = ONE(p, x); c = x; param p provided
    let rules = RuleBook::new(vec![
        (A, all([Clause::from(B), Clause::from(C)])),
        (B, one([Clause::from(P), Clause::from(X)])),
        (C, Clause::from(X)),
        (X, leaf()),
    ])
    .unwrap();
    let mut w = Workflow::new(rules, [P], [A], []).unwrap();
    // b is satisfied by p; c still needs x
    assert_eq!(w.list_runnable(), &[X]);
    assert_eq!(w.status(), Status::Runnable);

    w.mark_completed(X).unwrap();
    assert_eq!(w.status(), Status::Completed);
    assert_eq!(w.list_completed(), vec![X]);
}

#[test]
fn fst_short_circuits_left_to_right() {
    // a = FST(p1, s1, s2); p1 not provided
    let rules = RuleBook::new(vec![
        (A, fst([Clause::from(P1), Clause::from(S1), Clause::from(S2)])),
        (S1, leaf()),
        (S2, leaf()),
    ])
    .unwrap();
    let mut w = Workflow::new(rules, [], [A], []).unwrap();
    assert_eq!(w.list_runnable(), &[S1]);

    w.mark_failed(S1).unwrap();
    assert_eq!(w.list_runnable(), &[S2]);

    w.mark_failed(S2).unwrap();
    assert_eq!(w.status(), Status::Failed);
    assert!(w.list_runnable().is_empty());
}

#[test]
fn opt_absorbs_failure() {
    // a = ALL(OPT(s1), s2)
    let rules = RuleBook::new(vec![
        (A, all([opt(S1), Clause::from(S2)])),
        (S1, leaf()),
        (S2, leaf()),
    ])
    .unwrap();
    let mut w = Workflow::new(rules, [], [A], []).unwrap();
    assert_eq!(w.list_runnable(), &[S1, S2]);

    w.mark_failed(S1).unwrap();
    w.mark_completed(S2).unwrap();
    assert_eq!(w.status(), Status::Completed);
    assert_eq!(w.list_failed(), vec![S1]);
}

#[test]
fn excludes_count_as_failed_from_the_start() {
    let rules = RuleBook::new(vec![
        (A, all([opt(S1), Clause::from(S2)])),
        (S1, leaf()),
        (S2, leaf()),
    ])
    .unwrap();
    let mut w = Workflow::new(rules, [], [A], [S1]).unwrap();
    assert_eq!(w.list_runnable(), &[S2]);
    assert_eq!(w.list_failed(), vec![S1]);
    w.mark_completed(S2).unwrap();
    assert_eq!(w.status(), Status::Completed);
}

#[test]
fn excluding_the_goal_fails_immediately() {
    let rules = RuleBook::new(vec![(A, Clause::from(S1)), (S1, leaf())]).unwrap();
    let w = Workflow::new(rules, [], [A], [S1]).unwrap();
    assert_eq!(w.status(), Status::Failed);
}

#[test]
fn started_service_leaves_runnable_list() {
    let rules = RuleBook::new(vec![
        (A, all([Clause::from(S1), Clause::from(S2)])),
        (S1, leaf()),
        (S2, leaf()),
    ])
    .unwrap();
    let mut w = Workflow::new(rules, [], [A], []).unwrap();
    assert_eq!(w.list_runnable(), &[S1, S2]);

    w.mark_started(S1).unwrap();
    assert_eq!(w.list_runnable(), &[S2]);
    assert_eq!(w.list_started(), vec![S1]);
    assert_eq!(w.status(), Status::Runnable);

    w.mark_started(S2).unwrap();
    assert!(w.list_runnable().is_empty());
    assert_eq!(w.status(), Status::Waiting);
}

#[test]
fn mark_started_is_idempotent() {
    let rules = RuleBook::new(vec![(A, Clause::from(S1)), (S1, leaf())]).unwrap();
    let mut w = Workflow::new(rules, [], [A], []).unwrap();
    w.mark_started(S1).unwrap();
    w.mark_started(S1).unwrap();
    assert_eq!(w.list_started(), vec![S1]);
}

#[test]
fn mark_started_on_unknown_service_errors() {
    let rules = RuleBook::new(vec![(A, Clause::from(S1)), (S1, leaf())]).unwrap();
    let mut w = Workflow::new(rules, [], [A], []).unwrap();
    assert_eq!(w.mark_started(S2), Err(WorkflowError::NotRunnable(S2)));
}

#[test]
fn mark_completed_requires_runnable_or_started() {
    let rules = RuleBook::new(vec![(A, Clause::from(S1)), (S1, leaf())]).unwrap();
    let mut w = Workflow::new(rules, [], [A], []).unwrap();
    assert_eq!(w.mark_completed(S2), Err(WorkflowError::NotActive(S2)));
    // completing an already completed service is also an error
    w.mark_completed(S1).unwrap();
    assert_eq!(w.mark_completed(S1), Err(WorkflowError::NotActive(S1)));
}

#[test]
fn mark_completed_accepts_runnable_without_start() {
    let rules = RuleBook::new(vec![(A, Clause::from(S1)), (S1, leaf())]).unwrap();
    let mut w = Workflow::new(rules, [], [A], []).unwrap();
    w.mark_completed(S1).unwrap();
    assert_eq!(w.status(), Status::Completed);
}

#[test]
fn state_sets_stay_disjoint() {
    let rules = RuleBook::new(vec![
        (A, all([Clause::from(S1), opt(S2)])),
        (S1, leaf()),
        (S2, leaf()),
    ])
    .unwrap();
    let mut w = Workflow::new(rules, [], [A], []).unwrap();
    w.mark_started(S1).unwrap();
    w.mark_started(S2).unwrap();
    w.mark_completed(S1).unwrap();
    w.mark_failed(S2).unwrap();

    let started = w.list_started();
    let completed = w.list_completed();
    let failed = w.list_failed();
    assert!(started.iter().all(|s| !completed.contains(s) && !failed.contains(s)));
    assert!(completed.iter().all(|s| !failed.contains(s)));
    assert_eq!(completed, vec![S1]);
    assert_eq!(failed, vec![S2]);
}

#[test]
fn completed_service_is_never_rerunnable() {
    let rules = RuleBook::new(vec![(A, Clause::from(S1)), (S1, leaf())]).unwrap();
    let mut w = Workflow::new(rules, [], [A], []).unwrap();
    w.mark_completed(S1).unwrap();
    assert!(w.list_runnable().is_empty());
    assert_eq!(w.mark_started(S1), Err(WorkflowError::NotRunnable(S1)));
}

#[test]
fn draining_runnables_terminates() {
    // diamond book: repeatedly completing every runnable reaches COMPLETED
    let rules = RuleBook::new(vec![
        (A, all([Clause::from(B), Clause::from(C), Clause::from(S2)])),
        (B, one([Clause::from(P), Clause::from(X)])),
        (C, Clause::from(X)),
        (X, leaf()),
        (S1, leaf()),
        (S2, Clause::from(S1)),
    ])
    .unwrap();
    let mut w = Workflow::new(rules, [], [A], []).unwrap();
    let mut rounds = 0;
    while w.status() == Status::Runnable {
        rounds += 1;
        assert!(rounds < 10, "workflow did not terminate");
        for service in w.list_runnable().to_vec() {
            w.mark_completed(service).unwrap();
        }
    }
    assert_eq!(w.status(), Status::Completed);
}

#[yare::parameterized(
    runnable  = { Status::Runnable, "RUNNABLE" },
    waiting   = { Status::Waiting, "WAITING" },
    completed = { Status::Completed, "COMPLETED" },
    failed    = { Status::Failed, "FAILED" },
)]
fn status_display_matches_wire_values(status: Status, expected: &str) {
    assert_eq!(status.to_string(), expected);
}
