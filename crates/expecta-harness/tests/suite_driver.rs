//! Suite ordering and abort propagation

use expecta::{AbortReason, FailureKind, TestCase};
use expecta_harness::{Suite, SuiteOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_abort_stops_later_cases() {
    let performed = Arc::new(AtomicUsize::new(0));
    let mut suite = Suite::new("abort");

    let first = performed.clone();
    suite.test("passes", move |_| {
        first.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let second = performed.clone();
    suite.test("times out", move |ctx| {
        second.fetch_add(1, Ordering::SeqCst);
        let never = ctx.expectation("never fulfilled");
        ctx.wait(&[never], Duration::from_millis(20))?;
        Ok(())
    });
    let third = performed.clone();
    suite.test("never runs", move |_| {
        third.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    match suite.run() {
        SuiteOutcome::Aborted { completed, abort } => {
            assert_eq!(completed.len(), 1);
            assert!(completed[0].has_succeeded());
            assert_eq!(abort.reason, AbortReason::FailureRecorded);
            assert_eq!(abort.run.name(), "times out");
            assert_eq!(
                abort.run.failures()[0].kind,
                FailureKind::ExpectationTimeout
            );
        }
        SuiteOutcome::Completed(_) => panic!("suite should have aborted"),
    }
    assert_eq!(performed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_continue_after_failure_runs_every_case() {
    let mut suite = Suite::new("continue");
    suite.add(
        TestCase::new("fails", |_| anyhow::bail!("boom")).continue_after_failure(true),
    );
    suite.test("passes", |ctx| {
        let ready = ctx.expectation("ready");
        ready.fulfill();
        ctx.wait(&[ready], Duration::from_millis(20))?;
        Ok(())
    });

    let outcome = suite.run();
    assert!(!outcome.has_succeeded());
    match outcome {
        SuiteOutcome::Completed(runs) => {
            assert_eq!(runs.len(), 2);
            assert_eq!(runs[0].unexpected_failure_count(), 1);
            assert!(runs[1].has_succeeded());
        }
        SuiteOutcome::Aborted { abort, .. } => panic!("unexpected abort: {abort}"),
    }
}

#[test]
fn test_usage_violation_aborts_suite() {
    let mut suite = Suite::new("violation");
    suite.test("expectation without a context", |_| {
        std::thread::spawn(|| expecta::try_expectation("off the test thread"))
            .join()
            .expect("thread")?;
        Ok(())
    });
    suite.test("never runs", |_| Ok(()));

    match suite.run() {
        SuiteOutcome::Aborted { completed, abort } => {
            assert!(completed.is_empty());
            assert!(matches!(abort.reason, AbortReason::UsageViolation(_)));
        }
        SuiteOutcome::Completed(_) => panic!("suite should have aborted"),
    }
}
