//! Test case lifecycle, failure aggregation and abort policy

use expecta::{
    AbortReason, ExpectaError, FailureKind, SourceLocation, TestCase, TestState, Verdict,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_millis(100);

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (count.clone(), count)
}

#[test]
fn test_unwaited_expectation_is_one_failure() {
    let mut case = TestCase::new("unwaited", |ctx| {
        let _first = ctx.expectation("first");
        let _second = ctx.expectation("second");
        Ok(())
    })
    .continue_after_failure(true);

    let run = case.run().unwrap();
    assert_eq!(run.failure_count(), 1);
    assert_eq!(run.failures_of(FailureKind::ExpectationTimeout).count(), 0);

    let failure = &run.failures()[0];
    assert_eq!(failure.kind, FailureKind::UnwaitedExpectations);
    assert_eq!(
        failure.description,
        "API violation - test case returned without waiting for expectations: first, second"
    );
    assert!(failure.location.file.ends_with("lifecycle.rs"));
}

#[test]
fn test_unwaited_expectation_aborts_by_default() {
    let (tear_downs, counted) = counter();
    let mut case = TestCase::new("unwaited abort", |ctx| {
        let _pending = ctx.expectation("pending");
        Ok(())
    })
    .tear_down(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let abort = case.run().unwrap_err();
    assert_eq!(abort.reason, AbortReason::FailureRecorded);
    assert_eq!(abort.run.failure_count(), 1);
    assert_eq!(tear_downs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_abort_runs_tear_down_exactly_once() {
    let (tear_downs, counted) = counter();
    let (after_wait, reached) = counter();

    let mut case = TestCase::new("abort on timeout", move |ctx| {
        let never = ctx.expectation("never fulfilled");
        ctx.wait(&[never], TIMEOUT)?;
        reached.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .tear_down(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let abort = case.run().unwrap_err();
    assert_eq!(abort.reason, AbortReason::FailureRecorded);
    assert_eq!(tear_downs.load(Ordering::SeqCst), 1);
    assert_eq!(after_wait.load(Ordering::SeqCst), 0);
    assert_eq!(abort.run.failure_count(), 1);
    assert_eq!(
        abort.run.failures()[0].kind,
        FailureKind::ExpectationTimeout
    );
    assert_eq!(case.state(), TestState::Finished(Verdict::Failed));
    assert!(abort.run.stopped_at().is_some());
}

#[test]
fn test_abort_during_set_up_skips_body() {
    let (bodies, ran) = counter();
    let (tear_downs, counted) = counter();

    let mut case = TestCase::new("set up abort", move |_| {
        ran.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .set_up(|ctx| {
        ctx.record_failure("fixture broken", SourceLocation::caller(), true);
        Ok(())
    })
    .tear_down(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(case.run().is_err());
    assert_eq!(bodies.load(Ordering::SeqCst), 0);
    assert_eq!(tear_downs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failure_in_tear_down_does_not_rerun_it() {
    let (tear_downs, counted) = counter();
    let mut case = TestCase::new("tear down fails", |_| Ok(())).tear_down(move |ctx| {
        counted.fetch_add(1, Ordering::SeqCst);
        ctx.record_failure("cleanup leaked", SourceLocation::caller(), true);
        ctx.record_failure("cleanup leaked twice", SourceLocation::caller(), true);
        Ok(())
    });

    let abort = case.run().unwrap_err();
    assert_eq!(tear_downs.load(Ordering::SeqCst), 1);
    assert_eq!(abort.run.failure_count(), 2);
}

#[test]
fn test_worker_failure_interrupts_blocked_wait() {
    let (after_wait, reached) = counter();
    let (tear_downs, counted) = counter();

    let mut case = TestCase::new("worker fails during wait", move |ctx| {
        let done = ctx.expectation("done");
        let fulfiller = done.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(2));
            fulfiller.fulfill();
        });
        let worker = ctx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            worker.record_failure("worker failed", SourceLocation::caller(), true);
        });

        ctx.wait(&[done], Duration::from_secs(5))?;
        reached.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .tear_down(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let started = Instant::now();
    let abort = case.run().unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(abort.reason, AbortReason::FailureRecorded);
    assert_eq!(after_wait.load(Ordering::SeqCst), 0);
    assert_eq!(tear_downs.load(Ordering::SeqCst), 1);
    assert_eq!(abort.run.failure_count(), 1);
    assert_eq!(abort.run.failures()[0].description, "worker failed");
}

#[test]
fn test_tear_down_wait_still_blocks_after_abort() {
    let mut case = TestCase::new("cleanup waits", |ctx| {
        ctx.record_failure("body failed", SourceLocation::caller(), true);
        Ok(())
    })
    .tear_down(|ctx| {
        let closed = ctx.expectation("connection closed");
        let fulfiller = closed.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            fulfiller.fulfill();
        });
        let outcome = ctx.wait(&[closed], Duration::from_secs(10))?;
        assert!(outcome.is_completed());
        Ok(())
    });

    let abort = case.run().unwrap_err();
    assert_eq!(abort.run.failure_count(), 1);
}

#[test]
fn test_wait_from_worker_thread_aborts() {
    let mut case = TestCase::new("worker waits", |ctx| {
        let pending = ctx.expectation("pending");
        let worker = ctx.clone();
        let result = thread::spawn(move || worker.wait(&[pending], TIMEOUT))
            .join()
            .expect("worker thread");
        assert!(result.is_err());
        Ok(())
    })
    .continue_after_failure(true);

    let abort = case.run().unwrap_err();
    assert!(matches!(
        abort.reason,
        AbortReason::UsageViolation(ExpectaError::WaitOffTestThread { .. })
    ));
    assert_eq!(abort.run.failure_count(), 0);
}

#[test]
fn test_continue_after_failure_accumulates() {
    let (tear_downs, counted) = counter();
    let mut case = TestCase::new("accumulate", |ctx| {
        ctx.record_failure("first", SourceLocation::caller(), true);
        let never = ctx.expectation("never");
        ctx.wait(&[never], TIMEOUT)?;
        ctx.record_failure("third", SourceLocation::caller(), true);
        anyhow::bail!("fourth")
    })
    .continue_after_failure(true)
    .tear_down(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let run = case.run().unwrap();
    let kinds: Vec<FailureKind> = run.failures().iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![
            FailureKind::Assertion,
            FailureKind::ExpectationTimeout,
            FailureKind::Assertion,
            FailureKind::UncaughtError,
        ]
    );
    assert_eq!(run.unexpected_failure_count(), 1);
    assert_eq!(tear_downs.load(Ordering::SeqCst), 1);
}

// A handler that returns false declines the event, so the expectation stays
// unfulfilled and the wait times out.
#[test]
fn test_scenario_handler_returning_false_times_out() {
    let mut case = TestCase::new("returnFalse", |ctx| {
        let expectation = ctx.expectation("Expect notification 'returnFalse' from any object");
        let callback = expectation.clone();
        thread::spawn(move || callback.fulfill_if(|| false))
            .join()
            .expect("callback thread");

        ctx.wait(&[expectation], TIMEOUT)?;
        Ok(())
    })
    .continue_after_failure(true);

    let run = case.run().unwrap();
    assert_eq!(run.failure_count(), 1);
    assert_eq!(
        run.failures()[0].description,
        "Asynchronous wait failed - Exceeded timeout of 0.1 seconds, with unfulfilled expectations: Expect notification 'returnFalse' from any object"
    );
}

#[test]
fn test_scenario_handler_returning_true_succeeds() {
    let mut case = TestCase::new("returnTrue", |ctx| {
        let expectation = ctx.expectation("Expect notification 'returnTrue' from any object");
        let callback = expectation.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            callback.fulfill_if(|| true)
        });

        ctx.wait(&[expectation], TIMEOUT)?;
        Ok(())
    });

    let run = case.run().unwrap();
    assert!(run.has_succeeded());
    assert_eq!(run.failure_count(), 0);
}

#[test]
fn test_scenario_fulfillment_after_timeout_has_no_effect() {
    let mut case = TestCase::new("note", |ctx| {
        let note = ctx.expectation("Expect notification 'note' from any object");

        let outcome = ctx.wait(&[note.clone()], TIMEOUT)?;
        assert!(!outcome.is_completed());

        // The wait already returned; fulfilling now changes nothing about it.
        assert!(note.fulfill());
        assert_eq!(ctx.run().failure_count(), 1);
        Ok(())
    })
    .continue_after_failure(true);

    let run = case.run().unwrap();
    assert_eq!(run.failure_count(), 1);
    assert_eq!(run.failures()[0].kind, FailureKind::ExpectationTimeout);
}

#[test]
fn test_concurrent_cases_on_separate_threads() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || {
                let mut case = TestCase::new(format!("parallel {i}"), move |ctx| {
                    let e = ctx.expectation(format!("worker {i}"));
                    let fulfiller = e.clone();
                    thread::spawn(move || fulfiller.fulfill());
                    ctx.wait(&[e], Duration::from_secs(10))?;
                    assert_eq!(expecta::current().map(|c| c.id()), Some(ctx.id()));
                    Ok(())
                });
                case.run()
            })
        })
        .collect();

    for handle in handles {
        let run = handle.join().unwrap().unwrap();
        assert!(run.has_succeeded());
    }
}
