//! Current-test context
//!
//! Every test case execution gets a [`TestContext`]: the handle through
//! which expectations are created, waits are performed and failures are
//! recorded. The controller passes it to set-up, body and tear-down
//! explicitly, and also installs it in a thread-local slot for the
//! duration of `perform` so free-standing helpers ([`expectation`],
//! [`wait_for_expectations`], the `check!` family) can find it without
//! parameter threading.
//!
//! The slot is thread-local rather than process-global, so independent
//! test cases may run concurrently on different threads.

use crate::case::TestState;
use crate::config::CaseConfig;
use crate::error::{ExpectaError, Result};
use crate::expectation::{ContextId, Expectation};
use crate::location::SourceLocation;
use crate::registry::ExpectationRegistry;
use crate::run::{FailureKind, FailureRecord, TestRun};
use crate::wait::{self, WaitOutcome};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

thread_local! {
    static CURRENT_CONTEXT: RefCell<Option<TestContext>> = const { RefCell::new(None) };
}

const EMPTY_WAIT_VIOLATION: &str =
    "API violation - call made to wait without any expectations having been set.";
const ZERO_TIMEOUT_VIOLATION: &str = "API violation - wait timeout must be greater than zero.";

/// Unwind payload used to leave user code when abort-on-failure fires.
///
/// Raised with `resume_unwind`, so no panic hook output is produced, and
/// recognized by the controller's invocation boundary.
#[derive(Debug)]
pub(crate) struct AbortUnwind;

struct ContextInner {
    id: ContextId,
    name: Arc<str>,
    declared_at: SourceLocation,
    config: CaseConfig,
    registry: ExpectationRegistry,
    run: Mutex<TestRun>,
    state: Mutex<TestState>,
    test_thread: ThreadId,
    in_user_code: AtomicBool,
    abort_requested: AtomicBool,
    usage_violation: Mutex<Option<ExpectaError>>,
}

/// Handle to the execution context of one running test case
#[derive(Clone)]
pub struct TestContext {
    inner: Arc<ContextInner>,
}

impl TestContext {
    pub(crate) fn new(name: &str, declared_at: SourceLocation, config: CaseConfig) -> Self {
        let id = ContextId::new();
        let name: Arc<str> = Arc::from(name);
        Self {
            inner: Arc::new(ContextInner {
                id,
                registry: ExpectationRegistry::new(id, Arc::clone(&name)),
                run: Mutex::new(TestRun::new(name.as_ref())),
                name,
                declared_at,
                config,
                state: Mutex::new(TestState::Idle),
                test_thread: thread::current().id(),
                in_user_code: AtomicBool::new(false),
                abort_requested: AtomicBool::new(false),
                usage_violation: Mutex::new(None),
            }),
        }
    }

    /// Identity of this execution
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Name of the running test case
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Where the running test case was declared
    pub fn declared_at(&self) -> &SourceLocation {
        &self.inner.declared_at
    }

    /// Configuration the test case runs with
    pub fn config(&self) -> &CaseConfig {
        &self.inner.config
    }

    /// Timeout for waits that do not pick their own
    pub fn default_timeout(&self) -> Duration {
        self.inner.config.default_timeout()
    }

    /// Registry holding this test case's expectations
    pub fn registry(&self) -> &ExpectationRegistry {
        &self.inner.registry
    }

    /// Current lifecycle state of the test case
    pub fn state(&self) -> TestState {
        *self.inner.state.lock()
    }

    /// Snapshot of the run recorded so far
    pub fn run(&self) -> TestRun {
        self.inner.run.lock().clone()
    }

    /// Create an expectation owned by this test case
    pub fn expectation(&self, description: impl Into<String>) -> Expectation {
        self.inner.registry.create(description)
    }

    /// Block until every expectation in `expectations` is fulfilled or
    /// `timeout` elapses.
    ///
    /// A timeout is recorded as one failure attributed to the caller. Usage
    /// violations (a concurrent wait, an expectation from another test case)
    /// are returned as errors and abort the run once the test case returns.
    #[track_caller]
    pub fn wait(&self, expectations: &[Expectation], timeout: Duration) -> Result<WaitOutcome> {
        self.wait_at(expectations, timeout, SourceLocation::caller())
    }

    /// Wait on every expectation that no earlier wait covered
    #[track_caller]
    pub fn wait_for_expectations(&self, timeout: Duration) -> Result<WaitOutcome> {
        let outstanding = self.inner.registry.outstanding();
        self.wait_at(&outstanding, timeout, SourceLocation::caller())
    }

    /// [`wait`](Self::wait) with an explicit failure location
    pub fn wait_at(
        &self,
        expectations: &[Expectation],
        timeout: Duration,
        location: SourceLocation,
    ) -> Result<WaitOutcome> {
        if thread::current().id() != self.inner.test_thread {
            let err = ExpectaError::WaitOffTestThread {
                test: self.inner.name.to_string(),
            };
            self.flag_usage_violation(err.clone());
            return Err(err);
        }

        // A failure recorded on another thread could not unwind the test
        // thread; the abort takes effect here instead.
        self.unwind_if_aborting();

        if expectations.is_empty() {
            self.record(FailureRecord::new(
                FailureKind::ApiViolation,
                EMPTY_WAIT_VIOLATION,
                location,
            ));
            return Ok(WaitOutcome::Completed);
        }

        let zero_timeout = timeout.is_zero();
        if zero_timeout {
            self.record(FailureRecord::new(
                FailureKind::ApiViolation,
                ZERO_TIMEOUT_VIOLATION,
                location.clone(),
            ));
        }

        let outcome = match wait::wait(&self.inner.registry, expectations, timeout) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.flag_usage_violation(err.clone());
                return Err(err);
            }
        };
        self.unwind_if_aborting();

        if let WaitOutcome::TimedOut { unfulfilled } = &outcome {
            if !zero_timeout {
                self.record(FailureRecord::new(
                    FailureKind::ExpectationTimeout,
                    wait::timeout_description(timeout, unfulfilled),
                    location,
                ));
            }
        }
        Ok(outcome)
    }

    /// Record a failure at `location`.
    ///
    /// `expected = true` marks an assertion failure, `false` an uncaught
    /// error.
    pub fn record_failure(
        &self,
        description: impl Into<String>,
        location: SourceLocation,
        expected: bool,
    ) {
        let kind = if expected {
            FailureKind::Assertion
        } else {
            FailureKind::UncaughtError
        };
        self.record(FailureRecord::new(kind, description, location));
    }

    /// Single funnel for every failure of this test case.
    ///
    /// Appends to the run and applies the abort-on-failure policy. When the
    /// policy fires on the test thread while user set-up or body code is
    /// executing, this call does not return: control unwinds to the
    /// controller, which runs tear-down and reports the abort.
    pub fn record(&self, failure: FailureRecord) {
        tracing::warn!(
            test = %self.inner.name,
            kind = ?failure.kind,
            location = %failure.location,
            description = %failure.description,
            "test failure recorded"
        );

        let recorded = self.inner.run.lock().record(failure);
        if let Err(err) = recorded {
            tracing::error!(error = %err, "failure could not be recorded");
            return;
        }

        if self.inner.config.continue_after_failure {
            return;
        }
        self.inner.abort_requested.store(true, Ordering::SeqCst);
        if self.should_unwind() {
            std::panic::resume_unwind(Box::new(AbortUnwind));
        }
        self.interrupt_waits();
    }

    /// Whether abort-on-failure or a usage violation ended this test case
    pub fn abort_requested(&self) -> bool {
        self.inner.abort_requested.load(Ordering::SeqCst)
            || self.inner.usage_violation.lock().is_some()
    }

    /// Wake the test thread if it is blocked in a set-up or body wait.
    /// Tear-down waits are left alone so cleanup can still complete.
    fn interrupt_waits(&self) {
        if matches!(self.state(), TestState::SettingUp | TestState::Running) {
            self.inner.registry.abort();
        }
    }

    fn unwind_if_aborting(&self) {
        if self.abort_requested() && self.should_unwind() {
            std::panic::resume_unwind(Box::new(AbortUnwind));
        }
    }

    fn should_unwind(&self) -> bool {
        thread::current().id() == self.inner.test_thread
            && self.inner.in_user_code.load(Ordering::SeqCst)
            && matches!(self.state(), TestState::SettingUp | TestState::Running)
    }

    pub(crate) fn flag_usage_violation(&self, err: ExpectaError) {
        tracing::error!(test = %self.inner.name, error = %err, "framework usage violation");
        {
            let mut violation = self.inner.usage_violation.lock();
            if violation.is_none() {
                *violation = Some(err);
            }
        }
        self.interrupt_waits();
    }

    pub(crate) fn usage_violation(&self) -> Option<ExpectaError> {
        self.inner.usage_violation.lock().clone()
    }

    pub(crate) fn set_state(&self, state: TestState) {
        *self.inner.state.lock() = state;
        if state == TestState::TearingDown {
            self.inner.registry.resume();
        }
    }

    pub(crate) fn set_in_user_code(&self, active: bool) {
        self.inner.in_user_code.store(active, Ordering::SeqCst);
    }

    pub(crate) fn start_run(&self) -> Result<()> {
        self.inner.run.lock().start()
    }

    pub(crate) fn stop_run(&self) -> Result<()> {
        self.inner.run.lock().stop()
    }
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Restores the previously installed context when dropped
#[must_use]
pub(crate) struct ContextGuard {
    previous: Option<TestContext>,
}

/// Install `context` as the current test of this thread
pub(crate) fn install(context: TestContext) -> ContextGuard {
    let previous = CURRENT_CONTEXT.with(|current| current.borrow_mut().replace(context));
    ContextGuard { previous }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = CURRENT_CONTEXT.try_with(|current| {
            *current.borrow_mut() = previous;
        });
    }
}

/// The test case executing on this thread, if any
pub fn current() -> Option<TestContext> {
    CURRENT_CONTEXT.with(|current| current.borrow().clone())
}

/// Like [`current`], but reports a missing test as an error
pub fn try_current(operation: &str) -> Result<TestContext> {
    current().ok_or_else(|| {
        ExpectaError::no_active_test(format!("{operation} called outside of a running test case"))
    })
}

/// Create an expectation in the current test case
pub fn try_expectation(description: impl Into<String>) -> Result<Expectation> {
    Ok(try_current("expectation")?.expectation(description))
}

/// Create an expectation in the current test case.
///
/// # Panics
///
/// Panics when no test case is executing on this thread; creating an
/// expectation there is a programming error with no run to record into.
pub fn expectation(description: impl Into<String>) -> Expectation {
    match try_expectation(description) {
        Ok(expectation) => expectation,
        Err(err) => panic!("{err}"),
    }
}

/// Wait on `expectations` in the current test case
#[track_caller]
pub fn wait(expectations: &[Expectation], timeout: Duration) -> Result<WaitOutcome> {
    let location = SourceLocation::caller();
    try_current("wait")?.wait_at(expectations, timeout, location)
}

/// Wait on every not-yet-waited expectation of the current test case
#[track_caller]
pub fn wait_for_expectations(timeout: Duration) -> Result<WaitOutcome> {
    let location = SourceLocation::caller();
    let context = try_current("wait_for_expectations")?;
    let outstanding = context.registry().outstanding();
    context.wait_at(&outstanding, timeout, location)
}

/// Record a failure on the current test case
pub fn record_failure(
    description: impl Into<String>,
    location: SourceLocation,
    expected: bool,
) -> Result<()> {
    try_current("record_failure")?.record_failure(description, location, expected);
    Ok(())
}
