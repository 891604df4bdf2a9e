//! Test case controller
//!
//! A [`TestCase`] drives one execution through
//! `Idle -> SettingUp -> Running -> TearingDown -> Finished`. It brackets
//! the sequence with the run recorder, installs the current-test context,
//! converts errors and panics escaping user code into failure records, and
//! turns abort-on-failure into a [`FatalAbort`] returned to the driver
//! instead of terminating the process itself.

use crate::config::CaseConfig;
use crate::context::{self, AbortUnwind, TestContext};
use crate::error::ExpectaError;
use crate::location::SourceLocation;
use crate::run::{FailureKind, FailureRecord, TestRun};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// User code run by a test case: set-up, body or tear-down
pub type TestHook = Box<dyn FnOnce(&TestContext) -> anyhow::Result<()> + Send>;

/// Final verdict of a finished test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// No failure was recorded
    Passed,
    /// At least one failure was recorded
    Failed,
}

/// Lifecycle state of a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestState {
    /// Not yet performed
    Idle,
    /// Running the set-up hook
    SettingUp,
    /// Running the test body
    Running,
    /// Running the tear-down hook
    TearingDown,
    /// Execution completed
    Finished(Verdict),
}

/// Why a test case ended the whole run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    /// A failure was recorded while `continue_after_failure` was disabled
    #[error("failure recorded with continue_after_failure disabled")]
    FailureRecorded,
    /// The framework was used incorrectly
    #[error("framework usage violation: {0}")]
    UsageViolation(ExpectaError),
}

/// Control-flow signal telling the driver to stop running test cases.
///
/// Returned instead of a plain [`TestRun`] when abort-on-failure fires or
/// the framework detects a usage violation. Tear-down has already run.
#[derive(Debug, thiserror::Error)]
#[error("test case '{}' aborted the run: {reason}", .run.name())]
pub struct FatalAbort {
    /// What triggered the abort
    pub reason: AbortReason,
    /// The aborted test case's run, stopped and complete
    pub run: TestRun,
}

enum Invocation {
    Completed,
    Failed,
    Aborted,
}

/// A named unit of test logic with optional set-up and tear-down
pub struct TestCase {
    name: String,
    declared_at: SourceLocation,
    config: CaseConfig,
    set_up: Option<TestHook>,
    body: Option<TestHook>,
    tear_down: Option<TestHook>,
    state: TestState,
    last_run: Option<TestRun>,
}

impl TestCase {
    /// Declare a test case. Failures without a more precise location are
    /// attributed to the caller of this constructor.
    #[track_caller]
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(&TestContext) -> anyhow::Result<()> + Send + 'static,
    {
        Self::new_at(name, SourceLocation::caller(), body)
    }

    /// Declare a test case at an explicit source location
    pub fn new_at<F>(name: impl Into<String>, declared_at: SourceLocation, body: F) -> Self
    where
        F: FnOnce(&TestContext) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            declared_at,
            config: CaseConfig::default(),
            set_up: None,
            body: Some(Box::new(body)),
            tear_down: None,
            state: TestState::Idle,
            last_run: None,
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: CaseConfig) -> Self {
        self.config = config;
        self
    }

    /// Toggle the abort-on-failure policy
    pub fn continue_after_failure(mut self, enabled: bool) -> Self {
        self.config.continue_after_failure = enabled;
        self
    }

    /// Run `hook` before the body
    pub fn set_up<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&TestContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.set_up = Some(Box::new(hook));
        self
    }

    /// Run `hook` after the body, whatever its outcome
    pub fn tear_down<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&TestContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.tear_down = Some(Box::new(hook));
        self
    }

    /// Test case name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the case will run with
    pub fn config(&self) -> &CaseConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> TestState {
        self.state
    }

    /// Perform the test case and return its recorded run.
    ///
    /// `Err(FatalAbort)` means the driver must not run any further test
    /// case. A test case can be performed once; later calls report an
    /// [`ExpectaError::AlreadyPerformed`] usage violation carrying the run
    /// recorded by the first call.
    pub fn run(&mut self) -> Result<TestRun, FatalAbort> {
        if self.state != TestState::Idle {
            return Err(FatalAbort {
                reason: AbortReason::UsageViolation(ExpectaError::AlreadyPerformed {
                    test: self.name.clone(),
                }),
                run: self
                    .last_run
                    .clone()
                    .unwrap_or_else(|| TestRun::new(&self.name)),
            });
        }

        let span = tracing::info_span!("test_case", name = %self.name);
        let _entered = span.enter();

        let ctx = TestContext::new(&self.name, self.declared_at.clone(), self.config.clone());
        if let Err(err) = ctx.start_run() {
            tracing::error!(error = %err, "test run could not start");
        }
        let guard = context::install(ctx.clone());
        tracing::info!("test case started");

        self.transition(&ctx, TestState::SettingUp);
        let set_up = match self.set_up.take() {
            Some(hook) => self.invoke(&ctx, hook),
            None => Invocation::Completed,
        };

        if matches!(set_up, Invocation::Completed) && !ctx.abort_requested() {
            self.transition(&ctx, TestState::Running);
            if let Some(body) = self.body.take() {
                self.invoke(&ctx, body);
            }
        }

        self.transition(&ctx, TestState::TearingDown);
        if let Some(hook) = self.tear_down.take() {
            self.invoke(&ctx, hook);
        }

        // An interrupted body leaves its expectations unwaited by construction.
        if !ctx.abort_requested() {
            let unwaited = ctx.registry().unwaited();
            if !unwaited.is_empty() {
                ctx.record(FailureRecord::new(
                    FailureKind::UnwaitedExpectations,
                    format!(
                        "API violation - test case returned without waiting for expectations: {}",
                        unwaited.join(", ")
                    ),
                    self.declared_at.clone(),
                ));
            }
        }

        ctx.registry().close();
        if let Err(err) = ctx.stop_run() {
            tracing::error!(error = %err, "test run could not stop");
        }
        drop(guard);

        let run = ctx.run();
        let verdict = if run.has_succeeded() {
            Verdict::Passed
        } else {
            Verdict::Failed
        };
        self.transition(&ctx, TestState::Finished(verdict));
        self.last_run = Some(run.clone());
        tracing::info!(
            ?verdict,
            failures = run.failure_count(),
            duration_ms = run.total_duration().as_millis() as u64,
            "test case finished"
        );

        if let Some(violation) = ctx.usage_violation() {
            tracing::error!(error = %violation, "aborting run after usage violation");
            return Err(FatalAbort {
                reason: AbortReason::UsageViolation(violation),
                run,
            });
        }
        if ctx.abort_requested() {
            tracing::error!("aborting run after test failure");
            return Err(FatalAbort {
                reason: AbortReason::FailureRecorded,
                run,
            });
        }
        Ok(run)
    }

    fn transition(&mut self, ctx: &TestContext, state: TestState) {
        tracing::trace!(from = ?self.state, to = ?state, "test case state change");
        self.state = state;
        ctx.set_state(state);
    }

    /// Run user code inside the failure boundary
    fn invoke(&self, ctx: &TestContext, hook: TestHook) -> Invocation {
        ctx.set_in_user_code(true);
        let result = catch_unwind(AssertUnwindSafe(|| hook(ctx)));
        ctx.set_in_user_code(false);

        match result {
            Ok(Ok(())) => Invocation::Completed,
            Ok(Err(err))
                if err
                    .downcast_ref::<ExpectaError>()
                    .is_some_and(ExpectaError::is_usage_violation) =>
            {
                // Reported as an abort, not as a test failure.
                if let Some(violation) = err.downcast_ref::<ExpectaError>() {
                    ctx.flag_usage_violation(violation.clone());
                }
                Invocation::Failed
            }
            Ok(Err(err)) => {
                ctx.record(FailureRecord::new(
                    FailureKind::UncaughtError,
                    format!("{err:#}"),
                    self.declared_at.clone(),
                ));
                Invocation::Failed
            }
            Err(payload) if payload.is::<AbortUnwind>() => Invocation::Aborted,
            Err(payload) => {
                ctx.record(FailureRecord::new(
                    FailureKind::UncaughtError,
                    format!("panicked: {}", panic_message(payload.as_ref())),
                    self.declared_at.clone(),
                ));
                Invocation::Failed
            }
        }
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("declared_at", &self.declared_at)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
