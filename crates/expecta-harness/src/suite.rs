//! Suite driver
//!
//! Runs test cases in declaration order and stops at the first
//! [`FatalAbort`]. Whether an abort ends the process is the caller's
//! decision; [`exit_on_abort`] implements the conventional policy.

use expecta::{CaseConfig, FatalAbort, SourceLocation, TestCase, TestContext, TestRun};

/// Result of running a suite
#[derive(Debug)]
pub enum SuiteOutcome {
    /// Every test case was performed
    Completed(Vec<TestRun>),
    /// A test case aborted the run; later cases were not performed
    Aborted {
        /// Runs of the cases performed before the aborting one
        completed: Vec<TestRun>,
        /// Abort raised by the last performed case
        abort: FatalAbort,
    },
}

impl SuiteOutcome {
    /// Every recorded run, including the aborted one
    pub fn runs(&self) -> Vec<&TestRun> {
        match self {
            Self::Completed(runs) => runs.iter().collect(),
            Self::Aborted { completed, abort } => {
                completed.iter().chain(std::iter::once(&abort.run)).collect()
            }
        }
    }

    /// Whether every performed case passed and none aborted
    pub fn has_succeeded(&self) -> bool {
        match self {
            Self::Completed(runs) => runs.iter().all(TestRun::has_succeeded),
            Self::Aborted { .. } => false,
        }
    }
}

/// An ordered collection of test cases sharing default configuration
#[derive(Debug)]
pub struct Suite {
    name: String,
    defaults: CaseConfig,
    cases: Vec<TestCase>,
}

impl Suite {
    /// Create an empty suite with default case configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_defaults(name, CaseConfig::default())
    }

    /// Create an empty suite whose cases start from `defaults`
    pub fn with_defaults(name: impl Into<String>, defaults: CaseConfig) -> Self {
        Self {
            name: name.into(),
            defaults,
            cases: Vec::new(),
        }
    }

    /// Suite name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared test cases
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Whether the suite has no test cases
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Declare a test case using the suite defaults
    #[track_caller]
    pub fn test<F>(&mut self, name: impl Into<String>, body: F) -> &mut Self
    where
        F: FnOnce(&TestContext) -> anyhow::Result<()> + Send + 'static,
    {
        let case = TestCase::new_at(name, SourceLocation::caller(), body)
            .with_config(self.defaults.clone());
        self.cases.push(case);
        self
    }

    /// Add a fully configured test case
    pub fn add(&mut self, case: TestCase) -> &mut Self {
        self.cases.push(case);
        self
    }

    /// Perform every test case in order, stopping at the first abort
    pub fn run(self) -> SuiteOutcome {
        let span = tracing::info_span!("suite", name = %self.name);
        let _entered = span.enter();
        tracing::info!(cases = self.cases.len(), "suite started");

        let mut completed = Vec::with_capacity(self.cases.len());
        for mut case in self.cases {
            match case.run() {
                Ok(run) => completed.push(run),
                Err(abort) => {
                    tracing::error!(
                        case = case.name(),
                        performed = completed.len() + 1,
                        "suite aborted"
                    );
                    return SuiteOutcome::Aborted { completed, abort };
                }
            }
        }

        let failed = completed.iter().filter(|r| !r.has_succeeded()).count();
        tracing::info!(performed = completed.len(), failed, "suite finished");
        SuiteOutcome::Completed(completed)
    }
}

/// Return the runs of a completed suite, or end the process with status 1
/// when a test case aborted it
pub fn exit_on_abort(outcome: SuiteOutcome) -> Vec<TestRun> {
    match outcome {
        SuiteOutcome::Completed(runs) => runs,
        SuiteOutcome::Aborted { abort, .. } => {
            tracing::error!(error = %abort, "terminating after fatal abort");
            eprintln!("{abort}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_apply_to_declared_cases() {
        let defaults = CaseConfig {
            continue_after_failure: true,
            default_timeout_ms: 20,
        };
        let mut suite = Suite::with_defaults("defaults", defaults);
        suite.test("uses default timeout", |ctx| {
            assert_eq!(ctx.default_timeout(), Duration::from_millis(20));
            let never = ctx.expectation("never");
            ctx.wait(&[never], ctx.default_timeout())?;
            Ok(())
        });

        match suite.run() {
            SuiteOutcome::Completed(runs) => {
                assert_eq!(runs.len(), 1);
                assert_eq!(runs[0].failure_count(), 1);
            }
            SuiteOutcome::Aborted { abort, .. } => panic!("unexpected abort: {abort}"),
        }
    }

    #[test]
    fn test_declared_location_is_suite_caller() {
        let mut suite = Suite::new("locations");
        suite.test("unwaited", |ctx| {
            let _pending = ctx.expectation("pending");
            Ok(())
        });

        let outcome = suite.run();
        let runs = outcome.runs();
        assert!(runs[0].failures()[0].location.file.ends_with("suite.rs"));
        assert!(!outcome.has_succeeded());
    }
}
