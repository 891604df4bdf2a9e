//! Test run recorder
//!
//! A [`TestRun`] brackets one test case invocation with start and stop
//! timestamps and accumulates the failures recorded in between. The
//! controller owns it while the case executes; a reporting layer reads it
//! afterwards.

use crate::error::{ExpectaError, Result};
use crate::location::SourceLocation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Origin of a failure record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An explicit check failed
    Assertion,
    /// The body returned an error or panicked
    UncaughtError,
    /// A wait reached its deadline with unfulfilled expectations
    ExpectationTimeout,
    /// The test returned without waiting on every expectation it created
    UnwaitedExpectations,
    /// The wait API was called with arguments it cannot honor
    ApiViolation,
}

impl FailureKind {
    /// Whether failures of this kind were anticipated by the test author
    pub fn is_expected(self) -> bool {
        !matches!(self, Self::UncaughtError)
    }
}

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Where the failure is attributed
    pub location: SourceLocation,
    /// Human readable description
    pub description: String,
    /// `true` for assertion and expectation failures, `false` for uncaught errors
    pub expected: bool,
    /// What produced the failure
    pub kind: FailureKind,
}

impl FailureRecord {
    /// Create a record whose `expected` flag follows from its kind
    pub fn new(kind: FailureKind, description: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            location,
            description: description.into(),
            expected: kind.is_expected(),
            kind,
        }
    }
}

/// Recorded outcome of a single test case execution
#[derive(Debug, Clone, Serialize)]
pub struct TestRun {
    name: String,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    start_instant: Option<Instant>,
    #[serde(skip)]
    stop_instant: Option<Instant>,
    failures: Vec<FailureRecord>,
}

impl TestRun {
    /// Create an unstarted run for the named test case
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started_at: None,
            stopped_at: None,
            start_instant: None,
            stop_instant: None,
            failures: Vec::new(),
        }
    }

    /// Name of the test case this run belongs to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mark the run as started. Allowed exactly once.
    pub fn start(&mut self) -> Result<()> {
        if self.start_instant.is_some() {
            return Err(ExpectaError::run_not_active(&self.name, "already started"));
        }
        self.started_at = Some(Utc::now());
        self.start_instant = Some(Instant::now());
        Ok(())
    }

    /// Mark the run as stopped. Requires a prior `start`; allowed exactly once.
    pub fn stop(&mut self) -> Result<()> {
        if self.start_instant.is_none() {
            return Err(ExpectaError::run_not_active(&self.name, "stopped before start"));
        }
        if self.stop_instant.is_some() {
            return Err(ExpectaError::run_not_active(&self.name, "already stopped"));
        }
        self.stopped_at = Some(Utc::now());
        self.stop_instant = Some(Instant::now());
        Ok(())
    }

    /// Whether failures are currently accepted
    pub fn is_recording(&self) -> bool {
        self.start_instant.is_some() && self.stop_instant.is_none()
    }

    /// Append a failure. Only valid between `start` and `stop`.
    pub fn record(&mut self, failure: FailureRecord) -> Result<()> {
        if !self.is_recording() {
            return Err(ExpectaError::run_not_active(
                &self.name,
                format!("failure '{}' arrived outside of the run", failure.description),
            ));
        }
        self.failures.push(failure);
        Ok(())
    }

    /// Wall-clock start time
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Wall-clock stop time
    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.stopped_at
    }

    /// Time between start and stop, or since start while still running
    pub fn total_duration(&self) -> Duration {
        match (self.start_instant, self.stop_instant) {
            (Some(start), Some(stop)) => stop.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Failures in the order they were recorded
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Number of recorded failures
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Number of failures caused by uncaught errors rather than checks
    pub fn unexpected_failure_count(&self) -> usize {
        self.failures.iter().filter(|f| !f.expected).count()
    }

    /// Failures of one kind, in recording order
    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &FailureRecord> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }

    /// A run succeeds when it recorded no failure
    pub fn has_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}
