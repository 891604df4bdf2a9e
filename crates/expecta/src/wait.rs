//! Wait engine
//!
//! Blocks the test thread until every expectation of a wait group is
//! fulfilled or the group's deadline passes. Fulfillers set flags under the
//! registry mutex and broadcast the registry condvar; the waiter re-checks
//! the whole group on each wakeup, so it returns as soon as the last member
//! is fulfilled and never sleeps past that point.

use crate::error::{ExpectaError, Result};
use crate::expectation::Expectation;
use crate::registry::ExpectationRegistry;
use std::time::{Duration, Instant};

/// Result of a completed wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Every member of the group was fulfilled before the deadline
    Completed,
    /// The deadline passed first
    TimedOut {
        /// Descriptions of the still unfulfilled members, in creation order
        unfulfilled: Vec<String>,
    },
    /// The owning test case aborted while the wait was blocking
    Interrupted {
        /// Descriptions of the still unfulfilled members, in creation order
        unfulfilled: Vec<String>,
    },
}

impl WaitOutcome {
    /// Whether the wait finished with every expectation fulfilled
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Members and deadline of one blocking wait call
#[derive(Debug)]
struct WaitGroup {
    members: Vec<usize>,
    deadline: Option<Instant>,
}

impl WaitGroup {
    fn new(expectations: &[Expectation], timeout: Duration) -> Self {
        let mut members: Vec<usize> = expectations.iter().map(|e| e.id().index()).collect();
        members.sort_unstable();
        members.dedup();
        Self {
            members,
            // Durations too large to represent as an instant never expire.
            deadline: Instant::now().checked_add(timeout),
        }
    }
}

/// Failure description for a wait that reached its deadline
pub fn timeout_description(timeout: Duration, unfulfilled: &[String]) -> String {
    format!(
        "Asynchronous wait failed - Exceeded timeout of {} seconds, with unfulfilled expectations: {}",
        timeout.as_secs_f64(),
        unfulfilled.join(", ")
    )
}

/// Block until every expectation in `expectations` is fulfilled or `timeout`
/// elapses.
///
/// All members must have been created by `registry`. Only one wait may
/// block on a registry at a time; a second concurrent wait is rejected with
/// [`ExpectaError::ReentrantWait`]. Every member is marked as waited for
/// before blocking, whatever the outcome. An abort of the owning test case
/// ends the wait early with [`WaitOutcome::Interrupted`].
pub fn wait(
    registry: &ExpectationRegistry,
    expectations: &[Expectation],
    timeout: Duration,
) -> Result<WaitOutcome> {
    if let Some(foreign) = expectations.iter().find(|e| !e.is_member_of(registry)) {
        return Err(ExpectaError::ForeignExpectation {
            description: foreign.description().to_string(),
            test: registry.test_name().to_string(),
        });
    }

    let group = WaitGroup::new(expectations, timeout);
    let shared = registry.shared();
    let mut state = shared.state.lock();

    if state.wait_in_progress {
        return Err(ExpectaError::ReentrantWait {
            test: registry.test_name().to_string(),
        });
    }
    state.wait_in_progress = true;
    for &index in &group.members {
        state.entries[index].waited = true;
    }

    tracing::debug!(
        test = %registry.test_name(),
        members = group.members.len(),
        timeout_ms = timeout.as_millis() as u64,
        "waiting for expectations"
    );

    loop {
        if group.members.iter().all(|&i| state.entries[i].fulfilled)
            || state.closed
            || state.aborted
        {
            break;
        }
        match group.deadline {
            Some(deadline) => {
                if shared.wakeup.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }
            None => shared.wakeup.wait(&mut state),
        }
    }

    let unfulfilled: Vec<String> = group
        .members
        .iter()
        .filter(|&&i| !state.entries[i].fulfilled)
        .map(|&i| state.entries[i].description.to_string())
        .collect();
    let aborted = state.aborted;
    state.wait_in_progress = false;
    drop(state);

    if unfulfilled.is_empty() {
        tracing::debug!(test = %registry.test_name(), "wait completed");
        Ok(WaitOutcome::Completed)
    } else if aborted {
        tracing::debug!(test = %registry.test_name(), "wait interrupted by abort");
        Ok(WaitOutcome::Interrupted { unfulfilled })
    } else {
        tracing::debug!(
            test = %registry.test_name(),
            unfulfilled = unfulfilled.len(),
            "wait timed out"
        );
        Ok(WaitOutcome::TimedOut { unfulfilled })
    }
}
