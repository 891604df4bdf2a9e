//! Per-test-case expectation registry
//!
//! The registry owns every expectation a test case creates, in creation
//! order. Its mutex guards the fulfilled/waited flags of all of them and
//! the wait-in-progress marker; its condvar is what the wait engine
//! sleeps on. Keeping both behind one lock rules out lost wakeups between
//! a fulfiller setting a flag and a waiter checking it.

use crate::expectation::{ContextId, Expectation, ExpectationId};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) description: Arc<str>,
    pub(crate) fulfilled: bool,
    pub(crate) waited: bool,
}

#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    pub(crate) entries: Vec<Entry>,
    pub(crate) wait_in_progress: bool,
    pub(crate) closed: bool,
    pub(crate) aborted: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) state: Mutex<RegistryState>,
    pub(crate) wakeup: Condvar,
}

/// Ordered collection of the expectations created by one test case
#[derive(Debug, Clone)]
pub struct ExpectationRegistry {
    owner: ContextId,
    test_name: Arc<str>,
    shared: Arc<Shared>,
}

impl ExpectationRegistry {
    /// Create an empty registry for the given context
    pub fn new(owner: ContextId, test_name: impl Into<Arc<str>>) -> Self {
        Self {
            owner,
            test_name: test_name.into(),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Context this registry belongs to
    pub fn owner(&self) -> ContextId {
        self.owner
    }

    /// Name of the owning test case
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Register a new, unfulfilled expectation
    pub fn create(&self, description: impl Into<String>) -> Expectation {
        let description: Arc<str> = Arc::from(description.into());
        let mut state = self.shared.state.lock();
        let id = ExpectationId(state.entries.len());
        state.entries.push(Entry {
            description: Arc::clone(&description),
            fulfilled: false,
            waited: false,
        });
        drop(state);

        tracing::debug!(
            test = %self.test_name,
            expectation = %description,
            index = id.index(),
            "expectation created"
        );
        Expectation::new(id, self.owner, description, Arc::clone(&self.shared))
    }

    /// Number of expectations created so far
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Whether no expectation was created
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expectations not yet included in any wait, in creation order
    pub fn outstanding(&self) -> Vec<Expectation> {
        let state = self.shared.state.lock();
        state
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.waited)
            .map(|(index, entry)| {
                Expectation::new(
                    ExpectationId(index),
                    self.owner,
                    Arc::clone(&entry.description),
                    Arc::clone(&self.shared),
                )
            })
            .collect()
    }

    /// Descriptions of expectations never included in a wait, in creation order
    pub fn unwaited(&self) -> Vec<String> {
        let state = self.shared.state.lock();
        state
            .entries
            .iter()
            .filter(|entry| !entry.waited)
            .map(|entry| entry.description.to_string())
            .collect()
    }

    /// Descriptions of unfulfilled expectations, in creation order
    pub fn unfulfilled(&self) -> Vec<String> {
        let state = self.shared.state.lock();
        state
            .entries
            .iter()
            .filter(|entry| !entry.fulfilled)
            .map(|entry| entry.description.to_string())
            .collect()
    }

    /// Tear the registry down. Later fulfillments are ignored.
    pub fn close(&self) {
        self.shared.state.lock().closed = true;
        self.shared.wakeup.notify_all();
    }

    /// Whether the owning test case has finished
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Interrupt any blocking wait because the test case is aborting.
    pub(crate) fn abort(&self) {
        self.shared.state.lock().aborted = true;
        self.shared.wakeup.notify_all();
    }

    /// Let waits block again, once the interrupted code has been left.
    pub(crate) fn resume(&self) {
        self.shared.state.lock().aborted = false;
    }

    /// Whether an abort interrupted this registry's waits
    pub fn is_aborted(&self) -> bool {
        self.shared.state.lock().aborted
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}
