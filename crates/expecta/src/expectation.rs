//! Expectations: named conditions a test waits on

use crate::registry::{ExpectationRegistry, Shared};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of one test case execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub Uuid);

impl ContextId {
    /// Create a fresh random context id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

/// Position of an expectation in its registry's creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpectationId(pub(crate) usize);

impl ExpectationId {
    /// Zero-based creation index
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named condition that something must satisfy before a wait deadline.
///
/// Handles are cheap to clone and may be moved to any thread, timer or
/// callback. The fulfilled flag lives in the owning registry, guarded by
/// the same lock the wait engine sleeps on.
#[derive(Clone)]
pub struct Expectation {
    id: ExpectationId,
    owner: ContextId,
    description: Arc<str>,
    shared: Arc<Shared>,
}

impl Expectation {
    pub(crate) fn new(
        id: ExpectationId,
        owner: ContextId,
        description: Arc<str>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id,
            owner,
            description,
            shared,
        }
    }

    /// Creation-order id within the owning registry
    pub fn id(&self) -> ExpectationId {
        self.id
    }

    /// Context of the test case that created this expectation
    pub fn owner(&self) -> ContextId {
        self.owner
    }

    /// Description used in failure messages
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Mark the condition as met and wake any waiter.
    ///
    /// Returns `true` when this call changed the state. Fulfilling twice is
    /// a no-op, and so is fulfilling after the owning test case finished.
    pub fn fulfill(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.closed {
            tracing::debug!(
                expectation = %self.description,
                owner = %self.owner,
                "ignoring fulfillment after test case finished"
            );
            return false;
        }

        let entry = &mut state.entries[self.id.0];
        if entry.fulfilled {
            tracing::trace!(expectation = %self.description, "expectation already fulfilled");
            return false;
        }
        entry.fulfilled = true;
        drop(state);

        tracing::debug!(expectation = %self.description, "expectation fulfilled");
        self.shared.wakeup.notify_all();
        true
    }

    /// Run `predicate` and fulfill only if it reports success.
    ///
    /// This is the building block for helpers whose callback decides
    /// whether the observed event counts (a handler returning `false`
    /// leaves the expectation unfulfilled).
    pub fn fulfill_if(&self, predicate: impl FnOnce() -> bool) -> bool {
        if predicate() {
            self.fulfill()
        } else {
            tracing::debug!(expectation = %self.description, "handler declined fulfillment");
            false
        }
    }

    /// Whether this handle was created by `registry` itself, not merely by
    /// a registry with the same owner id
    pub(crate) fn is_member_of(&self, registry: &ExpectationRegistry) -> bool {
        Arc::ptr_eq(&self.shared, registry.shared())
    }

    /// Whether the condition has been met
    pub fn is_fulfilled(&self) -> bool {
        self.shared.state.lock().entries[self.id.0].fulfilled
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("description", &self.description)
            .field("fulfilled", &self.is_fulfilled())
            .finish()
    }
}

impl PartialEq for Expectation {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.id == other.id
    }
}

impl Eq for Expectation {}

#[cfg(test)]
mod tests {
    use crate::registry::ExpectationRegistry;
    use crate::ContextId;

    #[test]
    fn test_fulfill_is_monotonic() {
        let registry = ExpectationRegistry::new(ContextId::new(), "monotonic");
        let expectation = registry.create("callback invoked");

        assert!(!expectation.is_fulfilled());
        assert!(expectation.fulfill());
        assert!(expectation.is_fulfilled());
    }

    // Double fulfillment is tolerated rather than reported as misuse.
    #[test]
    fn test_double_fulfill_is_idempotent() {
        let registry = ExpectationRegistry::new(ContextId::new(), "idempotent");
        let expectation = registry.create("racing callbacks");

        assert!(expectation.fulfill());
        assert!(!expectation.fulfill());
        assert!(expectation.is_fulfilled());
    }

    #[test]
    fn test_fulfill_if_respects_handler() {
        let registry = ExpectationRegistry::new(ContextId::new(), "handler");
        let declined = registry.create("returnFalse");
        let accepted = registry.create("returnTrue");

        assert!(!declined.fulfill_if(|| false));
        assert!(!declined.is_fulfilled());

        assert!(accepted.fulfill_if(|| true));
        assert!(accepted.is_fulfilled());
    }

    #[test]
    fn test_fulfill_after_close_is_ignored() {
        let registry = ExpectationRegistry::new(ContextId::new(), "closed");
        let expectation = registry.create("late");
        registry.close();

        assert!(!expectation.fulfill());
        assert!(!expectation.is_fulfilled());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = ExpectationRegistry::new(ContextId::new(), "clones");
        let expectation = registry.create("shared");
        let clone = expectation.clone();

        std::thread::spawn(move || clone.fulfill()).join().unwrap();
        assert!(expectation.is_fulfilled());
    }
}
