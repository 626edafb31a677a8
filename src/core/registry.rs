/*!
 * Handle Registry
 * Maps event-loop handle ids back to their owning notification objects
 *
 * The dispatch thread only ever sees opaque handle ids; this table is the
 * sole bridge from an id back to the object whose callbacks must run. The
 * mapping is established before a handle can receive events and removed
 * exactly once, by whichever of close acknowledgment or finalization runs
 * first for that handle.
 */

use crate::notify::state::NotifyState;
use ahash::RandomState;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Opaque event-loop handle identifier
///
/// `0` is the null sentinel meaning "no native resource"; live ids start at
/// 1 and are never reused over the life of a reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub(crate) u64);

impl HandleId {
    /// The null sentinel
    pub const NULL: HandleId = HandleId(0);

    /// Check whether this is the null sentinel
    #[inline]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub(crate) fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Table mapping live handle ids to their notification objects
///
/// Holds weak references so the registry never keeps an object alive by
/// itself: once every strong owner (wrapper clones, callback-loop threads,
/// blocked waiters) is gone, finalization may proceed and a concurrent
/// dispatch simply fails to resolve the id.
pub(crate) struct HandleTable {
    entries: DashMap<HandleId, Weak<NotifyState>, RandomState>,
}

impl HandleTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Record the id -> object mapping
    ///
    /// Associating a live id twice is a programming defect.
    pub(crate) fn associate(&self, id: HandleId, state: &Arc<NotifyState>) {
        let prev = self.entries.insert(id, Arc::downgrade(state));
        debug_assert!(prev.is_none(), "handle {id} associated twice");
    }

    /// Remove the mapping; must be called exactly once per live id
    pub(crate) fn disassociate(&self, id: HandleId) {
        let removed = self.entries.remove(&id);
        debug_assert!(removed.is_some(), "handle {id} disassociated twice");
    }

    /// Resolve an id to its object, if it is still reachable
    ///
    /// `None` means the object is already being finalized; the event is
    /// dropped on the floor.
    pub(crate) fn resolve(&self, id: HandleId) -> Option<Arc<NotifyState>> {
        self.entries.get(&id).and_then(|weak| weak.upgrade())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::state::NotifyState;
    use crate::reactor::Reactor;

    #[test]
    fn test_null_sentinel() {
        assert!(HandleId::NULL.is_null());
        assert!(!HandleId(1).is_null());
        assert_eq!(HandleId::NULL.raw(), 0);
    }

    #[test]
    fn test_associate_resolve_disassociate() {
        let reactor = Reactor::new().unwrap();
        let table = HandleTable::new();
        let state = NotifyState::new(reactor.clone());

        let id = HandleId(7);
        table.associate(id, &state);
        let resolved = table.resolve(id).expect("live handle must resolve");
        assert!(Arc::ptr_eq(&resolved, &state));

        table.disassociate(id);
        assert!(table.resolve(id).is_none());
        reactor.shutdown();
    }

    #[test]
    fn test_resolve_after_finalization() {
        let reactor = Reactor::new().unwrap();
        let table = HandleTable::new();
        let state = NotifyState::new(reactor.clone());

        let id = HandleId(9);
        table.associate(id, &state);
        drop(state);

        // The weak reference is dead; the event must be dropped, not dispatched.
        assert!(table.resolve(id).is_none());
        table.disassociate(id);
        reactor.shutdown();
    }
}
