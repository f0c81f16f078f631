//! Owner-scoped reentrancy guard.
//!
//! At most one guard per owner exists at a time; owners never contend with
//! each other.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

/// Set of owners with an aggregation run in flight.
#[derive(Clone, Default)]
pub struct OwnerLocks {
    active: Arc<Mutex<HashSet<Uuid>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the owner, or `None` if a run already holds it.
    pub fn try_acquire(&self, owner_id: Uuid) -> Option<OwnerGuard> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(owner_id) {
            return None;
        }
        Some(OwnerGuard {
            owner_id,
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_held(&self, owner_id: Uuid) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&owner_id)
    }
}

/// Releases the owner on drop, including on early return or panic.
pub struct OwnerGuard {
    owner_id: Uuid,
    active: Arc<Mutex<HashSet<Uuid>>>,
}

impl OwnerGuard {
    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.owner_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_for_same_owner_fails() {
        let locks = OwnerLocks::new();
        let owner = Uuid::new_v4();

        let guard = locks.try_acquire(owner);
        assert!(guard.is_some());
        assert!(locks.try_acquire(owner).is_none());
    }

    #[test]
    fn different_owners_proceed_independently() {
        let locks = OwnerLocks::new();
        let a = locks.try_acquire(Uuid::new_v4());
        let b = locks.try_acquire(Uuid::new_v4());
        assert!(a.is_some());
        assert!(b.is_some());
    }

    #[test]
    fn dropping_guard_releases_owner() {
        let locks = OwnerLocks::new();
        let owner = Uuid::new_v4();

        {
            let guard = locks.try_acquire(owner).unwrap();
            assert_eq!(guard.owner_id(), owner);
            assert!(locks.is_held(owner));
        }

        assert!(!locks.is_held(owner));
        assert!(locks.try_acquire(owner).is_some());
    }

    #[test]
    fn clones_share_state() {
        let locks = OwnerLocks::new();
        let other = locks.clone();
        let owner = Uuid::new_v4();

        let _guard = locks.try_acquire(owner).unwrap();
        assert!(other.try_acquire(owner).is_none());
    }

    #[test]
    fn guard_survives_across_tasks() {
        let locks = OwnerLocks::new();
        let owner = Uuid::new_v4();

        tokio_test::block_on(async {
            let guard = locks.try_acquire(owner).unwrap();
            let handle = {
                let locks = locks.clone();
                async move { locks.try_acquire(owner).is_none() }
            };
            assert!(handle.await);
            drop(guard);
        });

        assert!(!locks.is_held(owner));
    }
}
