//! Debug-only reentrancy guard.
//!
//! Each thread records which map instances it is currently inside (shared
//! or exclusive). Entering an instance the thread already holds panics
//! instead of deadlocking on the instance's own lock. Bookkeeping is
//! thread-local, so readers never contend on it. In release builds, this
//! compiles to a zero-cost no-op.

#[cfg(debug_assertions)]
use core::cell::RefCell;
#[cfg(debug_assertions)]
use core::sync::atomic::{AtomicU64, Ordering};

#[cfg(debug_assertions)]
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

#[cfg(debug_assertions)]
thread_local! {
    static HELD: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Per-instance reentrancy tracker. Embed this next to the lock it guards
/// and hold the guard from `enter()` for as long as the lock is held, in
/// either mode.
#[derive(Debug)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    id: u64,
}

impl DebugReentrancy {
    pub(crate) fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Enter a guarded section. In debug builds, panics if the calling thread
    /// is already inside a section of this instance. Call before acquiring
    /// the lock so the panic replaces the deadlock.
    #[inline]
    pub(crate) fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            HELD.with(|held| {
                let mut held = held.borrow_mut();
                assert!(
                    !held.contains(&self.id),
                    "reentrancy detected: map accessed from inside one of its own callbacks"
                );
                held.push(self.id);
            });
            return ReentrancyGuard { owner: self };
        }

        #[cfg(not(debug_assertions))]
        {
            return ReentrancyGuard {
                _z: core::marker::PhantomData,
            };
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `DebugReentrancy::enter`.
pub(crate) struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _z: core::marker::PhantomData<&'a ()>,
}

impl<'a> Drop for ReentrancyGuard<'a> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let id = self.owner.id;
            let _ = HELD.try_with(|held| {
                let mut held = held.borrow_mut();
                if let Some(pos) = held.iter().rposition(|&h| h == id) {
                    held.swap_remove(pos);
                }
            });
        }
    }
}
