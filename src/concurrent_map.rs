//! ConcurrentMap: a `BaseMap` behind a single reader-writer lock.
//!
//! Pure reads take the shared lock; anything that may mutate takes the
//! exclusive lock. `transact` holds the exclusive lock across a caller
//! closure so several `BaseMap` operations commit as one unit.

use crate::base_map::{BaseMap, InsertError};
use crate::reentrancy::{DebugReentrancy, ReentrancyGuard};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::{Deref, DerefMut};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::hash_map::RandomState;

/// Thread-safe map. Share it by reference (scoped threads) or via `Arc`.
///
/// Every method is atomic on its own. Composing calls (`get` then `set`) is
/// not; use [`ConcurrentMap::transact`] for multi-step read-modify-write.
///
/// The lock does not poison: if a caller closure panics, the lock is still
/// released and the map keeps whatever state the closure left behind.
///
/// Caller closures (predicates, updaters, `reduce`, `view`, `transact`) run
/// while a lock is held and must not call back into the same map. Debug
/// builds panic on such reentry; release builds deadlock.
pub struct ConcurrentMap<K, V, S = RandomState> {
    inner: RwLock<BaseMap<K, V, S>>,
    reentrancy: DebugReentrancy,
}

/// Shared access to the inner map, marked as held by the calling thread.
struct Shared<'a, T> {
    guard: RwLockReadGuard<'a, T>,
    _holder: ReentrancyGuard<'a>,
}

impl<'a, T> Deref for Shared<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

/// Exclusive access to the inner map, marked as held by the calling thread.
struct Exclusive<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
    _holder: ReentrancyGuard<'a>,
}

impl<'a, T> Deref for Exclusive<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<'a, T> DerefMut for Exclusive<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<K, V> ConcurrentMap<K, V> {
    pub fn new() -> Self {
        Self::from(BaseMap::new())
    }
}

impl<K, V, S: Default> Default for ConcurrentMap<K, V, S> {
    fn default() -> Self {
        Self::from(BaseMap::default())
    }
}

impl<K, V, S> From<BaseMap<K, V, S>> for ConcurrentMap<K, V, S> {
    fn from(map: BaseMap<K, V, S>) -> Self {
        Self {
            inner: RwLock::new(map),
            reentrancy: DebugReentrancy::new(),
        }
    }
}

impl<K, V, S> ConcurrentMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::from(BaseMap::with_hasher(hasher))
    }

    fn read(&self) -> Shared<'_, BaseMap<K, V, S>> {
        let _holder = self.reentrancy.enter();
        Shared {
            guard: self.inner.read(),
            _holder,
        }
    }

    fn write(&self) -> Exclusive<'_, BaseMap<K, V, S>> {
        let _holder = self.reentrancy.enter();
        Exclusive {
            guard: self.inner.write(),
            _holder,
        }
    }

    /// Direct access without locking; `&mut self` already proves exclusivity.
    pub fn get_mut(&mut self) -> &mut BaseMap<K, V, S> {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> BaseMap<K, V, S> {
        self.inner.into_inner()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.read().keys()
    }

    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.read().values()
    }

    /// Clone of some value matching `pred`; which one is unspecified when
    /// several match.
    pub fn first_where<P>(&self, pred: P) -> Option<V>
    where
        P: FnMut(&K, &V) -> bool,
        V: Clone,
    {
        self.read().first_where(pred).cloned()
    }

    pub fn values_where<P>(&self, pred: P) -> Vec<V>
    where
        P: FnMut(&K, &V) -> bool,
        V: Clone,
    {
        self.read().values_where(pred)
    }

    /// Fold under the shared lock.
    pub fn reduce<R, F>(&self, init: R, f: F) -> R
    where
        F: FnMut(&K, &V, R) -> R,
    {
        self.read().reduce(init, f)
    }

    pub fn delete_where<P>(&self, pred: P) -> bool
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.write().delete_where(pred)
    }

    pub fn update_where<P, F>(&self, pred: P, f: F) -> bool
    where
        P: FnMut(&K, &V) -> bool,
        F: FnMut(&K, &V) -> V,
    {
        self.write().update_where(pred, f)
    }

    pub fn clear(&self) {
        self.write().clear()
    }

    /// Run several reads against one consistent state under the shared lock.
    ///
    /// Other readers may run alongside `f`; writers wait until it returns.
    /// As with every callback, `f` must not call back into this same map.
    pub fn view<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&BaseMap<K, V, S>) -> R,
    {
        let guard = self.read();
        f(&*guard)
    }

    /// Run `f` with exclusive access to the inner map.
    ///
    /// Every other operation on this instance, readers included, waits until
    /// `f` returns or unwinds. The borrow handed to `f` cannot outlive the
    /// call. Calling back into this same `ConcurrentMap` from inside `f`
    /// deadlocks (debug builds panic instead); use the `BaseMap` argument.
    ///
    /// ```
    /// use automap::ConcurrentMap;
    ///
    /// let m = ConcurrentMap::new();
    /// m.set("hits", 1);
    /// let now = m.transact(|inner| {
    ///     let n = inner.get("hits").copied().unwrap_or(0);
    ///     inner.set("hits", n + 1);
    ///     n + 1
    /// });
    /// assert_eq!(now, 2);
    /// ```
    pub fn transact<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut BaseMap<K, V, S>) -> R,
    {
        let mut guard = self.write();
        log::trace!("transaction started");
        let out = f(&mut *guard);
        log::trace!("transaction finished");
        out
    }
}

impl<K, V, S> ConcurrentMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Clone of the value under `q`.
    pub fn get<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.read().get(q).cloned()
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.read().contains_key(q)
    }

    pub fn set(&self, key: K, value: V) -> Option<V> {
        self.write().set(key, value)
    }

    /// Insert only if absent; the check and the insert are one atomic step.
    pub fn try_insert(&self, key: K, value: V) -> Result<(), InsertError> {
        self.write().try_insert(key, value)
    }

    pub fn remove<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.write().remove(q)
    }

    pub fn delete<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.write().delete(q)
    }

    /// Atomic read-modify-write of a single entry; `f` is not called on a miss.
    pub fn update<Q, F>(&self, q: &Q, f: F) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &V) -> V,
    {
        self.write().update(q, f)
    }
}

impl<K, V, S> FromIterator<(K, V)> for ConcurrentMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from(iter.into_iter().collect::<BaseMap<K, V, S>>())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for ConcurrentMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Some(guard) => f.debug_tuple("ConcurrentMap").field(&*guard).finish(),
            None => f.write_str("ConcurrentMap(<locked>)"),
        }
    }
}
