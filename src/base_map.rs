//! BaseMap: unsynchronized, lazily allocated hash map with predicate-based
//! bulk operations.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

#[derive(Clone, Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

/// Backing storage, only allocated once the map is first written.
#[derive(Clone)]
struct Storage<K, V> {
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
}

impl<K, V> Storage<K, V> {
    fn new() -> Self {
        log::trace!("materializing map storage");
        Self {
            index: HashTable::new(),
            slots: SlotMap::with_key(),
        }
    }

    fn find<Q>(&self, hash: u64, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .copied()
    }

    fn unlink(&mut self, slot: DefaultKey) -> Option<Entry<K, V>> {
        let entry = self.slots.remove(slot)?;
        if let Ok(occupied) = self.index.find_entry(entry.hash, |&k| k == slot) {
            occupied.remove();
        }
        Some(entry)
    }
}

/// Error returned by `try_insert` when the key is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    DuplicateKey,
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::DuplicateKey => f.write_str("key already present in map"),
        }
    }
}

impl std::error::Error for InsertError {}

/// Unsynchronized key-value map.
///
/// A default-constructed map owns no storage; the first write allocates it.
/// Reads on a never-written map behave exactly like reads on an empty one.
/// Iteration order is unspecified for every operation that visits more than
/// one entry.
pub struct BaseMap<K, V, S = RandomState> {
    hasher: S,
    storage: Option<Storage<K, V>>,
}

impl<K, V> BaseMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, S: Default> Default for BaseMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> BaseMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            storage: None,
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Whether backing storage has been allocated yet.
    pub fn is_allocated(&self) -> bool {
        self.storage.is_some()
    }

    pub fn len(&self) -> usize {
        self.storage.as_ref().map_or(0, |st| st.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.storage
            .iter()
            .flat_map(|st| st.slots.values())
            .map(|e| (&e.key, &e.value))
    }

    /// Iterate over all entries with mutable values, in unspecified order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.storage
            .iter_mut()
            .flat_map(|st| st.slots.values_mut())
            .map(|e| (&e.key, &mut e.value))
    }

    /// Snapshot of all keys. Later mutation does not affect the returned vector.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Snapshot of all values. Later mutation does not affect the returned vector.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Value of some entry matching `pred`. Which one is unspecified when
    /// several match.
    pub fn first_where<P>(&self, mut pred: P) -> Option<&V>
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.iter().find(|&(k, v)| pred(k, v)).map(|(_, v)| v)
    }

    /// Values of all entries matching `pred`, in unspecified order.
    pub fn values_where<P>(&self, mut pred: P) -> Vec<V>
    where
        P: FnMut(&K, &V) -> bool,
        V: Clone,
    {
        self.iter()
            .filter(|&(k, v)| pred(k, v))
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Replace the value of every entry matching `pred` with `f(key, value)`.
    /// Each entry is tested against its original value exactly once.
    /// Returns whether anything was updated; `f` never runs if nothing matches.
    pub fn update_where<P, F>(&mut self, mut pred: P, mut f: F) -> bool
    where
        P: FnMut(&K, &V) -> bool,
        F: FnMut(&K, &V) -> V,
    {
        let mut applied = false;
        for e in self.storage_mut().slots.values_mut() {
            if pred(&e.key, &e.value) {
                e.value = f(&e.key, &e.value);
                applied = true;
            }
        }
        applied
    }

    /// Remove every entry matching `pred`; returns whether any was removed.
    ///
    /// All predicates run against the map as it was before the call; nothing
    /// is removed until every entry has been tested.
    pub fn delete_where<P>(&mut self, mut pred: P) -> bool
    where
        P: FnMut(&K, &V) -> bool,
    {
        let st = self.storage_mut();
        let doomed: Vec<DefaultKey> = st
            .slots
            .iter()
            .filter(|(_, e)| pred(&e.key, &e.value))
            .map(|(slot, _)| slot)
            .collect();
        for &slot in &doomed {
            st.unlink(slot);
        }
        !doomed.is_empty()
    }

    /// Fold over all entries in unspecified order. `f` should be
    /// order-independent for the result to be deterministic.
    pub fn reduce<R, F>(&self, init: R, mut f: F) -> R
    where
        F: FnMut(&K, &V, R) -> R,
    {
        self.iter().fold(init, |acc, (k, v)| f(k, v, acc))
    }

    /// Remove all entries, keeping allocated storage for reuse.
    pub fn clear(&mut self) {
        if let Some(st) = self.storage.as_mut() {
            st.index.clear();
            st.slots.clear();
        }
    }

    fn storage_mut(&mut self) -> &mut Storage<K, V> {
        self.storage.get_or_insert_with(Storage::new)
    }
}

impl<K, V, S> BaseMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    fn find<Q>(&self, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let st = self.storage.as_ref()?;
        st.find(self.make_hash(q), q)
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find(q)?;
        self.storage.as_ref()?.slots.get(slot).map(|e| &e.value)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find(q)?;
        self.storage.as_mut()?.slots.get_mut(slot).map(|e| &mut e.value)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    /// Insert or overwrite; returns the previous value if the key existed.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.make_hash(&key);
        let st = self.storage_mut();
        match st.index.entry(
            hash,
            |&kk| st.slots.get(kk).map(|e| e.key == key).unwrap_or(false),
            |&kk| st.slots.get(kk).map(|e| e.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(o) => {
                let slot = *o.get();
                st.slots
                    .get_mut(slot)
                    .map(|e| core::mem::replace(&mut e.value, value))
            }
            hashbrown::hash_table::Entry::Vacant(v) => {
                let slot = st.slots.insert(Entry { key, value, hash });
                v.insert(slot);
                None
            }
        }
    }

    /// Insert only if `key` is absent. The map is unchanged on error.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<(), InsertError> {
        let hash = self.make_hash(&key);
        let st = self.storage_mut();
        match st.index.entry(
            hash,
            |&kk| st.slots.get(kk).map(|e| e.key == key).unwrap_or(false),
            |&kk| st.slots.get(kk).map(|e| e.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => Err(InsertError::DuplicateKey),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let slot = st.slots.insert(Entry { key, value, hash });
                v.insert(slot);
                Ok(())
            }
        }
    }

    /// Remove `q` and return its value.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let st = self.storage_mut();
        let slot = st.find(hash, q)?;
        st.unlink(slot).map(|e| e.value)
    }

    /// Remove `q`; true iff it was present.
    pub fn delete<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove(q).is_some()
    }

    /// Replace the value under `q` with `f(key, value)`. Returns whether the
    /// key existed; `f` is not called on a miss.
    pub fn update<Q, F>(&mut self, q: &Q, f: F) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &V) -> V,
    {
        let hash = self.make_hash(q);
        let st = self.storage_mut();
        let Some(e) = st.find(hash, q).and_then(|slot| st.slots.get_mut(slot)) else {
            return false;
        };
        e.value = f(&e.key, &e.value);
        true
    }
}

impl<K, V, S> Clone for BaseMap<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for BaseMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> Extend<(K, V)> for BaseMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for BaseMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut m = Self::default();
        m.extend(iter);
        m
    }
}
