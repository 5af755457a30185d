//! automap: a lazily allocated hash map and a lock-guarded wrapper with
//! closure transactions.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the data structure and its locking discipline in separate
//!   layers so each can be reasoned about on its own.
//! - Layers:
//!   - BaseMap<K, V, S>: unsynchronized map with point operations
//!     (get/set/delete/update) and predicate-driven bulk operations
//!     (first_where/values_where/update_where/delete_where/reduce).
//!   - ConcurrentMap<K, V, S>: owns one BaseMap behind one reader-writer
//!     lock; forwards every operation under the right lock mode and adds
//!     `transact` for multi-step atomic sections.
//!   - query: predicate combinators accepted by both layers.
//!
//! Storage
//! - Entries live in a `SlotMap`; a `HashTable` of slot keys indexes them
//!   by a precomputed `u64` hash, so `K: Hash` is never invoked after
//!   insertion.
//! - Storage is allocated on the first write. Reads on a never-written map
//!   behave exactly like reads on an empty map and do not allocate.
//!
//! Locking discipline
//! - Shared lock: get, contains_key, first_where, values_where, keys,
//!   values, len, is_empty, reduce, view.
//! - Exclusive lock: set, try_insert, remove, delete, delete_where, update,
//!   update_where, clear, transact.
//! - Guards are RAII; a panicking caller closure releases the lock while
//!   unwinding. The lock does not poison, so the map stays usable with
//!   whatever partial state the closure produced.
//! - No fairness guarantee between waiting readers and writers beyond what
//!   `parking_lot::RwLock` provides. No timeouts, no cancellation.
//!
//! Transactions
//! - `transact` hands the closure `&mut BaseMap` for the duration of the
//!   call only; the higher-ranked borrow cannot escape.
//! - No caller closure, under either lock mode, may call back into the
//!   same ConcurrentMap. That would deadlock; debug builds track the
//!   sections each thread holds (thread-locally, so readers do not
//!   contend) and panic instead.
//!
//! Ordering
//! - Iteration order is unspecified everywhere. `first_where` returns an
//!   arbitrary match when several exist, and `reduce` is only
//!   deterministic for order-independent folds.
//!
//! Errors
//! - Absence is reported through `Option`/`bool`, never an error. The only
//!   error type is `InsertError`, from `try_insert`.
//! - Panics in caller closures are neither caught nor wrapped.

mod base_map;
mod concurrent_map;
pub mod query;
mod reentrancy;

// Public surface
pub use base_map::{BaseMap, InsertError};
pub use concurrent_map::ConcurrentMap;
