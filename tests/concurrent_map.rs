// ConcurrentMap test suite.
//
// Invariants exercised:
// - Same observable semantics as BaseMap for every forwarded operation.
// - Single operations are atomic under contention (update).
// - transact bodies are indivisible: no other operation, reads included,
//   interleaves with them.
// - Lock release is unconditional: a panicking closure leaves the map
//   usable.
use automap::{BaseMap, ConcurrentMap, InsertError};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn keys_values_len() {
    let m = ConcurrentMap::new();
    m.set(1, "one");
    m.set(2, "two");

    let keys: HashSet<_> = m.keys().into_iter().collect();
    assert_eq!(keys, HashSet::from([1, 2]));

    let values: HashSet<_> = m.values().into_iter().collect();
    assert_eq!(values, HashSet::from(["one", "two"]));

    assert_eq!(m.len(), 2);
    assert!(!m.is_empty());
}

#[test]
fn get_missing() {
    let m1: ConcurrentMap<i32, Option<String>> = ConcurrentMap::new();
    assert_eq!(m1.get(&1), None);

    let m2: ConcurrentMap<i32, String> = ConcurrentMap::default();
    assert_eq!(m2.get(&1), None);
}

#[test]
fn set_get_delete() {
    let m = ConcurrentMap::new();
    assert_eq!(m.set(1, "one"), None);
    assert_eq!(m.get(&1), Some("one"));
    assert!(m.contains_key(&1));

    assert!(m.delete(&1));
    assert!(!m.delete(&1));
    assert!(!m.delete(&2));
    assert_eq!(m.remove(&1), None);
}

#[test]
fn first_where() {
    let m = ConcurrentMap::new();
    m.set(1, "one");
    m.set(2, "two");

    assert_eq!(m.first_where(|_, v| *v == "one"), Some("one"));
    assert_eq!(m.first_where(|_, v| *v == "three"), None);
}

#[test]
fn update() {
    let m = ConcurrentMap::new();
    m.set(1, "one");
    m.set(2, "two");

    assert!(m.update(&1, |_, _| "ONE"));
    assert_eq!(m.get(&1), Some("ONE"));

    assert!(!m.update(&3, |_, _| unreachable!()));
}

#[test]
fn update_where() {
    let m: ConcurrentMap<i32, &str> = [(1, "one"), (2, "two"), (3, "three"), (4, "four")]
        .into_iter()
        .collect();

    assert!(m.update_where(|k, _| *k > 2, |_, _| "too much"));
    assert_eq!(m.get(&1), Some("one"));
    assert_eq!(m.get(&2), Some("two"));
    assert_eq!(m.get(&3), Some("too much"));
    assert_eq!(m.get(&4), Some("too much"));

    assert!(!m.update_where(|_, v| v.len() < 3, |_, _| unreachable!()));
}

#[test]
fn delete_where_and_values_where() {
    let m: ConcurrentMap<u32, u32> = (0..10).map(|i| (i, i * i)).collect();
    assert!(m.delete_where(|k, _| *k >= 5));
    assert!(!m.delete_where(|k, _| *k >= 5));
    let mut squares = m.values_where(|_, v| v % 2 == 0);
    squares.sort();
    assert_eq!(squares, vec![0, 4, 16]);
}

#[test]
fn reduce() {
    let m = ConcurrentMap::new();
    m.set("1", 1);
    m.set("2", 2);
    m.set("3", 3);

    assert_eq!(m.reduce(0, |_, v, r| r + v), 6);
}

#[test]
fn try_insert_is_atomic_check_and_set() {
    let m = ConcurrentMap::new();
    let winners: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let m = &m;
                s.spawn(move || m.try_insert("slot", t).is_ok() as usize)
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(winners, 1);
    assert_eq!(m.try_insert("slot", 99), Err(InsertError::DuplicateKey));
}

// Test: two threads hammer one key with +1 and -1.
// Verifies: every update is applied atomically; the final value is 0.
#[test]
fn parallel_update() {
    let m = ConcurrentMap::new();
    m.set("", 0i64);

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..1_000_000 {
                m.update("", |_, v| v + 1);
            }
        });
        s.spawn(|| {
            for _ in 0..1_000_000 {
                m.update("", |_, v| v - 1);
            }
        });
    });

    assert_eq!(m.get(""), Some(0));
}

// Test: a slow read-sleep-increment transaction versus a concurrent set.
// Assumes: the set is attempted while the transaction is running.
// Verifies: the set waits for the whole transaction and lands last.
#[test]
fn transact_is_indivisible() {
    init_logging();
    let m = ConcurrentMap::new();
    m.set("", 0);
    let started = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            m.transact(|inner| {
                started.wait();
                for _ in 0..100 {
                    thread::sleep(Duration::from_millis(1));
                    let n = inner.get("").copied().unwrap_or(0);
                    inner.set("", n + 1);
                }
            });
        });
        s.spawn(|| {
            started.wait();
            m.set("", 0);
        });
    });

    assert_eq!(m.get(""), Some(0));
}

// Test: readers are excluded for the full duration of a transaction.
// Verifies: a concurrent get never observes an intermediate value.
#[test]
fn transact_excludes_readers() {
    let m = ConcurrentMap::new();
    m.set("x", 0u32);
    let started = Barrier::new(2);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            m.transact(|inner| {
                started.wait();
                for i in 1..=50 {
                    inner.set("x", i);
                    thread::sleep(Duration::from_micros(200));
                }
            });
        });
        s.spawn(|| {
            started.wait();
            while !done.load(Ordering::Acquire) {
                let seen = m.get("x").unwrap();
                assert!(seen == 0 || seen == 50, "observed partial state {seen}");
                if seen == 50 {
                    done.store(true, Ordering::Release);
                }
            }
        });
    });
}

// Test: readers hold the shared lock together.
// Assumes: each closure blocks on a two-party barrier while holding the lock.
// Verifies: both readers reach the barrier; an exclusive read path would hang.
#[test]
fn readers_share_the_lock() {
    let m: ConcurrentMap<u8, u8> = [(1, 1)].into_iter().collect();

    let met = Barrier::new(2);
    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| m.view(|inner| {
                met.wait();
                inner.len()
            }));
        }
    });

    let met = Barrier::new(2);
    let sums: Vec<u32> = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let (m, met) = (&m, &met);
                s.spawn(move || {
                    m.reduce(0u32, |_, v, r| {
                        met.wait();
                        r + *v as u32
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(sums, vec![1, 1]);

    let met = Barrier::new(2);
    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                let found = m.first_where(|_, _| {
                    met.wait();
                    true
                });
                assert_eq!(found, Some(1));
            });
        }
    });
}

// Test: view composes reads against one consistent state.
#[test]
fn view_sees_consistent_pair() {
    let m = Arc::new(ConcurrentMap::new());
    m.set("a", 0i64);
    m.set("b", 0i64);

    let writer = {
        let m = Arc::clone(&m);
        thread::spawn(move || {
            for _ in 0..10_000 {
                m.transact(|inner| {
                    inner.update("a", |_, v| v + 1);
                    inner.update("b", |_, v| v - 1);
                });
            }
        })
    };
    for _ in 0..10_000 {
        let sum = m.view(|inner| inner.get("a").unwrap() + inner.get("b").unwrap());
        assert_eq!(sum, 0);
    }
    writer.join().unwrap();
    assert_eq!(m.get("a"), Some(10_000));
}

// Test: a panicking update closure propagates and releases the lock.
#[test]
fn panic_in_update_releases_lock() {
    let m = ConcurrentMap::new();
    m.set(1, 1);
    let res = catch_unwind(AssertUnwindSafe(|| {
        m.update(&1, |_, _| panic!("boom"));
    }));
    assert!(res.is_err());
    assert_eq!(m.get(&1), Some(1));
    m.set(2, 2);
    assert_eq!(m.len(), 2);
}

// Test: a panicking transaction keeps its partial writes and releases the lock.
#[test]
fn panic_in_transact_keeps_partial_state() {
    let m = ConcurrentMap::new();
    let res = catch_unwind(AssertUnwindSafe(|| {
        m.transact(|inner| {
            inner.set("first", 1);
            panic!("abort mid-transaction");
        })
    }));
    assert!(res.is_err());
    assert_eq!(m.get("first"), Some(1));

    // Exclusive access is available to other threads again.
    thread::scope(|s| {
        s.spawn(|| m.set("second", 2));
    });
    assert_eq!(m.len(), 2);
}

#[test]
fn panic_in_reader_releases_shared_lock() {
    let m: ConcurrentMap<u8, u8> = [(1, 1)].into_iter().collect();
    let res = catch_unwind(AssertUnwindSafe(|| {
        m.reduce(0u8, |_, _, _| panic!("boom"))
    }));
    assert!(res.is_err());
    assert!(m.set(1, 2).is_some());
}

#[test]
fn from_base_map_and_back() {
    let mut base = BaseMap::new();
    base.set("k", vec![1, 2]);
    let m = ConcurrentMap::from(base);
    m.update("k", |_, v| v.iter().map(|x| x * 10).collect());
    let base = m.into_inner();
    assert_eq!(base.get("k"), Some(&vec![10, 20]));
}

#[test]
fn clear_under_exclusive_lock() {
    let m: ConcurrentMap<u8, u8> = (0..5).map(|i| (i, i)).collect();
    m.clear();
    assert!(m.is_empty());
}
