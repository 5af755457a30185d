//! Predicate combinators shared by `BaseMap` and `ConcurrentMap`.
//!
//! Every predicate-taking operation accepts any `FnMut(&K, &V) -> bool`;
//! the helpers here only build common ones so call sites stay short:
//!
//! ```
//! use automap::{query, BaseMap};
//!
//! let mut m: BaseMap<u32, &str> = (1..=4).zip(["one", "two", "three", "four"]).collect();
//! assert!(m.delete_where(query::or(query::key_eq(1), query::value_eq("four"))));
//! assert_eq!(m.len(), 2);
//! ```

/// Matches every entry.
pub fn any<K, V>() -> impl FnMut(&K, &V) -> bool {
    |_: &K, _: &V| true
}

/// Matches the entry whose key equals `key`.
pub fn key_eq<K: PartialEq, V>(key: K) -> impl FnMut(&K, &V) -> bool {
    move |k: &K, _: &V| *k == key
}

/// Matches entries whose value equals `value`.
pub fn value_eq<K, V: PartialEq>(value: V) -> impl FnMut(&K, &V) -> bool {
    move |_: &K, v: &V| *v == value
}

/// Matches entries whose key satisfies `pred`.
pub fn key_matches<K, V>(mut pred: impl FnMut(&K) -> bool) -> impl FnMut(&K, &V) -> bool {
    move |k: &K, _: &V| pred(k)
}

/// Matches entries whose value satisfies `pred`.
pub fn value_matches<K, V>(mut pred: impl FnMut(&V) -> bool) -> impl FnMut(&K, &V) -> bool {
    move |_: &K, v: &V| pred(v)
}

/// Negates `pred`.
pub fn not<K, V>(mut pred: impl FnMut(&K, &V) -> bool) -> impl FnMut(&K, &V) -> bool {
    move |k: &K, v: &V| !pred(k, v)
}

/// Short-circuiting conjunction; `b` only runs when `a` matched.
pub fn and<K, V>(
    mut a: impl FnMut(&K, &V) -> bool,
    mut b: impl FnMut(&K, &V) -> bool,
) -> impl FnMut(&K, &V) -> bool {
    move |k: &K, v: &V| a(k, v) && b(k, v)
}

/// Short-circuiting disjunction; `b` only runs when `a` did not match.
pub fn or<K, V>(
    mut a: impl FnMut(&K, &V) -> bool,
    mut b: impl FnMut(&K, &V) -> bool,
) -> impl FnMut(&K, &V) -> bool {
    move |k: &K, v: &V| a(k, v) || b(k, v)
}
