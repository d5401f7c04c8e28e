//! Sorting/comparison functions used by the shuffle.
//!
//! Keys are ordered by plain byte-wise comparison of their text. Numeric keys therefore sort
//! textually ("10" < "9"); programs that need numeric order have to use fixed-width keys.

use std::cmp::{Ord, Ordering};

use crate::record_types::Record;

/// Function type to be used as custom compare function.
pub type Comparer<T> = fn(a: &T, b: &T) -> Ordering;

/// Comparer<T: Ord>
#[inline]
pub fn default_generic_compare<T: Ord>(a: &T, b: &T) -> Ordering {
    a.cmp(b)
}

/// Compares two records by key only. Values never take part in shuffle ordering, so equal keys
/// keep the order in which they were emitted.
#[inline]
pub fn record_key_compare(a: &Record, b: &Record) -> Ordering {
    a.key.as_bytes().cmp(b.key.as_bytes())
}

/// Sorts one in-memory run by key. The sort is stable.
pub fn sort_run(run: &mut [Record]) {
    run.sort_by(record_key_compare);
}
