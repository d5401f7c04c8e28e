//! The example programs: word count, total count, single-source shortest paths, PageRank and
//! merge sort, each built from registered map/reduce functions.

pub mod graph;
pub mod mergesort;
pub mod pagerank;
pub mod shortest_path;
pub mod totalcount;
pub mod wordcount;

use std::str::FromStr;

use crate::registry::Registry;

/// Every function of every example program.
pub fn registry() -> Registry {
    let mut r = Registry::new();
    wordcount::register(&mut r);
    totalcount::register(&mut r);
    shortest_path::register(&mut r);
    pagerank::register(&mut r);
    mergesort::register(&mut r);
    r
}

/// Parses every value, or none at all.
fn parse_all<T: FromStr, I: IntoIterator<Item = S>, S: AsRef<str>>(values: I) -> Option<Vec<T>> {
    values.into_iter().map(|v| v.as_ref().trim().parse().ok()).collect()
}
