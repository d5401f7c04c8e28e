//! tests/api/algorithms.rs
use std::collections::BTreeMap;

use claims::assert_ok;
use prince::algorithms::pagerank::{self, Norm, PageRank};
use prince::algorithms::{mergesort, registry, shortest_path, totalcount, wordcount};
use prince::error::{DriverError, MrError};
use prince::iteration::{artifact, StopReason};
use prince::storage::{ReadLimit, Storage};

use crate::helpers::{driver, read_output};

#[test]
fn word_count_counts_every_word_once() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    d.storage().write_text("input/a.txt", "a b\n").unwrap();
    d.storage().write_text("input/b.txt", "c\nb a\n").unwrap();
    let reg = registry();

    // Act
    let (report, _) = wordcount::count_words(&d, &reg, "input", "wc").unwrap();

    // Assert
    let counts = read_output(&d, "wc");
    let expected: BTreeMap<String, String> = [("a", "2"), ("b", "2"), ("c", "1")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(counts, expected);
    assert_eq!(report.inputs.len(), 2);
    assert_eq!(report.stats.records_out, 3);
}

#[test]
fn word_count_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    let text: String = (0..200).map(|i| format!("w{} w{} x\n", i % 13, i % 7)).collect();
    d.storage().write_text("in.txt", &text).unwrap();
    let reg = registry();

    let (_, first) = wordcount::count_words(&d, &reg, "in.txt", "one").unwrap();
    let (_, second) = wordcount::count_words(&d, &reg, "in.txt", "two").unwrap();
    assert_eq!(first, second);
    assert_eq!(read_output(&d, "one")["x"], "200");
}

#[test]
fn total_count_counts_items_of_all_lines() {
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    d.storage().write_text("in.txt", "a b c\nd e\n\nf\n").unwrap();

    let total = totalcount::count_items(&d, &registry(), "in.txt", "count").unwrap();
    assert_eq!(total, 6);
    assert!(d.storage().exists("count_inter"));
}

#[test]
fn shortest_path_on_a_chain_converges_in_two_rounds() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    d.storage().write_text("graph.txt", "0 1\n1 2\n2\n").unwrap();
    let reg = registry();

    // Act
    let (outcome, distances) = shortest_path::shortest_paths(&d, &reg, "graph.txt", "0", 1, None).unwrap();

    // Assert
    assert_eq!(outcome.reason, StopReason::Converged);
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.last_iteration, Some(2));
    let flags: Vec<String> = (1..=2)
        .map(|i| {
            d.storage()
                .read(&[&format!("{}/part*", artifact("termination", i))], ReadLimit::all())
                .unwrap()
        })
        .collect();
    assert_eq!(flags, vec!["0\t0\n", "1\t1\n"]);
    assert_eq!(distances, BTreeMap::from([(0, 0), (1, 1), (2, 2)]));
}

#[test]
fn shortest_path_resumes_after_hitting_the_round_limit() {
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    d.storage()
        .write_text("graph.txt", "0 1 3\n1 2\n2 4\n3 4\n4 5\n5\n")
        .unwrap();
    let reg = registry();

    let (stopped, _) = shortest_path::shortest_paths(&d, &reg, "graph.txt", "0", 1, Some(3)).unwrap();
    assert_eq!(stopped.reason, StopReason::MaxIterations);
    assert_eq!(stopped.rounds, 2);
    assert!(!d.storage().exists(&artifact("frontier", 3)));

    let (outcome, distances) = shortest_path::shortest_paths(&d, &reg, "graph.txt", "0", 3, None).unwrap();
    assert_eq!(outcome.reason, StopReason::Converged);
    assert_eq!(
        distances,
        BTreeMap::from([(0, 0), (1, 1), (2, 2), (3, 1), (4, 2), (5, 3)])
    );
}

#[test]
fn shortest_path_reads_an_edited_graph_again() {
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    d.storage().write_text("graph.txt", "0 1\n1 2\n2\n").unwrap();
    let reg = registry();

    let (_, before) = shortest_path::shortest_paths(&d, &reg, "graph.txt", "0", 1, None).unwrap();
    assert_eq!(before, BTreeMap::from([(0, 0), (1, 1), (2, 2)]));

    for base in [shortest_path::FRONTIER, shortest_path::FILTER, shortest_path::TERMINATION] {
        for i in 0..=2 {
            d.storage().remove(&artifact(base, i)).unwrap();
        }
    }
    d.storage().write_text("graph.txt", "0 2\n2\n1\n").unwrap();

    let (outcome, after) = shortest_path::shortest_paths(&d, &reg, "graph.txt", "0", 1, None).unwrap();
    assert_eq!(outcome.reason, StopReason::Converged);
    assert_eq!(after, BTreeMap::from([(0, 0), (2, 1)]));
}

#[test]
fn shortest_path_needs_the_graph_file() {
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    let result = shortest_path::shortest_paths(&d, &registry(), "nowhere.txt", "0", 1, None);
    assert!(result.is_err());
}

#[test]
fn merge_sort_sorts_in_log_rounds() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    d.storage().write_text("numbers.txt", "42\n7\n19\n-3\n7\n100\n0\n").unwrap();

    // Act
    let outcome = mergesort::merge_sort(&d, &registry(), "numbers.txt", "ms").unwrap();

    // Assert: 3 merging rounds for 7 buckets, plus the round that finds bucket 1 alone.
    assert_eq!(outcome.rounds, 4);
    assert_eq!(outcome.reason, StopReason::Converged);
    let sorted = d
        .storage()
        .read(&["ms_sorted/part*"], ReadLimit::all())
        .unwrap();
    let numbers: Vec<&str> = sorted.lines().map(|l| l.split('\t').nth(1).unwrap()).collect();
    assert_eq!(numbers, vec!["-3", "0", "7", "7", "19", "42", "100"]);
    assert!(sorted.starts_with("1\t-3\n"));
}

#[test]
fn merge_sort_of_a_single_value() {
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    d.storage().write_text("numbers.txt", "5\n").unwrap();

    let outcome = mergesort::merge_sort(&d, &registry(), "numbers.txt", "ms").unwrap();
    assert_eq!(outcome.rounds, 1);
    assert_eq!(read_output(&d, "ms_sorted")["1"], "5");
}

fn squared_change(d: &prince::job::Driver, alg: &PageRank<'_>, iteration: usize) -> f64 {
    pagerank::read_ranks(d.storage(), &alg.ranks_name(iteration))
        .unwrap()
        .values()
        .map(|(previous, current)| (previous - current).powi(2))
        .sum()
}

#[test]
fn pagerank_stops_at_the_first_round_within_precision() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    let graph = dir.path().join("graph.txt");
    std::fs::write(&graph, "0 1 2\n1 2\n2 0\n3 0\n").unwrap();
    let reg = registry();
    let precision = 1e-4;
    let mut alg = PageRank::new(&reg, &graph.to_string_lossy(), "pr", 0.85, precision, Norm::Quadratic).unwrap();

    // Act
    let (outcome, ranks) = pagerank::pagerank(&d, &mut alg, 1, None).unwrap();

    // Assert
    assert_eq!(outcome.reason, StopReason::Converged);
    let last = outcome.last_iteration.unwrap();
    assert!(last > 2);
    assert!(squared_change(&d, &alg, last) <= precision * precision);
    for i in 2..last {
        assert!(squared_change(&d, &alg, i) > precision * precision, "round {} was within precision", i);
    }
    assert_eq!(ranks.len(), 4);
    let total: f64 = ranks.values().sum();
    assert!((total - 1.0).abs() < 1e-6, "ranks sum to {}", total);
    // Node 3 has no incoming edges and keeps the teleport share only.
    assert!((ranks[&3] - 0.15 / 4.0).abs() < 1e-9);
}

#[test]
fn pagerank_relative_norm_and_round_limit() {
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    let graph = dir.path().join("graph.txt");
    std::fs::write(&graph, "0 1\n1 2\n2 0 1\n").unwrap();
    let reg = registry();
    let mut alg = PageRank::new(&reg, &graph.to_string_lossy(), "pr", 0.85, 1e-9, Norm::Relative).unwrap();

    let (outcome, ranks) = pagerank::pagerank(&d, &mut alg, 1, Some(4)).unwrap();
    assert_eq!(outcome.reason, StopReason::MaxIterations);
    // Round 1 is the seed; rounds 2 and 3 ran.
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.last_iteration, Some(3));
    assert_eq!(ranks.len(), 3);
    assert_ok!(d.storage().read(&[&format!("{}/part*", alg.term_name(3))], ReadLimit::all()));
}

#[test]
fn pagerank_keeps_an_earlier_run_when_its_outputs_are_taken() {
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    let graph = dir.path().join("graph.txt");
    std::fs::write(&graph, "0 1\n1 0\n").unwrap();
    let reg = registry();
    let mut earlier = PageRank::new(&reg, &graph.to_string_lossy(), "pr", 0.85, 1e-9, Norm::Quadratic).unwrap();
    assert_ok!(pagerank::pagerank(&d, &mut earlier, 1, Some(3)));
    let seed = d
        .storage()
        .read(&[&format!("{}/part*", earlier.ranks_name(1))], ReadLimit::all())
        .unwrap();

    std::fs::write(&graph, "0 1\n1 2\n2 0\n").unwrap();
    let mut later = PageRank::new(&reg, &graph.to_string_lossy(), "pr", 0.85, 1e-9, Norm::Quadratic).unwrap();
    let err = pagerank::pagerank(&d, &mut later, 1, None).unwrap_err();

    assert!(
        matches!(&err, MrError::Driver(DriverError::OutputExists { path }) if path == "pr_pagerank0002"),
        "unexpected {:?}",
        err
    );
    let untouched = d
        .storage()
        .read(&[&format!("{}/part*", earlier.ranks_name(1))], ReadLimit::all())
        .unwrap();
    assert_eq!(untouched, seed);
}
