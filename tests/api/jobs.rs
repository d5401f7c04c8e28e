//! tests/api/jobs.rs
use prince::closure_mr::ClosureMapReducer;
use prince::error::RecordError;
use prince::job::Job;
use prince::parameter_set::ParameterSet;
use prince::record_types::{KeyGroup, MEmitter, REmitter, Record};
use prince::storage::{ReadLimit, Storage};

use crate::helpers::{driver, read_output};

/// Emits every word with the line and position it was found at.
fn tag_words(_: &ParameterSet, e: &mut MEmitter, r: Record) -> Result<(), RecordError> {
    for (i, w) in r.value.split_whitespace().enumerate() {
        e.emit(w, format!("{}:{}", r.key, i));
    }
    Ok(())
}

/// Writes a group's values in the order they arrived.
fn join_values(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> Result<(), RecordError> {
    let (k, vs) = g.into_parts();
    let values: Vec<String> = vs.collect();
    e.emit(k, values.join(","));
    Ok(())
}

#[test]
fn value_order_within_groups_is_repeatable() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    let text: String = (0..60).map(|i| format!("x w{} x y{}\n", i % 5, i % 3)).collect();
    d.storage().write_text("in.txt", &text).unwrap();
    let job = |output: &str| {
        Job::from_map_reducer(ClosureMapReducer::new(tag_words, join_values))
            .input("in.txt")
            .output(output)
            .build()
    };

    // Act
    let first = d.submit(&job("one")).unwrap();
    let second = d.submit(&job("two")).unwrap();

    // Assert
    assert!(first.stats.map_tasks > 1);
    assert!(first.stats.runs > first.stats.map_tasks);
    assert_eq!(first.stats, second.stats);
    let one = d.storage().read(&["one/part*"], ReadLimit::all()).unwrap();
    let two = d.storage().read(&["two/part*"], ReadLimit::all()).unwrap();
    assert_eq!(one, two);

    // Values reach the reducer in input order.
    let groups = read_output(&d, "one");
    let positions: Vec<(usize, usize)> = groups["x"]
        .split(',')
        .map(|v| {
            let (line, pos) = v.split_once(':').unwrap();
            (line.parse().unwrap(), pos.parse().unwrap())
        })
        .collect();
    assert_eq!(positions.len(), 120);
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}
