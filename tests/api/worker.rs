//! tests/api/worker.rs
use prince::algorithms::registry;
use prince::formats::lines::parse_records;
use prince::job::Job;
use prince::storage::Storage;
use prince::worker::WorkerTask;

use crate::helpers::{driver, read_output};

#[test]
fn worker_pipeline_matches_an_in_process_job() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    let text = "the cat\nthe dog and the cat\n";
    d.storage().write_text("in.txt", text).unwrap();
    let reg = registry();
    let job = Job::from_registry(&reg, "wc_mapper", "wc_reducer")
        .unwrap()
        .input("in.txt")
        .output("wc")
        .build();
    let (map_task, reduce_task) = job.worker_tasks(None).unwrap();

    // Act: map, sort by key, reduce, each step through the worker's command line.
    let map_task = WorkerTask::from_args(&map_task.to_args()).unwrap();
    let mut mapped = Vec::new();
    map_task.run(&reg, text.as_bytes(), &mut mapped).unwrap();
    let mut records = parse_records(&String::from_utf8(mapped).unwrap());
    records.sort_by(|a, b| a.key.cmp(&b.key));
    let sorted: String = records.iter().map(|r| format!("{}\n", r)).collect();

    let reduce_task = WorkerTask::from_args(&reduce_task.to_args()).unwrap();
    let mut reduced = Vec::new();
    reduce_task.run(&reg, sorted.as_bytes(), &mut reduced).unwrap();

    // Assert
    d.submit(&job).unwrap();
    let from_workers: Vec<String> = String::from_utf8(reduced)
        .unwrap()
        .lines()
        .map(String::from)
        .collect();
    let from_job: Vec<String> = read_output(&d, "wc")
        .into_iter()
        .map(|(k, v)| format!("{}\t{}", k, v))
        .collect();
    assert_eq!(from_workers, from_job);
    assert_eq!(from_job, vec!["and\t1", "cat\t2", "dog\t1", "the\t3"]);
}

#[test]
fn worker_params_reach_the_mapper() {
    let reg = registry();
    let args = ["--pmapper", "frontier_mapper", "--graph", "/does/not/exist"];
    let task = WorkerTask::from_args(&args).unwrap();
    assert_eq!(task.params.get("graph"), Some("/does/not/exist"));

    // The mapper needs the graph for a non-negative distance and fails without it.
    let result = task.run(&reg, &b"0\t0\n"[..], Vec::new());
    assert!(result.is_err());
}
