//! tests/api/helpers.rs
use std::collections::BTreeMap;
use std::path::Path;

use prince::job::Driver;
use prince::parameters::MRParameters;
use prince::storage::{LocalStorage, ReadLimit, Storage};

/// A driver rooted at `dir` with a few workers and a small spill buffer, so that jobs go through
/// several map tasks and spill runs.
pub fn driver(dir: &Path) -> Driver {
    let params = MRParameters::new()
        .set_concurrency(3, 3)
        .set_partition_size(16)
        .set_spill_size(64)
        .set_scratch_dir(dir.join("scratch"));
    Driver::new(LocalStorage::new(dir), params)
}

/// Reads all `key<TAB>value` lines of a job output into a map.
pub fn read_output(driver: &Driver, output: &str) -> BTreeMap<String, String> {
    driver
        .storage()
        .read(&[&format!("{}/part*", output)], ReadLimit::all())
        .expect("Failed to read output")
        .lines()
        .map(|l| {
            let (k, v) = l.split_once('\t').expect("Record without a tab");
            (k.to_string(), v.to_string())
        })
        .collect()
}
