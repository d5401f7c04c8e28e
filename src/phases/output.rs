//! Naming of intermediate run files and of reduce output files.
use std::path::{Path, PathBuf};

/// A sorted run written by map task `mapper` for reduce shard `shard`; `spill` counts the runs
/// of one map task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunFile {
    pub mapper: usize,
    pub shard: usize,
    pub spill: usize,
    pub path: PathBuf,
}

pub fn map_output_name(location: &Path, mapper: usize, shard: usize, spill: usize) -> PathBuf {
    location.join(format!("mapout_{}.{}.{}.wlg", mapper, shard, spill))
}

/// Name of the output file of a reduce shard, e.g. `part-00003`.
pub fn reduce_output_name(prefix: &str, shard: usize) -> String {
    format!("{}{:05}", prefix, shard)
}

/// Orders the runs destined for one reduce shard by map task, then spill number. Merging runs in
/// this order makes value order within a key group repeatable.
pub fn runs_for_shard(runs: &[RunFile], shard: usize) -> Vec<RunFile> {
    let mut mine: Vec<RunFile> = runs.iter().filter(|r| r.shard == shard).cloned().collect();
    mine.sort_by_key(|r| (r.mapper, r.spill));
    mine
}
