//! Counts the occurrences of every whitespace-separated word.

use crate::error::{RecordError, Result};
use crate::job::{Driver, Job, JobReport};
use crate::parameter_set::ParameterSet;
use crate::record_types::{KeyGroup, MEmitter, REmitter, Record};
use crate::registry::Registry;
use crate::storage::{ReadLimit, Storage};

use super::parse_all;

pub fn wc_mapper(_: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
    for word in r.value.split_whitespace() {
        e.emit(word, 1);
    }
    Ok(())
}

/// Sums the counts of a word. A group with a non-numeric count is dropped.
pub fn wc_reducer(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
    let (word, values) = g.into_parts();
    if let Some(counts) = parse_all::<u64, _, _>(values) {
        e.emit(word, counts.iter().sum::<u64>());
    }
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register_map_fn("wc_mapper", wc_mapper)
        .register_reduce_fn("wc_reducer", wc_reducer);
}

/// Runs the word count over `input` and returns the report and the output text.
pub fn count_words(driver: &Driver, registry: &Registry, input: &str, output: &str) -> Result<(JobReport, String)> {
    let job = Job::from_registry(registry, "wc_mapper", "wc_reducer")?
        .input(input)
        .output(output)
        .build();
    let report = driver.submit(&job)?;
    let text = driver.storage().read(&[&format!("{}/part*", output)], ReadLimit::all())?;
    Ok((report, text))
}
