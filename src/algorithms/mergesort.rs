//! Merge sort of integers.
//!
//! The init job puts every number into its own small bucket and sorts each bucket. Every merge
//! round halves the bucket ids (`b -> (b + 1) / 2`), so buckets 2k-1 and 2k meet in one reducer
//! and are merged. Once a single bucket with id 1 is left, its reducer also writes the reserved
//! record `(0, 1)`, which stops the loop. A final job writes the numbers one per line as
//! `rank<TAB>number`.
//!
//! Bucket ids only ever decrease, so n numbers take ⌈log2 n⌉ merge rounds plus the round that
//! finds bucket 1 alone.

use crate::error::{RecordError, Result};
use crate::iteration::{artifact, parts, reserved_key_seen, IterationController, IterationOutcome, IterativeAlgorithm};
use crate::job::{Driver, Job};
use crate::parameter_set::ParameterSet;
use crate::record_types::{KeyGroup, MEmitter, REmitter, Record};
use crate::registry::Registry;
use crate::storage::ReadLimit;

use super::parse_all;

fn join(numbers: &[i64]) -> String {
    numbers
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Numbers of a bucket; a bucket with anything else in it counts as empty.
fn numbers(s: &str) -> Vec<i64> {
    parse_all(s.split_whitespace()).unwrap_or_default()
}

pub fn merge_lists(a: &[i64], b: &[i64]) -> Vec<i64> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            out.push(a[i]);
            i += 1;
        } else {
            out.push(b[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Splits `id numbers...` into the bucket id and the rest.
fn bucket(value: &str) -> std::result::Result<(i64, &str), RecordError> {
    let value = value.trim_start();
    let (id, rest) = value.split_once(char::is_whitespace).unwrap_or((value, ""));
    Ok((id.parse()?, rest.trim()))
}

/// Item i of input line k goes to bucket k + 1 + i.
pub fn init_mapper(_: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
    let key = r.key.parse::<i64>()? + 1;
    for (index, item) in r.value.split_whitespace().enumerate() {
        e.emit(key + index as i64, item);
    }
    Ok(())
}

pub fn init_reducer(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
    let (key, values) = g.into_parts();
    let mut sorted: Vec<i64> = parse_all(values).unwrap_or_default();
    sorted.sort_unstable();
    e.emit(key, join(&sorted));
    Ok(())
}

pub fn merge_mapper(_: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
    let (id, numbers) = bucket(&r.value)?;
    e.emit((id + 1) / 2, numbers);
    Ok(())
}

pub fn merge_reducer(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
    let (key, values) = g.into_parts();
    let id = key.parse::<i64>()?;
    if id <= 0 {
        return Ok(());
    }
    let buckets: Vec<String> = values.collect();
    match buckets.as_slice() {
        [] => (),
        [only] => {
            e.emit(&key, only);
            if id == 1 {
                e.emit(0, 1);
            }
        }
        many => {
            let merged = many
                .iter()
                .fold(Vec::new(), |acc, b| merge_lists(&acc, &numbers(b)));
            e.emit(&key, join(&merged));
        }
    }
    Ok(())
}

pub fn split_mapper(_: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
    let (id, numbers) = bucket(&r.value)?;
    if id > 0 {
        e.emit(id, numbers);
    }
    Ok(())
}

/// Writes the numbers of the (single) bucket one per record, ranked from 1.
pub fn split_reducer(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
    let (_, mut values) = g.into_parts();
    if let Some(first) = values.next() {
        for (index, n) in numbers(&first).into_iter().enumerate() {
            e.emit(index + 1, n);
        }
    }
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register_map_fn("init_mapper", init_mapper)
        .register_reduce_fn("init_reducer", init_reducer)
        .register_map_fn("merge_mapper", merge_mapper)
        .register_reduce_fn("merge_reducer", merge_reducer)
        .register_map_fn("split_mapper", split_mapper)
        .register_reduce_fn("split_reducer", split_reducer);
}

/// Merge rounds over `<output><NNNN>`; round 0 is the init job.
pub struct MergeSort<'r> {
    registry: &'r Registry,
    input: String,
    output: String,
}

impl<'r> MergeSort<'r> {
    pub fn new(registry: &'r Registry, input: &str, output: &str) -> MergeSort<'r> {
        MergeSort {
            registry,
            input: input.to_string(),
            output: output.to_string(),
        }
    }

    pub fn round_name(&self, iteration: usize) -> String {
        artifact(&self.output, iteration)
    }

    pub fn sorted_name(&self) -> String {
        format!("{}_sorted", self.output)
    }
}

impl<'r> IterativeAlgorithm for MergeSort<'r> {
    fn initialize(&mut self, driver: &Driver, start: usize) -> Result<usize> {
        let job = Job::from_registry(self.registry, "init_mapper", "init_reducer")?
            .input(self.input.clone())
            .output(self.round_name(start - 1))
            .build();
        driver.submit(&job)?;
        Ok(start)
    }

    fn run_round(&mut self, driver: &Driver, iteration: usize) -> Result<String> {
        let current = self.round_name(iteration);
        let job = Job::from_registry(self.registry, "merge_mapper", "merge_reducer")?
            .input(parts(&self.round_name(iteration - 1)))
            .output(current.clone())
            .build();
        driver.submit(&job)?;
        Ok(current)
    }

    fn flag_position(&self) -> ReadLimit {
        ReadLimit::last(1)
    }

    fn converged(&self, flag: &Record) -> std::result::Result<bool, RecordError> {
        reserved_key_seen(flag)
    }
}

/// Sorts the numbers in `input`; the result is written to `<output>_sorted`.
pub fn merge_sort(driver: &Driver, registry: &Registry, input: &str, output: &str) -> Result<IterationOutcome> {
    let mut alg = MergeSort::new(registry, input, output);
    let outcome = IterationController::new(1, None).run(driver, &mut alg)?;

    let last = outcome.last_iteration.unwrap_or(0);
    let split = Job::from_registry(registry, "split_mapper", "split_reducer")?
        .input(parts(&alg.round_name(last)))
        .output(alg.sorted_name())
        .build();
    driver.submit(&split)?;
    Ok(outcome)
}
