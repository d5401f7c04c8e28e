//! Counts all items of a data set in two jobs.
//!
//! The first job spreads the items over a fixed number of buckets so that no single reducer has
//! to see the whole data set; the second job funnels the partial sums to one key.

use crate::error::{MrError, RecordError, Result};
use crate::job::{Driver, Job};
use crate::parameter_set::ParameterSet;
use crate::record_types::{KeyGroup, MEmitter, REmitter, Record};
use crate::registry::Registry;
use crate::storage::{ReadLimit, Storage};

use super::parse_all;

pub const NB_BUCKETS: u64 = 100;

pub fn count_mapper(_: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
    let key = r.key.parse::<u64>()?;
    for (index, _) in r.value.split_whitespace().enumerate() {
        e.emit((key + index as u64) % NB_BUCKETS, 1);
    }
    Ok(())
}

/// Sums a bucket. A group with a non-numeric value is dropped.
pub fn count_reducer(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
    let (key, values) = g.into_parts();
    if let Some(counts) = parse_all::<u64, _, _>(values) {
        e.emit(key, counts.iter().sum::<u64>());
    }
    Ok(())
}

/// Moves every partial sum `bucket<TAB>count` to key 1.
pub fn sum_mapper(_: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
    let fields: Vec<&str> = r.value.split_whitespace().collect();
    match fields.as_slice() {
        [_, count] => {
            e.emit(1, count);
            Ok(())
        }
        _ => Err(RecordError::new(format!("expected `bucket count`, got {:?}", r.value))),
    }
}

pub fn register(r: &mut Registry) {
    r.register_map_fn("count_mapper", count_mapper)
        .register_reduce_fn("count_reducer", count_reducer)
        .register_map_fn("sum_mapper", sum_mapper);
}

/// Counts the items in `input`. The partial sums go to `<output>_inter`.
pub fn count_items(driver: &Driver, registry: &Registry, input: &str, output: &str) -> Result<u64> {
    let inter = format!("{}_inter", output);

    let first = Job::from_registry(registry, "count_mapper", "count_reducer")?
        .input(input)
        .output(inter.clone())
        .build();
    driver.submit(&first)?;

    let second = Job::from_registry(registry, "sum_mapper", "count_reducer")?
        .input(format!("{}/part*", inter))
        .output(output)
        .build();
    driver.submit(&second)?;

    let text = driver
        .storage()
        .read(&[&format!("{}/part*", output)], ReadLimit::first(1))?;
    match text.split_whitespace().nth(1) {
        // An empty data set has no partial sums at all.
        None => Ok(0),
        Some(total) => total
            .parse()
            .map_err(|_| MrError::Format(format!("bad total {:?} in {}", total, output))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_mapper_spreads_items() {
        let mut e = MEmitter::new();
        count_mapper(&ParameterSet::new(), &mut e, Record::new("98", "a b c")).unwrap();
        let keys: Vec<String> = e.into_records().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["98", "99", "0"]);
    }

    #[test]
    fn test_sum_mapper_needs_two_fields() {
        let mut e = MEmitter::new();
        sum_mapper(&ParameterSet::new(), &mut e, Record::new("0", "17\t4")).unwrap();
        assert_eq!(e.into_records(), vec![Record::new("1", "4")]);
        assert!(sum_mapper(&ParameterSet::new(), &mut MEmitter::new(), Record::new("1", "17")).is_err());
    }
}
