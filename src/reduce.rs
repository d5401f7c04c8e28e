//! Implements the Reduce phase.
//!

use std::io;
use std::iter::Peekable;

use tracing::debug;

use crate::error::{MrError, Phase, RecordError, Result};
use crate::formats::util::{new_error_slot, RecordReadIterator, RecordSink};
use crate::formats::writelog::WriteLogReader;
use crate::mapreducer::Reducer;
use crate::parameter_set::ParameterSet;
use crate::parameters::MRParameters;
use crate::phases::output::RunFile;
use crate::phases::JobClock;
use crate::record_types::{KeyGroup, REmitter, Record};
use crate::shard_merge::ShardMergeIterator;
use crate::sort::record_key_compare;

/// What one reduce task did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReduceStats {
    pub groups: u64,
    pub values_in: u64,
    pub records_out: u64,
}

pub struct ReducePartition<'a, S: RecordSink> {
    reducer: &'a dyn Reducer,
    params: MRParameters,
    user_params: &'a ParameterSet,
    runs: Vec<RunFile>,
    sink: S,
    clock: &'a JobClock,
}

impl<'a, S: RecordSink> ReducePartition<'a, S> {
    /// Create a new Reduce partition for the given reducer; source and destination I/O.
    /// runs are the sorted map outputs destined for this partition, in merge order.
    /// sink receives the serialized output (there is one output file per reduce partition).
    pub fn new(
        reducer: &'a dyn Reducer,
        params: MRParameters,
        user_params: &'a ParameterSet,
        runs: Vec<RunFile>,
        sink: S,
        clock: &'a JobClock,
    ) -> ReducePartition<'a, S> {
        ReducePartition {
            reducer,
            params,
            user_params,
            runs,
            sink,
            clock,
        }
    }

    /// Run the Reduce partition.
    pub fn run(mut self) -> Result<ReduceStats> {
        let errors = new_error_slot();
        let mut inputs = Vec::with_capacity(self.runs.len());
        for run in &self.runs {
            let reader = WriteLogReader::new_from_file(&run.path)?;
            inputs.push(RecordReadIterator::new(reader, errors.clone()));
        }
        let merged = ShardMergeIterator::build_with(inputs, record_key_compare);

        let clock = self.clock;
        let stats = reduce_sorted(
            self.reducer,
            self.user_params,
            merged,
            &mut self.sink,
            || {
                if let Some(e) = errors.borrow_mut().take() {
                    return Err(MrError::Io(e));
                }
                clock.check()
            },
        )?;
        if let Some(e) = errors.borrow_mut().take() {
            return Err(MrError::Io(e));
        }
        self.sink.finish()?;

        debug!(
            shard = self.params.shard_id,
            groups = stats.groups,
            records_out = stats.records_out,
            "reduce task finished"
        );
        Ok(stats)
    }
}

/// The values of one key, read lazily from a key-sorted record stream.
struct GroupValues<'g, I: Iterator<Item = Record>> {
    key: &'g str,
    first: Option<String>,
    src: &'g mut Peekable<I>,
    count: u64,
}

impl<'g, I: Iterator<Item = Record>> Iterator for GroupValues<'g, I> {
    type Item = String;
    fn next(&mut self) -> Option<String> {
        if let Some(v) = self.first.take() {
            self.count += 1;
            return Some(v);
        }
        match self.src.peek() {
            Some(r) if r.key == self.key => {
                self.count += 1;
                self.src.next().map(|r| r.value)
            }
            _ => None,
        }
    }
}

/// Groups a key-sorted record stream by key and calls reduce() once per group. `checkpoint`
/// runs before every group; an error from it stops the task.
pub fn reduce_sorted<I, S, C>(
    reducer: &dyn Reducer,
    params: &ParameterSet,
    input: I,
    sink: &mut S,
    mut checkpoint: C,
) -> Result<ReduceStats>
where
    I: Iterator<Item = Record>,
    S: RecordSink,
    C: FnMut() -> Result<()>,
{
    let mut src = input.peekable();
    let mut stats = ReduceStats::default();
    let mut em = REmitter::new();

    while let Some(head) = src.next() {
        checkpoint()?;
        let key = head.key;

        let mut values = GroupValues {
            key: &key,
            first: Some(head.value),
            src: &mut src,
            count: 0,
        };
        let result = reducer.reduce(params, &mut em, KeyGroup::new(key.clone(), &mut values));
        // Skip whatever the reducer left unread.
        values.by_ref().for_each(drop);
        stats.values_in += values.count;
        stats.groups += 1;

        result.map_err(|source| MrError::RecordProcessing {
            phase: Phase::Reduce,
            key: key.clone(),
            source,
        })?;

        for r in em.drain() {
            sink.write_record(&r).map_err(|e| output_error(&key, e))?;
            stats.records_out += 1;
        }
    }
    Ok(stats)
}

fn output_error(key: &str, e: io::Error) -> MrError {
    if e.kind() == io::ErrorKind::InvalidData {
        MrError::RecordProcessing {
            phase: Phase::Reduce,
            key: key.to_string(),
            source: RecordError::new(e.to_string()),
        }
    } else {
        MrError::Io(e)
    }
}
