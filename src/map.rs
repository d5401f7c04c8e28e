//! Implements the Map phase.
//!

use std::path::Path;

use tracing::debug;

use crate::error::{MrError, Phase, Result};
use crate::formats::writelog::WriteLogWriter;
use crate::mapreducer::{Mapper, Partitioner};
use crate::parameter_set::ParameterSet;
use crate::parameters::MRParameters;
use crate::phases::output::{map_output_name, RunFile};
use crate::phases::JobClock;
use crate::record_types::{MEmitter, Record};
use crate::sort::sort_run;

/// What one map task did.
#[derive(Clone, Debug, Default)]
pub struct MapStats {
    pub records_in: u64,
    pub records_out: u64,
    pub runs: Vec<RunFile>,
}

/// This is the base of the mapping phase. It contains an input
/// and intermediary output buffers, one per reduce shard.
/// Mapper threads run on this. Every map task has one MapPartition
/// instance per input chunk.
pub struct MapPartition<'a, MapInput: Iterator<Item = Record>> {
    mapper: &'a dyn Mapper,
    partitioner: &'a dyn Partitioner,
    params: MRParameters,
    user_params: &'a ParameterSet,
    input: MapInput,
    location: &'a Path,
    clock: &'a JobClock,

    buffers: Vec<Vec<Record>>,
    buffered_bytes: usize,
    spills: usize,
    stats: MapStats,
}

impl<'a, MapInput: Iterator<Item = Record>> MapPartition<'a, MapInput> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: MRParameters,
        user_params: &'a ParameterSet,
        input: MapInput,
        mapper: &'a dyn Mapper,
        partitioner: &'a dyn Partitioner,
        location: &'a Path,
        clock: &'a JobClock,
    ) -> MapPartition<'a, MapInput> {
        let reducers = params.reducers;
        MapPartition {
            mapper,
            partitioner,
            params,
            user_params,
            input,
            location,
            clock,
            buffers: (0..reducers).map(|_| Vec::new()).collect(),
            buffered_bytes: 0,
            spills: 0,
            stats: MapStats::default(),
        }
    }

    /// Runs map() over the whole input and writes sorted runs. Returns the list of runs.
    pub fn run(mut self) -> Result<MapStats> {
        self.do_map()?;
        self.spill()?;
        debug!(
            shard = self.params.shard_id,
            records_in = self.stats.records_in,
            records_out = self.stats.records_out,
            runs = self.stats.runs.len(),
            "map task finished"
        );
        Ok(self.stats)
    }

    /// Executes the mapping phase.
    fn do_map(&mut self) -> Result<()> {
        while let Some(record) = self.input.next() {
            self.clock.check()?;
            self.stats.records_in += 1;

            let key = record.key.clone();
            let mut e = MEmitter::new();
            self.mapper
                .map(self.user_params, &mut e, record)
                .map_err(|source| MrError::RecordProcessing {
                    phase: Phase::Map,
                    key,
                    source,
                })?;
            self.insert_result(e)?;

            if self.buffered_bytes >= self.params.spill_buffer_size {
                self.spill()?;
            }
        }
        Ok(())
    }

    fn insert_result(&mut self, emitter: MEmitter) -> Result<()> {
        let n = self.buffers.len();
        for r in emitter.into_records() {
            let shard = self.partitioner.partition(n, &r.key);
            if shard >= n {
                return Err(MrError::Format(format!(
                    "partitioner put key {:?} into partition {} of {}",
                    r.key, shard, n
                )));
            }
            self.stats.records_out += 1;
            self.buffered_bytes += r.size();
            self.buffers[shard].push(r);
        }
        Ok(())
    }

    /// Sorts every non-empty buffer and writes it out as one run.
    fn spill(&mut self) -> Result<()> {
        if self.buffered_bytes == 0 && self.buffers.iter().all(Vec::is_empty) {
            return Ok(());
        }
        for (shard, buf) in self.buffers.iter_mut().enumerate() {
            if buf.is_empty() {
                continue;
            }
            sort_run(buf);

            let path = map_output_name(self.location, self.params.shard_id, shard, self.spills);
            let mut w = WriteLogWriter::new_to_file(&path)?;
            for r in buf.drain(..) {
                w.write_record(&r)?;
            }
            w.flush()?;

            self.stats.runs.push(RunFile {
                mapper: self.params.shard_id,
                shard,
                spill: self.spills,
                path,
            });
        }
        self.spills += 1;
        self.buffered_bytes = 0;
        Ok(())
    }
}
