//! Controls the execution of a mapreduce instance.

use std::any::Any;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, sync_channel};

use scoped_threadpool::Pool;
use tracing::{debug, info, warn};

use crate::error::{MrError, Phase, Result};
use crate::formats::util::SinkGenerator;
use crate::input_cache::InputCache;
use crate::map::{MapPartition, MapStats};
use crate::mapreducer::{Mapper, Partitioner, Reducer};
use crate::parameter_set::ParameterSet;
use crate::parameters::MRParameters;
use crate::phases::output::{reduce_output_name, runs_for_shard, RunFile};
use crate::phases::JobClock;
use crate::record_types::Record;
use crate::reduce::{ReducePartition, ReduceStats};

const INPUT_CHUNK_LENGTH: usize = 8192;

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// The user functions of one job.
#[derive(Clone, Copy)]
pub struct TaskFunctions<'a> {
    pub mapper: &'a dyn Mapper,
    pub reducer: &'a dyn Reducer,
    pub partitioner: &'a dyn Partitioner,
}

/// Counters of a finished job.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobStats {
    pub map_tasks: usize,
    pub records_in: u64,
    pub map_records_out: u64,
    pub runs: usize,
    pub groups: u64,
    pub records_out: u64,
}

pub struct MRController<'a> {
    params: MRParameters,
    user_params: &'a ParameterSet,
    functions: TaskFunctions<'a>,
    scratch: PathBuf,
    clock: JobClock,

    // How many map partitions have been run?
    map_partitions_run: usize,
    runs: Vec<RunFile>,
    stats: JobStats,
}

fn panic_message(p: Box<dyn Any + Send>) -> String {
    if let Some(s) = p.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("task panicked")
    }
}

/// Runs one task body, turning a panic into a WorkerFailure. Any failure cancels the job so
/// that sibling tasks stop early.
fn guarded<T, F: FnOnce() -> Result<T>>(phase: Phase, shard: usize, clock: &JobClock, f: F) -> Result<T> {
    let result = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => r,
        Err(p) => Err(MrError::WorkerFailure {
            phase,
            shard,
            reason: panic_message(p),
        }),
    };
    if result.is_err() {
        clock.cancel();
    }
    result
}

/// Picks the error to report for a failed phase: the first one that is not merely a
/// consequence of another task's failure.
fn first_error(mut errors: Vec<(usize, MrError)>, fallback: Option<MrError>) -> Option<MrError> {
    errors.sort_by_key(|(shard, _)| *shard);
    let mut cancelled = None;
    for (_, e) in errors {
        match e {
            MrError::Cancelled => cancelled = Some(e),
            e => return Some(e),
        }
    }
    fallback.or(cancelled)
}

fn new_scratch_dir(base: &Path) -> Result<PathBuf> {
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = base.join(format!("prince-{}-{}", std::process::id(), n));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

impl<'a> MRController<'a> {
    /// Runs a complete job: all map tasks over `inp`, then one reduce task per output shard
    /// writing through `out`. Returns once every reducer has finished and temporary files are
    /// gone.
    #[tracing::instrument(name = "job", skip_all, fields(mappers = params.mappers, reducers = params.reducers))]
    pub fn run<In: Iterator<Item = Record>, Out: SinkGenerator>(
        functions: TaskFunctions<'a>,
        params: MRParameters,
        user_params: &'a ParameterSet,
        inp: In,
        out: &Out,
    ) -> Result<JobStats> {
        // The fields are public; a pool of zero threads cannot run anything.
        let (mappers, reducers) = (params.mappers, params.reducers);
        let params = params.set_concurrency(mappers, reducers);
        let scratch = new_scratch_dir(&params.scratch_location())?;
        let clock = JobClock::new(params.timeout());
        let mut controller = MRController {
            params,
            user_params,
            functions,
            scratch,
            clock,
            map_partitions_run: 0,
            runs: Vec::new(),
            stats: JobStats::default(),
        };

        let result = controller
            .run_map(inp)
            .and_then(|_| controller.run_reduce(out));
        controller.clean_up();
        result?;

        info!(
            records_in = controller.stats.records_in,
            records_out = controller.stats.records_out,
            elapsed_ms = controller.clock.elapsed().as_millis() as u64,
            "job finished"
        );
        Ok(controller.stats)
    }

    fn read_map_input<In: Iterator<Item = Record>>(it: &mut In, approx_bytes: usize) -> InputCache {
        InputCache::from_iter(INPUT_CHUNK_LENGTH, approx_bytes, it)
    }

    fn run_map<In: Iterator<Item = Record>>(&mut self, mut input: In) -> Result<()> {
        let mut pool = Pool::new(self.params.mappers as u32);
        let (send, recv) = sync_channel(self.params.mappers);
        let (results, collected) = channel::<(usize, Result<MapStats>)>();

        for _ in 0..self.params.mappers {
            let _ = send.send(true);
        }

        let functions = self.functions;
        let user_params = self.user_params;
        let clock = &self.clock;
        let scratch = self.scratch.as_path();
        let base = &self.params;
        let mut launched = 0;
        let mut loop_err = None;

        pool.scoped(|scope| {
            loop {
                let _ = recv.recv();
                if let Err(e) = clock.check() {
                    loop_err = Some(e);
                    break;
                }

                let inp = MRController::read_map_input(&mut input, base.map_partition_size);
                if inp.is_empty() {
                    break;
                }

                let shard = launched;
                debug!(shard, records = inp.len(), bytes = inp.bytes(), "starting map task");
                let params = base.clone().set_shard_id(shard);
                let done = send.clone();
                let results = results.clone();

                scope.execute(move || {
                    let r = guarded(Phase::Map, shard, clock, || {
                        MapPartition::new(
                            params,
                            user_params,
                            inp,
                            functions.mapper,
                            functions.partitioner,
                            scratch,
                            clock,
                        )
                        .run()
                    });
                    let _ = results.send((shard, r));
                    let _ = done.send(true);
                });
                launched += 1;
            }

            scope.join_all();
        });
        drop(results);

        self.map_partitions_run = launched;
        self.stats.map_tasks = launched;
        let mut errors = Vec::new();
        for (shard, r) in collected.iter() {
            match r {
                Ok(stats) => {
                    self.stats.records_in += stats.records_in;
                    self.stats.map_records_out += stats.records_out;
                    self.runs.extend(stats.runs);
                }
                Err(e) => errors.push((shard, e)),
            }
        }
        self.stats.runs = self.runs.len();
        debug!(map_tasks = launched, runs = self.runs.len(), "map phase finished");

        match first_error(errors, loop_err) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn run_reduce<Out: SinkGenerator>(&mut self, outp: &Out) -> Result<()> {
        let mut pool = Pool::new(self.params.reducers as u32);
        let (results, collected) = channel::<(usize, Result<ReduceStats>)>();

        let reducer = self.functions.reducer;
        let user_params = self.user_params;
        let clock = &self.clock;
        let runs = &self.runs;
        let base = &self.params;

        pool.scoped(|scope| {
            for i in 0..base.reducers {
                let params = base.clone().set_shard_id(i);
                let inputs = runs_for_shard(runs, i);
                let results = results.clone();

                scope.execute(move || {
                    let r = guarded(Phase::Reduce, i, clock, || {
                        clock.check()?;
                        let name = reduce_output_name(&params.reduce_output_shard_prefix, i);
                        let output = outp.new_output(&name)?;
                        ReducePartition::new(reducer, params, user_params, inputs, output, clock).run()
                    });
                    let _ = results.send((i, r));
                });
            }
        });
        drop(results);

        let mut errors = Vec::new();
        for (shard, r) in collected.iter() {
            match r {
                Ok(stats) => {
                    self.stats.groups += stats.groups;
                    self.stats.records_out += stats.records_out;
                }
                Err(e) => errors.push((shard, e)),
            }
        }
        match first_error(errors, None) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn clean_up(&self) {
        if self.params.keep_temp_files {
            debug!(dir = %self.scratch.display(), map_tasks = self.map_partitions_run, "keeping map output");
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.scratch) {
            warn!(dir = %self.scratch.display(), error = %e, "could not remove scratch directory");
        }
    }
}
