//! Jobs and the driver that runs them.
//!
//! A `Job` bundles the user functions with the input specs, the output name and the parameters.
//! `Driver::submit` checks a job's preconditions, runs it through the controller, and commits
//! the output: reducers write into a hidden staging directory next to the output, which is
//! renamed into place only after every reducer succeeded. A failed job leaves no output behind.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::controller::{JobStats, MRController, TaskFunctions};
use crate::error::{DriverError, MrError, Phase, Result};
use crate::formats::lines::LinesSinkGenerator;
use crate::formats::util::{Format, PosRecordIterator};
use crate::mapreducer::{DefaultPartitioner, MapReducer, Mapper, MapperF, Partitioner, Reducer, ReducerF};
use crate::parameter_set::ParameterSet;
use crate::parameters::MRParameters;
use crate::registry::{MapperWrapper, ReducerWrapper, Registry};
use crate::storage::{LocalStorage, Storage};
use crate::worker::{write_trace, WorkerTask};

static STAGING_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// One map -> shuffle -> reduce pass. Immutable once built.
#[derive(Clone)]
pub struct Job {
    mapper: Arc<dyn Mapper>,
    reducer: Arc<dyn Reducer>,
    partitioner: Arc<dyn Partitioner>,
    mapper_name: Option<String>,
    reducer_name: Option<String>,

    inputs: Vec<String>,
    output: String,
    aux_files: Vec<String>,
    params: ParameterSet,
    input_format: Format,
    output_format: Format,
}

impl Job {
    pub fn builder(mapper: Arc<dyn Mapper>, reducer: Arc<dyn Reducer>) -> JobBuilder {
        JobBuilder {
            job: Job {
                mapper,
                reducer,
                partitioner: Arc::new(DefaultPartitioner),
                mapper_name: None,
                reducer_name: None,
                inputs: Vec::new(),
                output: String::new(),
                aux_files: Vec::new(),
                params: ParameterSet::new(),
                input_format: Format::default(),
                output_format: Format::default(),
            },
        }
    }

    /// A job running two plain functions.
    pub fn from_fns(mapper: MapperF, reducer: ReducerF) -> JobBuilder {
        Job::builder(Arc::new(MapperWrapper(mapper)), Arc::new(ReducerWrapper(reducer)))
    }

    /// A job whose map, reduce and partition functions come from one value.
    pub fn from_map_reducer<M: MapReducer + 'static>(mr: M) -> JobBuilder {
        let mr = Arc::new(mr);
        Job::builder(mr.clone(), mr.clone()).partitioner(mr)
    }

    /// A job running functions looked up by name. The names are kept so the job can describe
    /// its worker invocations.
    pub fn from_registry(registry: &Registry, mapper: &str, reducer: &str) -> Result<JobBuilder> {
        let mut b = Job::builder(registry.get_mapper(mapper)?, registry.get_reducer(reducer)?);
        b.job.mapper_name = Some(mapper.to_string());
        b.job.reducer_name = Some(reducer.to_string());
        Ok(b)
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn aux_files(&self) -> &[String] {
        &self.aux_files
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn input_format(&self) -> Format {
        self.input_format
    }

    pub fn output_format(&self) -> Format {
        self.output_format
    }

    /// Worker invocations equivalent to this job's tasks, if its functions are named.
    pub fn worker_tasks(&self, trace: Option<&str>) -> Option<(WorkerTask, WorkerTask)> {
        let m = self.mapper_name.as_deref()?;
        let r = self.reducer_name.as_deref()?;
        let mut map = WorkerTask::new(Phase::Map, m, self.params.clone());
        let mut reduce = WorkerTask::new(Phase::Reduce, r, self.params.clone());
        if let Some(t) = trace {
            map = map.with_trace(t);
            reduce = reduce.with_trace(t);
        }
        Some((map, reduce))
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("mapper", &self.mapper_name)
            .field("reducer", &self.reducer_name)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("params", &self.params)
            .finish()
    }
}

pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn input(mut self, spec: impl Into<String>) -> JobBuilder {
        self.job.inputs.push(spec.into());
        self
    }

    pub fn inputs<I: IntoIterator<Item = S>, S: Into<String>>(mut self, specs: I) -> JobBuilder {
        self.job.inputs.extend(specs.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, spec: impl Into<String>) -> JobBuilder {
        self.job.output = spec.into();
        self
    }

    /// A file the functions depend on; it has to exist when the job is submitted.
    pub fn aux_file(mut self, path: impl Into<String>) -> JobBuilder {
        self.job.aux_files.push(path.into());
        self
    }

    pub fn params(mut self, params: ParameterSet) -> JobBuilder {
        self.job.params = params;
        self
    }

    pub fn param<V: fmt::Display>(mut self, name: &str, value: V) -> JobBuilder {
        self.job.params.insert(name, value);
        self
    }

    pub fn partitioner(mut self, p: Arc<dyn Partitioner>) -> JobBuilder {
        self.job.partitioner = p;
        self
    }

    pub fn formats(mut self, input: Format, output: Format) -> JobBuilder {
        self.job.input_format = input;
        self.job.output_format = output;
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

/// What a submitted job did.
#[derive(Clone, Debug)]
pub struct JobReport {
    pub output: String,
    pub inputs: Vec<PathBuf>,
    pub started: OffsetDateTime,
    pub finished: OffsetDateTime,
    pub elapsed: Duration,
    pub stats: JobStats,
    pub workers: Option<(WorkerTask, WorkerTask)>,
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let started = self.started.format(&Rfc3339).map_err(|_| fmt::Error)?;
        writeln!(f, "job {} started {}", self.output, started)?;
        if let Some((m, r)) = &self.workers {
            writeln!(f, "  mapper:  {}", m.to_args().join(" "))?;
            writeln!(f, "  reducer: {}", r.to_args().join(" "))?;
        }
        for i in &self.inputs {
            writeln!(f, "  input: {}", i.display())?;
        }
        writeln!(
            f,
            "  map tasks: {}, records in: {}, map output: {}, spill runs: {}",
            self.stats.map_tasks, self.stats.records_in, self.stats.map_records_out, self.stats.runs
        )?;
        write!(
            f,
            "  key groups: {}, records out: {}, elapsed: {} ms",
            self.stats.groups,
            self.stats.records_out,
            self.elapsed.as_millis()
        )
    }
}

/// Submits jobs against one storage root.
#[derive(Clone, Debug)]
pub struct Driver {
    storage: LocalStorage,
    params: MRParameters,
    trace: Option<String>,
}

impl Driver {
    pub fn new(storage: LocalStorage, params: MRParameters) -> Driver {
        Driver {
            storage,
            params,
            trace: None,
        }
    }

    /// Failed jobs write their error to the next free `<base><N>`.
    pub fn with_trace(mut self, base: &str) -> Driver {
        self.trace = Some(base.to_string());
        self
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn params(&self) -> &MRParameters {
        &self.params
    }

    fn check(&self, job: &Job) -> Result<Vec<PathBuf>> {
        if let Some(name) = job.params.reserved_names().into_iter().next() {
            return Err(DriverError::ReservedParameter { name }.into());
        }
        if let Some((name, value)) = job.params.flag_like_value() {
            return Err(DriverError::FlagLikeValue {
                name: name.to_string(),
                value: value.to_string(),
            }
            .into());
        }
        for aux in &job.aux_files {
            if !self.storage.exists(aux) {
                return Err(DriverError::MissingAuxFile { path: aux.clone() }.into());
            }
        }
        if self.storage.exists(&job.output) && !self.params.overwrite_output {
            return Err(DriverError::OutputExists {
                path: job.output.clone(),
            }
            .into());
        }
        let files = self.storage.resolve_all(&job.inputs)?;
        if files.is_empty() {
            return Err(DriverError::NoInputs {
                specs: job.inputs.clone(),
            }
            .into());
        }
        Ok(files)
    }

    /// Runs a job to completion and commits its output.
    #[tracing::instrument(name = "submit", skip_all, fields(output = %job.output))]
    pub fn submit(&self, job: &Job) -> Result<JobReport> {
        let started = OffsetDateTime::now_utc();
        let inputs = self.check(job)?;
        info!(
            inputs = inputs.len(),
            params = %job.params,
            input_format = %job.input_format,
            output_format = %job.output_format,
            "job submitted"
        );

        let target = self.storage.locate(&job.output);
        let staging = staging_dir(&target)?;
        let result = self.execute(job, &inputs, &staging);
        let result = result.and_then(|stats| {
            commit(&staging, &target)?;
            Ok(stats)
        });

        match result {
            Ok(stats) => {
                let finished = OffsetDateTime::now_utc();
                Ok(JobReport {
                    output: job.output.clone(),
                    inputs,
                    started,
                    finished,
                    elapsed: (finished - started).try_into().unwrap_or_default(),
                    stats,
                    workers: job.worker_tasks(self.trace.as_deref()),
                })
            }
            Err(e) => {
                if let Err(ce) = fs::remove_dir_all(&staging) {
                    warn!(dir = %staging.display(), error = %ce, "could not remove staging directory");
                }
                if let Some(base) = &self.trace {
                    let context = format!("job {}", job.output);
                    if let Err(te) = write_trace(&self.storage, base, &context, &e) {
                        warn!(error = %te, "could not write trace");
                    }
                }
                Err(e)
            }
        }
    }

    fn execute(&self, job: &Job, inputs: &[PathBuf], staging: &Path) -> Result<JobStats> {
        let mut lines = self.storage.open_lines(inputs)?;
        let functions = TaskFunctions {
            mapper: job.mapper.as_ref(),
            reducer: job.reducer.as_ref(),
            partitioner: job.partitioner.as_ref(),
        };
        let sinks = LinesSinkGenerator::new_to_dir(staging);
        let stats = MRController::run(
            functions,
            self.params.clone(),
            &job.params,
            PosRecordIterator::new(lines.by_ref()),
            &sinks,
        )?;
        match lines.take_error() {
            Some(e) => Err(MrError::Io(e)),
            None => Ok(stats),
        }
    }
}

/// Creates a fresh hidden directory next to `target`.
fn staging_dir(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = STAGING_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = parent.join(format!(".{}.staging-{}-{}", name, std::process::id(), n));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn commit(staging: &Path, target: &Path) -> Result<()> {
    if target.is_dir() {
        fs::remove_dir_all(target)?;
    } else if target.exists() {
        fs::remove_file(target)?;
    }
    fs::rename(staging, target)?;
    Ok(())
}
