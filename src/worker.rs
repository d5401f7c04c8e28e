//! Worker entry point: runs one registered map or reduce function over a text stream.
//!
//! This is what an execution engine launches when a task crosses a process boundary. The task
//! is described by `--pmapper NAME` or `--preducer NAME`, an optional `--trace BASE`, and the
//! job's parameters as `--name value` tokens. A map worker reads plain lines (keyed by ordinal)
//! and writes its emitted records unsorted; a reduce worker reads key-sorted text records and
//! writes one group's output after the other.

use std::io::{BufRead, Write};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::error::{MrError, Phase, RecordError, Result};
use crate::formats::lines::{parse_record, LinesWriter};
use crate::formats::util::RecordSink;
use crate::parameter_set::{ParameterSet, MAPPER_FLAG, REDUCER_FLAG, TRACE_PARAM};
use crate::record_types::{MEmitter, Record};
use crate::reduce::reduce_sorted;
use crate::registry::Registry;
use crate::storage::Storage;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerTask {
    pub phase: Phase,
    pub function: String,
    pub trace: Option<String>,
    pub params: ParameterSet,
}

fn single_value(set: &mut ParameterSet, name: &str) -> Result<Option<String>> {
    match set.remove(name) {
        None => Ok(None),
        Some(mut v) if v.len() == 1 => Ok(v.pop()),
        Some(_) => Err(MrError::Format(format!("--{} needs exactly one value", name))),
    }
}

impl WorkerTask {
    pub fn new(phase: Phase, function: &str, params: ParameterSet) -> WorkerTask {
        WorkerTask {
            phase,
            function: function.to_string(),
            trace: None,
            params,
        }
    }

    pub fn with_trace(mut self, base: &str) -> WorkerTask {
        self.trace = Some(base.to_string());
        self
    }

    /// Parses worker arguments. The reserved names are stripped, so `params` holds exactly what
    /// the job submitted.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<WorkerTask> {
        let mut params = ParameterSet::from_args(args);
        let mapper = single_value(&mut params, MAPPER_FLAG)?;
        let reducer = single_value(&mut params, REDUCER_FLAG)?;
        let trace = single_value(&mut params, TRACE_PARAM)?;

        let (phase, function) = match (mapper, reducer) {
            (Some(m), None) => (Phase::Map, m),
            (None, Some(r)) => (Phase::Reduce, r),
            _ => {
                return Err(MrError::Format(format!(
                    "a worker needs exactly one of --{} and --{}",
                    MAPPER_FLAG, REDUCER_FLAG
                )))
            }
        };
        Ok(WorkerTask {
            phase,
            function,
            trace,
            params,
        })
    }

    /// The arguments from_args() turns back into this task.
    pub fn to_args(&self) -> Vec<String> {
        let flag = match self.phase {
            Phase::Map => MAPPER_FLAG,
            Phase::Reduce => REDUCER_FLAG,
        };
        let mut args = vec![format!("--{}", flag), self.function.clone()];
        if let Some(t) = &self.trace {
            args.push(format!("--{}", TRACE_PARAM));
            args.push(t.clone());
        }
        args.extend(self.params.to_args());
        args
    }

    /// Runs the task. Returns the number of records written.
    pub fn run<R: BufRead, W: Write>(&self, registry: &Registry, input: R, output: W) -> Result<u64> {
        let mut sink = LinesWriter::new_to_write(output);
        match self.phase {
            Phase::Map => self.run_map(registry, input, &mut sink)?,
            Phase::Reduce => self.run_reduce(registry, input, &mut sink)?,
        }
        sink.finish()?;
        Ok(sink.records_written())
    }

    fn run_map<R: BufRead, S: RecordSink>(&self, registry: &Registry, input: R, sink: &mut S) -> Result<()> {
        let mapper = registry.get_mapper(&self.function)?;
        for (ordinal, line) in input.lines().enumerate() {
            let key = ordinal.to_string();
            let mut em = MEmitter::new();
            mapper
                .map(&self.params, &mut em, Record::new(key.clone(), line?))
                .map_err(|source| MrError::RecordProcessing {
                    phase: Phase::Map,
                    key: key.clone(),
                    source,
                })?;
            for r in em.into_records() {
                sink.write_record(&r).map_err(|e| MrError::RecordProcessing {
                    phase: Phase::Map,
                    key: key.clone(),
                    source: RecordError::new(e.to_string()),
                })?;
            }
        }
        Ok(())
    }

    fn run_reduce<R: BufRead, S: RecordSink>(&self, registry: &Registry, input: R, sink: &mut S) -> Result<()> {
        let reducer = registry.get_reducer(&self.function)?;
        let mut read_error = None;
        let records = input
            .lines()
            .map_while(|l| match l {
                Ok(l) => Some(l),
                Err(e) => {
                    read_error = Some(e);
                    None
                }
            })
            .filter(|l| !l.is_empty())
            .map(|l| parse_record(&l));
        reduce_sorted(reducer.as_ref(), &self.params, records, sink, || Ok(()))?;
        match read_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Runs a worker task. If the task fails and has a trace sink, the error is written to the
/// first unused `<trace><N>` before it is returned.
pub fn run_worker<R: BufRead, W: Write>(
    task: &WorkerTask,
    registry: &Registry,
    storage: &dyn Storage,
    input: R,
    output: W,
) -> Result<u64> {
    match task.run(registry, input, output) {
        Ok(n) => {
            info!(phase = %task.phase, function = %task.function, records_out = n, "worker finished");
            Ok(n)
        }
        Err(e) => {
            if let Some(base) = &task.trace {
                let context = format!("{} task {}", task.phase, task.function);
                match write_trace(storage, base, &context, &e) {
                    Ok(path) => error!(trace = %path, "worker failed"),
                    Err(te) => error!(error = %te, "could not write trace"),
                }
            }
            Err(e)
        }
    }
}

/// First name `<base><N>`, N = 0, 1, 2, ..., that does not exist yet.
pub fn trace_path(storage: &dyn Storage, base: &str) -> String {
    let mut n = 0;
    loop {
        let path = format!("{}{}", base, n);
        if !storage.exists(&path) {
            return path;
        }
        n += 1;
    }
}

/// Writes a failure report to the next free trace name and returns that name.
pub fn write_trace(storage: &dyn Storage, base: &str, context: &str, err: &MrError) -> Result<String> {
    let path = trace_path(storage, base);
    let when = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("unknown time"));
    let report = format!("{} {} failed\n{:?}", when, context, err);
    storage.write_text(&path, &report)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_types::{KeyGroup, REmitter};
    use crate::storage::LocalStorage;
    use claims::assert_ok;

    fn split(_: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
        if r.value == "bad" {
            return Err(RecordError::new("bad line"));
        }
        for w in r.value.split_whitespace() {
            e.emit(w, &r.key);
        }
        Ok(())
    }

    fn join(p: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
        let sep = p.get("sep").unwrap_or(",");
        let (k, vs) = g.into_parts();
        e.emit(k, vs.collect::<Vec<_>>().join(sep));
        Ok(())
    }

    fn registry() -> Registry {
        let mut r = Registry::new();
        r.register_map_fn("split", split).register_reduce_fn("join", join);
        r
    }

    #[test]
    fn test_args_round_trip_and_strip_reserved() {
        let task = WorkerTask::new(Phase::Reduce, "join", ParameterSet::new().with("sep", "+")).with_trace("t");
        let args = task.to_args();
        assert_eq!(args[..4], ["--preducer", "join", "--trace", "t"]);
        let parsed = WorkerTask::from_args(&args).unwrap();
        assert_eq!(parsed, task);
        assert!(!parsed.params.contains("preducer"));
        assert!(!parsed.params.contains("trace"));
    }

    #[test]
    fn test_task_type_is_required_once() {
        assert!(WorkerTask::from_args(&["--x", "1"]).is_err());
        assert!(WorkerTask::from_args(&["--pmapper", "a", "--preducer", "b"]).is_err());
    }

    #[test]
    fn test_map_worker_keys_lines_by_ordinal() {
        let task = WorkerTask::new(Phase::Map, "split", ParameterSet::new());
        let mut out = Vec::new();
        let n = task.run(&registry(), &b"a b\nc\n"[..], &mut out).unwrap();
        assert_eq!(n, 3);
        assert_eq!(String::from_utf8(out).unwrap(), "a\t0\nb\t0\nc\t1\n");
    }

    #[test]
    fn test_reduce_worker_groups_sorted_input() {
        let task = WorkerTask::new(Phase::Reduce, "join", ParameterSet::new().with("sep", "+"));
        let mut out = Vec::new();
        task.run(&registry(), &b"a\t0\na\t1\nb\t0\n\n"[..], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\t0+1\nb\t0\n");
    }

    #[test]
    fn test_unknown_function() {
        let task = WorkerTask::new(Phase::Map, "nope", ParameterSet::new());
        let err = task.run(&registry(), &b""[..], Vec::new()).unwrap_err();
        assert!(matches!(err, MrError::UnknownFunction(n) if n == "nope"));
    }

    #[test]
    fn test_failure_goes_to_next_free_trace() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert_ok!(storage.write_text("trace0", "older failure"));

        let task = WorkerTask::new(Phase::Map, "split", ParameterSet::new()).with_trace("trace");
        let err = run_worker(&task, &registry(), &storage, &b"ok\nbad\n"[..], Vec::new()).unwrap_err();
        assert!(matches!(err, MrError::RecordProcessing { ref key, .. } if key == "1"));

        let report = std::fs::read_to_string(storage.locate("trace1")).unwrap();
        assert!(report.contains("map task split failed"));
        assert!(report.contains("bad line"));
        assert_eq!(trace_path(&storage, "trace"), "trace2");
    }
}
