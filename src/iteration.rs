//! Drives algorithms that repeat jobs until a fixed point is reached.
//!
//! Each round runs one or more jobs whose outputs are named `<base><NNNN>` after the round
//! number, so no name is ever reused and a stopped run can be resumed from any round. The round's
//! last job writes a single flag record; the controller reads it back from storage and hands it
//! to the algorithm's predicate. Rounds run strictly one after the other.

use std::fmt;

use tracing::{debug, info};

use crate::error::{MrError, RecordError, Result};
use crate::formats::lines::parse_record;
use crate::job::Driver;
use crate::record_types::Record;
use crate::storage::{ReadLimit, Storage};

/// Name of a per-round artifact, e.g. `artifact("frontier", 3) == "frontier0003"`.
pub fn artifact(base: &str, iteration: usize) -> String {
    format!("{}{:04}", base, iteration)
}

/// Glob matching the part files of a job output.
pub fn parts(output: &str) -> String {
    format!("{}/part*", output)
}

/// Reads one record of a job output: the first or the last line, depending on `limit`.
pub fn read_flag(storage: &dyn Storage, output: &str, limit: ReadLimit) -> Result<Record> {
    let text = storage.read(&[&parts(output)], limit)?;
    let line = match (limit.first, limit.last) {
        (Some(_), _) => text.lines().next(),
        _ => text.lines().last(),
    };
    match line {
        Some(l) => Ok(parse_record(l)),
        None => Err(MrError::Format(format!("{} has no flag record", output))),
    }
}

/// True if the flag's value is a nonzero integer: the `(1, 1)` "converged" record of the
/// termination jobs, as opposed to `(0, 0)` "continue".
pub fn flag_value_set(flag: &Record) -> std::result::Result<bool, RecordError> {
    let first = flag.value.split_whitespace().next().unwrap_or("");
    Ok(first.parse::<i64>()? != 0)
}

/// True if the flag record carries the reserved key `0`.
pub fn reserved_key_seen(flag: &Record) -> std::result::Result<bool, RecordError> {
    Ok(flag.key.trim().parse::<i64>()? == 0)
}

/// An algorithm the controller can drive.
pub trait IterativeAlgorithm {
    /// Writes the seed artifacts for a run starting at round `start` and returns the first
    /// round to execute.
    fn initialize(&mut self, driver: &Driver, start: usize) -> Result<usize>;

    /// Runs the jobs of one round. Returns the output holding the flag record.
    fn run_round(&mut self, driver: &Driver, iteration: usize) -> Result<String>;

    /// Where in the flag output the flag record is.
    fn flag_position(&self) -> ReadLimit {
        ReadLimit::last(1)
    }

    /// Decides from the flag record whether the iteration is over.
    fn converged(&self, flag: &Record) -> std::result::Result<bool, RecordError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Converged,
    MaxIterations,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterationState {
    Initializing,
    Iterating { iteration: usize },
    CheckingTermination { iteration: usize },
    Terminated { iteration: usize, reason: StopReason },
}

impl fmt::Display for IterationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationState::Initializing => write!(f, "initializing"),
            IterationState::Iterating { iteration } => write!(f, "iterating ({})", iteration),
            IterationState::CheckingTermination { iteration } => {
                write!(f, "checking termination ({})", iteration)
            }
            IterationState::Terminated { iteration, reason } => {
                write!(f, "terminated at {} ({:?})", iteration, reason)
            }
        }
    }
}

/// How an iterative run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IterationOutcome {
    /// Rounds executed by this run.
    pub rounds: usize,
    /// Number of the last executed round, if any.
    pub last_iteration: Option<usize>,
    pub reason: StopReason,
    pub flag: Option<Record>,
}

pub struct IterationController {
    start: usize,
    /// Exclusive upper bound on round numbers.
    max: Option<usize>,
    state: IterationState,
}

impl IterationController {
    /// Starts at round `start`; no round numbered `max` or higher is run.
    pub fn new(start: usize, max: Option<usize>) -> IterationController {
        IterationController {
            start,
            max,
            state: IterationState::Initializing,
        }
    }

    pub fn state(&self) -> IterationState {
        self.state
    }

    fn transition(&mut self, next: IterationState) {
        debug!(from = %self.state, to = %next, "iteration state");
        self.state = next;
    }

    #[tracing::instrument(name = "iterate", skip_all, fields(start = self.start))]
    pub fn run<A: IterativeAlgorithm>(&mut self, driver: &Driver, alg: &mut A) -> Result<IterationOutcome> {
        self.transition(IterationState::Initializing);
        let first = alg.initialize(driver, self.start)?;

        let mut iteration = first;
        let mut rounds = 0;
        let mut flag = None;
        let reason = loop {
            if self.max.map(|m| iteration >= m).unwrap_or(false) {
                break StopReason::MaxIterations;
            }
            self.transition(IterationState::Iterating { iteration });
            let flag_output = alg.run_round(driver, iteration)?;
            rounds += 1;

            self.transition(IterationState::CheckingTermination { iteration });
            let record = read_flag(driver.storage(), &flag_output, alg.flag_position())?;
            let done = alg.converged(&record).map_err(|e| {
                MrError::Format(format!("unreadable flag {:?} in {}: {}", record.to_string(), flag_output, e))
            })?;
            info!(iteration, flag = %record, done, "round finished");
            flag = Some(record);
            if done {
                break StopReason::Converged;
            }
            iteration += 1;
        };

        let last_iteration = if rounds > 0 { Some(first + rounds - 1) } else { None };
        self.transition(IterationState::Terminated {
            iteration: last_iteration.unwrap_or(first),
            reason,
        });
        Ok(IterationOutcome {
            rounds,
            last_iteration,
            reason,
            flag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use crate::parameter_set::ParameterSet;
    use crate::parameters::MRParameters;
    use crate::record_types::{KeyGroup, MEmitter, REmitter};
    use crate::storage::LocalStorage;

    fn dec_map(_: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
        let rec = parse_record(&r.value);
        e.emit(rec.key, rec.value.parse::<i64>()? - 1);
        Ok(())
    }

    fn ident_reduce(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
        let (k, vs) = g.into_parts();
        for v in vs {
            e.emit(&k, v);
        }
        Ok(())
    }

    /// Counts down from a seed; done when the count reaches zero.
    struct Countdown {
        seed: i64,
    }

    impl IterativeAlgorithm for Countdown {
        fn initialize(&mut self, driver: &Driver, start: usize) -> Result<usize> {
            let seed = artifact("count", start - 1);
            if !driver.storage().exists(&seed) {
                driver
                    .storage()
                    .write_records(&format!("{}/part-00000", seed), &[Record::new("0", self.seed.to_string())])?;
            }
            Ok(start)
        }

        fn run_round(&mut self, driver: &Driver, iteration: usize) -> Result<String> {
            let out = artifact("count", iteration);
            let job = Job::from_fns(dec_map, ident_reduce)
                .input(parts(&artifact("count", iteration - 1)))
                .output(out.clone())
                .build();
            driver.submit(&job)?;
            Ok(out)
        }

        fn converged(&self, flag: &Record) -> std::result::Result<bool, RecordError> {
            Ok(flag.value.parse::<i64>()? <= 0)
        }
    }

    fn driver(dir: &std::path::Path) -> Driver {
        let params = MRParameters::new()
            .set_concurrency(1, 2)
            .set_scratch_dir(dir.join("scratch"));
        Driver::new(LocalStorage::new(dir), params)
    }

    #[test]
    fn test_artifact_names() {
        assert_eq!(artifact("frontier", 1), "frontier0001");
        assert_eq!(artifact("t", 12345), "t12345");
        assert_eq!(parts("out0002"), "out0002/part*");
    }

    #[test]
    fn test_flag_predicates() {
        assert!(flag_value_set(&Record::new("1", "1")).unwrap());
        assert!(!flag_value_set(&Record::new("0", "0")).unwrap());
        assert!(flag_value_set(&Record::new("0", "x")).is_err());
        assert!(reserved_key_seen(&Record::new("0", "1")).unwrap());
        assert!(!reserved_key_seen(&Record::new("1", "1 2 3")).unwrap());
    }

    #[test]
    fn test_runs_until_converged() {
        let dir = tempfile::tempdir().unwrap();
        let d = driver(dir.path());
        let mut ctl = IterationController::new(1, None);
        let out = ctl.run(&d, &mut Countdown { seed: 3 }).unwrap();

        assert_eq!(out.rounds, 3);
        assert_eq!(out.last_iteration, Some(3));
        assert_eq!(out.reason, StopReason::Converged);
        assert_eq!(out.flag, Some(Record::new("0", "0")));
        assert_eq!(
            ctl.state(),
            IterationState::Terminated {
                iteration: 3,
                reason: StopReason::Converged
            }
        );
        for n in 0..=3 {
            assert!(d.storage().exists(&artifact("count", n)));
        }
    }

    #[test]
    fn test_max_iterations_and_resume() {
        let dir = tempfile::tempdir().unwrap();
        let d = driver(dir.path());

        let mut ctl = IterationController::new(1, Some(3));
        let out = ctl.run(&d, &mut Countdown { seed: 5 }).unwrap();
        assert_eq!(out.rounds, 2);
        assert_eq!(out.reason, StopReason::MaxIterations);
        assert_eq!(out.flag, Some(Record::new("0", "3")));

        // Picks up from the artifacts of round 2.
        let mut ctl = IterationController::new(3, None);
        let out = ctl.run(&d, &mut Countdown { seed: 5 }).unwrap();
        assert_eq!(out.rounds, 3);
        assert_eq!(out.last_iteration, Some(5));
        assert_eq!(out.reason, StopReason::Converged);
    }

    #[test]
    fn test_missing_flag_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = LocalStorage::new(dir.path());
        s.write_text("t0001/part-00000", "").unwrap();
        assert!(matches!(
            read_flag(&s, "t0001", ReadLimit::last(1)),
            Err(MrError::Format(_))
        ));
    }
}
