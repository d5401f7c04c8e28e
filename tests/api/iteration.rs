//! tests/api/iteration.rs
use prince::error::{RecordError, Result};
use prince::iteration::{artifact, parts, IterationController, IterationState, IterativeAlgorithm, StopReason};
use prince::job::{Driver, Job};
use prince::parameter_set::ParameterSet;
use prince::record_types::{KeyGroup, MEmitter, REmitter, Record};
use prince::storage::{ReadLimit, Storage};

use crate::helpers::driver;

fn halve(_: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
    let (k, v) = r.value.split_once('\t').unwrap_or((r.value.as_str(), ""));
    e.emit(k, v.parse::<u64>()? / 2);
    Ok(())
}

fn keep(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
    let (k, vs) = g.into_parts();
    for v in vs {
        e.emit(&k, v);
    }
    Ok(())
}

/// Halves a set of numbers until the smallest one (key `a`, which sorts first) reaches 1.
struct Halving;

impl IterativeAlgorithm for Halving {
    fn initialize(&mut self, driver: &Driver, start: usize) -> Result<usize> {
        driver.storage().write_text(
            &format!("{}/part-00000", artifact("half", start - 1)),
            "a\t16\nb\t1000\n",
        )?;
        Ok(start)
    }

    fn run_round(&mut self, driver: &Driver, iteration: usize) -> Result<String> {
        let out = artifact("half", iteration);
        let job = Job::from_fns(halve, keep)
            .input(parts(&artifact("half", iteration - 1)))
            .output(out.clone())
            .build();
        driver.submit(&job)?;
        Ok(out)
    }

    fn flag_position(&self) -> ReadLimit {
        ReadLimit::first(1)
    }

    fn converged(&self, flag: &Record) -> std::result::Result<bool, RecordError> {
        Ok(flag.key == "a" && flag.value.parse::<u64>()? <= 1)
    }
}

#[test]
fn the_predicate_sees_the_first_record_when_asked_to() {
    let dir = tempfile::tempdir().unwrap();
    // A single reducer keeps both keys in one part file, `a` first.
    let d = Driver::new(
        prince::storage::LocalStorage::new(dir.path()),
        prince::parameters::MRParameters::new()
            .set_concurrency(2, 1)
            .set_scratch_dir(dir.path().join("scratch")),
    );

    let mut ctl = IterationController::new(1, None);
    let outcome = ctl.run(&d, &mut Halving).unwrap();

    assert_eq!(outcome.rounds, 4);
    assert_eq!(outcome.reason, StopReason::Converged);
    assert_eq!(outcome.flag, Some(Record::new("a", "1")));
    assert_eq!(
        ctl.state(),
        IterationState::Terminated {
            iteration: 4,
            reason: StopReason::Converged
        }
    );
}

#[test]
fn a_failing_round_stops_the_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let d = driver(dir.path());
    // Round 1's output already exists, so its job is rejected.
    d.storage().write_text("half0001/part-00000", "x\n").unwrap();

    let mut ctl = IterationController::new(1, None);
    assert!(ctl.run(&d, &mut Halving).is_err());
    assert_eq!(ctl.state(), IterationState::Iterating { iteration: 1 });
}
