//! Error taxonomy of the engine.

use std::fmt;
use std::time::Duration;

/// Renders an error together with its chain of causes.
pub fn error_chain_fmt(
    f: &mut std::fmt::Formatter<'_>,
    e: &impl std::error::Error,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

/// The phase a task belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Map,
    Reduce,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Map => f.write_str("map"),
            Phase::Reduce => f.write_str("reduce"),
        }
    }
}

/// Returned by user map()/reduce() functions to reject a record.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RecordError(String);

impl RecordError {
    pub fn new(msg: impl Into<String>) -> RecordError {
        RecordError(msg.into())
    }
}

impl From<std::num::ParseIntError> for RecordError {
    fn from(e: std::num::ParseIntError) -> Self {
        RecordError(format!("not an integer: {}", e))
    }
}

impl From<std::num::ParseFloatError> for RecordError {
    fn from(e: std::num::ParseFloatError) -> Self {
        RecordError(format!("not a number: {}", e))
    }
}

/// A job was rejected before any task ran.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("no input files matched {specs:?}")]
    NoInputs { specs: Vec<String> },
    #[error("output {path} already exists")]
    OutputExists { path: String },
    #[error("parameter name {name:?} is reserved by the engine")]
    ReservedParameter { name: String },
    #[error("value {value:?} of parameter {name:?} would be read back as a flag")]
    FlagLikeValue { name: String, value: String },
    #[error("invalid input pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("auxiliary file {path} does not exist")]
    MissingAuxFile { path: String },
}

#[derive(thiserror::Error)]
pub enum MrError {
    #[error("{phase} function failed on key {key:?}")]
    RecordProcessing {
        phase: Phase,
        key: String,
        #[source]
        source: RecordError,
    },
    #[error("job rejected")]
    Driver(#[from] DriverError),
    #[error("{phase} worker {shard} failed: {reason}")]
    WorkerFailure {
        phase: Phase,
        shard: usize,
        reason: String,
    },
    #[error("job exceeded its time limit of {limit:?}")]
    Timeout { limit: Duration },
    /// Another task of the same job failed first.
    #[error("task cancelled")]
    Cancelled,
    #[error("i/o error")]
    Io(#[from] std::io::Error),
    #[error("malformed data: {0}")]
    Format(String),
    #[error("no function registered under the name {0:?}")]
    UnknownFunction(String),
}

impl fmt::Debug for MrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        error_chain_fmt(f, self)
    }
}

pub type Result<T> = std::result::Result<T, MrError>;
