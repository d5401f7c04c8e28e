//! Implements a mapreduce process bounded to one machine, together with the machinery to run
//! iterative algorithms as a sequence of jobs.
//!
//! A job maps every input record, shuffles the output by key into sorted runs, and reduces each
//! key group once, in ascending key order. Iterative programs chain jobs through named outputs
//! and stop on a flag record written by a termination job.

pub mod algorithms;
pub mod closure_mr;
pub mod configuration;
pub mod controller;
pub mod error;
pub mod formats;
pub mod input_cache;
pub mod iteration;
pub mod job;
pub mod map;
pub mod mapreducer;
pub mod parameter_set;
pub mod parameters;
pub mod phases;
pub mod record_types;
pub mod reduce;
pub mod registry;
pub mod shard_merge;
pub mod sort;
pub mod storage;
pub mod telemetry;
pub mod worker;
