//! The Mapper, Reducer and Partitioner traits and associated types.

use crate::error::RecordError;
use crate::parameter_set::ParameterSet;
use crate::record_types::{KeyGroup, MEmitter, REmitter, Record};

/// Default partitioning function: a polynomial string hash of the key's bytes, modulo `n`.
///
/// The hash is computed by hand instead of through `std::hash` so that assignments are stable
/// across processes, runs and compiler versions.
pub fn std_partition(n: usize, key: &str) -> usize {
    let mut h: u64 = 0;
    for b in key.bytes() {
        h = h.wrapping_mul(31).wrapping_add(b as u64);
    }
    (h % n.max(1) as u64) as usize
}

/// Map() function type. The MEmitter argument is used to emit values from
/// the map() function.
pub type MapperF = fn(&ParameterSet, &mut MEmitter, Record) -> Result<(), RecordError>;
/// Reduce() function type. The REmitter argument is used to emit values
/// from the reduce() function.
pub type ReducerF = fn(&ParameterSet, &mut REmitter, KeyGroup<'_>) -> Result<(), RecordError>;
/// A function used to determine the partition a key belongs in.
/// The first argument is the number of partitions, the second one the key;
/// the return value should be in [0; n).
pub type PartitionerF = fn(usize, &str) -> usize;

pub trait Mapper: Send + Sync {
    /// Takes one <key,value> pair and an emitter.
    /// The emitter is used to yield results from the map phase.
    ///
    /// A mapper must not keep state between invocations; anything it needs to know about the
    /// job comes from `params`.
    fn map(&self, params: &ParameterSet, em: &mut MEmitter, record: Record)
        -> Result<(), RecordError>;
}

pub trait Reducer: Send + Sync {
    /// Takes one key and its values and emits zero or more (key,value) pairs.
    fn reduce(
        &self,
        params: &ParameterSet,
        em: &mut REmitter,
        group: KeyGroup<'_>,
    ) -> Result<(), RecordError>;
}

pub trait Partitioner: Send + Sync {
    /// Determines how to map keys to reduce partitions.
    /// Returns a number in [0; n). Must be a pure function of `n` and `key`.
    /// The default implementation uses std_partition().
    fn partition(&self, n: usize, key: &str) -> usize {
        std_partition(n, key)
    }
}

/// The set of functions a job runs.
pub trait MapReducer: Mapper + Reducer + Partitioner {}

impl<T: Mapper + Reducer + Partitioner> MapReducer for T {}

pub struct DefaultPartitioner;

impl Partitioner for DefaultPartitioner {}
