//! A MapReducer that uses supplied map()/reduce() functions.

use crate::error::RecordError;
use crate::mapreducer::{
    std_partition, Mapper, MapperF, Partitioner, PartitionerF, Reducer, ReducerF,
};
use crate::parameter_set::ParameterSet;
use crate::record_types::{KeyGroup, MEmitter, REmitter, Record};

/// This type implements the MapReducer trait. You can use it to provide your own functions to a
/// MapReduce process. If you need more flexibility, however, you may want to simply implement your
/// own type that fulfills MapReducer.
#[derive(Clone, Copy)]
pub struct ClosureMapReducer {
    mapper: MapperF,
    reducer: ReducerF,
    partitioner: PartitionerF,
}

impl ClosureMapReducer {
    /// Create a new MapReducer from the supplied functions.
    pub fn new(mapper: MapperF, reducer: ReducerF) -> ClosureMapReducer {
        ClosureMapReducer {
            mapper,
            reducer,
            partitioner: std_partition,
        }
    }

    /// Set the function used for partitioning.
    pub fn with_partitioner(mut self, p: PartitionerF) -> ClosureMapReducer {
        self.partitioner = p;
        self
    }
}

impl Mapper for ClosureMapReducer {
    fn map(&self, params: &ParameterSet, e: &mut MEmitter, r: Record) -> Result<(), RecordError> {
        (self.mapper)(params, e, r)
    }
}

impl Reducer for ClosureMapReducer {
    fn reduce(
        &self,
        params: &ParameterSet,
        e: &mut REmitter,
        g: KeyGroup<'_>,
    ) -> Result<(), RecordError> {
        (self.reducer)(params, e, g)
    }
}

impl Partitioner for ClosureMapReducer {
    fn partition(&self, n: usize, k: &str) -> usize {
        (self.partitioner)(n, k)
    }
}
