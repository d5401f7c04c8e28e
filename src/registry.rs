//! Explicit lookup table from function names to map/reduce implementations.
//!
//! A program builds its registry at startup and uses it both on the driver side (to submit
//! jobs by name) and on the worker side (to find the function a task should run).

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{MrError, RecordError};
use crate::mapreducer::{Mapper, MapperF, Reducer, ReducerF};
use crate::parameter_set::ParameterSet;
use crate::record_types::{KeyGroup, MEmitter, REmitter, Record};

// Wrapper structs adapting plain functions to the traits.
pub struct MapperWrapper(pub MapperF);
pub struct ReducerWrapper(pub ReducerF);

impl Mapper for MapperWrapper {
    fn map(&self, params: &ParameterSet, em: &mut MEmitter, r: Record) -> Result<(), RecordError> {
        (self.0)(params, em, r)
    }
}

impl Reducer for ReducerWrapper {
    fn reduce(
        &self,
        params: &ParameterSet,
        em: &mut REmitter,
        g: KeyGroup<'_>,
    ) -> Result<(), RecordError> {
        (self.0)(params, em, g)
    }
}

#[derive(Clone, Default)]
pub struct Registry {
    mappers: HashMap<String, Arc<dyn Mapper>>,
    reducers: HashMap<String, Arc<dyn Reducer>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn register_mapper<M: Mapper + 'static>(&mut self, name: &str, m: M) -> &mut Registry {
        self.mappers.insert(name.to_string(), Arc::new(m));
        self
    }

    pub fn register_reducer<R: Reducer + 'static>(&mut self, name: &str, r: R) -> &mut Registry {
        self.reducers.insert(name.to_string(), Arc::new(r));
        self
    }

    pub fn register_map_fn(&mut self, name: &str, f: MapperF) -> &mut Registry {
        self.register_mapper(name, MapperWrapper(f))
    }

    pub fn register_reduce_fn(&mut self, name: &str, f: ReducerF) -> &mut Registry {
        self.register_reducer(name, ReducerWrapper(f))
    }

    // Get mapper by name
    pub fn get_mapper(&self, name: &str) -> Result<Arc<dyn Mapper>, MrError> {
        self.mappers
            .get(name)
            .cloned()
            .ok_or_else(|| MrError::UnknownFunction(name.to_string()))
    }

    // Get reducer by name
    pub fn get_reducer(&self, name: &str) -> Result<Arc<dyn Reducer>, MrError> {
        self.reducers
            .get(name)
            .cloned()
            .ok_or_else(|| MrError::UnknownFunction(name.to_string()))
    }

    pub fn list_mappers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.mappers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn list_reducers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.reducers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::assert_ok;

    fn ident(_: &ParameterSet, e: &mut MEmitter, r: Record) -> Result<(), RecordError> {
        e.emit(r.key, r.value);
        Ok(())
    }

    fn first(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> Result<(), RecordError> {
        let (k, mut vs) = g.into_parts();
        if let Some(v) = vs.next() {
            e.emit(k, v);
        }
        Ok(())
    }

    #[test]
    fn test_lookup_by_name() {
        let mut reg = Registry::new();
        reg.register_map_fn("ident", ident)
            .register_reduce_fn("first", first);

        let m = assert_ok!(reg.get_mapper("ident"));
        let mut e = MEmitter::new();
        assert_ok!(m.map(&ParameterSet::new(), &mut e, Record::new("a", "b")));
        assert_eq!(e.len(), 1);

        assert_ok!(reg.get_reducer("first"));
        assert!(matches!(
            reg.get_mapper("first"),
            Err(MrError::UnknownFunction(ref n)) if n == "first"
        ));
        assert_eq!(reg.list_mappers(), vec!["ident"]);
        assert_eq!(reg.list_reducers(), vec!["first"]);
    }
}
