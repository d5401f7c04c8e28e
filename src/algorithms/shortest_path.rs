//! Single-source shortest paths with unit edge weights.
//!
//! Every round runs three jobs. The frontier job expands the previous round's filter by one
//! hop and keeps the minimum distance per node. The filter job compares the new frontier with
//! the previous one and marks distances that did not change by negating them. The termination
//! job funnels one "changed" bit per node to the reserved key `0`; its reducer writes `(0, 0)`
//! to continue or `(1, 1)` once nothing that could still spread has changed.
//!
//! Records are `node<TAB>distance`. The graph is read from the local file named by the `graph`
//! parameter.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{MrError, RecordError, Result};
use crate::iteration::{artifact, flag_value_set, parts, IterationController, IterationOutcome, IterativeAlgorithm};
use crate::job::{Driver, Job};
use crate::mapreducer::Mapper;
use crate::parameter_set::ParameterSet;
use crate::record_types::{KeyGroup, MEmitter, REmitter, Record};
use crate::registry::Registry;
use crate::storage::{ReadLimit, Storage};

use super::graph::GraphCache;
use super::parse_all;

pub const FRONTIER: &str = "frontier";
pub const FILTER: &str = "filter";
pub const TERMINATION: &str = "termination";

/// Parses a `node distance` line; None for anything else.
fn node_info(value: &str) -> Option<(i64, i64)> {
    let mut it = value.split_whitespace();
    let node = it.next()?.parse().ok()?;
    let distance = it.next()?.parse().ok()?;
    match it.next() {
        None => Some((node, distance)),
        Some(_) => None,
    }
}

/// Expands the frontier by one hop. Nodes with a negative (unchanged) distance are carried
/// over without being expanded again.
pub struct FrontierMapper {
    graphs: Arc<GraphCache>,
}

impl Mapper for FrontierMapper {
    fn map(&self, params: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
        let (node, distance) = match node_info(&r.value) {
            Some(info) => info,
            None => return Ok(()),
        };
        e.emit(node, distance.abs());
        if distance >= 0 {
            let graph = self.graphs.get(params.require("graph")?)?;
            for adjacent in graph.get(&node).into_iter().flatten() {
                e.emit(adjacent, distance + 1);
            }
        }
        Ok(())
    }
}

pub fn frontier_reducer(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
    let (node, values) = g.into_parts();
    if let Some(min) = parse_all::<i64, _, _>(values).and_then(|d| d.into_iter().min()) {
        e.emit(node, min);
    }
    Ok(())
}

pub fn filter_mapper(_: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
    if let Some((node, distance)) = node_info(&r.value) {
        e.emit(node, distance);
    }
    Ok(())
}

/// Compares a node's distance in the previous and the current frontier.
pub fn filter_reducer(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
    let (node, values) = g.into_parts();
    let distances = match parse_all::<i64, _, _>(values) {
        Some(d) => d,
        None => return Ok(()),
    };
    match distances[..] {
        [] => (),
        [d] => e.emit(node, d),
        [a, b] if a == b => e.emit(node, -a),
        _ => {
            if let Some(min) = distances.iter().min() {
                e.emit(node, min);
            }
        }
    }
    Ok(())
}

/// Maps every node to the reserved key `0` with 1 if its distance changed in a way that can
/// still reach other nodes, 0 otherwise. A changed node without out-edges cannot improve any
/// other distance.
pub struct TerminationMapper {
    graphs: Arc<GraphCache>,
}

impl Mapper for TerminationMapper {
    fn map(&self, params: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
        let (node, distance) = match node_info(&r.value) {
            Some(info) => info,
            None => return Ok(()),
        };
        let mut changed = distance > 0;
        if changed {
            let graph = self.graphs.get(params.require("graph")?)?;
            changed = graph.get(&node).map(|a| !a.is_empty()).unwrap_or(false);
        }
        e.emit(0, if changed { 1 } else { 0 });
        Ok(())
    }
}

/// `(0, 0)` if any node changed, else `(1, 1)`. Unreadable input stops the iteration.
pub fn termination_reducer(_: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
    let (_, values) = g.into_parts();
    let any_changed = parse_all::<i64, _, _>(values)
        .map(|c| c.iter().any(|&c| c != 0))
        .unwrap_or(false);
    if any_changed {
        e.emit(0, 0);
    } else {
        e.emit(1, 1);
    }
    Ok(())
}

pub fn register(r: &mut Registry) {
    let graphs = Arc::new(GraphCache::default());
    r.register_mapper("frontier_mapper", FrontierMapper { graphs: graphs.clone() })
        .register_reduce_fn("frontier_reducer", frontier_reducer)
        .register_map_fn("filter_mapper", filter_mapper)
        .register_reduce_fn("filter_reducer", filter_reducer)
        .register_mapper("termination_mapper", TerminationMapper { graphs })
        .register_reduce_fn("termination_reducer", termination_reducer);
}

/// Shortest paths from one source node of the graph in a local file.
pub struct ShortestPath<'r> {
    registry: &'r Registry,
    graph: String,
    source: String,
}

impl<'r> ShortestPath<'r> {
    pub fn new(registry: &'r Registry, graph: &str, source: &str) -> ShortestPath<'r> {
        ShortestPath {
            registry,
            graph: graph.to_string(),
            source: source.to_string(),
        }
    }

    fn job(&self, driver: &Driver, mapper: &str, reducer: &str, inputs: &[String], output: &str) -> Result<Job> {
        let located = driver.storage().locate(&self.graph);
        Ok(Job::from_registry(self.registry, mapper, reducer)?
            .inputs(inputs.iter().cloned())
            .output(output)
            .aux_file(self.graph.clone())
            .param("graph", located.display())
            .param("source", &self.source)
            .build())
    }
}

impl<'r> IterativeAlgorithm for ShortestPath<'r> {
    /// Seeds `(source, 0)` into the frontier and filter of the round before `start`, unless a
    /// previous run already produced them.
    fn initialize(&mut self, driver: &Driver, start: usize) -> Result<usize> {
        let prev = start
            .checked_sub(1)
            .ok_or_else(|| MrError::Format(String::from("rounds are numbered from 1")))?;
        let seed = [Record::new(self.source.clone(), "0")];
        for base in [FRONTIER, FILTER] {
            let name = artifact(base, prev);
            if !driver.storage().exists(&name) {
                driver.storage().write_records(&format!("{}/part-00000", name), &seed)?;
            }
        }
        Ok(start)
    }

    fn run_round(&mut self, driver: &Driver, iteration: usize) -> Result<String> {
        let frontier_previous = artifact(FRONTIER, iteration - 1);
        let frontier_current = artifact(FRONTIER, iteration);
        let filter_previous = artifact(FILTER, iteration - 1);
        let filter_current = artifact(FILTER, iteration);
        let termination_current = artifact(TERMINATION, iteration);

        let frontier = self.job(
            driver,
            "frontier_mapper",
            "frontier_reducer",
            &[parts(&filter_previous)],
            &frontier_current,
        )?;
        driver.submit(&frontier)?;

        let filter = self.job(
            driver,
            "filter_mapper",
            "filter_reducer",
            &[parts(&frontier_previous), parts(&frontier_current)],
            &filter_current,
        )?;
        driver.submit(&filter)?;

        let termination = self.job(
            driver,
            "termination_mapper",
            "termination_reducer",
            &[parts(&filter_current)],
            &termination_current,
        )?;
        driver.submit(&termination)?;
        Ok(termination_current)
    }

    fn converged(&self, flag: &Record) -> std::result::Result<bool, RecordError> {
        flag_value_set(flag)
    }
}

/// Reads node distances from a filter or frontier output. Unchanged (negated) distances are
/// reported as positive.
pub fn read_distances(storage: &dyn Storage, output: &str) -> Result<BTreeMap<i64, i64>> {
    let text = storage.read(&[&parts(output)], ReadLimit::all())?;
    let mut distances = BTreeMap::new();
    for line in text.lines() {
        let (node, d) =
            node_info(line).ok_or_else(|| MrError::Format(format!("bad distance record {:?}", line)))?;
        distances.insert(node, d.abs());
    }
    Ok(distances)
}

/// Runs the search and returns the outcome with the final distances.
pub fn shortest_paths(
    driver: &Driver,
    registry: &Registry,
    graph: &str,
    source: &str,
    start: usize,
    max: Option<usize>,
) -> Result<(IterationOutcome, BTreeMap<i64, i64>)> {
    let mut alg = ShortestPath::new(registry, graph, source);
    let outcome = IterationController::new(start, max).run(driver, &mut alg)?;
    let last = outcome.last_iteration.unwrap_or(start.saturating_sub(1));
    let distances = read_distances(driver.storage(), &artifact(FILTER, last))?;
    Ok((outcome, distances))
}
