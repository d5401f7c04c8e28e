//! PageRank over a graph read from a local file.
//!
//! A node record is `node<TAB>previous current adjacent...` with both ranks printed with 40
//! decimals. The rank job's mapper sends each neighbor its share of the current rank and
//! re-emits the node's own data behind an `infos` marker; because the reducer sorts the values
//! of a group textually, the marker always ends up last, after the numeric shares. The
//! termination job compares previous and current ranks, either by the quadratic norm of all
//! changes (the default) or by the largest relative change of a single node.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{DriverError, MrError, RecordError, Result};
use crate::iteration::{artifact, flag_value_set, parts, IterationController, IterationOutcome, IterativeAlgorithm};
use crate::job::{Driver, Job};
use crate::parameter_set::ParameterSet;
use crate::record_types::{KeyGroup, MEmitter, REmitter, Record};
use crate::registry::Registry;
use crate::storage::{ReadLimit, Storage};

use super::graph::{connect_dangling, read_graph, Graph};
use super::parse_all;

const INFOS: &str = "infos";

/// How the termination job measures convergence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Norm {
    /// Stop once the sum of squared changes is at most precision².
    #[default]
    Quadratic,
    /// Stop once no node changed by more than `precision` relative to its current rank.
    Relative,
}

impl FromStr for Norm {
    type Err = RecordError;
    fn from_str(s: &str) -> std::result::Result<Norm, RecordError> {
        match s {
            "quadratic" => Ok(Norm::Quadratic),
            "relative" => Ok(Norm::Relative),
            other => Err(RecordError::new(format!("unknown norm {:?}", other))),
        }
    }
}

impl fmt::Display for Norm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Norm::Quadratic => f.write_str("quadratic"),
            Norm::Relative => f.write_str("relative"),
        }
    }
}

pub fn make_value(previous: f64, current: f64, adjacent: &[i64]) -> String {
    let mut v = format!("{:.40} {:.40}", previous, current);
    for n in adjacent {
        v.push(' ');
        v.push_str(&n.to_string());
    }
    v
}

struct NodeInfo {
    node: i64,
    previous: f64,
    current: f64,
    adjacent: Vec<i64>,
}

fn node_info(value: &str) -> Option<NodeInfo> {
    let mut it = value.split_whitespace();
    let node = it.next()?.parse().ok()?;
    let previous = it.next()?.parse().ok()?;
    let current = it.next()?.parse().ok()?;
    let adjacent = parse_all(it)?;
    Some(NodeInfo {
        node,
        previous,
        current,
        adjacent,
    })
}

fn norm(params: &ParameterSet) -> std::result::Result<Norm, RecordError> {
    match params.get("norm") {
        None => Ok(Norm::default()),
        Some(n) => n.parse(),
    }
}

pub fn pagerank_mapper(_: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
    let info = match node_info(&r.value) {
        Some(info) => info,
        None => return Ok(()),
    };
    let share = info.current / info.adjacent.len() as f64;
    for adjacent in &info.adjacent {
        e.emit(adjacent, share);
    }
    e.emit(
        info.node,
        format!("{} {}", INFOS, make_value(info.current, info.current, &info.adjacent)),
    );
    Ok(())
}

/// New rank = (1 - damping) / N + damping * (sum of incoming shares). Groups without node data
/// or with unreadable shares are dropped.
pub fn pagerank_reducer(params: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
    let (node, values) = g.into_parts();
    let mut values: Vec<String> = values.collect();
    values.sort();

    let infos = match values.pop() {
        Some(v) if v.starts_with(INFOS) => v,
        _ => return Ok(()),
    };
    let fields: Vec<&str> = infos.split_whitespace().collect();
    let (previous, adjacent) = match (fields.get(2), fields.get(3..)) {
        (Some(p), Some(adj)) => match (p.parse::<f64>(), parse_all::<i64, _, _>(adj)) {
            (Ok(p), Some(adj)) => (p, adj),
            _ => return Ok(()),
        },
        _ => return Ok(()),
    };
    let shares = match parse_all::<f64, _, _>(&values) {
        Some(s) => s,
        None => return Ok(()),
    };

    let damping: f64 = params.parse("damping")?;
    let nb_nodes: f64 = params.parse("nb_nodes")?;
    let rank = (1.0 - damping) / nb_nodes + damping * shares.iter().sum::<f64>();
    e.emit(node, make_value(previous, rank, &adjacent));
    Ok(())
}

/// Sends every node's change to the reserved key `0`.
pub fn term_mapper(params: &ParameterSet, e: &mut MEmitter, r: Record) -> std::result::Result<(), RecordError> {
    let info = match node_info(&r.value) {
        Some(info) => info,
        None => return Ok(()),
    };
    let delta = info.previous - info.current;
    match norm(params)? {
        Norm::Quadratic => e.emit(0, delta),
        Norm::Relative if info.current != 0.0 => e.emit(0, delta / info.current),
        Norm::Relative => e.emit(0, delta),
    }
    Ok(())
}

/// `(0, 0)` to continue, `(1, 1)` once converged. Unreadable changes stop the iteration.
pub fn term_reducer(params: &ParameterSet, e: &mut REmitter, g: KeyGroup<'_>) -> std::result::Result<(), RecordError> {
    let (_, values) = g.into_parts();
    let precision: f64 = params.parse("precision")?;
    let norm = norm(params)?;
    let go_on = match parse_all::<f64, _, _>(values) {
        None => false,
        Some(changes) => match norm {
            Norm::Quadratic => changes.iter().map(|c| c * c).sum::<f64>() > precision * precision,
            Norm::Relative => changes.iter().any(|c| c.abs() > precision),
        },
    };
    if go_on {
        e.emit(0, 0);
    } else {
        e.emit(1, 1);
    }
    Ok(())
}

pub fn register(r: &mut Registry) {
    r.register_map_fn("pagerank_mapper", pagerank_mapper)
        .register_reduce_fn("pagerank_reducer", pagerank_reducer)
        .register_map_fn("term_mapper", term_mapper)
        .register_reduce_fn("term_reducer", term_reducer);
}

/// PageRank with a uniform initial distribution.
pub struct PageRank<'r> {
    registry: &'r Registry,
    graph: Graph,
    ranks: String,
    terms: String,
    params: ParameterSet,
}

impl<'r> PageRank<'r> {
    /// Outputs are named `<output>_pagerank<NNNN>` and `<output>_term<NNNN>`.
    pub fn new(
        registry: &'r Registry,
        graph_path: &str,
        output: &str,
        damping: f64,
        precision: f64,
        norm: Norm,
    ) -> Result<PageRank<'r>> {
        let mut graph = read_graph(graph_path).map_err(|e| MrError::Format(e.to_string()))?;
        if graph.is_empty() {
            return Err(MrError::Format(format!("graph {} has no nodes", graph_path)));
        }
        connect_dangling(&mut graph);
        let params = ParameterSet::new()
            .with("damping", damping)
            .with("precision", precision)
            .with("nb_nodes", graph.len())
            .with("norm", norm);
        Ok(PageRank {
            registry,
            graph,
            ranks: format!("{}_pagerank", output),
            terms: format!("{}_term", output),
            params,
        })
    }

    pub fn ranks_name(&self, iteration: usize) -> String {
        artifact(&self.ranks, iteration)
    }

    pub fn term_name(&self, iteration: usize) -> String {
        artifact(&self.terms, iteration)
    }

    fn job(&self, mapper: &str, reducer: &str, input: &str, output: &str) -> Result<Job> {
        Ok(Job::from_registry(self.registry, mapper, reducer)?
            .input(parts(input))
            .output(output)
            .params(self.params.clone())
            .build())
    }
}

impl<'r> IterativeAlgorithm for PageRank<'r> {
    /// A run starting at round 1 writes the initial ranks as round 1 and continues at round 2.
    fn initialize(&mut self, driver: &Driver, start: usize) -> Result<usize> {
        if start != 1 {
            return Ok(start);
        }
        let initial = 1.0 / self.graph.len() as f64;
        let seed: Vec<Record> = self
            .graph
            .iter()
            .map(|(node, adjacent)| Record::new(node.to_string(), make_value(initial, initial, adjacent)))
            .collect();
        // Round 2 would be rejected anyway; fail before the seed of an earlier run is replaced.
        if !driver.params().overwrite_output {
            for name in [self.ranks_name(2), self.term_name(2)] {
                if driver.storage().exists(&name) {
                    return Err(DriverError::OutputExists { path: name }.into());
                }
            }
        }
        let first = self.ranks_name(1);
        driver.storage().remove(&first)?;
        driver
            .storage()
            .write_records(&format!("{}/part-00000", first), &seed)?;
        Ok(2)
    }

    fn run_round(&mut self, driver: &Driver, iteration: usize) -> Result<String> {
        let previous = self.ranks_name(iteration - 1);
        let current = self.ranks_name(iteration);
        let term = self.term_name(iteration);

        driver.submit(&self.job("pagerank_mapper", "pagerank_reducer", &previous, &current)?)?;
        driver.submit(&self.job("term_mapper", "term_reducer", &current, &term)?)?;
        Ok(term)
    }

    fn converged(&self, flag: &Record) -> std::result::Result<bool, RecordError> {
        flag_value_set(flag)
    }
}

/// Reads `node -> (previous, current)` ranks from a rank output.
pub fn read_ranks(storage: &dyn Storage, output: &str) -> Result<BTreeMap<i64, (f64, f64)>> {
    let text = storage.read(&[&parts(output)], ReadLimit::all())?;
    let mut ranks = BTreeMap::new();
    for line in text.lines() {
        let info = node_info(line).ok_or_else(|| MrError::Format(format!("bad rank record {:?}", line)))?;
        ranks.insert(info.node, (info.previous, info.current));
    }
    Ok(ranks)
}

/// Runs PageRank and returns the outcome with the final rank of every node.
pub fn pagerank(
    driver: &Driver,
    alg: &mut PageRank<'_>,
    start: usize,
    max: Option<usize>,
) -> Result<(IterationOutcome, BTreeMap<i64, f64>)> {
    let outcome = IterationController::new(start, max).run(driver, alg)?;
    let last = outcome.last_iteration.unwrap_or(start.max(1));
    let ranks = read_ranks(driver.storage(), &alg.ranks_name(last))?
        .into_iter()
        .map(|(node, (_, current))| (node, current))
        .collect();
    Ok((outcome, ranks))
}
