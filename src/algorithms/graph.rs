//! Adjacency-list graph files: each line is a node id followed by the ids it points to.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::error::RecordError;

pub type Graph = BTreeMap<i64, Vec<i64>>;

pub fn parse_graph(text: &str) -> Result<Graph, RecordError> {
    let mut graph = Graph::new();
    for line in text.lines() {
        let mut ids = line.split_whitespace();
        let node = match ids.next() {
            Some(n) => n.parse::<i64>()?,
            None => continue,
        };
        let adjacent = ids.map(str::parse::<i64>).collect::<Result<Vec<_>, _>>()?;
        graph.insert(node, adjacent);
    }
    Ok(graph)
}

pub fn read_graph(path: &str) -> Result<Graph, RecordError> {
    let text = fs::read_to_string(path)
        .map_err(|e| RecordError::new(format!("cannot read graph {}: {}", path, e)))?;
    parse_graph(&text)
}

/// Connects every node without out-links to all other nodes.
pub fn connect_dangling(graph: &mut Graph) {
    let nodes: Vec<i64> = graph.keys().copied().collect();
    for (node, adjacent) in graph.iter_mut() {
        if adjacent.is_empty() {
            adjacent.extend(nodes.iter().copied().filter(|n| n != node));
        }
    }
}

/// Size and modification time of a graph file.
type Stamp = (u64, Option<SystemTime>);

fn stamp(path: &str) -> Result<Stamp, RecordError> {
    let meta = fs::metadata(path)
        .map_err(|e| RecordError::new(format!("cannot read graph {}: {}", path, e)))?;
    Ok((meta.len(), meta.modified().ok()))
}

/// Graphs loaded by map tasks, keyed by path. The tasks of a job share one parse; a file whose
/// size or modification time changed is parsed again.
#[derive(Default)]
pub struct GraphCache {
    graphs: Mutex<HashMap<String, (Stamp, Arc<Graph>)>>,
}

impl GraphCache {
    pub fn get(&self, path: &str) -> Result<Arc<Graph>, RecordError> {
        let current = stamp(path)?;
        let mut graphs = self.graphs.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((seen, g)) = graphs.get(path) {
            if *seen == current {
                return Ok(g.clone());
            }
        }
        let g = Arc::new(read_graph(path)?);
        graphs.insert(path.to_string(), (current, g.clone()));
        Ok(g)
    }
}
