//! Graph Normalization and Snapshot
//!
//! Turns an authored [`PipelineGraph`] into the immutable [`ValidatedGraph`]
//! every engine reads. Normalization enforces the structural invariants
//! (resolved blocks, DAG, sources, sinks, reachability) and precomputes the
//! topological order, adjacency views, and data-path membership so engine
//! passes stay simple linear walks.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::catalog::{BlockCatalog, BuildingBlock};
use crate::error::{GraphError, GraphResult};
use crate::graph::pipeline::{Connection, PipelineGraph, PipelineNode};
use crate::types::NodeId;

/// Borrowed view of one node with its resolved block
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    /// Node id
    pub id: &'a NodeId,
    /// The authored node
    pub node: &'a PipelineNode,
    /// The catalog block the node instantiates
    pub block: &'a BuildingBlock,
}

/// Immutable, validated snapshot of a pipeline graph
///
/// All engines take `&ValidatedGraph`; two analyses of the same snapshot see
/// exactly the same structure, which is what makes engine runs referentially
/// transparent.
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    name: String,
    nodes: BTreeMap<NodeId, PipelineNode>,
    blocks: BTreeMap<NodeId, BuildingBlock>,
    connections: Vec<Connection>,
    topo_order: Vec<NodeId>,
    topo_index: BTreeMap<NodeId, usize>,
    all_succs: BTreeMap<NodeId, Vec<NodeId>>,
    data_preds: BTreeMap<NodeId, Vec<NodeId>>,
    data_succs: BTreeMap<NodeId, Vec<NodeId>>,
    sources: Vec<NodeId>,
    sinks: Vec<NodeId>,
    on_data_path: BTreeSet<NodeId>,
}

impl PipelineGraph {
    /// Validate the graph against a catalog and build the analysis snapshot
    ///
    /// Checks run in a fixed order and the first violation wins, so a given
    /// graph always reports the same error.
    ///
    /// # Errors
    ///
    /// Returns the [`GraphError`] kind matching the first violated
    /// structural invariant.
    pub fn validate(&self, catalog: &BlockCatalog) -> GraphResult<ValidatedGraph> {
        if self.nodes.is_empty() {
            return Err(GraphError::MissingSource);
        }

        // Resolve every node's block up front
        let mut blocks = BTreeMap::new();
        for (id, node) in &self.nodes {
            let block = catalog
                .get(&node.block)
                .ok_or_else(|| GraphError::unknown_block(id.clone(), node.block.clone()))?;
            blocks.insert(id.clone(), block.clone());
        }

        // Endpoint existence plus re-checks for graphs built via serde
        let mut seen = BTreeSet::new();
        for c in &self.connections {
            if !self.nodes.contains_key(&c.source) || !self.nodes.contains_key(&c.target) {
                return Err(GraphError::dangling_edge(c.source.clone(), c.target.clone()));
            }
            if c.source == c.target {
                return Err(GraphError::SelfReference {
                    node: c.source.clone(),
                });
            }
            if !seen.insert((c.source.clone(), c.target.clone(), c.kind)) {
                return Err(GraphError::DuplicateEdge {
                    from: c.source.clone(),
                    to: c.target.clone(),
                    kind: c.kind,
                });
            }
        }

        // Category edge rules: ingestion is never fed, storage never feeds
        for c in &self.connections {
            let (Some(src), Some(dst)) = (blocks.get(&c.source), blocks.get(&c.target)) else {
                continue;
            };
            if dst.category.is_ingestion() {
                return Err(GraphError::IngestionHasIncomingEdge {
                    node: c.target.clone(),
                });
            }
            if src.category.is_storage() {
                return Err(GraphError::StorageHasOutgoingEdge {
                    node: c.source.clone(),
                });
            }
        }

        // Unique-pair adjacency over the full relation and the data subset
        let mut succ_sets: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        let mut pred_sets: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        let mut data_succ_sets: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        let mut data_pred_sets: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for id in self.nodes.keys() {
            succ_sets.insert(id.clone(), BTreeSet::new());
            pred_sets.insert(id.clone(), BTreeSet::new());
            data_succ_sets.insert(id.clone(), BTreeSet::new());
            data_pred_sets.insert(id.clone(), BTreeSet::new());
        }
        for c in &self.connections {
            if let Some(set) = succ_sets.get_mut(&c.source) {
                set.insert(c.target.clone());
            }
            if let Some(set) = pred_sets.get_mut(&c.target) {
                set.insert(c.source.clone());
            }
            if c.kind.carries_data() {
                if let Some(set) = data_succ_sets.get_mut(&c.source) {
                    set.insert(c.target.clone());
                }
                if let Some(set) = data_pred_sets.get_mut(&c.target) {
                    set.insert(c.source.clone());
                }
            }
        }

        let topo_order = kahn_order(&self.nodes, &succ_sets, &pred_sets)?;

        let sources: Vec<NodeId> = blocks
            .iter()
            .filter(|(_, b)| b.category.is_ingestion())
            .map(|(id, _)| id.clone())
            .collect();
        if sources.is_empty() {
            return Err(GraphError::MissingSource);
        }
        let sinks: Vec<NodeId> = blocks
            .iter()
            .filter(|(_, b)| b.category.is_storage())
            .map(|(id, _)| id.clone())
            .collect();
        if sinks.is_empty() {
            return Err(GraphError::MissingSink);
        }

        // Every node hangs off some source; sources must lead somewhere
        let visited = breadth_first(&sources, &succ_sets);
        for id in self.nodes.keys() {
            if !visited.contains(id) {
                return Err(GraphError::unreachable(id.clone()));
            }
        }
        for id in &sources {
            if succ_sets.get(id).map_or(true, BTreeSet::is_empty) {
                return Err(GraphError::unreachable(id.clone()));
            }
        }

        // Nodes that both receive from a source and feed a sink over data
        // edges; only these count for bottleneck and efficiency analysis
        let fwd = breadth_first(&sources, &data_succ_sets);
        let back = breadth_first(&sinks, &data_pred_sets);
        let on_data_path: BTreeSet<NodeId> = fwd.intersection(&back).cloned().collect();

        let topo_index: BTreeMap<NodeId, usize> = topo_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        tracing::info!(
            "Normalized pipeline '{}': {} nodes, {} connections, {} sources, {} sinks",
            self.name,
            self.nodes.len(),
            self.connections.len(),
            sources.len(),
            sinks.len()
        );

        Ok(ValidatedGraph {
            name: self.name.clone(),
            nodes: self.nodes.clone(),
            blocks,
            connections: self.connections.clone(),
            topo_order,
            topo_index,
            all_succs: into_sorted_vecs(succ_sets),
            data_preds: into_sorted_vecs(data_pred_sets),
            data_succs: into_sorted_vecs(data_succ_sets),
            sources,
            sinks,
            on_data_path,
        })
    }
}

/// Kahn's algorithm with an ascending-id frontier
///
/// The `BTreeSet` frontier pops the smallest ready id, so the produced
/// numbering is stable across runs and across equal graphs.
fn kahn_order(
    nodes: &BTreeMap<NodeId, PipelineNode>,
    succ_sets: &BTreeMap<NodeId, BTreeSet<NodeId>>,
    pred_sets: &BTreeMap<NodeId, BTreeSet<NodeId>>,
) -> GraphResult<Vec<NodeId>> {
    let mut remaining: BTreeMap<&NodeId, usize> = pred_sets
        .iter()
        .map(|(id, preds)| (id, preds.len()))
        .collect();
    let mut frontier: BTreeSet<&NodeId> = remaining
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(id) = frontier.pop_first() {
        order.push(id.clone());
        if let Some(succs) = succ_sets.get(id) {
            for succ in succs {
                if let Some(deg) = remaining.get_mut(succ) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        frontier.insert(succ);
                    }
                }
            }
        }
    }

    if order.len() == nodes.len() {
        return Ok(order);
    }

    // Leftover nodes all sit on or behind a cycle; walk predecessors inside
    // the leftover set until one repeats to name a true cycle member
    let ordered: BTreeSet<&NodeId> = order.iter().collect();
    let leftover: BTreeSet<&NodeId> = nodes.keys().filter(|id| !ordered.contains(id)).collect();
    let mut cursor = match leftover.first() {
        Some(id) => *id,
        None => return Ok(order),
    };
    let mut walked: BTreeSet<&NodeId> = BTreeSet::new();
    loop {
        if !walked.insert(cursor) {
            return Err(GraphError::cycle(cursor.clone()));
        }
        let next = pred_sets
            .get(cursor)
            .and_then(|preds| preds.iter().find(|p| leftover.contains(p)));
        match next {
            Some(pred) => cursor = pred,
            // A leftover node always keeps a leftover predecessor; name the
            // walk end if that invariant ever breaks
            None => return Err(GraphError::cycle(cursor.clone())),
        }
    }
}

/// Breadth-first reachability over an adjacency view
fn breadth_first(
    start: &[NodeId],
    adjacency: &BTreeMap<NodeId, BTreeSet<NodeId>>,
) -> BTreeSet<NodeId> {
    let mut visited: BTreeSet<NodeId> = start.iter().cloned().collect();
    let mut queue: VecDeque<NodeId> = start.iter().cloned().collect();
    while let Some(id) = queue.pop_front() {
        if let Some(nexts) = adjacency.get(&id) {
            for next in nexts {
                if visited.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }
    }
    visited
}

fn into_sorted_vecs(sets: BTreeMap<NodeId, BTreeSet<NodeId>>) -> BTreeMap<NodeId, Vec<NodeId>> {
    sets.into_iter()
        .map(|(id, set)| (id, set.into_iter().collect()))
        .collect()
}

impl ValidatedGraph {
    /// Pipeline name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of connections
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Node view by id
    #[must_use]
    pub fn get(&self, id: &NodeId) -> Option<NodeRef<'_>> {
        let node = self.nodes.get(id)?;
        let block = self.blocks.get(id)?;
        Some(NodeRef {
            id: &node.id,
            node,
            block,
        })
    }

    /// Iterate node views in topological order
    pub fn iter_topo(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.topo_order.iter().filter_map(|id| self.get(id))
    }

    /// Stable topological numbering of a node
    #[must_use]
    pub fn topo_position(&self, id: &NodeId) -> Option<usize> {
        self.topo_index.get(id).copied()
    }

    /// The topological order itself
    #[must_use]
    pub fn topo_order(&self) -> &[NodeId] {
        &self.topo_order
    }

    /// All connections in authoring order
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Data-flow connections entering a node
    pub fn data_inputs<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Connection> {
        self.connections
            .iter()
            .filter(move |c| c.kind.carries_data() && &c.target == id)
    }

    /// Data-flow connections leaving a node
    pub fn data_outputs<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Connection> {
        self.connections
            .iter()
            .filter(move |c| c.kind.carries_data() && &c.source == id)
    }

    /// Ids of data-flow predecessors, ascending
    #[must_use]
    pub fn data_predecessors(&self, id: &NodeId) -> &[NodeId] {
        self.data_preds.get(id).map_or(&[], Vec::as_slice)
    }

    /// Ids of data-flow successors, ascending
    #[must_use]
    pub fn data_successors(&self, id: &NodeId) -> &[NodeId] {
        self.data_succs.get(id).map_or(&[], Vec::as_slice)
    }

    /// Ids of successors over all edge kinds, ascending
    #[must_use]
    pub fn successors(&self, id: &NodeId) -> &[NodeId] {
        self.all_succs.get(id).map_or(&[], Vec::as_slice)
    }

    /// Source node ids (ingestion), ascending
    #[must_use]
    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    /// Sink node ids (storage), ascending
    #[must_use]
    pub fn sinks(&self) -> &[NodeId] {
        &self.sinks
    }

    /// Whether a node is a source
    #[must_use]
    pub fn is_source(&self, id: &NodeId) -> bool {
        self.sources.binary_search(id).is_ok()
    }

    /// Whether a node is a sink
    #[must_use]
    pub fn is_sink(&self, id: &NodeId) -> bool {
        self.sinks.binary_search(id).is_ok()
    }

    /// Whether a node lies on some source-to-sink data path
    #[must_use]
    pub fn on_data_path(&self, id: &NodeId) -> bool {
        self.on_data_path.contains(id)
    }
}
