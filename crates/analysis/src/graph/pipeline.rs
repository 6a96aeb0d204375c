//! Pipeline Graph Authoring Model
//!
//! Mutable graph representation the designer builds up node by node. The
//! builders reject what they can catch locally (duplicate node ids,
//! self-edges, duplicate edges); everything structural happens at
//! [`PipelineGraph::validate`](crate::graph::snapshot) which produces the
//! immutable snapshot the engines read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{GraphError, GraphResult};
use crate::types::{BlockId, ConfigValue, ConnectionKind, NodeId};

/// Typed connection between two pipeline nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Source node id
    pub source: NodeId,
    /// Target node id
    pub target: NodeId,
    /// Whether the edge carries records or only control
    pub kind: ConnectionKind,
    /// Expected transfer volume per run in GB, engine default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_gb_per_run: Option<f64>,
    /// Transfer latency override in milliseconds, engine default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_latency_ms: Option<f64>,
}

impl Connection {
    /// Create a data-flow connection
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: ConnectionKind::DataFlow,
            volume_gb_per_run: None,
            network_latency_ms: None,
        }
    }

    /// Create a control-flow connection
    pub fn control(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            kind: ConnectionKind::ControlFlow,
            ..Self::new(source, target)
        }
    }

    /// Set the expected transfer volume per run
    #[must_use]
    pub fn with_volume_gb(mut self, volume_gb_per_run: f64) -> Self {
        self.volume_gb_per_run = Some(volume_gb_per_run);
        self
    }

    /// Override the transfer latency
    #[must_use]
    pub fn with_network_latency_ms(mut self, latency_ms: f64) -> Self {
        self.network_latency_ms = Some(latency_ms);
        self
    }

    /// The (source, target, kind) identity used for duplicate detection
    #[must_use]
    pub fn endpoints(&self) -> (&NodeId, &NodeId, ConnectionKind) {
        (&self.source, &self.target, self.kind)
    }
}

/// One placed block instance in a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineNode {
    /// Caller-assigned id, unique within the graph
    pub id: NodeId,
    /// Catalog block this node instantiates
    pub block: BlockId,
    /// Display label, defaults to the id
    pub label: String,
    /// Canvas position, carried through untouched and ignored by engines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<(f64, f64)>,
    /// Free-form per-node options read by the engines
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: BTreeMap<String, ConfigValue>,
}

impl PipelineNode {
    /// Create a node instantiating a catalog block
    pub fn new(id: impl Into<NodeId>, block: impl Into<BlockId>) -> Self {
        let id = id.into();
        let label = id.as_str().to_string();
        Self {
            id,
            block: block.into(),
            label,
            position: None,
            configuration: BTreeMap::new(),
        }
    }

    /// Set the display label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the canvas position
    #[must_use]
    pub fn at_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some((x, y));
        self
    }

    /// Set one configuration option
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }

    /// Read a float option, widening integers
    #[must_use]
    pub fn float_option(&self, key: &str) -> Option<f64> {
        self.configuration.get(key).and_then(ConfigValue::as_f64)
    }

    /// Read a boolean option
    #[must_use]
    pub fn bool_option(&self, key: &str) -> Option<bool> {
        self.configuration.get(key).and_then(ConfigValue::as_bool)
    }

    /// Worker parallelism for this node, floored at 1
    #[must_use]
    pub fn parallelism(&self) -> f64 {
        self.float_option("parallelism").map_or(1.0, |p| p.max(1.0))
    }

    /// Retention period for stored data in months, floored at 0
    #[must_use]
    pub fn retention_months(&self) -> f64 {
        self.float_option("retention_months").map_or(1.0, |r| r.max(0.0))
    }
}

/// Complete mutable pipeline graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineGraph {
    /// Pipeline name carried into reports
    pub name: String,
    pub(crate) nodes: BTreeMap<NodeId, PipelineNode>,
    pub(crate) connections: Vec<Connection>,
}

impl PipelineGraph {
    /// Create an empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: BTreeMap::new(),
            connections: Vec::new(),
        }
    }

    /// Add a node
    ///
    /// # Errors
    ///
    /// Returns `GraphError::DuplicateNode` when the id is already taken.
    pub fn add_node(&mut self, node: PipelineNode) -> GraphResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::duplicate_node(node.id));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Add a connection
    ///
    /// Endpoints may name nodes added later; existence is checked at
    /// validation time.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::SelfReference` for loops onto the same node and
    /// `GraphError::DuplicateEdge` when source, target, and kind all match
    /// an existing connection.
    pub fn add_connection(&mut self, connection: Connection) -> GraphResult<()> {
        if connection.source == connection.target {
            return Err(GraphError::SelfReference {
                node: connection.source,
            });
        }
        if self
            .connections
            .iter()
            .any(|c| c.endpoints() == connection.endpoints())
        {
            return Err(GraphError::DuplicateEdge {
                from: connection.source,
                to: connection.target,
                kind: connection.kind,
            });
        }
        self.connections.push(connection);
        Ok(())
    }

    /// Look up a node by id
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&PipelineNode> {
        self.nodes.get(id)
    }

    /// Iterate over nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &PipelineNode> {
        self.nodes.values()
    }

    /// All connections in insertion order
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, block: &str) -> PipelineNode {
        PipelineNode::new(id, block)
    }

    #[test]
    fn duplicate_node_ids_rejected() -> GraphResult<()> {
        let mut graph = PipelineGraph::new("dup");
        graph.add_node(node("a", "csv_reader"))?;
        let err = graph.add_node(node("a", "filter"));
        assert!(matches!(err, Err(GraphError::DuplicateNode { .. })));
        Ok(())
    }

    #[test]
    fn self_edges_rejected() {
        let mut graph = PipelineGraph::new("self");
        let err = graph.add_connection(Connection::new("a", "a"));
        assert!(matches!(err, Err(GraphError::SelfReference { .. })));
    }

    #[test]
    fn duplicate_edges_rejected_only_for_same_kind() -> GraphResult<()> {
        let mut graph = PipelineGraph::new("edges");
        graph.add_connection(Connection::new("a", "b"))?;
        let err = graph.add_connection(Connection::new("a", "b"));
        assert!(matches!(err, Err(GraphError::DuplicateEdge { .. })));
        // Same pair, different kind is a distinct relation
        graph.add_connection(Connection::control("a", "b"))?;
        assert_eq!(graph.connection_count(), 2);
        Ok(())
    }

    #[test]
    fn parallelism_floors_at_one() {
        let plain = node("a", "filter");
        assert!((plain.parallelism() - 1.0).abs() < f64::EPSILON);
        let scaled = node("b", "filter").with_option("parallelism", 4.0);
        assert!((scaled.parallelism() - 4.0).abs() < f64::EPSILON);
        let nonsense = node("c", "filter").with_option("parallelism", 0.25);
        assert!((nonsense.parallelism() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn graph_roundtrips_through_serde() -> Result<(), serde_json::Error> {
        let mut graph = PipelineGraph::new("roundtrip");
        #[allow(clippy::unwrap_used)]
        {
            graph
                .add_node(node("src", "csv_reader").at_position(10.0, 20.0))
                .unwrap();
            graph
                .add_node(node("out", "csv_writer").with_option("retention_months", 3.0))
                .unwrap();
            graph
                .add_connection(Connection::new("src", "out").with_volume_gb(2.5))
                .unwrap();
        }
        let json = serde_json::to_string(&graph)?;
        let back: PipelineGraph = serde_json::from_str(&json)?;
        assert_eq!(back, graph);
        Ok(())
    }
}
