//! Steady-State Flow Propagation
//!
//! Pure record-rate propagation along the topological order. Both the
//! throughput and quality engines call this helper, which keeps the two
//! engines independent of each other at runtime while guaranteeing they
//! agree on capacity-induced drop figures.

use std::collections::BTreeMap;

use crate::graph::snapshot::ValidatedGraph;
use crate::types::NodeId;

/// Steady-state rates of one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NodeFlow {
    /// Records per second offered to the node
    pub input_rps: f64,
    /// Base rate times parallelism
    pub capacity_rps: f64,
    /// min(input, capacity)
    pub output_rps: f64,
    /// Input the node could not process this second
    pub excess_rps: f64,
}

/// Whole-pipeline propagation outcome
#[derive(Debug, Clone)]
pub(crate) struct FlowOutcome {
    /// Per-node rates keyed by node id
    pub per_node: BTreeMap<NodeId, NodeFlow>,
    /// Total rate offered to the sources
    pub offered_rps: f64,
    /// Sum of sink output rates
    pub delivered_rps: f64,
    /// Excess lost when backpressure is disabled, 0 otherwise
    pub dropped_rps: f64,
    /// What the sources could inject if nothing downstream underperformed
    pub max_theoretical_rps: f64,
}

impl FlowOutcome {
    /// Fraction of offered records lost to disabled backpressure
    pub(crate) fn drop_fraction(&self) -> f64 {
        if self.offered_rps > 0.0 {
            self.dropped_rps / self.offered_rps
        } else {
            0.0
        }
    }
}

/// Propagate record rates source-to-sink
///
/// Each source is offered `ingestion_rate_rps`; every node forwards
/// `min(input, capacity)`. With backpressure enabled the excess queues at
/// the node, with backpressure disabled it is dropped and accounted here.
/// `scaled_node` multiplies one node's capacity, used for what-if scaling
/// estimates without touching the snapshot.
pub(crate) fn propagate(
    graph: &ValidatedGraph,
    ingestion_rate_rps: f64,
    backpressure_enabled: bool,
    scaled_node: Option<(&NodeId, f64)>,
) -> FlowOutcome {
    let mut per_node: BTreeMap<NodeId, NodeFlow> = BTreeMap::new();
    let mut offered = 0.0;
    let mut dropped = 0.0;
    let mut theoretical = 0.0;

    for view in graph.iter_topo() {
        let mut capacity = view.block.cost.records_per_second * view.node.parallelism();
        if let Some((scaled, factor)) = scaled_node {
            if scaled == view.id {
                capacity *= factor;
            }
        }
        let input = if graph.is_source(view.id) {
            offered += ingestion_rate_rps;
            theoretical += ingestion_rate_rps.min(capacity);
            ingestion_rate_rps
        } else {
            graph
                .data_predecessors(view.id)
                .iter()
                .filter_map(|pred| per_node.get(pred))
                .map(|flow| flow.output_rps)
                .sum()
        };
        let output = input.min(capacity).max(0.0);
        let excess = (input - output).max(0.0);
        if !backpressure_enabled {
            dropped += excess;
        }
        per_node.insert(
            view.id.clone(),
            NodeFlow {
                input_rps: input,
                capacity_rps: capacity,
                output_rps: output,
                excess_rps: excess,
            },
        );
    }

    let delivered = graph
        .sinks()
        .iter()
        .filter_map(|sink| per_node.get(sink))
        .map(|flow| flow.output_rps)
        .sum();

    FlowOutcome {
        per_node,
        offered_rps: offered,
        delivered_rps: delivered,
        dropped_rps: dropped,
        max_theoretical_rps: theoretical,
    }
}
