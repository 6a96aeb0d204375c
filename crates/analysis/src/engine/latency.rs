//! Latency Engine
//!
//! Critical-path analysis over the snapshot. Each node's duration combines
//! its processing latency, the slowest incoming network hop and the queue
//! wait implied by the throughput result; a forward and backward pass then
//! yield per-node slack, the critical path and the end-to-end latency.
//! Parallel branches join through the slowest branch, never by summing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::LatencyConfig;
use crate::engine::throughput::ThroughputResult;
use crate::error::{ConfigError, ConfigResult};
use crate::graph::snapshot::ValidatedGraph;
use crate::types::NodeId;

const MS_PER_SECOND: f64 = 1_000.0;

/// Timing attribution of a single node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeLatency {
    /// Block latency over the node's parallelism
    pub processing_ms: f64,
    /// Slowest incoming data-flow hop
    pub network_ms: f64,
    /// Wait implied by the throughput queue depth, capped
    pub queue_wait_ms: f64,
    /// Sum of the three components
    pub total_ms: f64,
    /// Earliest moment the node can start
    pub earliest_start_ms: f64,
    /// Earliest moment the node can finish
    pub earliest_finish_ms: f64,
    /// Latest start that keeps the pipeline on schedule
    pub latest_start_ms: f64,
    /// Latest finish that keeps the pipeline on schedule
    pub latest_finish_ms: f64,
    /// Scheduling freedom, zero on the critical path
    pub slack_ms: f64,
    /// Whether the node sits on the critical path
    pub on_critical_path: bool,
}

/// Node whose slack leaves room to run work in parallel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackOpportunity {
    /// Node with spare schedule room
    pub node: NodeId,
    /// Slack beyond the configured margin
    pub slack_ms: f64,
}

/// Result of a latency analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyResult {
    /// End-to-end latency, the latest sink finish
    pub total_latency_ms: f64,
    /// Zero-slack nodes in topological order
    pub critical_path: Vec<NodeId>,
    /// Per-node timing keyed by node id
    pub node_latencies: BTreeMap<NodeId, NodeLatency>,
    /// Nodes with slack above the configured margin, largest first
    pub parallelization_opportunities: Vec<SlackOpportunity>,
}

/// Effect of scaling one node's processing latency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyScaling {
    /// Scaled node
    pub node: NodeId,
    /// Divisor applied to its processing latency
    pub factor: f64,
    /// End-to-end latency before scaling
    pub original_total_ms: f64,
    /// End-to-end latency after scaling
    pub scaled_total_ms: f64,
    /// Latency saved; never negative
    pub saved_ms: f64,
}

/// Forward and backward pass figures of one node
#[derive(Debug, Clone, Copy, Default)]
struct PassTimes {
    earliest_start: f64,
    earliest_finish: f64,
    latest_start: f64,
    latest_finish: f64,
}

/// Pure latency analysis over a validated snapshot
#[derive(Debug, Clone)]
pub struct LatencyEngine {
    config: LatencyConfig,
}

impl LatencyEngine {
    /// Create an engine with a validated configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the latency section is invalid.
    pub fn new(config: LatencyConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Critical-path analysis using the throughput result's queue depths
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the latency section is invalid.
    pub fn calculate(
        &self,
        graph: &ValidatedGraph,
        throughput: &ThroughputResult,
    ) -> ConfigResult<LatencyResult> {
        self.config.validate()?;
        Ok(self.run(graph, throughput, None))
    }

    /// Total-latency delta after dividing one node's processing latency
    ///
    /// Queue waits stay as the given throughput result implies; only the
    /// named node's processing term changes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the section is invalid or the factor is
    /// not a positive finite number.
    pub fn estimate_scaling_impact(
        &self,
        graph: &ValidatedGraph,
        throughput: &ThroughputResult,
        node_id: &NodeId,
        factor: f64,
    ) -> ConfigResult<LatencyScaling> {
        self.config.validate()?;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ConfigError::invalid(
                "latency",
                "scale factor must be a positive finite number",
            ));
        }

        let original = self.run(graph, throughput, None);
        let scaled = self.run(graph, throughput, Some((node_id, factor)));
        Ok(LatencyScaling {
            node: node_id.clone(),
            factor,
            original_total_ms: original.total_latency_ms,
            scaled_total_ms: scaled.total_latency_ms,
            saved_ms: (original.total_latency_ms - scaled.total_latency_ms).max(0.0),
        })
    }

    fn run(
        &self,
        graph: &ValidatedGraph,
        throughput: &ThroughputResult,
        scaled_node: Option<(&NodeId, f64)>,
    ) -> LatencyResult {
        let mut components: BTreeMap<&NodeId, (f64, f64, f64)> = BTreeMap::new();
        for view in graph.iter_topo() {
            let mut processing = view.block.cost.base_latency_ms / view.node.parallelism();
            if let Some((scaled, factor)) = scaled_node {
                if scaled == view.id {
                    processing /= factor;
                }
            }

            let network = graph
                .data_inputs(view.id)
                .map(|c| {
                    c.network_latency_ms
                        .unwrap_or(self.config.default_network_latency_ms)
                        .max(0.0)
                })
                .fold(0.0_f64, f64::max);

            let queue_wait = throughput.node_metrics.get(view.id).map_or(0.0, |m| {
                if m.capacity_rps > 0.0 {
                    (m.queue_depth / m.capacity_rps * MS_PER_SECOND)
                        .min(self.config.max_queue_wait_ms)
                } else if m.queue_depth > 0.0 {
                    self.config.max_queue_wait_ms
                } else {
                    0.0
                }
            });

            components.insert(view.id, (processing, network, queue_wait));
        }
        let duration =
            |id: &NodeId| components.get(id).map_or(0.0, |(p, n, q)| p + n + q);

        // Forward pass pushes finish times into successors; branches that
        // rejoin take the slowest feed
        let mut times: BTreeMap<&NodeId, PassTimes> = BTreeMap::new();
        for id in graph.topo_order() {
            let entry = times.entry(id).or_default();
            entry.earliest_finish = entry.earliest_start + duration(id);
            let finish = entry.earliest_finish;
            for succ in graph.successors(id) {
                let succ_entry = times.entry(succ).or_default();
                succ_entry.earliest_start = succ_entry.earliest_start.max(finish);
            }
        }

        let total_latency_ms = graph
            .sinks()
            .iter()
            .filter_map(|id| times.get(id))
            .fold(0.0_f64, |acc, t| acc.max(t.earliest_finish));

        // Backward pass in reverse topological order
        for id in graph.topo_order().iter().rev() {
            let latest_finish = graph
                .successors(id)
                .iter()
                .filter_map(|succ| times.get(succ))
                .map(|t| t.latest_start)
                .fold(f64::INFINITY, f64::min);
            let latest_finish = if latest_finish.is_finite() {
                latest_finish
            } else {
                total_latency_ms
            };
            if let Some(entry) = times.get_mut(id) {
                entry.latest_finish = latest_finish;
                entry.latest_start = latest_finish - duration(id);
            }
        }

        let mut node_latencies: BTreeMap<NodeId, NodeLatency> = BTreeMap::new();
        let mut critical_path = Vec::new();
        let mut opportunities = Vec::new();
        for id in graph.topo_order() {
            let (processing, network, queue_wait) =
                components.get(id).copied().unwrap_or((0.0, 0.0, 0.0));
            let t = times.get(id).copied().unwrap_or_default();
            let slack = (t.latest_start - t.earliest_start).max(0.0);
            let on_critical_path = slack < 1e-6;

            if on_critical_path {
                critical_path.push(id.clone());
            }
            if slack > self.config.parallelization_margin_ms {
                opportunities.push(SlackOpportunity {
                    node: id.clone(),
                    slack_ms: slack,
                });
            }

            node_latencies.insert(
                id.clone(),
                NodeLatency {
                    processing_ms: processing,
                    network_ms: network,
                    queue_wait_ms: queue_wait,
                    total_ms: processing + network + queue_wait,
                    earliest_start_ms: t.earliest_start,
                    earliest_finish_ms: t.earliest_finish,
                    latest_start_ms: t.latest_start,
                    latest_finish_ms: t.latest_finish,
                    slack_ms: slack,
                    on_critical_path,
                },
            );
        }
        opportunities.sort_by(|a, b| {
            b.slack_ms
                .total_cmp(&a.slack_ms)
                .then_with(|| a.node.cmp(&b.node))
        });

        tracing::debug!(
            "Latency of '{}': {:.1} ms over a {}-node critical path",
            graph.name(),
            total_latency_ms,
            critical_path.len()
        );

        LatencyResult {
            total_latency_ms,
            critical_path,
            node_latencies,
            parallelization_opportunities: opportunities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BlockCatalog, BuildingBlock};
    use crate::config::ThroughputConfig;
    use crate::engine::throughput::ThroughputEngine;
    use crate::graph::pipeline::{Connection, PipelineGraph, PipelineNode};
    use crate::types::BlockCategory;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn branch_catalog() -> Result<BlockCatalog, Box<dyn std::error::Error>> {
        Ok(BlockCatalog::from_blocks(vec![
            BuildingBlock::new("feed", "Feed", BlockCategory::Ingestion, "test feed")
                .with_rate(50_000.0)
                .with_latency(10.0),
            BuildingBlock::new("slow", "Slow", BlockCategory::Transform, "slow branch")
                .with_rate(50_000.0)
                .with_latency(100.0),
            BuildingBlock::new("fast", "Fast", BlockCategory::Transform, "fast branch")
                .with_rate(50_000.0)
                .with_latency(60.0),
            BuildingBlock::new("store", "Store", BlockCategory::Storage, "test store")
                .with_rate(50_000.0)
                .with_latency(20.0),
        ])?)
    }

    /// feed fans out to a 100 ms and a 60 ms branch that rejoin at the store
    fn branch_graph() -> Result<ValidatedGraph, Box<dyn std::error::Error>> {
        let mut graph = PipelineGraph::new("latency-branches");
        graph.add_node(PipelineNode::new("feed", "feed"))?;
        graph.add_node(PipelineNode::new("slow", "slow"))?;
        graph.add_node(PipelineNode::new("fast", "fast"))?;
        graph.add_node(PipelineNode::new("store", "store"))?;
        graph.add_connection(Connection::new("feed", "slow"))?;
        graph.add_connection(Connection::new("feed", "fast"))?;
        graph.add_connection(Connection::new("slow", "store"))?;
        graph.add_connection(Connection::new("fast", "store"))?;
        Ok(graph.validate(&branch_catalog()?)?)
    }

    fn throughput_for(graph: &ValidatedGraph, rate: f64) -> ConfigResult<ThroughputResult> {
        ThroughputEngine::new(ThroughputConfig {
            default_ingestion_rate_rps: rate,
            ..ThroughputConfig::default()
        })?
        .calculate(graph)
    }

    #[test]
    fn branches_join_through_the_slowest_feed() -> TestResult {
        let graph = branch_graph()?;
        let throughput = throughput_for(&graph, 100.0)?;
        let result = LatencyEngine::new(LatencyConfig::default())?.calculate(&graph, &throughput)?;

        // feed 10, slow 100+5, fast 60+5, store 20+5; nothing queues
        assert!((result.total_latency_ms - 140.0).abs() < 1e-9);
        assert_eq!(
            result.critical_path,
            vec![NodeId::new("feed"), NodeId::new("slow"), NodeId::new("store")]
        );

        let fast = &result.node_latencies[&NodeId::new("fast")];
        assert!((fast.slack_ms - 40.0).abs() < 1e-9);
        assert!(!fast.on_critical_path);

        assert_eq!(result.parallelization_opportunities.len(), 1);
        assert_eq!(result.parallelization_opportunities[0].node, NodeId::new("fast"));
        Ok(())
    }

    #[test]
    fn queue_wait_follows_throughput_depth() -> TestResult {
        let mut graph = PipelineGraph::new("latency-queue");
        graph.add_node(PipelineNode::new("reader", "database_reader"))?;
        graph.add_node(PipelineNode::new("clean", "data_cleaner"))?;
        graph.add_node(PipelineNode::new("writer", "database_writer"))?;
        graph.add_connection(Connection::new("reader", "clean"))?;
        graph.add_connection(Connection::new("clean", "writer"))?;
        let graph = graph.validate(&BlockCatalog::builtin())?;

        let throughput = throughput_for(&graph, 8_000.0)?;
        let result = LatencyEngine::new(LatencyConfig::default())?.calculate(&graph, &throughput)?;

        // 6500 queued records drain at 1500 rps
        let clean = &result.node_latencies[&NodeId::new("clean")];
        let expected_wait = 6_500.0 / 1_500.0 * 1_000.0;
        assert!((clean.queue_wait_ms - expected_wait).abs() < 1e-6);
        assert!(result.total_latency_ms > expected_wait);
        Ok(())
    }

    #[test]
    fn queue_wait_caps_at_the_configured_maximum() -> TestResult {
        let catalog = BlockCatalog::from_blocks(vec![
            BuildingBlock::new("feed", "Feed", BlockCategory::Ingestion, "test feed")
                .with_rate(5_000.0),
            BuildingBlock::new("trickle", "Trickle", BlockCategory::Transform, "slow worker")
                .with_rate(1.0),
            BuildingBlock::new("store", "Store", BlockCategory::Storage, "test store")
                .with_rate(5_000.0),
        ])?;
        let mut graph = PipelineGraph::new("latency-cap");
        graph.add_node(PipelineNode::new("feed", "feed"))?;
        graph.add_node(PipelineNode::new("trickle", "trickle"))?;
        graph.add_node(PipelineNode::new("store", "store"))?;
        graph.add_connection(Connection::new("feed", "trickle"))?;
        graph.add_connection(Connection::new("trickle", "store"))?;
        let graph = graph.validate(&catalog)?;

        let throughput = throughput_for(&graph, 5_000.0)?;
        let config = LatencyConfig::default();
        let cap = config.max_queue_wait_ms;
        let result = LatencyEngine::new(config)?.calculate(&graph, &throughput)?;

        let trickle = &result.node_latencies[&NodeId::new("trickle")];
        assert!((trickle.queue_wait_ms - cap).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn scaling_the_critical_node_can_flip_the_path() -> TestResult {
        let graph = branch_graph()?;
        let throughput = throughput_for(&graph, 100.0)?;
        let engine = LatencyEngine::new(LatencyConfig::default())?;

        let scaling =
            engine.estimate_scaling_impact(&graph, &throughput, &NodeId::new("slow"), 2.0)?;
        // slow drops to 50+5 ms, so the 65 ms fast branch now dominates
        assert!((scaling.original_total_ms - 140.0).abs() < 1e-9);
        assert!((scaling.scaled_total_ms - 100.0).abs() < 1e-9);
        assert!((scaling.saved_ms - 40.0).abs() < 1e-9);

        assert!(engine
            .estimate_scaling_impact(&graph, &throughput, &NodeId::new("slow"), 0.0)
            .is_err());
        Ok(())
    }
}
