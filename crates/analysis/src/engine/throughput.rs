//! Throughput Engine
//!
//! Steady-state record-rate analysis: per-node utilization and queueing,
//! bottleneck identification, saturation point, and pipeline efficiency.
//! All figures derive from one pass of the shared flow propagation, so a
//! given snapshot and configuration always reproduce the same numbers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ThroughputConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::graph::flow;
use crate::graph::snapshot::ValidatedGraph;
use crate::types::NodeId;

/// Throughput metrics of a single node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeThroughput {
    /// Records per second offered to the node
    pub input_rps: f64,
    /// Base rate times node parallelism
    pub capacity_rps: f64,
    /// Records per second the node forwards
    pub output_rps: f64,
    /// Output over capacity, clamped to `[0, 1]`
    pub utilization: f64,
    /// Records queued over the analysis horizon (backpressure enabled)
    pub queue_depth: f64,
    /// Records per second lost at this node (backpressure disabled)
    pub dropped_rps: f64,
    /// Whether this node limits the whole pipeline
    pub is_bottleneck: bool,
}

/// Result of a throughput analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputResult {
    /// Sum of sink output rates
    pub pipeline_rps: f64,
    /// Pipeline rate expressed in bytes per second
    pub pipeline_bps: f64,
    /// Per-node metrics keyed by node id
    pub node_metrics: BTreeMap<NodeId, NodeThroughput>,
    /// Node limiting the pipeline, earliest in topological order on ties
    pub bottleneck: Option<NodeId>,
    /// What the sources could inject if nothing downstream underperformed
    pub max_theoretical_rps: f64,
    /// Pipeline rate over the theoretical maximum, `[0, 1]`
    pub efficiency: f64,
    /// Lowest ingestion rate at which some node saturates
    pub saturation_point_rps: f64,
    /// Total records per second lost to disabled backpressure
    pub dropped_rps: f64,
    /// Horizon used for queue accumulation, seconds
    pub duration_secs: f64,
}

/// Pure throughput analysis over a validated snapshot
#[derive(Debug, Clone)]
pub struct ThroughputEngine {
    config: ThroughputConfig,
}

impl ThroughputEngine {
    /// Create an engine with a validated configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the throughput section is invalid.
    pub fn new(config: ThroughputConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Steady-state analysis at the configured ingestion rate
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the throughput section is invalid.
    pub fn calculate(&self, graph: &ValidatedGraph) -> ConfigResult<ThroughputResult> {
        self.simulate(graph, self.config.default_ingestion_rate_rps, 1.0)
    }

    /// Analysis at an explicit ingestion rate and queue-accumulation horizon
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the section is invalid, the rate is
    /// negative or non-finite, or the duration is not positive.
    pub fn simulate(
        &self,
        graph: &ValidatedGraph,
        ingestion_rate_rps: f64,
        duration_secs: f64,
    ) -> ConfigResult<ThroughputResult> {
        self.config.validate()?;
        check_rate(ingestion_rate_rps)?;
        check_duration(duration_secs)?;

        let outcome = flow::propagate(
            graph,
            ingestion_rate_rps,
            self.config.backpressure_enabled,
            None,
        );
        Ok(self.assemble(graph, &outcome, duration_secs))
    }

    /// Re-run the analysis with one node's capacity multiplied by `factor`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the section is invalid or the factor is
    /// not a positive finite number.
    pub fn estimate_scaling_impact(
        &self,
        graph: &ValidatedGraph,
        node_id: &NodeId,
        factor: f64,
    ) -> ConfigResult<ThroughputResult> {
        self.config.validate()?;
        check_factor(factor)?;

        let outcome = flow::propagate(
            graph,
            self.config.default_ingestion_rate_rps,
            self.config.backpressure_enabled,
            Some((node_id, factor)),
        );
        Ok(self.assemble(graph, &outcome, 1.0))
    }

    /// Convenience lookup of the limiting node
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the throughput section is invalid.
    pub fn find_bottleneck(&self, graph: &ValidatedGraph) -> ConfigResult<Option<NodeId>> {
        Ok(self.calculate(graph)?.bottleneck)
    }

    fn assemble(
        &self,
        graph: &ValidatedGraph,
        outcome: &flow::FlowOutcome,
        duration_secs: f64,
    ) -> ThroughputResult {
        let backpressure = self.config.backpressure_enabled;

        let mut node_metrics: BTreeMap<NodeId, NodeThroughput> = outcome
            .per_node
            .iter()
            .map(|(id, f)| {
                let utilization = if f.capacity_rps > 0.0 {
                    (f.output_rps / f.capacity_rps).clamp(0.0, 1.0)
                } else if f.input_rps > 0.0 {
                    1.0
                } else {
                    0.0
                };
                let metrics = NodeThroughput {
                    input_rps: f.input_rps,
                    capacity_rps: f.capacity_rps,
                    output_rps: f.output_rps,
                    utilization,
                    queue_depth: if backpressure {
                        f.excess_rps * duration_secs
                    } else {
                        0.0
                    },
                    dropped_rps: if backpressure { 0.0 } else { f.excess_rps },
                    is_bottleneck: false,
                };
                (id.clone(), metrics)
            })
            .collect();

        // Lowest forwarded rate among data-carrying interior nodes; walking
        // the topological order makes the earliest node win ties
        let mut bottleneck: Option<(NodeId, f64)> = None;
        for id in graph.topo_order() {
            if graph.is_sink(id) || !graph.on_data_path(id) {
                continue;
            }
            let Some(metrics) = node_metrics.get(id) else {
                continue;
            };
            let lower = bottleneck
                .as_ref()
                .map_or(true, |(_, best)| metrics.output_rps < *best);
            if lower {
                bottleneck = Some((id.clone(), metrics.output_rps));
            }
        }
        let bottleneck = bottleneck.map(|(id, _)| id);
        if let Some(id) = &bottleneck {
            if let Some(metrics) = node_metrics.get_mut(id) {
                metrics.is_bottleneck = true;
            }
            tracing::debug!("Throughput bottleneck at '{}'", id);
        }

        let efficiency = if outcome.max_theoretical_rps > 0.0 {
            (outcome.delivered_rps / outcome.max_theoretical_rps).clamp(0.0, 1.0)
        } else {
            0.0
        };

        ThroughputResult {
            pipeline_rps: outcome.delivered_rps,
            pipeline_bps: outcome.delivered_rps * f64::from(self.config.record_size_bytes),
            node_metrics,
            bottleneck,
            max_theoretical_rps: outcome.max_theoretical_rps,
            efficiency,
            saturation_point_rps: saturation_point(graph),
            dropped_rps: outcome.dropped_rps,
            duration_secs,
        }
    }
}

/// Lowest ingestion rate at which some data-path node saturates
///
/// Rates scale linearly with the ingestion rate until the first clamp, and
/// every successor reads the full upstream output, so a node fed by `k`
/// source-to-node paths saturates at `capacity / k`.
fn saturation_point(graph: &ValidatedGraph) -> f64 {
    let mut path_counts: BTreeMap<&NodeId, f64> = BTreeMap::new();
    let mut saturation = f64::INFINITY;

    for view in graph.iter_topo() {
        let paths = if graph.is_source(view.id) {
            1.0
        } else {
            graph
                .data_predecessors(view.id)
                .iter()
                .filter_map(|pred| path_counts.get(pred))
                .sum()
        };
        path_counts.insert(view.id, paths);

        if graph.on_data_path(view.id) && paths > 0.0 {
            let capacity = view.block.cost.records_per_second * view.node.parallelism();
            saturation = saturation.min(capacity / paths);
        }
    }

    if saturation.is_finite() {
        saturation
    } else {
        0.0
    }
}

fn check_rate(rate: f64) -> ConfigResult<()> {
    if rate.is_finite() && rate >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            "throughput",
            "ingestion rate must be a non-negative finite number",
        ))
    }
}

fn check_duration(duration_secs: f64) -> ConfigResult<()> {
    if duration_secs.is_finite() && duration_secs > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            "throughput",
            "duration must be a positive finite number",
        ))
    }
}

fn check_factor(factor: f64) -> ConfigResult<()> {
    if factor.is_finite() && factor > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            "throughput",
            "scale factor must be a positive finite number",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BlockCatalog, BuildingBlock};
    use crate::graph::pipeline::{Connection, PipelineGraph, PipelineNode};
    use crate::types::BlockCategory;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn reference_graph() -> Result<ValidatedGraph, Box<dyn std::error::Error>> {
        let catalog = BlockCatalog::from_blocks(vec![
            BuildingBlock::new("source", "Source", BlockCategory::Ingestion, "test source")
                .with_rate(6_000.0),
            BuildingBlock::new("worker", "Worker", BlockCategory::Transform, "test worker")
                .with_rate(4_500.0),
            BuildingBlock::new("sink", "Sink", BlockCategory::Storage, "test sink")
                .with_rate(8_000.0),
        ])?;

        let mut graph = PipelineGraph::new("reference");
        graph.add_node(PipelineNode::new("a", "source"))?;
        graph.add_node(PipelineNode::new("b", "worker"))?;
        graph.add_node(PipelineNode::new("c", "sink"))?;
        graph.add_connection(Connection::new("a", "b"))?;
        graph.add_connection(Connection::new("b", "c"))?;
        Ok(graph.validate(&catalog)?)
    }

    fn engine_at(rate: f64) -> ConfigResult<ThroughputEngine> {
        ThroughputEngine::new(ThroughputConfig {
            default_ingestion_rate_rps: rate,
            ..ThroughputConfig::default()
        })
    }

    #[test]
    fn reference_scenario_finds_transform_bottleneck() -> TestResult {
        let graph = reference_graph()?;
        let engine = engine_at(6_000.0)?;
        let result = engine.calculate(&graph)?;

        assert!((result.pipeline_rps - 4_500.0).abs() < 1e-9);
        assert_eq!(result.bottleneck, Some(NodeId::new("b")));
        assert!((result.max_theoretical_rps - 6_000.0).abs() < 1e-9);
        assert!((result.efficiency - 0.75).abs() < 1e-9);
        // The convenience lookup agrees with the full result
        assert_eq!(engine.find_bottleneck(&graph)?, result.bottleneck);
        Ok(())
    }

    #[test]
    fn utilization_clamps_and_queue_accumulates() -> TestResult {
        let graph = reference_graph()?;
        let result = engine_at(6_000.0)?.simulate(&graph, 6_000.0, 10.0)?;

        let worker = &result.node_metrics[&NodeId::new("b")];
        assert!((worker.utilization - 1.0).abs() < 1e-9);
        // 1500 rps excess for 10 seconds
        assert!((worker.queue_depth - 15_000.0).abs() < 1e-9);
        assert!(worker.is_bottleneck);
        Ok(())
    }

    #[test]
    fn scaling_the_bottleneck_raises_pipeline_rate() -> TestResult {
        let graph = reference_graph()?;
        let engine = engine_at(6_000.0)?;
        let scaled = engine.estimate_scaling_impact(&graph, &NodeId::new("b"), 2.0)?;
        assert!((scaled.pipeline_rps - 6_000.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn saturation_point_is_lowest_path_capacity() -> TestResult {
        let graph = reference_graph()?;
        let result = engine_at(1_000.0)?.calculate(&graph)?;
        assert!((result.saturation_point_rps - 4_500.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn negative_rate_is_a_config_error() -> TestResult {
        let graph = reference_graph()?;
        let engine = engine_at(1_000.0)?;
        assert!(engine.simulate(&graph, -5.0, 1.0).is_err());
        assert!(engine.simulate(&graph, f64::NAN, 1.0).is_err());
        assert!(engine.simulate(&graph, 100.0, 0.0).is_err());
        Ok(())
    }
}
