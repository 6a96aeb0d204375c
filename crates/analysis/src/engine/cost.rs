//! Cost Engine
//!
//! Operational cost model: compute, storage, network, licensing and a
//! maintenance surcharge, rolled up per node and per category. The month
//! is the canonical horizon; per-run, hourly and daily figures derive
//! from the monthly total at the configured run cadence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::CostConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::graph::snapshot::ValidatedGraph;
use crate::types::NodeId;

const HOURS_PER_MONTH: f64 = 720.0;
const DAYS_PER_MONTH: f64 = 30.0;

/// Monthly cost split by category
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Processing cost across all nodes
    pub compute: f64,
    /// Resident-volume cost of storage nodes
    pub storage: f64,
    /// Transfer cost of data-flow connections
    pub network: f64,
    /// License fees of premium blocks
    pub licensing: f64,
    /// Summed per-node maintenance surcharges
    pub maintenance: f64,
}

impl CostBreakdown {
    /// Sum over all categories
    #[must_use]
    pub fn total(&self) -> f64 {
        self.compute + self.storage + self.network + self.licensing + self.maintenance
    }
}

/// Cost attribution of a single node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeCost {
    /// Processing cost of one run
    pub compute_per_run: f64,
    /// Outbound transfer cost of one run
    pub network_per_run: f64,
    /// Resident-volume cost per month, storage nodes only
    pub storage_per_month: f64,
    /// License fee per month, premium blocks only
    pub licensing_per_month: f64,
    /// Surcharge on this node's own monthly subtotal
    pub maintenance_per_month: f64,
    /// Sum of the five components at the modeled run cadence
    pub total_per_month: f64,
}

/// Result of a cost analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostResult {
    /// Total cost of a single run
    pub total_per_run: f64,
    /// Total cost per hour at the modeled cadence
    pub total_per_hour: f64,
    /// Total cost per day at the modeled cadence
    pub total_per_day: f64,
    /// Total cost per month at the modeled cadence
    pub total_per_month: f64,
    /// Per-node attribution keyed by node id
    pub node_costs: BTreeMap<NodeId, NodeCost>,
    /// Monthly totals by category
    pub breakdown: CostBreakdown,
    /// Node with the highest monthly total, smallest id on ties
    pub most_expensive_node: Option<NodeId>,
    /// Advisory hints; never feed back into the numbers
    pub optimization_suggestions: Vec<String>,
    /// Run count the monthly figures assume
    pub runs_per_month: f64,
}

/// Delta report between two cost results
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostComparison {
    /// Monthly total of `b` minus monthly total of `a`
    pub monthly_delta: f64,
    /// Per-run total of `b` minus per-run total of `a`
    pub per_run_delta: f64,
    /// Category-wise monthly deltas
    pub breakdown_delta: CostBreakdown,
    /// Monthly delta as a fraction of `a`, 0 when `a` costs nothing
    pub relative_change: f64,
}

/// Pure cost analysis over a validated snapshot
#[derive(Debug, Clone)]
pub struct CostEngine {
    config: CostConfig,
}

/// Parameters one model evaluation runs under
#[derive(Debug, Clone, Copy)]
struct ModelParams {
    /// Divides every node's processing time
    time_divisor: f64,
    /// Run count behind the monthly roll-up
    runs_per_month: f64,
    /// Scales resident volume and licensing
    volume_multiplier: f64,
}

impl CostEngine {
    /// Create an engine with a validated configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the cost section is invalid.
    pub fn new(config: CostConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Cost analysis at the configured run cadence
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the cost section is invalid.
    pub fn calculate(&self, graph: &ValidatedGraph) -> ConfigResult<CostResult> {
        self.config.validate()?;
        Ok(self.evaluate(
            graph,
            ModelParams {
                time_divisor: 1.0,
                runs_per_month: self.configured_runs_per_month(),
                volume_multiplier: 1.0,
            },
        ))
    }

    /// Projection at an explicit run count and data-volume multiplier
    ///
    /// Compute and network scale with the run count; storage and licensing
    /// scale with the volume multiplier; maintenance is recomputed on the
    /// scaled subtotal.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the section is invalid, the run count is
    /// not positive, or the multiplier is negative or non-finite.
    pub fn project_monthly_cost(
        &self,
        graph: &ValidatedGraph,
        runs_per_month: f64,
        volume_multiplier: f64,
    ) -> ConfigResult<CostResult> {
        self.config.validate()?;
        if !runs_per_month.is_finite() || runs_per_month <= 0.0 {
            return Err(ConfigError::invalid(
                "cost",
                "runs per month must be a positive finite number",
            ));
        }
        if !volume_multiplier.is_finite() || volume_multiplier < 0.0 {
            return Err(ConfigError::invalid(
                "cost",
                "volume multiplier must be a non-negative finite number",
            ));
        }
        Ok(self.evaluate(
            graph,
            ModelParams {
                time_divisor: 1.0,
                runs_per_month,
                volume_multiplier,
            },
        ))
    }

    /// Cost after dividing every node's processing time by `factor`
    ///
    /// The total is monotonically non-increasing in the factor.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the section is invalid or the factor is
    /// not a positive finite number.
    pub fn estimate_scaling_cost(
        &self,
        graph: &ValidatedGraph,
        factor: f64,
    ) -> ConfigResult<CostResult> {
        self.config.validate()?;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ConfigError::invalid(
                "cost",
                "scale factor must be a positive finite number",
            ));
        }
        Ok(self.evaluate(
            graph,
            ModelParams {
                time_divisor: factor,
                runs_per_month: self.configured_runs_per_month(),
                volume_multiplier: 1.0,
            },
        ))
    }

    /// Delta report between two cost results, read as `b` relative to `a`
    #[must_use]
    pub fn compare(a: &CostResult, b: &CostResult) -> CostComparison {
        let monthly_delta = b.total_per_month - a.total_per_month;
        CostComparison {
            monthly_delta,
            per_run_delta: b.total_per_run - a.total_per_run,
            breakdown_delta: CostBreakdown {
                compute: b.breakdown.compute - a.breakdown.compute,
                storage: b.breakdown.storage - a.breakdown.storage,
                network: b.breakdown.network - a.breakdown.network,
                licensing: b.breakdown.licensing - a.breakdown.licensing,
                maintenance: b.breakdown.maintenance - a.breakdown.maintenance,
            },
            relative_change: if a.total_per_month > 0.0 {
                monthly_delta / a.total_per_month
            } else {
                0.0
            },
        }
    }

    fn configured_runs_per_month(&self) -> f64 {
        f64::from(self.config.runs_per_hour) * HOURS_PER_MONTH
    }

    fn evaluate(&self, graph: &ValidatedGraph, params: ModelParams) -> CostResult {
        let mut node_costs: BTreeMap<NodeId, NodeCost> = BTreeMap::new();
        let mut breakdown = CostBreakdown::default();
        let mut suggestions = Vec::new();

        for view in graph.iter_topo() {
            let parallelism = view.node.parallelism();
            let processing_ms =
                view.block.cost.base_latency_ms / parallelism / params.time_divisor;
            let compute_per_run = processing_ms * self.config.compute_rate_per_ms;

            let volume_gb = view
                .node
                .float_option("data_volume_gb")
                .unwrap_or(self.config.default_volume_gb_per_run)
                .max(0.0);

            let storage_per_month = if view.block.category.is_storage() {
                volume_gb
                    * self.config.storage_rate_per_gb_month
                    * view.node.retention_months()
                    * params.volume_multiplier
            } else {
                0.0
            };

            let network_per_run = graph
                .data_outputs(view.id)
                .map(|c| {
                    c.volume_gb_per_run.unwrap_or(volume_gb).max(0.0)
                        * self.config.network_rate_per_gb
                })
                .sum::<f64>();

            let licensing_per_month = if view.block.cost.premium {
                view.block.cost.license_fee_monthly * params.volume_multiplier
            } else {
                0.0
            };

            let subtotal_per_month = (compute_per_run + network_per_run)
                * params.runs_per_month
                + storage_per_month
                + licensing_per_month;
            let maintenance_per_month = self.config.maintenance_fraction * subtotal_per_month;
            let total_per_month = subtotal_per_month + maintenance_per_month;

            breakdown.compute += compute_per_run * params.runs_per_month;
            breakdown.network += network_per_run * params.runs_per_month;
            breakdown.storage += storage_per_month;
            breakdown.licensing += licensing_per_month;
            breakdown.maintenance += maintenance_per_month;

            if view.block.cost.premium {
                suggestions.push(format!(
                    "Node '{}' uses premium block '{}' (${:.2}/month license); consider a standard alternative",
                    view.id, view.block.id, view.block.cost.license_fee_monthly
                ));
            }
            if view.block.category.is_storage() && view.node.retention_months() > 1.0 {
                suggestions.push(format!(
                    "Node '{}' retains data for {:.0} months; shorter retention lowers storage cost",
                    view.id,
                    view.node.retention_months()
                ));
            }
            if processing_ms > 100.0 && parallelism <= 1.0 {
                suggestions.push(format!(
                    "Node '{}' spends {:.0} ms per batch at parallelism 1; higher parallelism cuts compute cost",
                    view.id, processing_ms
                ));
            }

            node_costs.insert(
                view.id.clone(),
                NodeCost {
                    compute_per_run,
                    network_per_run,
                    storage_per_month,
                    licensing_per_month,
                    maintenance_per_month,
                    total_per_month,
                },
            );
        }

        let mut most_expensive: Option<(NodeId, f64)> = None;
        for (id, cost) in &node_costs {
            let higher = most_expensive
                .as_ref()
                .map_or(true, |(_, best)| cost.total_per_month > *best);
            if higher {
                most_expensive = Some((id.clone(), cost.total_per_month));
            }
        }

        // Pipeline cost is the sum of node costs
        let total_per_month: f64 = node_costs.values().map(|c| c.total_per_month).sum();
        tracing::debug!(
            "Cost model for '{}': ${:.2}/month over {} nodes",
            graph.name(),
            total_per_month,
            node_costs.len()
        );

        CostResult {
            total_per_run: total_per_month / params.runs_per_month,
            total_per_hour: total_per_month / HOURS_PER_MONTH,
            total_per_day: total_per_month / DAYS_PER_MONTH,
            total_per_month,
            node_costs,
            breakdown,
            most_expensive_node: most_expensive.map(|(id, _)| id),
            optimization_suggestions: suggestions,
            runs_per_month: params.runs_per_month,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BlockCatalog;
    use crate::graph::pipeline::{Connection, PipelineGraph, PipelineNode};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    /// reader -> filter -> writer over the builtin catalog; the filter
    /// carries 2 GB per run so the most expensive node is unambiguous
    fn linear_graph() -> Result<ValidatedGraph, Box<dyn std::error::Error>> {
        let mut graph = PipelineGraph::new("cost-linear");
        graph.add_node(PipelineNode::new("reader", "database_reader"))?;
        graph.add_node(PipelineNode::new("shape", "filter").with_option("data_volume_gb", 2.0))?;
        graph.add_node(PipelineNode::new("writer", "database_writer"))?;
        graph.add_connection(Connection::new("reader", "shape"))?;
        graph.add_connection(Connection::new("shape", "writer"))?;
        Ok(graph.validate(&BlockCatalog::builtin())?)
    }

    #[test]
    fn monthly_breakdown_matches_hand_computation() -> TestResult {
        let graph = linear_graph()?;
        let result = CostEngine::new(CostConfig::default())?.calculate(&graph)?;

        // 4 runs/hour over a 720-hour month
        assert!(close(result.runs_per_month, 2_880.0));
        // reader 50 ms + filter 50 ms + writer 120 ms, $0.0001/ms
        assert!(close(result.breakdown.compute, 0.022 * 2_880.0));
        // reader ships 1 GB, filter ships 2 GB, $0.09/GB
        assert!(close(result.breakdown.network, 0.27 * 2_880.0));
        // writer holds 1 GB for one month at $0.023
        assert!(close(result.breakdown.storage, 0.023));
        assert!(close(result.breakdown.licensing, 0.0));

        let subtotal = result.breakdown.compute
            + result.breakdown.network
            + result.breakdown.storage;
        assert!(close(result.breakdown.maintenance, 0.10 * subtotal));
        assert!(close(result.total_per_month, result.breakdown.total()));
        assert!(close(result.total_per_run, result.total_per_month / 2_880.0));
        assert!(close(result.total_per_hour, result.total_per_month / 720.0));
        assert!(close(result.total_per_day, result.total_per_month / 30.0));

        assert_eq!(result.most_expensive_node, Some(NodeId::new("shape")));
        Ok(())
    }

    #[test]
    fn node_totals_carry_maintenance_and_sum_to_the_pipeline() -> TestResult {
        let graph = linear_graph()?;
        let result = CostEngine::new(CostConfig::default())?.calculate(&graph)?;

        let node_sum: f64 = result.node_costs.values().map(|c| c.total_per_month).sum();
        assert!(close(node_sum, result.total_per_month));

        // Each node pays the surcharge on its own subtotal
        for cost in result.node_costs.values() {
            let subtotal = (cost.compute_per_run + cost.network_per_run) * result.runs_per_month
                + cost.storage_per_month
                + cost.licensing_per_month;
            assert!(close(cost.maintenance_per_month, 0.10 * subtotal));
            assert!(close(cost.total_per_month, subtotal + cost.maintenance_per_month));
        }
        Ok(())
    }

    #[test]
    fn scaling_factor_only_shrinks_compute() -> TestResult {
        let graph = linear_graph()?;
        let engine = CostEngine::new(CostConfig::default())?;
        let base = engine.calculate(&graph)?;
        let scaled = engine.estimate_scaling_cost(&graph, 2.0)?;

        assert!(close(scaled.breakdown.compute, base.breakdown.compute / 2.0));
        assert!(close(scaled.breakdown.network, base.breakdown.network));
        assert!(close(scaled.breakdown.storage, base.breakdown.storage));
        assert!(scaled.total_per_month < base.total_per_month);

        assert!(engine.estimate_scaling_cost(&graph, 0.0).is_err());
        assert!(engine.estimate_scaling_cost(&graph, -1.0).is_err());
        assert!(engine.estimate_scaling_cost(&graph, f64::NAN).is_err());
        Ok(())
    }

    #[test]
    fn projection_scales_run_and_volume_terms_independently() -> TestResult {
        let graph = linear_graph()?;
        let engine = CostEngine::new(CostConfig::default())?;
        let base = engine.calculate(&graph)?;
        let projected = engine.project_monthly_cost(&graph, 5_760.0, 2.0)?;

        assert!(close(projected.breakdown.compute, base.breakdown.compute * 2.0));
        assert!(close(projected.breakdown.network, base.breakdown.network * 2.0));
        assert!(close(projected.breakdown.storage, base.breakdown.storage * 2.0));
        assert!(engine.project_monthly_cost(&graph, 0.0, 1.0).is_err());
        assert!(engine.project_monthly_cost(&graph, 100.0, -0.5).is_err());
        Ok(())
    }

    #[test]
    fn comparison_reports_signed_deltas() -> TestResult {
        let graph = linear_graph()?;
        let engine = CostEngine::new(CostConfig::default())?;
        let cheap = engine.estimate_scaling_cost(&graph, 4.0)?;
        let expensive = engine.calculate(&graph)?;

        let delta = CostEngine::compare(&cheap, &expensive);
        assert!(delta.monthly_delta > 0.0);
        assert!(delta.per_run_delta > 0.0);
        assert!(delta.breakdown_delta.compute > 0.0);
        assert!(close(delta.breakdown_delta.network, 0.0));
        assert!(delta.relative_change > 0.0);

        let flipped = CostEngine::compare(&expensive, &cheap);
        assert!(flipped.monthly_delta < 0.0);
        Ok(())
    }

    #[test]
    fn premium_and_retention_produce_suggestions() -> TestResult {
        let mut graph = PipelineGraph::new("cost-suggestions");
        graph.add_node(PipelineNode::new("stream", "streaming_reader"))?;
        graph.add_node(
            PipelineNode::new("lake", "data_lake_writer").with_option("retention_months", 6.0),
        )?;
        graph.add_connection(Connection::new("stream", "lake"))?;
        let graph = graph.validate(&BlockCatalog::builtin())?;

        let result = CostEngine::new(CostConfig::default())?.calculate(&graph)?;
        assert!(result.breakdown.licensing > 0.0);
        assert!(result
            .optimization_suggestions
            .iter()
            .any(|s| s.contains("premium block")));
        assert!(result
            .optimization_suggestions
            .iter()
            .any(|s| s.contains("retains data for 6 months")));
        Ok(())
    }
}
