//! Quality Engine
//!
//! Data-quality model over six weighted metrics. Each node starts from its
//! block's quality profile, applies the node's configuration adjustments,
//! and is then degraded by the worst upstream feed, so quality only ever
//! falls along a data path. Structural error and loss estimates turn the
//! weighted score into the graded overall figure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{QualityConfig, ThroughputConfig};
use crate::error::{ConfigError, ConfigResult};
use crate::graph::flow;
use crate::graph::snapshot::ValidatedGraph;
use crate::types::{BlockCategory, Grade, NodeId, QualityMetric};

const ERROR_PENALTY_FACTOR: f64 = 0.5;
const ERROR_PENALTY_CAP: f64 = 0.3;
const LOSS_PENALTY_FACTOR: f64 = 0.3;
const LOSS_PENALTY_CAP: f64 = 0.2;

/// Fixed metric weights; they sum to 1.0
const fn metric_weight(metric: QualityMetric) -> f64 {
    match metric {
        QualityMetric::Completeness => 0.20,
        QualityMetric::Accuracy => 0.25,
        QualityMetric::Consistency | QualityMetric::Timeliness | QualityMetric::Validity => 0.15,
        QualityMetric::Uniqueness => 0.10,
    }
}

/// Quality attribution of a single node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeQuality {
    /// Block profile after the node's configuration adjustments
    pub adjusted: BTreeMap<QualityMetric, f64>,
    /// Adjusted scores degraded by the worst upstream feed
    pub effective: BTreeMap<QualityMetric, f64>,
    /// Weighted composite of the effective scores
    pub weighted_effective: f64,
}

/// Result of a quality analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityResult {
    /// Weighted score after error and loss penalties, `[0, 1]`
    pub overall_score: f64,
    /// Letter grade of the overall score
    pub grade: Grade,
    /// Pipeline-level score per metric, mean over sink nodes
    pub metric_scores: BTreeMap<QualityMetric, f64>,
    /// Per-node attribution keyed by node id
    pub node_scores: BTreeMap<NodeId, NodeQuality>,
    /// Structural error estimate, grows with node and connection count
    pub error_rate: f64,
    /// Penalty applied for the error rate
    pub error_penalty: f64,
    /// Structural loss estimate plus flow drops without backpressure
    pub data_loss_rate: f64,
    /// Penalty applied for the loss rate
    pub data_loss_penalty: f64,
    /// Data-flow edges handing streaming output to a non-streaming store
    pub schema_violations: usize,
}

/// Node falling below a quality threshold on at least one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakPoint {
    /// Offending node
    pub node: NodeId,
    /// Metric with the lowest effective score
    pub metric: QualityMetric,
    /// That lowest effective score
    pub score: f64,
}

/// Result of an error-propagation simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPropagation {
    /// Cumulative error rate per node; every hop compounds the injected rate
    pub cumulative_rates: BTreeMap<NodeId, f64>,
    /// Worst cumulative rate over the sink nodes
    pub pipeline_error_rate: f64,
    /// Overall quality score under that elevated error rate
    pub overall_score: f64,
    /// Letter grade of the degraded score
    pub grade: Grade,
}

/// Pure quality analysis over a validated snapshot
///
/// Carries the flow parameters alongside its own section so that disabled
/// backpressure shows up as data loss without consulting the throughput
/// engine's output.
#[derive(Debug, Clone)]
pub struct QualityEngine {
    config: QualityConfig,
    flow: ThroughputConfig,
}

impl QualityEngine {
    /// Create an engine with validated configuration sections
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when either section is invalid.
    pub fn new(config: QualityConfig, flow: ThroughputConfig) -> ConfigResult<Self> {
        config.validate()?;
        flow.validate()?;
        Ok(Self { config, flow })
    }

    /// Quality analysis of the whole pipeline
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a configuration section is invalid.
    pub fn calculate(&self, graph: &ValidatedGraph) -> ConfigResult<QualityResult> {
        self.config.validate()?;
        self.flow.validate()?;

        let node_scores = node_quality(graph);
        let metric_scores = pipeline_metrics(graph, &node_scores);
        let weighted = weighted_sum(&metric_scores);

        let error_rate = structural_error_rate(graph);
        let data_loss_rate = self.data_loss_rate(graph);
        let error_penalty = (error_rate * ERROR_PENALTY_FACTOR).min(ERROR_PENALTY_CAP);
        let data_loss_penalty = (data_loss_rate * LOSS_PENALTY_FACTOR).min(LOSS_PENALTY_CAP);
        let overall_score = apply_penalties(weighted, error_rate, data_loss_rate);

        tracing::debug!(
            "Quality of '{}': {:.3} ({})",
            graph.name(),
            overall_score,
            Grade::from_score(overall_score)
        );

        Ok(QualityResult {
            overall_score,
            grade: Grade::from_score(overall_score),
            metric_scores,
            node_scores,
            error_rate,
            error_penalty,
            data_loss_rate,
            data_loss_penalty,
            schema_violations: schema_violations(graph),
        })
    }

    /// Overall score when every node applies an injected error rate
    ///
    /// The cumulative rate of a node is `1 - survival`, where survival
    /// shrinks by `(1 - rate)` at each hop along its worst data path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a section is invalid or the injected rate
    /// is outside `[0, 1]`.
    pub fn simulate_error_propagation(
        &self,
        graph: &ValidatedGraph,
        injected_error_rate: f64,
    ) -> ConfigResult<ErrorPropagation> {
        self.config.validate()?;
        self.flow.validate()?;
        if !injected_error_rate.is_finite() || !(0.0..=1.0).contains(&injected_error_rate) {
            return Err(ConfigError::invalid(
                "quality",
                "injected error rate must lie in [0, 1]",
            ));
        }

        let mut survival: BTreeMap<&NodeId, f64> = BTreeMap::new();
        for view in graph.iter_topo() {
            let upstream = graph
                .data_predecessors(view.id)
                .iter()
                .filter_map(|pred| survival.get(pred))
                .fold(1.0_f64, |acc, s| acc.min(*s));
            survival.insert(view.id, upstream * (1.0 - injected_error_rate));
        }

        let cumulative_rates: BTreeMap<NodeId, f64> = survival
            .iter()
            .map(|(id, s)| ((*id).clone(), 1.0 - *s))
            .collect();
        let pipeline_error_rate = graph
            .sinks()
            .iter()
            .filter_map(|id| cumulative_rates.get(id))
            .fold(0.0_f64, |acc, r| acc.max(*r));

        let node_scores = node_quality(graph);
        let metric_scores = pipeline_metrics(graph, &node_scores);
        let overall_score = apply_penalties(
            weighted_sum(&metric_scores),
            pipeline_error_rate,
            self.data_loss_rate(graph),
        );

        Ok(ErrorPropagation {
            cumulative_rates,
            pipeline_error_rate,
            overall_score,
            grade: Grade::from_score(overall_score),
        })
    }

    /// Nodes whose effective score for any metric falls below the threshold
    ///
    /// A node with a healthy composite still shows up when a single metric
    /// sags. Each entry names the node's worst metric; sorted worst first by
    /// that lowest score, ties break on the node id.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a section is invalid or the threshold is
    /// outside `(0, 1]`.
    pub fn identify_weak_points(
        &self,
        graph: &ValidatedGraph,
        threshold: f64,
    ) -> ConfigResult<Vec<WeakPoint>> {
        self.config.validate()?;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(ConfigError::invalid(
                "quality",
                "weak point threshold must lie in (0, 1]",
            ));
        }

        let mut weak: Vec<WeakPoint> = node_quality(graph)
            .into_iter()
            .filter_map(|(node, q)| {
                q.effective
                    .iter()
                    .map(|(metric, score)| (*metric, *score))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .filter(|(_, lowest)| *lowest < threshold)
                    .map(|(metric, score)| WeakPoint { node, metric, score })
            })
            .collect();
        weak.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.node.cmp(&b.node)));
        Ok(weak)
    }

    /// Weak points at the configured threshold
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a configuration section is invalid.
    pub fn weak_points_at_configured_threshold(
        &self,
        graph: &ValidatedGraph,
    ) -> ConfigResult<Vec<WeakPoint>> {
        self.identify_weak_points(graph, self.config.weak_point_threshold)
    }

    /// Structural loss plus the flow drop fraction without backpressure
    fn data_loss_rate(&self, graph: &ValidatedGraph) -> f64 {
        let transforms = graph
            .iter_topo()
            .filter(|view| matches!(view.block.category, BlockCategory::Transform))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let structural = (0.001 + 0.002 * transforms as f64).min(0.05);

        let dropped = if self.flow.backpressure_enabled {
            0.0
        } else {
            flow::propagate(graph, self.flow.default_ingestion_rate_rps, false, None)
                .drop_fraction()
        };
        (structural + dropped).clamp(0.0, 1.0)
    }
}

/// Adjusted and effective scores for every node
fn node_quality(graph: &ValidatedGraph) -> BTreeMap<NodeId, NodeQuality> {
    let mut result: BTreeMap<NodeId, NodeQuality> = BTreeMap::new();

    for view in graph.iter_topo() {
        let strict = view.node.bool_option("strict_validation").unwrap_or(false);
        let dedup = view.node.bool_option("deduplicate").unwrap_or(false);
        let sampling = view.node.float_option("sampling_ratio").unwrap_or(1.0);

        let mut adjusted = BTreeMap::new();
        let mut effective = BTreeMap::new();
        let mut weighted_effective = 0.0;

        for metric in QualityMetric::ALL {
            let mut score = view.block.quality.score(metric);
            match metric {
                QualityMetric::Validity if strict => score += 0.03,
                QualityMetric::Accuracy if strict => score += 0.02,
                QualityMetric::Uniqueness if dedup => score += 0.05,
                QualityMetric::Completeness if sampling < 1.0 => score *= sampling.max(0.5),
                _ => {}
            }
            let score = score.clamp(0.0, 1.0);

            let upstream = graph
                .data_predecessors(view.id)
                .iter()
                .filter_map(|pred| result.get(pred))
                .filter_map(|q| q.effective.get(&metric))
                .fold(1.0_f64, |acc, s| acc.min(*s));
            let eff = (score * upstream).clamp(0.0, 1.0);

            adjusted.insert(metric, score);
            effective.insert(metric, eff);
            weighted_effective += metric_weight(metric) * eff;
        }

        result.insert(
            view.id.clone(),
            NodeQuality {
                adjusted,
                effective,
                weighted_effective,
            },
        );
    }

    result
}

/// Pipeline-level score per metric, mean over sink nodes
fn pipeline_metrics(
    graph: &ValidatedGraph,
    node_scores: &BTreeMap<NodeId, NodeQuality>,
) -> BTreeMap<QualityMetric, f64> {
    let sinks = graph.sinks();
    QualityMetric::ALL
        .iter()
        .map(|metric| {
            let total: f64 = sinks
                .iter()
                .filter_map(|id| node_scores.get(id))
                .filter_map(|q| q.effective.get(metric))
                .sum();
            #[allow(clippy::cast_precision_loss)]
            let mean = if sinks.is_empty() {
                0.0
            } else {
                total / sinks.len() as f64
            };
            (*metric, mean)
        })
        .collect()
}

/// Weighted composite of per-metric scores
fn weighted_sum(scores: &BTreeMap<QualityMetric, f64>) -> f64 {
    scores
        .iter()
        .map(|(metric, score)| metric_weight(*metric) * score)
        .sum()
}

/// Error and loss penalties over a weighted score
fn apply_penalties(weighted: f64, error_rate: f64, data_loss_rate: f64) -> f64 {
    let error_penalty = (error_rate * ERROR_PENALTY_FACTOR).min(ERROR_PENALTY_CAP);
    let loss_penalty = (data_loss_rate * LOSS_PENALTY_FACTOR).min(LOSS_PENALTY_CAP);
    (weighted * (1.0 - error_penalty) * (1.0 - loss_penalty)).clamp(0.0, 1.0)
}

/// Structural error estimate from graph size
fn structural_error_rate(graph: &ValidatedGraph) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let rate =
        0.01 + 0.005 * graph.node_count() as f64 + 0.002 * graph.connection_count() as f64;
    rate.min(0.10)
}

/// Data-flow edges handing a streaming source's output straight to a store
/// that cannot accept a stream
fn schema_violations(graph: &ValidatedGraph) -> usize {
    graph
        .connections()
        .iter()
        .filter(|c| c.kind.carries_data())
        .filter(|c| {
            let Some(source) = graph.get(&c.source) else {
                return false;
            };
            let Some(target) = graph.get(&c.target) else {
                return false;
            };
            source.block.category.is_ingestion()
                && source.block.has_capability("streaming")
                && target.block.category.is_storage()
                && !target.block.has_capability("streaming")
        })
        .count()
}
