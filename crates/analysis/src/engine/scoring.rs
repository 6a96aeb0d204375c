//! Result Aggregator
//!
//! Folds the four engine results into one weighted score card. The pillar
//! weights are fixed by contract and there are no tunables: a missing
//! baseline never punishes the pipeline, it scores the term at full
//! credit, while badge flags stay false until a baseline exists to beat.

use serde::{Deserialize, Serialize};

use crate::engine::cost::CostResult;
use crate::engine::latency::LatencyResult;
use crate::engine::quality::QualityResult;
use crate::engine::throughput::ThroughputResult;
use crate::types::Grade;

const QUALITY_WEIGHT: f64 = 0.35;
const PERFORMANCE_WEIGHT: f64 = 0.30;
const COST_EFFICIENCY_WEIGHT: f64 = 0.20;
const COMPLEXITY_WEIGHT: f64 = 0.15;

/// Caller-supplied structure sub-scores, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityInputs {
    /// How varied the block palette in use is
    pub block_diversity: f64,
    /// How well orchestration blocks coordinate the pipeline
    pub orchestration_score: f64,
    /// Reviewer judgement of the overall design
    pub design_quality: f64,
}

impl Default for ComplexityInputs {
    fn default() -> Self {
        Self {
            block_diversity: 0.5,
            orchestration_score: 0.5,
            design_quality: 0.5,
        }
    }
}

/// Targets and context the score card is judged against
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Baselines {
    /// Throughput target in records per second
    pub target_rps: Option<f64>,
    /// End-to-end latency target in milliseconds
    pub target_latency_ms: Option<f64>,
    /// Monthly cost of the setup being replaced
    pub baseline_cost_monthly: Option<f64>,
    /// Optimization passes already applied, each worth a 10% efficiency bonus
    pub optimization_count: u32,
    /// Structure sub-scores
    pub complexity: ComplexityInputs,
}

/// Baseline-beating flags; false whenever the baseline is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Badges {
    /// Pipeline rate met or beat the throughput target
    pub meets_target_rps: bool,
    /// End-to-end latency met or beat the latency target
    pub meets_target_latency: bool,
    /// Monthly cost came in at or under the baseline
    pub under_budget: bool,
}

/// Aggregate judgement of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    /// Quality pillar, the quality engine's overall score
    pub quality: f64,
    /// Performance pillar from throughput and latency ratios
    pub performance: f64,
    /// Cost pillar relative to the baseline spend
    pub cost_efficiency: f64,
    /// Structure pillar from the caller's complexity inputs
    pub complexity: f64,
    /// Weighted overall score
    pub overall: f64,
    /// Letter grade of the overall score
    pub grade: Grade,
    /// Baseline-beating flags
    pub badges: Badges,
}

/// Fold the four engine results and the baselines into a score card
#[must_use]
pub fn score(
    cost: &CostResult,
    throughput: &ThroughputResult,
    quality: &QualityResult,
    latency: &LatencyResult,
    baselines: &Baselines,
) -> ScoreCard {
    let quality_pillar = quality.overall_score.clamp(0.0, 1.0);

    let rps_term = match baselines.target_rps {
        Some(target) if target > 0.0 => (throughput.pipeline_rps / target).clamp(0.0, 1.0),
        _ => 1.0,
    };
    let latency_term = match baselines.target_latency_ms {
        Some(target) if latency.total_latency_ms > 0.0 => {
            (target / latency.total_latency_ms).clamp(0.0, 1.0)
        }
        _ => 1.0,
    };
    let efficiency_term = if throughput.max_theoretical_rps > 0.0 {
        (throughput.pipeline_rps / throughput.max_theoretical_rps).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let performance = 0.5 * rps_term + 0.3 * latency_term + 0.2 * efficiency_term;

    let cost_ratio = match baselines.baseline_cost_monthly {
        Some(baseline) if baseline > 0.0 && cost.total_per_month > 0.0 => {
            (baseline / cost.total_per_month).min(1.0)
        }
        _ => 1.0,
    };
    let optimization_bonus = 1.0 + 0.1 * f64::from(baselines.optimization_count);
    let cost_efficiency = (cost_ratio * optimization_bonus).clamp(0.0, 1.0);

    let inputs = baselines.complexity;
    let complexity = 0.3 * inputs.block_diversity.clamp(0.0, 1.0)
        + 0.3 * inputs.orchestration_score.clamp(0.0, 1.0)
        + 0.4 * inputs.design_quality.clamp(0.0, 1.0);

    let overall = QUALITY_WEIGHT * quality_pillar
        + PERFORMANCE_WEIGHT * performance
        + COST_EFFICIENCY_WEIGHT * cost_efficiency
        + COMPLEXITY_WEIGHT * complexity;

    ScoreCard {
        quality: quality_pillar,
        performance,
        cost_efficiency,
        complexity,
        overall,
        grade: Grade::from_score(overall),
        badges: Badges {
            meets_target_rps: baselines
                .target_rps
                .is_some_and(|t| throughput.pipeline_rps >= t),
            meets_target_latency: baselines
                .target_latency_ms
                .is_some_and(|t| latency.total_latency_ms <= t),
            under_budget: baselines
                .baseline_cost_monthly
                .is_some_and(|b| cost.total_per_month <= b),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cost::CostBreakdown;
    use std::collections::BTreeMap;

    fn cost_fixture(total_per_month: f64) -> CostResult {
        CostResult {
            total_per_run: total_per_month / 2_880.0,
            total_per_hour: total_per_month / 720.0,
            total_per_day: total_per_month / 30.0,
            total_per_month,
            node_costs: BTreeMap::new(),
            breakdown: CostBreakdown::default(),
            most_expensive_node: None,
            optimization_suggestions: Vec::new(),
            runs_per_month: 2_880.0,
        }
    }

    fn throughput_fixture(pipeline_rps: f64, max_theoretical_rps: f64) -> ThroughputResult {
        ThroughputResult {
            pipeline_rps,
            pipeline_bps: pipeline_rps * 1_024.0,
            node_metrics: BTreeMap::new(),
            bottleneck: None,
            max_theoretical_rps,
            efficiency: if max_theoretical_rps > 0.0 {
                pipeline_rps / max_theoretical_rps
            } else {
                0.0
            },
            saturation_point_rps: 0.0,
            dropped_rps: 0.0,
            duration_secs: 1.0,
        }
    }

    fn quality_fixture(overall_score: f64) -> QualityResult {
        QualityResult {
            overall_score,
            grade: Grade::from_score(overall_score),
            metric_scores: BTreeMap::new(),
            node_scores: BTreeMap::new(),
            error_rate: 0.0,
            error_penalty: 0.0,
            data_loss_rate: 0.0,
            data_loss_penalty: 0.0,
            schema_violations: 0,
        }
    }

    fn latency_fixture(total_latency_ms: f64) -> LatencyResult {
        LatencyResult {
            total_latency_ms,
            critical_path: Vec::new(),
            node_latencies: BTreeMap::new(),
            parallelization_opportunities: Vec::new(),
        }
    }

    #[test]
    fn pillar_weights_match_the_contract() {
        let baselines = Baselines {
            target_rps: Some(2_000.0),
            target_latency_ms: Some(100.0),
            baseline_cost_monthly: Some(500.0),
            optimization_count: 0,
            complexity: ComplexityInputs::default(),
        };
        let card = score(
            &cost_fixture(1_000.0),
            &throughput_fixture(1_000.0, 6_000.0),
            &quality_fixture(0.8),
            &latency_fixture(200.0),
            &baselines,
        );

        // rps 0.5, latency 0.5, efficiency 1/6
        let performance = 0.5 * 0.5 + 0.3 * 0.5 + 0.2 * (1_000.0 / 6_000.0);
        assert!((card.performance - performance).abs() < 1e-9);
        assert!((card.cost_efficiency - 0.5).abs() < 1e-9);
        assert!((card.complexity - 0.5).abs() < 1e-9);

        let overall = 0.35 * 0.8 + 0.30 * performance + 0.20 * 0.5 + 0.15 * 0.5;
        assert!((card.overall - overall).abs() < 1e-9);
        assert_eq!(card.grade, Grade::from_score(overall));

        assert!(!card.badges.meets_target_rps);
        assert!(!card.badges.meets_target_latency);
        assert!(!card.badges.under_budget);
    }

    #[test]
    fn missing_baselines_score_neutral_with_no_badges() {
        let card = score(
            &cost_fixture(10_000.0),
            &throughput_fixture(4_500.0, 6_000.0),
            &quality_fixture(1.0),
            &latency_fixture(5_000.0),
            &Baselines::default(),
        );

        assert!((card.performance - (0.5 + 0.3 + 0.2 * 0.75)).abs() < 1e-9);
        assert!((card.cost_efficiency - 1.0).abs() < 1e-9);
        assert!(!card.badges.meets_target_rps);
        assert!(!card.badges.meets_target_latency);
        assert!(!card.badges.under_budget);
    }

    #[test]
    fn optimization_bonus_clamps_at_full_credit() {
        let baselines = Baselines {
            baseline_cost_monthly: Some(800.0),
            optimization_count: 3,
            ..Baselines::default()
        };
        let card = score(
            &cost_fixture(1_000.0),
            &throughput_fixture(1_000.0, 1_000.0),
            &quality_fixture(0.9),
            &latency_fixture(100.0),
            &baselines,
        );

        // 0.8 ratio times a 1.3 bonus clamps to 1.0
        assert!((card.cost_efficiency - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_denominators_fall_back_to_full_credit() {
        let baselines = Baselines {
            target_latency_ms: Some(50.0),
            baseline_cost_monthly: Some(100.0),
            ..Baselines::default()
        };
        let card = score(
            &cost_fixture(0.0),
            &throughput_fixture(0.0, 0.0),
            &quality_fixture(0.5),
            &latency_fixture(0.0),
            &baselines,
        );

        // latency target over a zero actual, efficiency over a zero
        // theoretical and cost over a zero spend all score neutral
        assert!((card.performance - 1.0).abs() < 1e-9);
        assert!((card.cost_efficiency - 1.0).abs() < 1e-9);
        // a zero-latency pipeline trivially meets its target
        assert!(card.badges.meets_target_latency);
        assert!(card.badges.under_budget);
    }

    #[test]
    fn met_targets_light_the_badges() {
        let baselines = Baselines {
            target_rps: Some(4_000.0),
            target_latency_ms: Some(500.0),
            baseline_cost_monthly: Some(2_000.0),
            ..Baselines::default()
        };
        let card = score(
            &cost_fixture(1_500.0),
            &throughput_fixture(4_500.0, 6_000.0),
            &quality_fixture(0.95),
            &latency_fixture(350.0),
            &baselines,
        );

        assert!(card.badges.meets_target_rps);
        assert!(card.badges.meets_target_latency);
        assert!(card.badges.under_budget);
        assert!((card.performance - (0.5 + 0.3 + 0.2 * 0.75)).abs() < 1e-9);
    }
}
