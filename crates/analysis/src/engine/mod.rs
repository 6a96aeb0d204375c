//! Analysis engines and their orchestration
//!
//! Four pure engines share one validated snapshot; the analyzer fans them
//! out on the rayon pool and folds their results into a scored report.
//! Latency is the only engine that consumes another engine's output, so it
//! runs on the throughput arm of the fan-out.
//!
//! ```text
//!                 ┌── Cost ───────────────────────────┐
//! ValidatedGraph ─┼── Quality ────────────────────────┼─► ScoreCard
//!                 └── Throughput ──► Latency ─────────┘
//! ```

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::BlockCatalog;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisResult, ConfigError, ConfigResult};
use crate::graph::pipeline::PipelineGraph;
use crate::graph::snapshot::ValidatedGraph;

pub mod cost;
pub mod latency;
pub mod quality;
pub mod scoring;
pub mod throughput;

pub use cost::{CostBreakdown, CostComparison, CostEngine, CostResult, NodeCost};
pub use latency::{LatencyEngine, LatencyResult, LatencyScaling, NodeLatency, SlackOpportunity};
pub use quality::{ErrorPropagation, NodeQuality, QualityEngine, QualityResult, WeakPoint};
pub use scoring::{Badges, Baselines, ComplexityInputs, ScoreCard};
pub use throughput::{NodeThroughput, ThroughputEngine, ThroughputResult};

/// Everything one analysis run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Unique id of this run
    pub id: Uuid,
    /// When the run finished
    pub generated_at: DateTime<Utc>,
    /// Name of the analyzed pipeline
    pub pipeline_name: String,
    /// Cost engine result
    pub cost: CostResult,
    /// Throughput engine result
    pub throughput: ThroughputResult,
    /// Quality engine result
    pub quality: QualityResult,
    /// Latency engine result
    pub latency: LatencyResult,
    /// Aggregate score card
    pub score: ScoreCard,
}

/// Orchestrates the four engines over one validated snapshot
///
/// Construction validates every configuration section up front, so a
/// malformed section surfaces before any graph is touched.
#[derive(Debug, Clone)]
pub struct PipelineAnalyzer {
    config: AnalysisConfig,
    catalog: BlockCatalog,
    cost: CostEngine,
    throughput: ThroughputEngine,
    quality: QualityEngine,
    latency: LatencyEngine,
}

impl PipelineAnalyzer {
    /// Analyzer over the builtin block catalog
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any configuration section is invalid.
    pub fn new(config: AnalysisConfig) -> ConfigResult<Self> {
        Self::with_catalog(config, BlockCatalog::builtin())
    }

    /// Analyzer over a custom block catalog
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any configuration section is invalid.
    pub fn with_catalog(config: AnalysisConfig, catalog: BlockCatalog) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            cost: CostEngine::new(config.cost.clone())?,
            throughput: ThroughputEngine::new(config.throughput.clone())?,
            quality: QualityEngine::new(config.quality.clone(), config.throughput.clone())?,
            latency: LatencyEngine::new(config.latency.clone())?,
            config,
            catalog,
        })
    }

    /// The configuration this analyzer runs under
    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The catalog node blocks resolve against
    #[must_use]
    pub const fn catalog(&self) -> &BlockCatalog {
        &self.catalog
    }

    /// Validate the graph, run all engines and aggregate the score
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::Graph` when the pipeline fails validation
    /// and `AnalysisError::Config` when an engine rejects its parameters.
    pub fn analyze(
        &self,
        graph: &PipelineGraph,
        baselines: &Baselines,
    ) -> AnalysisResult<AnalysisReport> {
        let snapshot = graph.validate(&self.catalog)?;
        self.analyze_snapshot(&snapshot, baselines)
    }

    /// Run all engines over an already validated snapshot
    ///
    /// Two runs over the same snapshot agree on everything except `id`
    /// and `generated_at`.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::Config` when an engine rejects its
    /// parameters.
    pub fn analyze_snapshot(
        &self,
        snapshot: &ValidatedGraph,
        baselines: &Baselines,
    ) -> AnalysisResult<AnalysisReport> {
        let started = Instant::now();

        let (cost, (quality, flow_chain)) = rayon::join(
            || self.cost.calculate(snapshot),
            || {
                rayon::join(
                    || self.quality.calculate(snapshot),
                    || {
                        let throughput = self.throughput.calculate(snapshot)?;
                        let latency = self.latency.calculate(snapshot, &throughput)?;
                        Ok::<_, ConfigError>((throughput, latency))
                    },
                )
            },
        );
        let cost = cost?;
        let quality = quality?;
        let (throughput, latency) = flow_chain?;

        let score = scoring::score(&cost, &throughput, &quality, &latency, baselines);
        let report = AnalysisReport {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            pipeline_name: snapshot.name().to_string(),
            cost,
            throughput,
            quality,
            latency,
            score,
        };

        tracing::info!(
            "Analyzed pipeline '{}' in {:?}: overall {:.3} ({}), {} rps through {} nodes",
            report.pipeline_name,
            started.elapsed(),
            report.score.overall,
            report.score.grade,
            report.throughput.pipeline_rps,
            snapshot.node_count()
        );
        Ok(report)
    }
}
