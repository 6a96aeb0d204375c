//! Flowmetry Analysis - Pipeline Analysis Core
//!
//! This crate provides the analysis engines behind the Flowmetry visual
//! data-pipeline designer: a validated graph model over an immutable block
//! catalog, four pure analysis engines and a weighted result aggregator.
//!
//! # Features
//!
//! - **Validated snapshots**: every analysis runs over a normalized DAG
//!   with a stable topological order and precomputed adjacency
//! - **Pure engines**: cost, throughput, quality and latency never touch
//!   global state, I/O or randomness; identical inputs give identical
//!   results
//! - **Zero-panic policy**: all fallible operations return `Result<T, E>`
//! - **Parallel orchestration**: the analyzer fans the engines out on the
//!   rayon pool and folds them into one scored report
//!
//! # Architecture
//!
//! - [`types`] - Identifiers, categories, grades and option values
//! - [`catalog`] - The immutable building-block palette
//! - [`graph`] - Authoring model and validated snapshots
//! - [`engine`] - The four engines, the aggregator and the analyzer
//! - [`config`] - Garde-validated engine configuration
//! - [`error`] - Graph, configuration and umbrella error types
//!
//! # Example
//!
//! ```rust
//! use flowmetry_analysis::prelude::*;
//!
//! fn main() -> Result<(), AnalysisError> {
//!     let mut pipeline = PipelineGraph::new("orders");
//!     pipeline.add_node(PipelineNode::new("ingest", "database_reader"))?;
//!     pipeline.add_node(PipelineNode::new("shape", "filter"))?;
//!     pipeline.add_node(PipelineNode::new("store", "database_writer"))?;
//!     pipeline.add_connection(Connection::new("ingest", "shape"))?;
//!     pipeline.add_connection(Connection::new("shape", "store"))?;
//!
//!     let analyzer = PipelineAnalyzer::new(AnalysisConfig::default())?;
//!     let report = analyzer.analyze(&pipeline, &Baselines::default())?;
//!     println!(
//!         "'{}' scored {:.3} ({})",
//!         report.pipeline_name, report.score.overall, report.score.grade
//!     );
//!     Ok(())
//! }
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs
)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::correctness,
    clippy::suspicious,
    clippy::perf,
    clippy::style,
    clippy::complexity,
    clippy::unreachable,
    clippy::redundant_pattern_matching,
    clippy::manual_let_else,
    clippy::unnecessary_wraps,
    clippy::missing_errors_doc,
    clippy::float_cmp
)]
#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Public modules
pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

// Graph model and analysis engines
pub mod engine;
pub mod graph;

// Re-exports for convenience
pub use catalog::{BlockCatalog, BuildingBlock, CostProfile, QualityProfile};
pub use config::{AnalysisConfig, CostConfig, LatencyConfig, QualityConfig, ThroughputConfig};
pub use error::{AnalysisError, AnalysisResult, ConfigError, ConfigResult, GraphError, GraphResult};
pub use types::{BlockCategory, BlockId, ConfigValue, ConnectionKind, Grade, NodeId, QualityMetric};

// Re-export the graph model and the analyzer surface
pub use engine::{AnalysisReport, Baselines, PipelineAnalyzer, ScoreCard};
pub use graph::{Connection, PipelineGraph, PipelineNode, ValidatedGraph};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
///
/// Common imports for building and analyzing pipelines. Import this module
/// to get access to the most commonly used types.
pub mod prelude {
    // Authoring surface
    pub use crate::catalog::{BlockCatalog, BuildingBlock, CostProfile, QualityProfile};
    pub use crate::graph::{Connection, PipelineGraph, PipelineNode, ValidatedGraph};
    pub use crate::types::{
        BlockCategory, BlockId, ConfigValue, ConnectionKind, Grade, NodeId, QualityMetric,
    };

    // Analysis surface
    pub use crate::config::{
        AnalysisConfig, CostConfig, LatencyConfig, QualityConfig, ThroughputConfig,
    };
    pub use crate::engine::{
        AnalysisReport, Badges, Baselines, ComplexityInputs, CostEngine, CostResult,
        LatencyEngine, LatencyResult, PipelineAnalyzer, QualityEngine, QualityResult, ScoreCard,
        ThroughputEngine, ThroughputResult,
    };
    pub use crate::error::{
        AnalysisError, AnalysisResult, ConfigError, ConfigResult, GraphError, GraphResult,
    };
}
