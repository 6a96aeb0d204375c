//! `Flowmetry` Building-Block Catalog
//!
//! Immutable library of the building blocks a pipeline may instantiate.
//! Each block carries the static profiles the engines read: a cost profile
//! (base latency, base processing rate, licensing) and an intrinsic quality
//! profile over the six tracked metrics. The built-in catalog mirrors the
//! designer's standard palette; custom catalogs can be assembled from caller
//! blocks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{GraphError, GraphResult};
use crate::types::{BlockCategory, BlockId, QualityMetric};

/// Static cost characteristics of a building block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostProfile {
    /// Base processing latency per batch in milliseconds
    pub base_latency_ms: f64,
    /// Base processing rate at parallelism 1, records per second
    pub records_per_second: f64,
    /// Whether the block requires a commercial license
    pub premium: bool,
    /// Monthly license fee in dollars, 0 unless premium
    pub license_fee_monthly: f64,
}

impl CostProfile {
    /// Profile with category-default latency and the given base rate
    #[must_use]
    pub const fn standard(category: BlockCategory, records_per_second: f64) -> Self {
        Self {
            base_latency_ms: category.default_latency_ms(),
            records_per_second,
            premium: false,
            license_fee_monthly: 0.0,
        }
    }
}

/// Intrinsic quality scores of a building block, each in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    /// Fraction of expected records and fields present
    pub completeness: f64,
    /// Fraction of values matching ground truth
    pub accuracy: f64,
    /// Agreement of values across the pipeline
    pub consistency: f64,
    /// Freshness of delivered data
    pub timeliness: f64,
    /// Conformance to declared formats and types
    pub validity: f64,
    /// Absence of duplicate records
    pub uniqueness: f64,
}

impl QualityProfile {
    /// Build a profile from scores in metric weight order
    #[must_use]
    pub const fn new(
        completeness: f64,
        accuracy: f64,
        consistency: f64,
        timeliness: f64,
        validity: f64,
        uniqueness: f64,
    ) -> Self {
        Self {
            completeness,
            accuracy,
            consistency,
            timeliness,
            validity,
            uniqueness,
        }
    }

    /// Profile with the same score on every metric
    #[must_use]
    pub const fn uniform(score: f64) -> Self {
        Self::new(score, score, score, score, score, score)
    }

    /// Score for one metric
    #[must_use]
    pub const fn score(&self, metric: QualityMetric) -> f64 {
        match metric {
            QualityMetric::Completeness => self.completeness,
            QualityMetric::Accuracy => self.accuracy,
            QualityMetric::Consistency => self.consistency,
            QualityMetric::Timeliness => self.timeliness,
            QualityMetric::Validity => self.validity,
            QualityMetric::Uniqueness => self.uniqueness,
        }
    }
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self::uniform(0.95)
    }
}

/// One entry in the building-block catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingBlock {
    /// Catalog key
    pub id: BlockId,
    /// Human-readable name shown by the designer
    pub display_name: String,
    /// Functional category
    pub category: BlockCategory,
    /// Short description of what the block does
    pub description: String,
    /// Capability tags (e.g. "streaming", "cleansing")
    pub capabilities: Vec<String>,
    /// Static cost characteristics
    pub cost: CostProfile,
    /// Intrinsic quality scores
    pub quality: QualityProfile,
}

impl BuildingBlock {
    /// Create a block with category-default profiles
    pub fn new(
        id: impl Into<BlockId>,
        display_name: impl Into<String>,
        category: BlockCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            category,
            description: description.into(),
            capabilities: Vec::new(),
            cost: CostProfile::standard(category, 5_000.0),
            quality: category_quality(category),
        }
    }

    /// Set the base processing rate
    #[must_use]
    pub fn with_rate(mut self, records_per_second: f64) -> Self {
        self.cost.records_per_second = records_per_second;
        self
    }

    /// Override the category-default base latency
    #[must_use]
    pub fn with_latency(mut self, base_latency_ms: f64) -> Self {
        self.cost.base_latency_ms = base_latency_ms;
        self
    }

    /// Mark the block premium with a monthly license fee
    #[must_use]
    pub fn with_license(mut self, fee_monthly: f64) -> Self {
        self.cost.premium = true;
        self.cost.license_fee_monthly = fee_monthly;
        self
    }

    /// Replace the intrinsic quality profile
    #[must_use]
    pub fn with_quality(mut self, quality: QualityProfile) -> Self {
        self.quality = quality;
        self
    }

    /// Add capability tags
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.capabilities = capabilities.iter().map(ToString::to_string).collect();
        self
    }

    /// Whether the block declares a capability tag
    #[must_use]
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }
}

/// Immutable, shareable catalog of building blocks
#[derive(Debug, Clone)]
pub struct BlockCatalog {
    blocks: Arc<BTreeMap<BlockId, BuildingBlock>>,
}

impl BlockCatalog {
    /// Assemble a catalog from caller-supplied blocks
    ///
    /// # Errors
    ///
    /// Returns `GraphError::DuplicateBlock` when two blocks share an id.
    pub fn from_blocks(blocks: Vec<BuildingBlock>) -> GraphResult<Self> {
        let mut map = BTreeMap::new();
        for block in blocks {
            let id = block.id.clone();
            if map.insert(id.clone(), block).is_some() {
                return Err(GraphError::DuplicateBlock { block: id });
            }
        }
        Ok(Self {
            blocks: Arc::new(map),
        })
    }

    /// Look up a block by id
    #[must_use]
    pub fn get(&self, id: &BlockId) -> Option<&BuildingBlock> {
        self.blocks.get(id)
    }

    /// Whether the catalog contains a block id
    #[must_use]
    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    /// Number of registered blocks
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate over all blocks in id order
    pub fn blocks(&self) -> impl Iterator<Item = &BuildingBlock> {
        self.blocks.values()
    }

    /// The designer's standard palette
    #[must_use]
    pub fn builtin() -> Self {
        let blocks = vec![
            // Ingestion
            BuildingBlock::new(
                "database_reader",
                "Database Reader",
                BlockCategory::Ingestion,
                "Connect to relational databases to read data",
            )
            .with_rate(8_000.0)
            .with_capabilities(&["sql", "batch"]),
            BuildingBlock::new(
                "csv_reader",
                "CSV Reader",
                BlockCategory::Ingestion,
                "Read CSV files with delimiter detection and header parsing",
            )
            .with_rate(12_000.0)
            .with_capabilities(&["files", "batch"])
            .with_quality(QualityProfile::new(0.95, 0.92, 0.92, 0.90, 0.88, 0.90)),
            BuildingBlock::new(
                "api_reader",
                "API Reader",
                BlockCategory::Ingestion,
                "Fetch data from REST APIs with authentication and pagination",
            )
            .with_rate(2_000.0)
            .with_latency(150.0)
            .with_capabilities(&["api", "batch"])
            .with_quality(QualityProfile::new(0.90, 0.93, 0.92, 0.85, 0.92, 0.90)),
            BuildingBlock::new(
                "streaming_reader",
                "Streaming Reader",
                BlockCategory::Ingestion,
                "Consume real-time records from streaming platforms",
            )
            .with_rate(20_000.0)
            .with_latency(20.0)
            .with_license(299.0)
            .with_capabilities(&["streaming"])
            .with_quality(QualityProfile::new(0.95, 0.93, 0.90, 0.99, 0.92, 0.85)),
            BuildingBlock::new(
                "excel_reader",
                "Excel Reader",
                BlockCategory::Ingestion,
                "Read Excel workbooks with multiple sheet support",
            )
            .with_rate(1_500.0)
            .with_latency(120.0)
            .with_capabilities(&["files", "batch"])
            .with_quality(QualityProfile::new(0.95, 0.85, 0.90, 0.88, 0.85, 0.90)),
            BuildingBlock::new(
                "file_system_reader",
                "File System Reader",
                BlockCategory::Ingestion,
                "Read files from local or cloud storage with pattern matching",
            )
            .with_rate(10_000.0)
            .with_capabilities(&["files", "batch"]),
            // Storage
            BuildingBlock::new(
                "database_writer",
                "Database Writer",
                BlockCategory::Storage,
                "Write to relational databases with transaction support",
            )
            .with_rate(4_000.0)
            .with_latency(120.0)
            .with_capabilities(&["sql", "batch"]),
            BuildingBlock::new(
                "csv_writer",
                "CSV Writer",
                BlockCategory::Storage,
                "Export CSV files with custom delimiters and encodings",
            )
            .with_rate(6_000.0)
            .with_capabilities(&["files", "batch"]),
            BuildingBlock::new(
                "data_lake_writer",
                "Data Lake Writer",
                BlockCategory::Storage,
                "Write partitioned files to data lakes",
            )
            .with_rate(5_000.0)
            .with_license(199.0)
            .with_capabilities(&["files", "streaming", "batch"]),
            BuildingBlock::new(
                "cache_writer",
                "Cache Writer",
                BlockCategory::Storage,
                "Store intermediate results in a cache for fast access",
            )
            .with_rate(20_000.0)
            .with_latency(10.0)
            .with_capabilities(&["cache", "streaming", "batch"])
            .with_quality(QualityProfile::new(0.99, 0.98, 0.98, 0.99, 0.98, 0.97)),
            BuildingBlock::new(
                "excel_writer",
                "Excel Writer",
                BlockCategory::Storage,
                "Export Excel workbooks with formatting and charts",
            )
            .with_rate(1_000.0)
            .with_latency(250.0)
            .with_capabilities(&["files", "batch"])
            .with_quality(QualityProfile::new(0.99, 0.96, 0.96, 0.90, 0.90, 0.97)),
            BuildingBlock::new(
                "file_system_writer",
                "File System Writer",
                BlockCategory::Storage,
                "Write files to local or cloud storage with compression",
            )
            .with_rate(7_000.0)
            .with_capabilities(&["files", "batch"]),
            // Transform
            BuildingBlock::new(
                "filter",
                "Filter",
                BlockCategory::Transform,
                "Filter rows on conditions, drop duplicates, or sample",
            )
            .with_rate(10_000.0)
            .with_latency(50.0)
            .with_capabilities(&["row-wise"])
            .with_quality(QualityProfile::new(0.97, 0.95, 0.96, 0.95, 0.96, 0.97)),
            BuildingBlock::new(
                "join",
                "Join",
                BlockCategory::Transform,
                "Combine datasets with inner, left, right, or full joins",
            )
            .with_rate(2_000.0)
            .with_latency(400.0)
            .with_capabilities(&["multi-input"])
            .with_quality(QualityProfile::new(0.95, 0.93, 0.96, 0.93, 0.96, 0.92)),
            BuildingBlock::new(
                "aggregate",
                "Aggregate",
                BlockCategory::Transform,
                "Group records and compute aggregations",
            )
            .with_rate(3_000.0)
            .with_latency(300.0)
            .with_capabilities(&["grouping"]),
            BuildingBlock::new(
                "union",
                "Union",
                BlockCategory::Transform,
                "Concatenate datasets sharing a schema",
            )
            .with_rate(8_000.0)
            .with_latency(100.0)
            .with_capabilities(&["multi-input"])
            .with_quality(QualityProfile::new(0.97, 0.95, 0.92, 0.95, 0.96, 0.90)),
            BuildingBlock::new(
                "rename_columns",
                "Rename Columns",
                BlockCategory::Transform,
                "Rename headers and standardize naming conventions",
            )
            .with_rate(15_000.0)
            .with_latency(20.0)
            .with_capabilities(&["schema"]),
            BuildingBlock::new(
                "split",
                "Split",
                BlockCategory::Transform,
                "Split datasets by condition or columns into parts",
            )
            .with_rate(9_000.0)
            .with_latency(90.0)
            .with_capabilities(&["row-wise"]),
            BuildingBlock::new(
                "type_converter",
                "Type Converter",
                BlockCategory::Transform,
                "Convert value types, parse dates, coerce booleans",
            )
            .with_rate(7_000.0)
            .with_latency(80.0)
            .with_capabilities(&["schema"])
            .with_quality(QualityProfile::new(0.97, 0.95, 0.96, 0.95, 0.99, 0.95)),
            BuildingBlock::new(
                "data_cleaner",
                "Data Cleaner",
                BlockCategory::Transform,
                "Handle missing values, outliers, and quality issues",
            )
            .with_rate(1_500.0)
            .with_latency(350.0)
            .with_capabilities(&["cleansing"])
            .with_quality(QualityProfile::new(0.99, 0.96, 0.98, 0.93, 0.99, 0.97)),
            // Orchestration
            BuildingBlock::new(
                "scheduler",
                "Scheduler",
                BlockCategory::Orchestration,
                "Trigger pipeline runs on a schedule",
            )
            .with_rate(100_000.0)
            .with_capabilities(&["scheduling"])
            .with_quality(QualityProfile::uniform(1.0)),
            BuildingBlock::new(
                "loop",
                "Loop",
                BlockCategory::Orchestration,
                "Repeat operations per item in a collection",
            )
            .with_rate(100_000.0)
            .with_capabilities(&["iteration"])
            .with_quality(QualityProfile::uniform(1.0)),
            BuildingBlock::new(
                "conditional",
                "Conditional",
                BlockCategory::Orchestration,
                "Route execution by condition or validation outcome",
            )
            .with_rate(100_000.0)
            .with_capabilities(&["branching"])
            .with_quality(QualityProfile::uniform(1.0)),
            BuildingBlock::new(
                "branch",
                "Branch",
                BlockCategory::Orchestration,
                "Fan execution out into parallel branches",
            )
            .with_rate(100_000.0)
            .with_capabilities(&["branching"])
            .with_quality(QualityProfile::uniform(1.0)),
            BuildingBlock::new(
                "trigger",
                "Trigger",
                BlockCategory::Orchestration,
                "Wait for external events before continuing",
            )
            .with_rate(100_000.0)
            .with_capabilities(&["scheduling"])
            .with_quality(QualityProfile::uniform(1.0)),
            BuildingBlock::new(
                "parallel",
                "Parallel",
                BlockCategory::Orchestration,
                "Run multiple operations simultaneously",
            )
            .with_rate(100_000.0)
            .with_capabilities(&["branching"])
            .with_quality(QualityProfile::uniform(1.0)),
        ];

        // Built-in ids are distinct by construction
        let mut map = BTreeMap::new();
        for block in blocks {
            map.insert(block.id.clone(), block);
        }
        Self {
            blocks: Arc::new(map),
        }
    }
}

/// Category-default intrinsic quality
const fn category_quality(category: BlockCategory) -> QualityProfile {
    match category {
        BlockCategory::Ingestion => QualityProfile::new(0.95, 0.93, 0.92, 0.90, 0.92, 0.90),
        BlockCategory::Transform => QualityProfile::new(0.97, 0.95, 0.96, 0.95, 0.96, 0.95),
        BlockCategory::Storage => QualityProfile::new(0.99, 0.98, 0.98, 0.96, 0.98, 0.97),
        BlockCategory::Orchestration => QualityProfile::uniform(1.0),
    }
}
