//! `Flowmetry` Core Types
//!
//! Identifier newtypes and small value types shared by the graph model and
//! the analysis engines. Identifiers are caller-supplied strings (the visual
//! designer assigns them), so they are ordered rather than generated.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline node identifier, unique within a graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create node ID from a caller-supplied identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Building-block identifier, unique within a catalog
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Create block ID from a catalog key
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BlockId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Functional category of a building block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    /// Reads records into the pipeline (graph sources)
    Ingestion,
    /// Reshapes records in flight
    Transform,
    /// Persists records (graph sinks)
    Storage,
    /// Coordinates execution without carrying records itself
    Orchestration,
}

impl BlockCategory {
    /// Whether nodes of this category may act as graph sources
    #[must_use]
    pub const fn is_ingestion(self) -> bool {
        matches!(self, Self::Ingestion)
    }

    /// Whether nodes of this category must be graph sinks
    #[must_use]
    pub const fn is_storage(self) -> bool {
        matches!(self, Self::Storage)
    }

    /// Category default processing latency in milliseconds
    #[must_use]
    pub const fn default_latency_ms(self) -> f64 {
        match self {
            Self::Ingestion => 50.0,
            Self::Storage => 100.0,
            Self::Transform => 200.0,
            Self::Orchestration => 10.0,
        }
    }
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ingestion => "ingestion",
            Self::Transform => "transform",
            Self::Storage => "storage",
            Self::Orchestration => "orchestration",
        };
        write!(f, "{name}")
    }
}

/// Connection type between two nodes
///
/// Only data-flow edges carry records; control-flow edges participate in
/// structural validation (DAG, reachability) but not in rate, volume, or
/// quality propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Records flow along this edge
    DataFlow,
    /// Scheduling/triggering relation, no records
    ControlFlow,
}

impl ConnectionKind {
    /// Whether this edge carries records
    #[must_use]
    pub const fn carries_data(self) -> bool {
        matches!(self, Self::DataFlow)
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DataFlow => "data",
            Self::ControlFlow => "control",
        };
        write!(f, "{name}")
    }
}

/// Data-quality dimension tracked by the quality engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMetric {
    /// Fraction of expected records and fields present
    Completeness,
    /// Fraction of values matching ground truth
    Accuracy,
    /// Agreement of values across the pipeline
    Consistency,
    /// Freshness of delivered data
    Timeliness,
    /// Conformance to declared formats and types
    Validity,
    /// Absence of duplicate records
    Uniqueness,
}

impl QualityMetric {
    /// All metrics in weight order
    pub const ALL: [Self; 6] = [
        Self::Completeness,
        Self::Accuracy,
        Self::Consistency,
        Self::Timeliness,
        Self::Validity,
        Self::Uniqueness,
    ];
}

impl fmt::Display for QualityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Completeness => "completeness",
            Self::Accuracy => "accuracy",
            Self::Consistency => "consistency",
            Self::Timeliness => "timeliness",
            Self::Validity => "validity",
            Self::Uniqueness => "uniqueness",
        };
        write!(f, "{name}")
    }
}

/// Letter grade derived from a score in `[0, 1]`
///
/// One ladder serves both the quality engine and the aggregate score:
/// A ≥ 0.95, B ≥ 0.85, C ≥ 0.70, D ≥ 0.50, F below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    /// Excellent, 0.95 and above
    A,
    /// Good, 0.85 and above
    B,
    /// Acceptable, 0.70 and above
    C,
    /// Poor, 0.50 and above
    D,
    /// Failing, everything else
    F,
}

impl Grade {
    /// Grade a score; non-finite scores fall through to `F`
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.95 {
            Self::A
        } else if score >= 0.85 {
            Self::B
        } else if score >= 0.70 {
            Self::C
        } else if score >= 0.50 {
            Self::D
        } else {
            Self::F
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        write!(f, "{letter}")
    }
}

/// Per-node configuration value
///
/// The designer stores node options as loosely typed key/value pairs; the
/// engines read them through the typed accessors and fall back to defaults
/// when a key is absent or has the wrong shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean option
    Bool(bool),
    /// Integer option
    Integer(i64),
    /// Floating-point option
    Float(f64),
    /// Free-text option
    Text(String),
}

impl ConfigValue {
    /// Read as boolean if the value is one
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read as integer if the value is one
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Read as float, widening integers
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Read as text if the value is one
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}
