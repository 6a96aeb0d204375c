//! `Flowmetry` Analysis Error System
//!
//! Error taxonomy for the analysis core. Structural graph problems are fatal
//! to the whole analysis call; a bad engine configuration is fatal to that
//! engine call only. Everything that merely describes a badly designed
//! pipeline (zero throughput, grade F quality, runaway cost) is data in the
//! results, never an error.

use thiserror::Error;

use crate::types::{BlockId, ConnectionKind, NodeId};

/// Result type for graph construction and normalization
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type for engine configuration checks
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for whole-analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Structural errors raised while building or normalizing a pipeline graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node id already used in this graph
    #[error("Duplicate node id '{node}'")]
    DuplicateNode {
        /// Offending node id
        node: NodeId,
    },

    /// Block id registered twice in one catalog
    #[error("Duplicate block id '{block}' in catalog")]
    DuplicateBlock {
        /// Offending block id
        block: BlockId,
    },

    /// Node references a building block the catalog does not contain
    #[error("Node '{node}' references unknown block '{block}'")]
    UnknownBlock {
        /// Node whose block reference failed to resolve
        node: NodeId,
        /// Unresolved block id
        block: BlockId,
    },

    /// Connection endpoint names a node that does not exist
    ///
    /// Endpoints are `from`/`to` rather than source/target because thiserror
    /// reserves a `source` field for the error cause.
    #[error("Connection '{from}' -> '{to}' references a missing node")]
    DanglingEdge {
        /// Source endpoint as written
        from: NodeId,
        /// Target endpoint as written
        to: NodeId,
    },

    /// Connection loops a node back onto itself
    #[error("Connection '{node}' -> '{node}' references its own node")]
    SelfReference {
        /// Node with the self-edge
        node: NodeId,
    },

    /// Same source, target, and kind connected twice
    #[error("Duplicate {kind} connection '{from}' -> '{to}'")]
    DuplicateEdge {
        /// Source endpoint
        from: NodeId,
        /// Target endpoint
        to: NodeId,
        /// Connection kind of the duplicate
        kind: ConnectionKind,
    },

    /// Edge relation contains a cycle
    #[error("Cycle detected involving node '{node}'")]
    CycleDetected {
        /// One node participating in the cycle
        node: NodeId,
    },

    /// No ingestion node with zero incoming edges
    #[error("Pipeline has no source (ingestion node without incoming edges)")]
    MissingSource,

    /// No storage node with zero outgoing edges
    #[error("Pipeline has no sink (storage node without outgoing edges)")]
    MissingSink,

    /// Ingestion nodes are sources and must not be fed by other nodes
    #[error("Ingestion node '{node}' has an incoming connection")]
    IngestionHasIncomingEdge {
        /// Offending ingestion node
        node: NodeId,
    },

    /// Storage nodes are terminal and must not feed other nodes
    #[error("Storage node '{node}' has an outgoing connection")]
    StorageHasOutgoingEdge {
        /// Offending storage node
        node: NodeId,
    },

    /// Node cannot be reached from any source (or a source reaches nothing)
    #[error("Node '{node}' is not connected to the pipeline flow")]
    UnreachableNode {
        /// Disconnected node
        node: NodeId,
    },
}

impl GraphError {
    /// Create duplicate-node error
    pub fn duplicate_node(node: impl Into<NodeId>) -> Self {
        Self::DuplicateNode { node: node.into() }
    }

    /// Create unknown-block error
    pub fn unknown_block(node: impl Into<NodeId>, block: impl Into<BlockId>) -> Self {
        Self::UnknownBlock {
            node: node.into(),
            block: block.into(),
        }
    }

    /// Create dangling-edge error
    pub fn dangling_edge(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self::DanglingEdge {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create cycle error naming one participating node
    pub fn cycle(node: impl Into<NodeId>) -> Self {
        Self::CycleDetected { node: node.into() }
    }

    /// Create unreachable-node error
    pub fn unreachable(node: impl Into<NodeId>) -> Self {
        Self::UnreachableNode { node: node.into() }
    }
}

/// Engine configuration errors
///
/// Raised by an engine when its own configuration section is unusable.
/// Sibling engines sharing the same analysis run are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range or shape validation
    #[error("Invalid {section} configuration: {reason}")]
    Invalid {
        /// Configuration section (e.g. "throughput")
        section: String,
        /// Reason reported by validation
        reason: String,
    },

    /// A cross-field business rule was violated
    #[error("Conflicting {section} configuration: {reason}")]
    Conflict {
        /// Configuration section
        section: String,
        /// Rule that was violated
        reason: String,
    },
}

impl ConfigError {
    /// Create field-validation error
    pub fn invalid(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            section: section.into(),
            reason: reason.into(),
        }
    }

    /// Create business-rule error
    pub fn conflict(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            section: section.into(),
            reason: reason.into(),
        }
    }
}

/// Umbrella error for whole-analysis operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Graph failed normalization
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// An engine configuration section is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
