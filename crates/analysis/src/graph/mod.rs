//! Pipeline Graph Model
//!
//! The authoring model (`pipeline`), the validated immutable snapshot the
//! engines read (`snapshot`), and the shared steady-state rate propagation
//! (`flow`). Validation happens once per analysis; everything downstream of
//! [`PipelineGraph::validate`] is pure reads.

pub(crate) mod flow;
pub mod pipeline;
pub mod snapshot;

pub use pipeline::{Connection, PipelineGraph, PipelineNode};
pub use snapshot::{NodeRef, ValidatedGraph};
