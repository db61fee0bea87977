//! Version graph for the FrameLeap artifact store.
//!
//! Every stage run is recorded as a [`VersionNode`] with at most one parent,
//! so a project's nodes form a forest rooted at its first node. The
//! [`VersionGraph`] indexes those nodes for traversal (history, children,
//! fork points, cache lookups) and [`validate`] checks a project record
//! against the graph it indexes.
//!
//! # Invariants
//!
//! - Nodes are never removed or re-parented.
//! - A node's parent was created before it.
//! - Once a node is settled its artifact reference never changes.

pub mod error;
pub mod graph;
pub mod node;
pub mod validate;

pub use error::{GraphError, GraphResult};
pub use graph::VersionGraph;
pub use node::{version_label, VersionNode};
pub use validate::{validate, Severity, ValidationReport, Violation, ViolationKind};
