//! Foundation types for the FrameLeap artifact store.
//!
//! Every other `fls-*` crate depends on this one. It holds the closed
//! vocabulary of the pipeline (stages, node statuses), the identifiers used
//! to key persisted records, and the [`Project`] record that indexes a
//! project's version graph.
//!
//! # Key Types
//!
//! - [`Stage`] -- pipeline stage with an explicit ordinal
//! - [`NodeStatus`] -- lifecycle status of a version node
//! - [`NodeId`] / [`ProjectId`] -- record identifiers
//! - [`ContentHash`] -- SHA-256 digest of canonical artifact content
//! - [`ArtifactId`] -- content-derived artifact key
//! - [`Project`] -- node index, branch pointers, and HEAD

pub mod error;
pub mod hash;
pub mod ids;
pub mod project;
pub mod stage;
pub mod status;

pub use error::TypeError;
pub use hash::ContentHash;
pub use ids::{ArtifactId, NodeId, ProjectId};
pub use project::Project;
pub use stage::Stage;
pub use status::NodeStatus;

/// Timestamp type used on every persisted record.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Open key/value map carried by nodes and projects.
pub type Metadata = std::collections::BTreeMap<String, serde_json::Value>;
