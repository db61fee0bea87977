//! Versioned artifact store for the FrameLeap pipeline.
//!
//! An [`ArtifactStore`] records every stage run of a project as a
//! [`VersionNode`] in a branching version graph, stores each run's output in
//! the project's content-addressed artifact repository, and keeps named
//! branches and a HEAD pointer in the [`Project`] record.
//!
//! # Layout
//!
//! With the filesystem backend, everything lives under `<root>/projects/`:
//!
//! ```text
//! <root>/projects/<project_id>/
//!     project.json          project record (node index, branches, HEAD)
//!     nodes/<node_id>.json  one record per version node
//!     artifacts/<id>/       data.json, meta.json, optional preview.bin
//!     operations.jsonl      append-only branch operation log
//!     .lock                 advisory writer lock
//! ```
//!
//! # Design Rules
//!
//! 1. The project record is the index. A node record it does not list is
//!    invisible.
//! 2. Every record is replaced atomically. Writes go artifact, node, project.
//! 3. A settled node (`Completed` or `Cached`) is never modified; regenerating
//!    a stage creates a new node.
//! 4. Parent links only point at nodes created earlier, so the graph is a
//!    tree rooted at the project's first node.

pub mod config;
pub mod error;
pub mod fs;
pub mod lock;
pub mod memory;
pub mod names;
pub mod operation;
pub mod request;
pub mod store;
pub mod traits;

pub use config::StoreConfig;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use fs::FsProjectStore;
pub use lock::ProjectLock;
pub use memory::InMemoryProjectStore;
pub use names::validate_branch_name;
pub use operation::{BranchOperation, OperationType};
pub use request::{input_hash_of, NewNode, SaveArtifact};
pub use store::{ArtifactStore, CACHED_FROM_KEY, ERROR_KEY};
pub use traits::ProjectStore;

pub use fls_graph::{Severity, ValidationReport, VersionNode, Violation, ViolationKind};
pub use fls_repo::{ArtifactMetadata, ArtifactRepository};
pub use fls_types::{
    ArtifactId, ContentHash, Metadata, NodeId, NodeStatus, Project, ProjectId, Stage,
};
