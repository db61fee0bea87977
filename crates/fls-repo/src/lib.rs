//! Content-addressed artifact repository.
//!
//! Every stage output is stored as an immutable bundle keyed by an
//! [`ArtifactId`] derived from the stage, the artifact type, and the hash of
//! the artifact's canonical form. Storing logically equal content twice
//! resolves to the same bundle and writes no new bytes.
//!
//! # Backends
//!
//! All backends implement the [`ArtifactRepository`] trait:
//!
//! - [`InMemoryArtifactRepository`] -- `HashMap`-based, for tests and embedding
//! - [`FsArtifactRepository`] -- one directory per artifact, atomic file writes
//!
//! # Design Rules
//!
//! 1. Bundles are immutable once written; the data blob is never rewritten.
//! 2. Write order inside a bundle is data, preview, metadata. The metadata
//!    record is the commit marker: a bundle without it does not exist.
//! 3. Reads verify the data blob against the recorded content hash.
//! 4. Nothing is ever deleted.
//!
//! [`ArtifactId`]: fls_types::ArtifactId

pub mod atomic;
pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod traits;

pub use atomic::write_atomic;
pub use error::{RepoError, RepoResult};
pub use fs::FsArtifactRepository;
pub use memory::InMemoryArtifactRepository;
pub use object::{validate_artifact_type, ArtifactDraft, ArtifactMetadata, PreparedArtifact};
pub use traits::ArtifactRepository;
