//! Canonical serialization and content hashing.
//!
//! Content addressing only works if every writer turns logically equal data
//! into the same bytes. This crate fixes that byte form (`fls-canon-v1`):
//!
//! 1. The value is lowered to the JSON data model via `serde`.
//! 2. Object keys are sorted by UTF-8 byte order, recursively.
//! 3. Output is compact: no whitespace, `,` and `:` separators.
//! 4. Strings use `serde_json` escaping; non-ASCII is emitted as raw UTF-8.
//! 5. Integers are plain base-10. Floats use the shortest round-trip form
//!    (`1.0`, `1e-7`). Non-finite floats lower to `null`.
//! 6. Enums serialize to their serde tag.
//! 7. Path normalization is opt-in. Only fields marked
//!    `#[serde(serialize_with = "serialize_path")]`, or strings already passed
//!    through [`normalize_path`], are normalized. A plain `PathBuf` field
//!    serializes as its raw string, so `./a` and `a` hash differently.
//!
//! [`hash`] is SHA-256 over that byte form, with no domain prefix.

pub mod canonical;
pub mod error;
pub mod hasher;
pub mod path;

pub use canonical::{canonicalize, canonicalize_value, to_canonical_string, CANON_VERSION};
pub use error::{CanonError, CanonResult};
pub use hasher::{hash, hash_bytes, hash_value};
pub use path::{normalize_path, serialize_path};
