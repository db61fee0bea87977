use std::path::{Component, Path};

use serde::Serializer;

use crate::error::{CanonError, CanonResult};

/// Canonical string form of a path.
///
/// Separators become `/` (including `\` inside components), `.` components
/// and trailing separators are dropped, `..` is kept verbatim. An empty
/// relative path normalizes to `.`.
pub fn normalize_path(path: &Path) -> CanonResult<String> {
    let mut prefix = String::new();
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => {
                let s = p
                    .as_os_str()
                    .to_str()
                    .ok_or_else(|| CanonError::NonUtf8Path(path.to_path_buf()))?;
                prefix.push_str(&s.replace('\\', "/"));
            }
            Component::RootDir => prefix.push('/'),
            Component::CurDir => {}
            Component::ParentDir => parts.push("..".into()),
            Component::Normal(s) => {
                let s = s
                    .to_str()
                    .ok_or_else(|| CanonError::NonUtf8Path(path.to_path_buf()))?;
                parts.extend(
                    s.split('\\')
                        .filter(|p| !p.is_empty() && *p != ".")
                        .map(str::to_string),
                );
            }
        }
    }
    let joined = parts.join("/");
    Ok(match (prefix.is_empty(), joined.is_empty()) {
        (true, true) => ".".into(),
        (true, false) => joined,
        (false, _) => format!("{prefix}{joined}"),
    })
}

/// `serialize_with` adapter that emits [`normalize_path`] output.
pub fn serialize_path<P, S>(path: &P, serializer: S) -> Result<S::Ok, S::Error>
where
    P: AsRef<Path>,
    S: Serializer,
{
    let normalized = normalize_path(path.as_ref()).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&normalized)
}
