//! Advisory per-project writer lock.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{StoreError, StoreResult};

/// RAII guard for a project's writer lock. Dropping it releases the lock.
///
/// The filesystem backend holds an exclusive OS lock (`flock` /
/// `LockFileEx`) on `.lock`. The OS drops it when the holder exits, so a
/// crashed writer never leaves the project locked. The file itself stays on
/// disk. The in-memory backend hands out guards that hold nothing.
#[must_use = "the lock is released when the guard is dropped"]
pub struct ProjectLock {
    held: Option<Held>,
}

struct Held {
    _file: File,
    path: PathBuf,
}

impl ProjectLock {
    /// Take the exclusive lock on `path`, failing with `Locked` if another
    /// guard holds it.
    pub fn acquire(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::write(".lock", e))?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StoreError::write(".lock", e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(StoreError::Locked {
                    path: path.to_path_buf(),
                });
            }
            return Err(StoreError::write(".lock", e));
        }

        if let Err(e) = Self::stamp(&mut file) {
            tracing::debug!(path = %path.display(), error = %e, "failed to stamp project lock");
        }
        tracing::debug!(path = %path.display(), "acquired project lock");
        Ok(Self {
            held: Some(Held {
                _file: file,
                path: path.to_path_buf(),
            }),
        })
    }

    /// A guard that holds no file.
    pub(crate) fn unlocked() -> Self {
        Self { held: None }
    }

    /// Path of the held lock file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.held.as_ref().map(|h| h.path.as_path())
    }

    /// Record the holder for operators inspecting a stuck lock.
    fn stamp(file: &mut File) -> io::Result<()> {
        file.set_len(0)?;
        writeln!(
            file,
            "pid={} acquired_at={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Some(held) = &self.held {
            tracing::debug!(path = %held.path.display(), "releasing project lock");
            // Closing the file releases the OS lock.
        }
    }
}

impl std::fmt::Debug for ProjectLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectLock")
            .field("path", &self.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_acquire_fails_until_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".lock");
        let guard = ProjectLock::acquire(&path).unwrap();
        assert!(path.exists());
        assert!(matches!(
            ProjectLock::acquire(&path).unwrap_err(),
            StoreError::Locked { .. }
        ));
        drop(guard);
        let _again = ProjectLock::acquire(&path).unwrap();
    }

    #[test]
    fn old_lock_is_never_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".lock");
        let first = ProjectLock::acquire(&path).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));

        assert!(ProjectLock::acquire(&path).is_err());
        assert!(ProjectLock::acquire(&path).is_err());
        drop(first);

        let second = ProjectLock::acquire(&path).unwrap();
        assert!(matches!(
            ProjectLock::acquire(&path).unwrap_err(),
            StoreError::Locked { .. }
        ));
        drop(second);
    }

    #[test]
    fn release_keeps_the_file_and_frees_the_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".lock");
        drop(ProjectLock::acquire(&path).unwrap());
        assert!(path.exists());
        let guard = ProjectLock::acquire(&path).unwrap();
        assert_eq!(guard.path(), Some(path.as_path()));
        let stamp = fs::read_to_string(&path).unwrap();
        assert!(stamp.starts_with(&format!("pid={}", std::process::id())));
    }

    #[test]
    fn leftover_file_without_holder_is_free() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".lock");
        fs::write(&path, "pid=0").unwrap();
        assert!(ProjectLock::acquire(&path).is_ok());
    }

    #[test]
    fn unlocked_guard_holds_nothing() {
        assert!(ProjectLock::unlocked().path().is_none());
    }
}
