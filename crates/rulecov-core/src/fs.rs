//! Rule file access.
//!
//! The coverage engine reads PMD rule files through the `FileSystem` trait so
//! line resolution and rule checking can be tested without touching disk.
//!
//! `RuleFileCache` is the short-lived cache a caller builds for one run: every
//! path is read at most once, and a failed read is remembered with its error so
//! a rule with many unresolved tokens does not hammer the filesystem.
//!
//! ```ignore
//! let cache = RuleFileCache::new(Arc::new(RealFileSystem));
//! let text = cache.get(Path::new("rules/AvoidSoqlInLoops.xml"));
//! ```

use crate::error::{CoverageError, RuleResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Largest rule file the engine will read (4 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// Trait abstracting the filesystem operations the engine needs.
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    /// Read a file as UTF-8, rejecting symlinks, non-regular files and
    /// files above [`DEFAULT_MAX_FILE_SIZE`].
    fn read_file(&self, path: &Path) -> RuleResult<String>;

    /// Check if a path exists (file or directory).
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Check if a path is a directory.
    fn is_dir(&self, path: &Path) -> bool;
}

/// Production filesystem backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_file(&self, path: &Path) -> RuleResult<String> {
        safe_read_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Read a rule or config file, refusing symlinks, non-regular files and
/// anything above [`DEFAULT_MAX_FILE_SIZE`].
pub fn safe_read_file(path: &Path) -> RuleResult<String> {
    let metadata = std::fs::symlink_metadata(path).map_err(|e| CoverageError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    if metadata.file_type().is_symlink() {
        return Err(CoverageError::FileSymlink {
            path: path.to_path_buf(),
        });
    }

    if !metadata.is_file() {
        return Err(CoverageError::FileNotRegular {
            path: path.to_path_buf(),
        });
    }

    if metadata.len() > DEFAULT_MAX_FILE_SIZE {
        return Err(CoverageError::FileTooBig {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit: DEFAULT_MAX_FILE_SIZE,
        });
    }

    std::fs::read_to_string(path).map_err(|e| CoverageError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Per-run cache of rule file contents.
///
/// Each path is read at most once; a failed read is remembered along with its
/// error.
#[derive(Debug)]
pub struct RuleFileCache {
    fs: Arc<dyn FileSystem>,
    entries: Mutex<HashMap<PathBuf, Result<Arc<str>, Arc<CoverageError>>>>,
}

impl RuleFileCache {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache backed by the real filesystem.
    pub fn real() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }

    /// Return the file's text, reading it on first access.
    ///
    /// Never fails: unreadable files yield `None`.
    pub fn get(&self, path: &Path) -> Option<Arc<str>> {
        self.read(path).ok()
    }

    /// Like [`get`](Self::get) but surfaces the read error, wrapped in
    /// [`CoverageError::Shared`].
    pub fn read(&self, path: &Path) -> RuleResult<Arc<str>> {
        if let Ok(entries) = self.entries.lock()
            && let Some(cached) = entries.get(path)
        {
            tracing::trace!(path = %path.display(), "rule file cache hit");
            return cached.clone().map_err(CoverageError::Shared);
        }

        let loaded = self.fs.read_file(path).map(Arc::<str>::from).map_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "cannot read rule file");
            Arc::new(e)
        });

        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(path.to_path_buf(), loaded.clone());
        }
        loaded.map_err(CoverageError::Shared)
    }

    /// Drop the entry for `path`; a later access reads the file again.
    pub fn forget(&self, path: &Path) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(path);
        }
    }

    /// Number of paths currently cached (hits and misses).
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
pub mod mock {
    //! In-memory filesystem for tests.

    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    pub struct MockFileSystem {
        files: HashMap<PathBuf, String>,
        dirs: HashSet<PathBuf>,
        reads: AtomicUsize,
    }

    impl MockFileSystem {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a file; parent directories are created implicitly.
        pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
            let path = path.as_ref().to_path_buf();
            let mut parent = path.parent();
            while let Some(dir) = parent {
                if dir.as_os_str().is_empty() {
                    break;
                }
                self.dirs.insert(dir.to_path_buf());
                parent = dir.parent();
            }
            self.files.insert(path, content.into());
        }

        /// Number of `read_file` calls served so far.
        pub fn read_count(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl FileSystem for MockFileSystem {
        fn read_file(&self, path: &Path) -> RuleResult<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| CoverageError::FileRead {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "file not found in mock",
                    ),
                })
        }

        fn exists(&self, path: &Path) -> bool {
            self.files.contains_key(path) || self.dirs.contains(path)
        }

        fn is_file(&self, path: &Path) -> bool {
            self.files.contains_key(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.dirs.contains(path)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_mock_add_and_read_file() {
            let mut mock = MockFileSystem::new();
            mock.add_file("rules/a.xml", "<rule/>");
            assert_eq!(mock.read_file(Path::new("rules/a.xml")).unwrap(), "<rule/>");
            assert!(mock.is_dir(Path::new("rules")));
            assert!(mock.exists(Path::new("rules/a.xml")));
        }

        #[test]
        fn test_mock_file_not_found() {
            let mock = MockFileSystem::new();
            assert!(matches!(
                mock.read_file(Path::new("nope.xml")),
                Err(CoverageError::FileRead { .. })
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockFileSystem;
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cache_reads_each_path_once() {
        let mut mock = MockFileSystem::new();
        mock.add_file("a.xml", "one");
        let mock = Arc::new(mock);
        let cache = RuleFileCache::new(mock.clone());

        assert_eq!(cache.get(Path::new("a.xml")).as_deref(), Some("one"));
        assert_eq!(cache.get(Path::new("a.xml")).as_deref(), Some("one"));
        assert_eq!(mock.read_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_remembers_misses() {
        let mock = Arc::new(MockFileSystem::new());
        let cache = RuleFileCache::new(mock.clone());

        assert!(cache.get(Path::new("missing.xml")).is_none());
        assert!(cache.get(Path::new("missing.xml")).is_none());
        assert_eq!(mock.read_count(), 1);
    }

    #[test]
    fn test_cache_read_surfaces_error() {
        let cache = RuleFileCache::new(Arc::new(MockFileSystem::new()));
        let err = cache.read(Path::new("missing.xml")).unwrap_err();
        assert_eq!(err.path(), Some(&PathBuf::from("missing.xml")));
        assert_eq!(err.to_string(), "Failed to read file: missing.xml");
    }

    #[test]
    fn test_cache_read_failure_is_not_retried() {
        let mock = Arc::new(MockFileSystem::new());
        let cache = RuleFileCache::new(mock.clone());

        assert!(cache.read(Path::new("missing.xml")).is_err());
        assert!(cache.read(Path::new("missing.xml")).is_err());
        assert!(cache.get(Path::new("missing.xml")).is_none());
        assert_eq!(mock.read_count(), 1);
    }

    #[test]
    fn test_forget_drops_entry() {
        let mut mock = MockFileSystem::new();
        mock.add_file("a.xml", "one");
        let mock = Arc::new(mock);
        let cache = RuleFileCache::new(mock.clone());

        assert!(cache.read(Path::new("a.xml")).is_ok());
        cache.forget(Path::new("a.xml"));
        assert!(cache.is_empty());
        assert_eq!(cache.get(Path::new("a.xml")).as_deref(), Some("one"));
        assert_eq!(mock.read_count(), 2);
    }

    #[test]
    fn test_real_fs_read_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<ruleset/>").unwrap();
        let fs = RealFileSystem;
        assert_eq!(fs.read_file(file.path()).unwrap(), "<ruleset/>");
        assert!(fs.is_file(file.path()));
        assert!(fs.exists(file.path()));
    }

    #[test]
    fn test_real_fs_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RealFileSystem.read_file(dir.path()),
            Err(CoverageError::FileNotRegular { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_real_fs_rejects_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target.xml");
        std::fs::write(&target, "<rule/>").unwrap();
        let link = dir.path().join("link.xml");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(matches!(
            RealFileSystem.read_file(&link),
            Err(CoverageError::FileSymlink { .. })
        ));
    }
}
