//! Directory scanning
//!
//! Walks a directory tree in a deterministic order (entries sorted by file
//! name at every level), prunes ignored directories, and hashes every
//! regular file on a bounded pool of worker threads. Results come back in
//! walk order regardless of which worker finished first.
//!
//! Symlinks are recorded rather than followed: they get the empty marker
//! hash and their targets are never read. Symlinks that resolve to a
//! directory are skipped entirely, as are sockets, FIFOs and devices.

pub mod ignore;

pub use ignore::{IgnoreError, IgnoreRules, DEFAULT_IGNORE_DIRS};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use walkdir::WalkDir;

use crate::digest::{sha256_file, ContentHash};
use crate::signal::CancelToken;

/// Default number of hashing threads.
pub const DEFAULT_WORKERS: usize = 4;

/// Upper bound on hashing threads.
pub const MAX_WORKERS: usize = 64;

/// Errors during a scan
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to hash {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Path {path} is not under {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error(transparent)]
    Ignore(#[from] IgnoreError),

    #[error("Scan cancelled")]
    Cancelled,
}

/// What a scanned entry is on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Symlink,
}

/// A hashed entry, ready for ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Filesystem path as walked.
    pub path: PathBuf,
    /// Path relative to the scan root, `/`-separated.
    pub location: String,
    pub kind: EntryKind,
    pub hash: ContentHash,
}

/// Options for [`scan_directory`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub ignore: IgnoreRules,
    pub workers: usize,
    pub cancel: CancelToken,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ignore: IgnoreRules::default(),
            workers: DEFAULT_WORKERS,
            cancel: CancelToken::new(),
        }
    }
}

impl ScanOptions {
    pub fn with_ignore(mut self, ignore: IgnoreRules) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[derive(Debug)]
struct PendingEntry {
    path: PathBuf,
    location: String,
    kind: EntryKind,
}

/// Scan `root` and return every recordable entry in walk order.
pub fn scan_directory(root: &Path, options: &ScanOptions) -> Result<Vec<ScannedFile>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let pending = walk(root, &options.ignore, &options.cancel)?;
    tracing::debug!(
        root = %root.display(),
        entries = pending.len(),
        "Walk complete, hashing"
    );

    let hashes = hash_all(&pending, options.workers, &options.cancel)?;

    Ok(pending
        .into_iter()
        .zip(hashes)
        .map(|(entry, hash)| ScannedFile {
            path: entry.path,
            location: entry.location,
            kind: entry.kind,
            hash,
        })
        .collect())
}

fn walk(root: &Path, ignore: &IgnoreRules, cancel: &CancelToken) -> Result<Vec<PendingEntry>, ScanError> {
    let mut pending = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !(e.file_type().is_dir() && ignore.is_ignored(e.file_name()))
        });

    for entry in walker {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let entry = entry.map_err(|source| ScanError::Walk {
            path: root.to_path_buf(),
            source,
        })?;

        let file_type = entry.file_type();
        let kind = if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            // fs::metadata follows the link; dangling links are still recorded
            if fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false) {
                tracing::debug!(path = %entry.path().display(), "Skipping symlink to directory");
                continue;
            }
            EntryKind::Symlink
        } else {
            continue;
        };

        let location = relative_location(root, entry.path())?;
        pending.push(PendingEntry {
            path: entry.into_path(),
            location,
            kind,
        });
    }

    Ok(pending)
}

fn hash_all(
    pending: &[PendingEntry],
    workers: usize,
    cancel: &CancelToken,
) -> Result<Vec<ContentHash>, ScanError> {
    if pending.is_empty() {
        return Ok(Vec::new());
    }
    let workers = workers.clamp(1, MAX_WORKERS).min(pending.len());
    let next = AtomicUsize::new(0);

    let batches: Vec<Vec<(usize, Result<ContentHash, ScanError>)>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut done = Vec::new();
                    while !cancel.is_cancelled() {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(entry) = pending.get(index) else {
                            break;
                        };
                        let result = hash_entry(&entry.path, entry.kind).map_err(|source| {
                            ScanError::Hash {
                                path: entry.path.clone(),
                                source,
                            }
                        });
                        done.push((index, result));
                    }
                    done
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });

    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }

    let mut slots: Vec<Option<ContentHash>> = vec![None; pending.len()];
    for (index, result) in batches.into_iter().flatten() {
        slots[index] = Some(result?);
    }
    slots
        .into_iter()
        .map(|slot| slot.ok_or(ScanError::Cancelled))
        .collect()
}

/// Hash one entry: file content for regular files, the marker for symlinks.
pub fn hash_entry(path: &Path, kind: EntryKind) -> io::Result<ContentHash> {
    match kind {
        EntryKind::File => sha256_file(path),
        EntryKind::Symlink => Ok(ContentHash::symlink()),
    }
}

/// Classify and hash a single path without descending into it.
///
/// Returns `None` for directories and special files.
pub fn hash_path(path: &Path) -> Result<Option<(EntryKind, ContentHash)>, ScanError> {
    let file_type = fs::symlink_metadata(path)
        .map_err(|source| ScanError::Hash {
            path: path.to_path_buf(),
            source,
        })?
        .file_type();
    let kind = if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        return Ok(None);
    };
    let hash = hash_entry(path, kind).map_err(|source| ScanError::Hash {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some((kind, hash)))
}

/// `path` relative to `root`, joined with `/` on every platform.
pub fn relative_location(root: &Path, path: &Path) -> Result<String, ScanError> {
    let relative = path.strip_prefix(root).map_err(|_| ScanError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    })?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::sha256_bytes;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn locations(files: &[ScannedFile]) -> Vec<&str> {
        files.iter().map(|f| f.location.as_str()).collect()
    }

    #[test]
    fn test_walk_order_is_sorted_and_pruned() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "b.txt", b"b");
        write(root, "a/z.txt", b"z");
        write(root, "a/c.txt", b"c");
        write(root, ".git/HEAD", b"ref");
        write(root, "src/.git/keep", b"nested");

        let files = scan_directory(root, &ScanOptions::default()).unwrap();
        assert_eq!(locations(&files), vec!["a/c.txt", "a/z.txt", "b.txt"]);
        assert_eq!(files[2].hash, sha256_bytes(b"b"));
    }

    #[test]
    fn test_results_in_walk_order_with_many_workers() {
        let temp = TempDir::new().unwrap();
        for i in 0..40 {
            write(temp.path(), &format!("f{:02}.dat", i), format!("{}", i).as_bytes());
        }

        let options = ScanOptions::default().with_workers(8);
        let files = scan_directory(temp.path(), &options).unwrap();
        assert_eq!(files.len(), 40);
        for (i, file) in files.iter().enumerate() {
            assert_eq!(file.location, format!("f{:02}.dat", i));
            assert_eq!(file.hash, sha256_bytes(format!("{}", i).as_bytes()));
        }
    }

    #[test]
    fn test_root_is_never_pruned() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join(".git");
        write(&root, "config", b"x");
        let files = scan_directory(&root, &ScanOptions::default()).unwrap();
        assert_eq!(locations(&files), vec!["config"]);
    }

    #[test]
    fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        assert!(scan_directory(temp.path(), &ScanOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_not_a_directory() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "file", b"x");
        let err = scan_directory(&temp.path().join("file"), &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory(_)));
    }

    #[test]
    fn test_cancelled_before_walk() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a", b"a");
        let options = ScanOptions::default();
        options.cancel.cancel();
        let err = scan_directory(temp.path(), &options).unwrap_err();
        assert!(matches!(err, ScanError::Cancelled));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_recorded_not_followed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "data/real.txt", b"content");
        std::os::unix::fs::symlink("real.txt", root.join("data/link.txt")).unwrap();
        std::os::unix::fs::symlink("data", root.join("dirlink")).unwrap();
        std::os::unix::fs::symlink("missing", root.join("dangling")).unwrap();

        let files = scan_directory(root, &ScanOptions::default()).unwrap();
        assert_eq!(locations(&files), vec!["dangling", "data/link.txt", "data/real.txt"]);
        assert_eq!(files[0].kind, EntryKind::Symlink);
        assert!(files[0].hash.is_symlink_marker());
        assert!(files[1].hash.is_symlink_marker());
        assert_eq!(files[2].kind, EntryKind::File);
    }

    #[test]
    fn test_relative_location() {
        let root = Path::new("/a/b");
        assert_eq!(relative_location(root, Path::new("/a/b/c/d.txt")).unwrap(), "c/d.txt");
        assert!(relative_location(root, Path::new("/x/y")).is_err());
    }

    #[test]
    fn test_hash_path_skips_directories() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "f", b"f");
        assert!(hash_path(temp.path()).unwrap().is_none());
        let (kind, hash) = hash_path(&temp.path().join("f")).unwrap().unwrap();
        assert_eq!(kind, EntryKind::File);
        assert_eq!(hash, sha256_bytes(b"f"));
    }
}
