//! All-or-nothing write envelope around a run.
//!
//! Every path the run may touch is read into memory before the first write.
//! Unless [`Transaction::commit`] is reached, every snapshotted file is put
//! back byte for byte, files the run created are deleted and directories it
//! created are removed again once empty. Rollback also runs from `Drop`, so
//! a panicking phase leaves the tree as it found it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::error::{AntimagicResult, IoResultExt};

#[inline]
fn hash_bytes(bytes: &[u8]) -> String {
    let mut sha = Sha256::new();
    sha.update(bytes);
    format!("{:x}", sha.finalize())
}

/// Pre-run content of one path. `None` means the path did not exist.
#[derive(Debug, Clone)]
struct Snapshot {
    original: Option<Vec<u8>>,
    digest: Option<String>,
}

/// Snapshot/rollback envelope rooted at the project root.
#[derive(Debug)]
pub struct Transaction {
    root: PathBuf,
    /// Root-relative path → pre-run content
    snapshots: BTreeMap<PathBuf, Snapshot>,
    /// Directories created by this run, outermost first
    created_dirs: Vec<PathBuf>,
    finished: bool,
}

impl Transaction {
    /// Snapshot `paths` (root-relative) before anything is written.
    pub fn begin<'a>(root: &Path, paths: impl IntoIterator<Item = &'a Path>) -> AntimagicResult<Self> {
        let mut transaction = Self {
            root: root.to_path_buf(),
            snapshots: BTreeMap::new(),
            created_dirs: Vec::new(),
            finished: false,
        };
        for path in paths {
            transaction.snapshot(path)?;
        }
        tracing::debug!(files = transaction.snapshots.len(), "Snapshotted files");
        Ok(transaction)
    }

    fn snapshot(&mut self, relative: &Path) -> AntimagicResult<()> {
        if self.snapshots.contains_key(relative) {
            return Ok(());
        }
        let absolute = self.root.join(relative);
        let original = match fs::read(&absolute) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e).with_path(&absolute),
        };
        let digest = original.as_deref().map(hash_bytes);
        self.snapshots
            .insert(relative.to_path_buf(), Snapshot { original, digest });
        Ok(())
    }

    /// Write `contents` to a root-relative path.
    ///
    /// Returns whether the bytes on disk changed.
    pub fn write(&mut self, relative: &Path, contents: &str) -> AntimagicResult<bool> {
        self.snapshot(relative)?;
        let absolute = self.root.join(relative);
        let current = match fs::read(&absolute) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e).with_path(&absolute),
        };
        if current.as_deref() == Some(contents.as_bytes()) {
            return Ok(false);
        }

        if let Some(parent) = absolute.parent() {
            self.create_dirs(parent)?;
        }
        write_atomic(&absolute, contents.as_bytes())?;
        tracing::debug!(path = %relative.display(), "Wrote file");
        Ok(true)
    }

    fn create_dirs(&mut self, dir: &Path) -> AntimagicResult<()> {
        let mut missing = Vec::new();
        let mut cursor = Some(dir);
        while let Some(d) = cursor {
            if d.exists() {
                break;
            }
            missing.push(d.to_path_buf());
            cursor = d.parent();
        }
        for d in missing.into_iter().rev() {
            fs::create_dir(&d).with_path(&d)?;
            self.created_dirs.push(d);
        }
        Ok(())
    }

    /// Root-relative paths whose content now differs from the snapshot.
    pub fn changed_paths(&self) -> Vec<PathBuf> {
        self.snapshots
            .iter()
            .filter(|(relative, snapshot)| {
                let now = fs::read(self.root.join(relative)).ok();
                now.as_deref().map(hash_bytes) != snapshot.digest
            })
            .map(|(relative, _)| relative.clone())
            .collect()
    }

    /// Keep every write and report the changed paths.
    pub fn commit(mut self) -> Vec<PathBuf> {
        let changed = self.changed_paths();
        self.finished = true;
        tracing::info!(files = changed.len(), "Committed changes");
        changed
    }

    /// Restore every snapshotted path. Errors are collected so one failing
    /// path does not stop the others from being restored.
    pub fn rollback(mut self) -> AntimagicResult<()> {
        self.restore()
    }

    fn restore(&mut self) -> AntimagicResult<()> {
        self.finished = true;
        let changed = self.changed_paths();
        if !changed.is_empty() {
            tracing::warn!(files = changed.len(), "Reverting changes");
        }

        let mut first_error = None;
        for relative in &changed {
            let absolute = self.root.join(relative);
            let result = match self.snapshots.get(relative).and_then(|s| s.original.as_deref()) {
                Some(bytes) => write_atomic(&absolute, bytes),
                None => fs::remove_file(&absolute).with_path(&absolute),
            };
            if let Err(e) = result {
                tracing::error!(path = %relative.display(), error = %e, "Failed to restore file");
                first_error.get_or_insert(e);
            }
        }
        for dir in self.created_dirs.drain(..).rev() {
            // Only empty directories go; anything else was put there by someone else.
            let _ = fs::remove_dir(&dir);
        }
        if first_error.is_none() && !changed.is_empty() {
            tracing::info!("Changes reverted");
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.restore() {
                tracing::error!(error = %e, "Rollback incomplete");
            }
        }
    }
}

/// Write through a temporary sibling and rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> AntimagicResult<()> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.{}.{}.tmp", file_name, std::process::id(), nanos));

    fs::write(&temp, bytes).with_path(&temp)?;
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(e).with_path(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_temp_dir() -> PathBuf {
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "antimagic_transaction_test_{}_{}",
            std::process::id(),
            id
        ));
        if dir.exists() {
            fs::remove_dir_all(&dir).ok();
        }
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_commit_reports_changed_paths() {
        let root = create_temp_dir();
        fs::write(root.join("a.py"), "x = 1\n").unwrap();
        fs::write(root.join("b.py"), "y = 2\n").unwrap();

        let mut tx = Transaction::begin(&root, [Path::new("a.py"), Path::new("b.py")]).unwrap();
        assert!(tx.write(Path::new("a.py"), "x = 2\n").unwrap());
        assert!(!tx.write(Path::new("b.py"), "y = 2\n").unwrap());
        assert!(tx.write(Path::new("out/new.py"), "Z = 'z'\n").unwrap());

        let changed = tx.commit();
        assert_eq!(changed, vec![PathBuf::from("a.py"), PathBuf::from("out/new.py")]);
        assert_eq!(fs::read_to_string(root.join("out/new.py")).unwrap(), "Z = 'z'\n");
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_rollback_restores_bytes_and_removes_created() {
        let root = create_temp_dir();
        fs::write(root.join("a.py"), "x = 'é'\r\n").unwrap();

        let mut tx = Transaction::begin(&root, [Path::new("a.py")]).unwrap();
        tx.write(Path::new("a.py"), "changed\n").unwrap();
        tx.write(Path::new("out/deep/new.py"), "new\n").unwrap();
        tx.rollback().unwrap();

        assert_eq!(fs::read(root.join("a.py")).unwrap(), "x = 'é'\r\n".as_bytes());
        assert!(!root.join("out").exists());
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_drop_rolls_back() {
        let root = create_temp_dir();
        fs::write(root.join("a.py"), "original\n").unwrap();
        {
            let mut tx = Transaction::begin(&root, [Path::new("a.py")]).unwrap();
            tx.write(Path::new("a.py"), "partial\n").unwrap();
        }
        assert_eq!(fs::read_to_string(root.join("a.py")).unwrap(), "original\n");
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_rollback_keeps_directories_with_foreign_files() {
        let root = create_temp_dir();
        let mut tx = Transaction::begin(&root, std::iter::empty::<&Path>()).unwrap();
        tx.write(Path::new("out/new.py"), "new\n").unwrap();
        fs::write(root.join("out/other.txt"), "keep").unwrap();
        drop(tx);

        assert!(!root.join("out/new.py").exists());
        assert!(root.join("out/other.txt").exists());
        fs::remove_dir_all(&root).ok();
    }
}
