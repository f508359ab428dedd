//! Parallel, deterministic discovery of Python sources and generated modules.
//!
//! - Early directory pruning via `WalkDir::filter_entry` (O(1) subtree skip)
//! - Parallel entry processing via Rayon's `par_bridge`
//! - Results are sorted so every later phase sees the same order

use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::AntimagicConfig;
use crate::error::{AntimagicError, AntimagicResult, IoResultExt};

/// Directories never worth descending into.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "node_modules",
    ".mypy_cache",
    ".tox",
];

/// A Python file selected for scanning.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Location on disk
    pub absolute: PathBuf,
    /// Location relative to the project root
    pub relative: PathBuf,
}

#[inline]
fn is_excluded_dir(entry: &walkdir::DirEntry, excludes: &HashSet<&str>) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| excludes.contains(name))
}

#[inline]
fn is_python_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "py")
}

/// Gathers all .py files recursively below `dir`.
///
/// Automatically skips VCS metadata, caches and virtual environments.
pub fn gather_py_files(dir: &Path) -> AntimagicResult<Vec<PathBuf>> {
    let excludes: HashSet<&str> = EXCLUDED_DIRS.iter().copied().collect();

    let mut files = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded_dir(e, &excludes))
        .par_bridge()
        .filter_map(|entry| match entry {
            Ok(e) if is_python_file(e.path()) => Some(Ok(e.into_path())),
            Ok(_) => None,
            Err(e) => {
                let path = e.path().unwrap_or(dir).to_path_buf();
                Some(Err(AntimagicError::io(path, e.into())))
            }
        })
        .collect::<AntimagicResult<Vec<_>>>()?;
    files.sort();
    Ok(files)
}

/// Canonical project root.
pub fn canonical_root(config: &AntimagicConfig) -> AntimagicResult<PathBuf> {
    fs::canonicalize(&config.root).with_path(&config.root)
}

/// Resolve the configured source paths into the set of files to scan.
///
/// Paths may be files or directories, relative to the root or absolute
/// inside it. Files inside the output tree or under an `exclude` prefix are
/// dropped. With no paths configured the whole root is scanned.
pub fn collect_sources(root: &Path, config: &AntimagicConfig) -> AntimagicResult<Vec<SourceFile>> {
    let requested: Vec<PathBuf> = if config.paths.is_empty() {
        vec![root.to_path_buf()]
    } else {
        config.paths.iter().map(|p| root.join(p)).collect()
    };

    let output_root = config.output_root();
    let mut selected = BTreeSet::new();

    for path in requested {
        let path = fs::canonicalize(&path).with_path(&path)?;
        let files = if path.is_dir() {
            gather_py_files(&path)?
        } else if is_python_file(&path) {
            vec![path.clone()]
        } else {
            tracing::debug!(path = %path.display(), "Skipping non-Python file");
            continue;
        };

        for absolute in files {
            let relative = absolute
                .strip_prefix(root)
                .map_err(|_| {
                    AntimagicError::config(format!(
                        "{} is outside the project root {}",
                        absolute.display(),
                        root.display()
                    ))
                })?
                .to_path_buf();

            if relative.starts_with(&output_root) || config.is_excluded(&relative) {
                tracing::debug!(path = %relative.display(), "Skipping excluded file");
                continue;
            }
            selected.insert(SourceFile { absolute, relative });
        }
    }

    Ok(selected.into_iter().collect())
}

/// Every generated `.py` module currently in the output tree, root-relative.
pub fn collect_output_files(root: &Path, config: &AntimagicConfig) -> AntimagicResult<Vec<PathBuf>> {
    let output = root.join(config.output_root());
    if !output.is_dir() {
        return Ok(Vec::new());
    }
    gather_py_files(&output)?
        .into_iter()
        .map(|absolute| {
            absolute
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .map_err(|_| AntimagicError::internal("output file outside the project root"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_project() -> PathBuf {
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "antimagic_scan_test_{}_{}",
            std::process::id(),
            id
        ));
        if dir.exists() {
            fs::remove_dir_all(&dir).ok();
        }
        fs::create_dir_all(dir.join("pkg/sub")).unwrap();
        fs::create_dir_all(dir.join("__pycache__")).unwrap();
        fs::create_dir_all(dir.join("generated_constants")).unwrap();
        fs::create_dir_all(dir.join("migrations")).unwrap();
        fs::write(dir.join("app.py"), "x = 'a'\n").unwrap();
        fs::write(dir.join("pkg/sub/mod.py"), "y = 'b'\n").unwrap();
        fs::write(dir.join("pkg/notes.txt"), "not python").unwrap();
        fs::write(dir.join("__pycache__/app.py"), "").unwrap();
        fs::write(dir.join("generated_constants/__init__.py"), "").unwrap();
        fs::write(dir.join("migrations/0001.py"), "").unwrap();
        fs::canonicalize(&dir).unwrap()
    }

    #[test]
    fn test_gather_py_files_prunes_caches() {
        let dir = temp_project();
        let files = gather_py_files(&dir).unwrap();
        assert!(files.iter().all(|f| !f.to_string_lossy().contains("__pycache__")));
        assert!(files.iter().any(|f| f.ends_with("pkg/sub/mod.py")));
        assert!(files.iter().all(|f| f.extension().is_some_and(|e| e == "py")));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_collect_sources_skips_output_tree_and_excludes() {
        let dir = temp_project();
        let config = AntimagicConfig {
            root: dir.clone(),
            exclude: vec!["migrations".to_string()],
            ..Default::default()
        };
        let sources = collect_sources(&dir, &config).unwrap();
        let relative: Vec<_> = sources.iter().map(|s| s.relative.clone()).collect();
        assert_eq!(
            relative,
            vec![PathBuf::from("app.py"), PathBuf::from("pkg/sub/mod.py")]
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_collect_sources_with_explicit_file() {
        let dir = temp_project();
        let config = AntimagicConfig {
            root: dir.clone(),
            paths: vec![PathBuf::from("app.py"), PathBuf::from("app.py")],
            ..Default::default()
        };
        let sources = collect_sources(&dir, &config).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].relative, PathBuf::from("app.py"));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_collect_sources_ignores_explicit_non_python_file() {
        let dir = temp_project();
        let config = AntimagicConfig {
            root: dir.clone(),
            paths: vec![PathBuf::from("pkg/notes.txt"), PathBuf::from("app.py")],
            ..Default::default()
        };
        let sources = collect_sources(&dir, &config).unwrap();
        let relative: Vec<_> = sources.iter().map(|s| s.relative.clone()).collect();
        assert_eq!(relative, vec![PathBuf::from("app.py")]);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_collect_output_files() {
        let dir = temp_project();
        let config = AntimagicConfig::default();
        let files = collect_output_files(&dir, &config).unwrap();
        assert_eq!(files, vec![PathBuf::from("generated_constants/__init__.py")]);
        fs::remove_dir_all(&dir).ok();
    }
}
