//! Placement: which generated module declares each constant.
//!
//! The output tree mirrors the source tree. A value used in a single source
//! file goes to that file's mirror (`a/b/c.py` → `<out>/a/b/c.py`); a value
//! shared by several files goes to the package module of their nearest common
//! directory (`<out>/a/b/__init__.py`). An existing declaration counts as one
//! more site, so a constant never moves below where importers already find it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use crate::constants::{Constant, ConstantPool};
use crate::error::{AntimagicError, AntimagicResult};

const PACKAGE_MODULE: &str = "__init__.py";

/// Where a value will be declared and under which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub name: String,
    /// Generated module, root-relative
    pub file: PathBuf,
    pub is_raw: bool,
}

/// Value → placement for every named fresh candidate.
pub type Plan = BTreeMap<String, Placement>;

/// A usage site in source space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Site {
    File(Vec<String>),
    Dir(Vec<String>),
}

impl Site {
    fn directory(&self) -> &[String] {
        match self {
            Self::File(parts) => &parts[..parts.len().saturating_sub(1)],
            Self::Dir(parts) => parts,
        }
    }
}

fn components(path: &Path) -> Option<Vec<String>> {
    path.components()
        .map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect()
}

/// Source-space site a generated module stands for.
fn declaration_site(declared_at: &Path, output_root: &Path) -> Option<Site> {
    let relative = declared_at.strip_prefix(output_root).ok()?;
    let parts = components(relative)?;
    if relative.file_name().is_some_and(|name| name == PACKAGE_MODULE) {
        Some(Site::Dir(parts[..parts.len() - 1].to_vec()))
    } else {
        Some(Site::File(parts))
    }
}

/// Output module for a set of sites.
fn target_for(sites: &BTreeSet<Site>, output_root: &Path) -> Option<PathBuf> {
    let mut iter = sites.iter();
    let first = iter.next()?;

    if sites.len() == 1 {
        if let Site::File(parts) = first {
            return Some(parts.iter().fold(output_root.to_path_buf(), |p, c| p.join(c)));
        }
    }

    let mut common: Vec<String> = first.directory().to_vec();
    for site in iter {
        let shared = common
            .iter()
            .zip(site.directory())
            .take_while(|(a, b)| a == b)
            .count();
        common.truncate(shared);
    }
    let dir = common.iter().fold(output_root.to_path_buf(), |p, c| p.join(c));
    Some(dir.join(PACKAGE_MODULE))
}

/// Place every named fresh candidate and record the target on it.
///
/// Unnamed candidates are left out: their literals stay inline.
pub fn plan(pool: &mut ConstantPool, output_root: &Path) -> AntimagicResult<Plan> {
    let mut targets: Vec<(String, PathBuf)> = Vec::new();

    for candidate in pool.fresh() {
        if candidate.name().is_none() {
            continue;
        }
        let mut sites = BTreeSet::new();
        for file in candidate.files() {
            let parts = components(file).ok_or_else(|| {
                AntimagicError::placement(
                    candidate.value.clone(),
                    format!("site {} is not inside the project root", file.display()),
                )
            })?;
            sites.insert(Site::File(parts));
        }
        for persisted in pool.persisted() {
            if persisted.value == candidate.value && !persisted.is_alias() {
                if let Some(site) = declaration_site(&persisted.declared_at, output_root) {
                    sites.insert(site);
                }
            }
        }

        let target = target_for(&sites, output_root).ok_or_else(|| {
            AntimagicError::placement(candidate.value.clone(), "no usage sites to place it by")
        })?;
        targets.push((candidate.value.clone(), target));
    }

    let mut plan = Plan::new();
    for (value, target) in targets {
        if let Some(candidate) = pool.fresh_mut().find(|c| c.value == value) {
            candidate.relocate(target.clone());
            if let Some(name) = candidate.name() {
                plan.insert(
                    value,
                    Placement {
                        name: name.to_string(),
                        file: target,
                        is_raw: candidate.is_raw,
                    },
                );
            }
        }
    }
    tracing::debug!(constants = plan.len(), "Planned constant placement");
    Ok(plan)
}
