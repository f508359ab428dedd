//! Rendering of generated constant modules.
//!
//! Each affected module is rendered in full from the reconciled records:
//!
//! ```text
//! from typing import Final
//! from <module> import NEW as OLD
//! _ = (OLD,)
//!
//! NAME: Final[str] = "value"
//!
//! OLD_NAME = NAME
//! ```
//!
//! Every section is sorted, so rendering the same records twice yields the
//! same bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::constants::{Constant, ConstantPool, PersistedConstant};
use crate::literal::render_string_literal;
use crate::parse::module_path;
use crate::state::{ReExport, MARKER_NAME};

/// A generated module ready to be written, root-relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Default)]
struct ModuleBody {
    /// name → (value, raw)
    declarations: BTreeMap<String, (String, bool)>,
    /// alias → target
    aliases: BTreeMap<String, String>,
    re_exports: BTreeSet<(String, String, String)>,
}

impl ModuleBody {
    fn render(&self, suffix: &str) -> String {
        let named = |name: &str| format!("{name}{suffix}");

        let mut header = vec!["from typing import Final".to_string()];
        let mut marker = BTreeSet::new();
        for (module, name, alias) in &self.re_exports {
            if name == alias {
                header.push(format!("from {module} import {}", named(name)));
            } else {
                header.push(format!("from {module} import {} as {}", named(name), named(alias)));
            }
            marker.insert(named(alias));
        }
        if !marker.is_empty() {
            let names: Vec<String> = marker.into_iter().collect();
            let tuple = if names.len() == 1 {
                format!("({},)", names[0])
            } else {
                format!("({})", names.join(", "))
            };
            header.push(format!("{MARKER_NAME} = {tuple}"));
        }

        let mut sections = vec![header.join("\n")];
        if !self.declarations.is_empty() {
            let lines: Vec<String> = self
                .declarations
                .iter()
                .map(|(name, (value, raw))| {
                    format!("{}: Final[str] = {}", named(name), render_string_literal(value, *raw))
                })
                .collect();
            sections.push(lines.join("\n"));
        }
        if !self.aliases.is_empty() {
            let lines: Vec<String> = self
                .aliases
                .iter()
                .map(|(alias, target)| format!("{} = {}", named(alias), named(target)))
                .collect();
            sections.push(lines.join("\n"));
        }
        let mut contents = sections.join("\n\n");
        contents.push('\n');
        contents
    }
}

/// Modules touched by this run: planned targets plus modules constants moved out of.
fn affected_modules(pool: &ConstantPool) -> BTreeSet<PathBuf> {
    let mut files: BTreeSet<PathBuf> = pool
        .fresh()
        .filter(|c| c.name().is_some())
        .filter_map(|c| c.location().map(Path::to_path_buf))
        .collect();
    for record in pool.persisted() {
        if let Some(previous) = &record.previous_declared_at {
            files.insert(previous.clone());
            files.insert(record.declared_at.clone());
        }
        if record.was_renamed() {
            files.insert(record.declared_at.clone());
        }
    }
    files
}

/// Name a moved record stays importable by in its old module.
fn old_binding(record: &PersistedConstant) -> Option<&str> {
    if record.is_alias() {
        record.name.as_deref()
    } else {
        record.previous_name.as_deref().or(record.name.as_deref())
    }
}

/// Point every alias at the end of its chain, so `OLD = MID` never precedes `MID = NEW`.
fn flatten_aliases(aliases: &mut BTreeMap<String, String>) {
    let resolved: Vec<(String, String)> = aliases
        .iter()
        .map(|(alias, target)| {
            let mut seen = BTreeSet::from([alias.as_str()]);
            let mut end = target.as_str();
            while let Some(next) = aliases.get(end) {
                if !seen.insert(end) || seen.contains(next.as_str()) {
                    // Cycle: leave the alias as written.
                    end = target.as_str();
                    break;
                }
                end = next.as_str();
            }
            (alias.clone(), end.to_string())
        })
        .collect();
    aliases.extend(resolved);
}

/// Render every module affected by the reconciled pool.
///
/// `re_exports` are the re-export lines read from the output tree; they are
/// carried forward unless the module now binds the name itself.
pub fn render_modules(pool: &ConstantPool, re_exports: &[ReExport], suffix: &str) -> Vec<GeneratedModule> {
    let files = affected_modules(pool);
    let mut bodies: BTreeMap<PathBuf, ModuleBody> =
        files.iter().map(|f| (f.clone(), ModuleBody::default())).collect();

    for record in pool.persisted() {
        let Some(body) = bodies.get_mut(&record.declared_at) else {
            continue;
        };
        let Some(name) = record.name.clone() else {
            continue;
        };
        match &record.alias_of {
            Some(target) => {
                body.aliases.insert(name, target.clone());
            }
            None => {
                if let Some(previous) = &record.previous_name {
                    body.aliases.insert(previous.clone(), name.clone());
                }
                body.declarations.insert(name, (record.value.clone(), record.is_raw));
            }
        }
    }

    for candidate in pool.fresh() {
        let (Some(name), Some(file)) = (candidate.name(), candidate.location()) else {
            continue;
        };
        if let Some(body) = bodies.get_mut(file) {
            body.declarations
                .insert(name.to_string(), (candidate.value.clone(), candidate.is_raw));
        }
    }

    for record in pool.persisted() {
        let (Some(previous), Some(name), Some(old)) =
            (&record.previous_declared_at, record.name.as_deref(), old_binding(record))
        else {
            continue;
        };
        if let Some(body) = bodies.get_mut(previous) {
            body.re_exports.insert((
                module_path(&record.declared_at),
                name.to_string(),
                old.to_string(),
            ));
        }
    }

    for re_export in re_exports {
        if let Some(body) = bodies.get_mut(&re_export.file) {
            body.re_exports.insert((
                re_export.module.clone(),
                re_export.name.clone(),
                re_export.alias.clone(),
            ));
        }
    }

    bodies
        .into_iter()
        .map(|(path, mut body)| {
            // A declaration wins over an alias of the same name; a local binding
            // wins over a re-export.
            let declared: Vec<String> = body.declarations.keys().cloned().collect();
            body.aliases.retain(|alias, _| !declared.contains(alias));
            body.aliases.retain(|alias, target| alias != target);
            flatten_aliases(&mut body.aliases);
            let bound: BTreeSet<String> = body
                .declarations
                .keys()
                .chain(body.aliases.keys())
                .cloned()
                .collect();
            body.re_exports.retain(|(_, _, alias)| !bound.contains(alias));

            GeneratedModule {
                contents: body.render(suffix),
                path,
            }
        })
        .collect()
}
