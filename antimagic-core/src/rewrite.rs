//! Source rewriting: magic literals become references to generated constants.
//!
//! Replacements are applied back to front so earlier byte offsets stay valid.
//! Imports are inserted after leading comments, the module docstring and
//! `from __future__` imports, which must stay first in a Python module.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::constants::{Constant, ConstantPool};
use crate::error::{AntimagicError, AntimagicResult};
use crate::parse::{module_path, node_text, parse_source, ParsedModule};

/// Replace `start..end` of a source file with `text`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Every edit planned for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEdits {
    pub replacements: Vec<Replacement>,
    /// module → names to import from it
    pub imports: BTreeMap<String, BTreeSet<String>>,
}

/// Edits per root-relative source file, for every named and placed candidate.
pub fn plan_edits(pool: &ConstantPool, suffix: &str) -> BTreeMap<PathBuf, FileEdits> {
    let mut edits: BTreeMap<PathBuf, FileEdits> = BTreeMap::new();

    for candidate in pool.fresh() {
        let (Some(name), Some(import_file)) = (candidate.name(), candidate.location()) else {
            continue;
        };
        let symbol = format!("{name}{suffix}");
        let module = module_path(import_file);

        for site in &candidate.sites {
            let text = if site.is_formatted() {
                format!("{symbol}.format({})", site.format_args.join(", "))
            } else {
                symbol.clone()
            };
            let file = edits.entry(site.file.clone()).or_default();
            file.replacements.push(Replacement {
                start: site.start,
                end: site.end,
                text,
            });
            file.imports
                .entry(module.clone())
                .or_default()
                .insert(symbol.clone());
        }
    }
    edits
}

/// Apply planned edits to a file's text.
pub fn apply_edits(path: &Path, source: &str, edits: &FileEdits) -> AntimagicResult<String> {
    let module = parse_source(path, source.to_string())?;
    let insert_at = import_insertion_point(&module);
    let already = imported_names(&module);

    let mut replacements = edits.replacements.clone();
    replacements.sort();
    for pair in replacements.windows(2) {
        if pair[0].end > pair[1].start {
            return Err(AntimagicError::internal(format!(
                "overlapping literal sites at bytes {} and {} in {}",
                pair[0].start,
                pair[1].start,
                path.display()
            )));
        }
    }
    if replacements.first().is_some_and(|r| r.start < insert_at) {
        return Err(AntimagicError::internal(format!(
            "literal before the import block in {}",
            path.display()
        )));
    }

    let mut output = source.to_string();
    for replacement in replacements.iter().rev() {
        if replacement.end > output.len()
            || !output.is_char_boundary(replacement.start)
            || !output.is_char_boundary(replacement.end)
        {
            return Err(AntimagicError::internal(format!(
                "literal site {}..{} is outside {}",
                replacement.start,
                replacement.end,
                path.display()
            )));
        }
        let text = pad_for_neighbours(source, replacement);
        output.replace_range(replacement.start..replacement.end, &text);
    }

    let lines = import_lines(&edits.imports, &already);
    if !lines.is_empty() {
        let block = lines.join("\n");
        if insert_at == 0 {
            output.insert_str(0, &format!("{block}\n"));
        } else {
            output.insert_str(insert_at, &format!("\n{block}"));
        }
    }
    Ok(output)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A string literal may touch keywords (`return"x"`); a name in its place may not.
fn pad_for_neighbours(source: &str, replacement: &Replacement) -> String {
    let before = source[..replacement.start].chars().next_back();
    let after = source[replacement.end..].chars().next();
    let mut text = String::with_capacity(replacement.text.len() + 2);
    if before.is_some_and(is_identifier_char) {
        text.push(' ');
    }
    text.push_str(&replacement.text);
    if after.is_some_and(is_identifier_char) {
        text.push(' ');
    }
    text
}

/// `from module import A, B` lines, leaving out names the module already imports.
fn import_lines(
    imports: &BTreeMap<String, BTreeSet<String>>,
    already: &BTreeMap<String, BTreeSet<String>>,
) -> Vec<String> {
    imports
        .iter()
        .filter_map(|(module, names)| {
            let missing: Vec<&str> = names
                .iter()
                .filter(|name| !already.get(module).is_some_and(|have| have.contains(*name)))
                .map(String::as_str)
                .collect();
            (!missing.is_empty()).then(|| format!("from {} import {}", module, missing.join(", ")))
        })
        .collect()
}

fn is_docstring(node: Node<'_>) -> bool {
    node.kind() == "expression_statement"
        && node.named_child_count() == 1
        && node
            .named_child(0)
            .is_some_and(|child| matches!(child.kind(), "string" | "concatenated_string"))
}

/// Byte offset right after the module header.
fn import_insertion_point(module: &ParsedModule) -> usize {
    let root = module.root();
    let mut cursor = root.walk();
    let mut offset = 0;
    let mut seen_statement = false;

    for node in root.named_children(&mut cursor) {
        let header = match node.kind() {
            "comment" => true,
            "future_import_statement" => true,
            _ if !seen_statement && is_docstring(node) => true,
            _ => false,
        };
        if !header {
            break;
        }
        if node.kind() != "comment" {
            seen_statement = true;
        }
        offset = node.end_byte();
    }
    offset
}

/// Names bound unaliased by top-level `from module import ...` statements.
fn imported_names(module: &ParsedModule) -> BTreeMap<String, BTreeSet<String>> {
    let source = module.source.as_str();
    let root = module.root();
    let mut imported: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut cursor = root.walk();

    for statement in root.named_children(&mut cursor) {
        if statement.kind() != "import_from_statement" {
            continue;
        }
        let Some(module_name) = statement.child_by_field_name("module_name") else {
            continue;
        };
        let from = node_text(module_name, source).to_string();
        let mut names_cursor = statement.walk();
        for imported_name in statement.children_by_field_name("name", &mut names_cursor) {
            let bound = match imported_name.kind() {
                "dotted_name" => Some(node_text(imported_name, source)),
                "aliased_import" => {
                    let name = imported_name.child_by_field_name("name").map(|n| node_text(n, source));
                    let alias = imported_name.child_by_field_name("alias").map(|n| node_text(n, source));
                    name.filter(|n| alias == Some(*n))
                }
                _ => None,
            };
            if let Some(bound) = bound {
                imported.entry(from.clone()).or_default().insert(bound.to_string());
            }
        }
    }
    imported
}
