//! Loading previously generated constants from the output tree.
//!
//! Each generated module yields:
//! - one [`PersistedConstant`] per `NAME = "value"` assignment, top-level or nested
//! - one alias record per `OLD = NAME` whose target resolves within the same file
//! - one [`ReExport`] per `from module import NEW as OLD` whose bound name is
//!   listed in the `_ = (...)` marker

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::constants::PersistedConstant;
use crate::error::AntimagicResult;
use crate::literal::evaluate;
use crate::parse::{node_text, parse_file, ParsedModule};

/// Name of the discard binding that marks re-exported names as used.
pub const MARKER_NAME: &str = "_";

/// A moved constant re-exported from its old module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReExport {
    /// Old module that keeps the name importable, root-relative
    pub file: PathBuf,
    /// Dotted module the name is imported from
    pub module: String,
    /// Name in the source module (without suffix)
    pub name: String,
    /// Name bound in the old module (without suffix)
    pub alias: String,
}

/// Everything read back from the output tree.
#[derive(Debug, Clone, Default)]
pub struct PersistedState {
    pub constants: Vec<PersistedConstant>,
    pub re_exports: Vec<ReExport>,
}

/// Strip the configured suffix from a generated name.
pub fn strip_suffix<'a>(name: &'a str, suffix: &str) -> &'a str {
    if suffix.is_empty() {
        return name;
    }
    match name.strip_suffix(suffix) {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => name,
    }
}

/// Parse every generated module.
///
/// A generated module that no longer parses is an error: skipping it would
/// drop its bindings from the merged output.
pub fn load_state(root: &Path, output_files: &[PathBuf], suffix: &str) -> AntimagicResult<PersistedState> {
    let mut state = PersistedState::default();
    for relative in output_files {
        let module = parse_file(&root.join(relative), relative)?;
        read_module(&module, suffix, &mut state);
    }
    tracing::debug!(
        constants = state.constants.len(),
        re_exports = state.re_exports.len(),
        "Loaded persisted constants"
    );
    Ok(state)
}

fn assignments<'t>(module: &'t ParsedModule) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut stack = vec![module.root()];
    while let Some(node) = stack.pop() {
        if node.kind() == "assignment" {
            found.push(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    found
}

fn read_module(module: &ParsedModule, suffix: &str, state: &mut PersistedState) {
    let source = module.source.as_str();
    let mut values: BTreeMap<String, (String, bool)> = BTreeMap::new();
    let mut aliases: Vec<(String, String)> = Vec::new();
    let mut marker: BTreeSet<String> = BTreeSet::new();

    for assignment in assignments(module) {
        let (Some(left), Some(right)) = (
            assignment.child_by_field_name("left"),
            assignment.child_by_field_name("right"),
        ) else {
            continue;
        };
        if left.kind() != "identifier" {
            continue;
        }
        let name = node_text(left, source);
        if name == MARKER_NAME {
            marker.extend(marker_names(right, source).map(|n| strip_suffix(n, suffix).to_string()));
            continue;
        }
        let name = strip_suffix(name, suffix).to_string();

        match right.kind() {
            "string" | "concatenated_string" => match evaluate(right, source) {
                Some(literal) if !literal.is_formatted() => {
                    let mut constant =
                        PersistedConstant::new(name.clone(), literal.value.clone(), &module.path);
                    constant.is_raw = literal.is_raw;
                    values.insert(name, (literal.value, literal.is_raw));
                    state.constants.push(constant);
                }
                _ => tracing::debug!(path = %module.path.display(), name = %name, "Skipping non-constant assignment"),
            },
            "identifier" => {
                let target = strip_suffix(node_text(right, source), suffix).to_string();
                aliases.push((name, target));
            }
            _ => {}
        }
    }

    resolve_aliases(module, values, aliases, state);
    read_re_exports(module, suffix, &marker, state);
}

/// Identifiers listed in the marker's right-hand side.
fn marker_names<'a>(node: Node<'_>, source: &'a str) -> impl Iterator<Item = &'a str> {
    let mut names = Vec::new();
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind() == "identifier" {
            names.push(node_text(n, source));
            continue;
        }
        let mut cursor = n.walk();
        stack.extend(n.named_children(&mut cursor));
    }
    names.into_iter()
}

/// Resolve `OLD = NEW` chains against names declared in the same file.
fn resolve_aliases(
    module: &ParsedModule,
    mut values: BTreeMap<String, (String, bool)>,
    mut pending: Vec<(String, String)>,
    state: &mut PersistedState,
) {
    loop {
        let before = pending.len();
        pending.retain(|(name, target)| {
            let Some((value, is_raw)) = values.get(target).cloned() else {
                return true;
            };
            let mut alias = PersistedConstant::new(name.clone(), value.clone(), &module.path);
            alias.is_raw = is_raw;
            alias.alias_of = Some(target.clone());
            state.constants.push(alias);
            values.insert(name.clone(), (value, is_raw));
            false
        });
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }
    for (name, target) in pending {
        tracing::debug!(path = %module.path.display(), name = %name, target = %target, "Alias target not declared in this module");
    }
}

/// `from module import NEW as OLD` statements whose bound name is in the marker.
fn read_re_exports(module: &ParsedModule, suffix: &str, marker: &BTreeSet<String>, state: &mut PersistedState) {
    let source = module.source.as_str();
    let root = module.root();
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
        for imported in statement.children_by_field_name("name", &mut names_cursor) {
            let (name, alias) = match imported.kind() {
                "aliased_import" => {
                    let name = imported.child_by_field_name("name").map(|n| node_text(n, source));
                    let alias = imported.child_by_field_name("alias").map(|n| node_text(n, source));
                    match (name, alias) {
                        (Some(name), Some(alias)) => (name, alias),
                        _ => continue,
                    }
                }
                "dotted_name" => {
                    let name = node_text(imported, source);
                    (name, name)
                }
                _ => continue,
            };
            let alias = strip_suffix(alias, suffix);
            if !marker.contains(alias) {
                continue;
            }
            state.re_exports.push(ReExport {
                file: module.path.clone(),
                module: from.clone(),
                name: strip_suffix(name, suffix).to_string(),
                alias: alias.to_string(),
            });
        }
    }
}
