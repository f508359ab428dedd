//! Tree-sitter based Python parsing.
//!
//! Parsers are expensive to create but reusable, so every rayon worker keeps
//! its own pre-configured parser in thread-local storage.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser, Tree};

use crate::error::{AntimagicError, AntimagicResult, IoResultExt};

/// Maximum file size to parse (10 MB).
const MAX_FILE_SIZE: u64 = 10_000_000;

thread_local! {
    static PYTHON_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

fn new_parser() -> AntimagicResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| AntimagicError::internal(format!("cannot load the Python grammar: {}", e)))?;
    Ok(parser)
}

/// Run `source` through this thread's parser, creating it on first use.
fn parse_tree(source: &str) -> AntimagicResult<Option<Tree>> {
    PYTHON_PARSER.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(new_parser()?);
        }
        let Some(parser) = slot.as_mut() else {
            return Err(AntimagicError::internal("Python parser is not initialised"));
        };
        Ok(parser.parse(source, None))
    })
}

/// A parsed Python source file together with its text.
#[derive(Debug)]
pub struct ParsedModule {
    /// Path relative to the project root
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
}

impl ParsedModule {
    /// Root `module` node.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by a node.
    pub fn text(&self, node: Node<'_>) -> &str {
        node_text(node, &self.source)
    }
}

/// Source text covered by a node.
#[inline]
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    source.get(node.byte_range()).unwrap_or_default()
}

/// Parse Python source held in memory.
///
/// Trees containing syntax errors are rejected: rewriting a file whose
/// structure was guessed by error recovery could corrupt it.
pub fn parse_source(path: &Path, source: String) -> AntimagicResult<ParsedModule> {
    let tree = parse_tree(&source)?.ok_or_else(|| AntimagicError::parse(path, "parser produced no tree"))?;

    let root = tree.root_node();
    if root.has_error() {
        let (line, column) = first_error_position(root)
            .map(|p| (p.row + 1, p.column + 1))
            .unwrap_or((1, 1));
        return Err(AntimagicError::parse_at(path, "syntax error", line, column));
    }

    Ok(ParsedModule {
        path: path.to_path_buf(),
        source,
        tree,
    })
}

/// Read and parse a file. `relative` is the path recorded on the module.
pub fn parse_file(absolute: &Path, relative: &Path) -> AntimagicResult<ParsedModule> {
    let metadata = fs::metadata(absolute).with_path(absolute)?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(AntimagicError::parse(
            relative,
            format!("file exceeds {} bytes", MAX_FILE_SIZE),
        ));
    }
    let source = fs::read_to_string(absolute).with_path(absolute)?;
    parse_source(relative, source)
}

fn first_error_position(root: Node<'_>) -> Option<tree_sitter::Point> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node.start_position());
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// Dotted import path of a root-relative `.py` file.
///
/// `pkg/sub/__init__.py` imports as `pkg.sub`, `pkg/sub/mod.py` as `pkg.sub.mod`.
pub fn module_path(relative: &Path) -> String {
    let without_ext = relative.with_extension("");
    let mut parts: Vec<String> = without_ext
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if parts.last().is_some_and(|last| last == "__init__") {
        parts.pop();
    }
    parts.join(".")
}
