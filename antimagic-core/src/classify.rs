//! Literal classification: which string literals of a module are "magic".
//!
//! Every exclusion is decided on the tree, never on the literal's text:
//! docstrings, annotation content, type-variable names, values already bound
//! to an all-caps name and match-statement patterns are left alone.
//! Concatenations are evaluated whole, so their parts are never candidates.

use rayon::prelude::*;
use regex::Regex;
use tree_sitter::Node;

use crate::error::AntimagicResult;
use crate::literal::{evaluate, EvaluatedString};
use crate::parse::{node_text, parse_file, ParsedModule};
use crate::scan::SourceFile;

/// Calls whose first argument names a type rather than carrying data.
const TYPE_DECLARATION_CALLS: &[&str] = &["TypeVar", "ParamSpec", "TypeVarTuple", "NewType"];

/// Classification switches taken from the configuration.
#[derive(Debug, Clone, Default)]
pub struct ClassifyOptions {
    pub include_annotations: bool,
    /// Values must fully match this pattern to be extracted
    pub allowed_values: Option<Regex>,
}

/// One magic literal found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOccurrence {
    /// Byte range of the whole literal expression
    pub start: usize,
    pub end: usize,
    pub literal: EvaluatedString,
}

/// A classified source file, keeping the text the byte ranges refer to.
#[derive(Debug, Clone)]
pub struct FileLiterals {
    pub file: SourceFile,
    pub source: String,
    pub literals: Vec<LiteralOccurrence>,
}

/// Magic literals of one module, in source order.
pub fn classify_module(module: &ParsedModule, options: &ClassifyOptions) -> Vec<LiteralOccurrence> {
    let source = module.source.as_str();
    let mut found = Vec::new();
    let mut stack = vec![module.root()];

    while let Some(node) = stack.pop() {
        if matches!(node.kind(), "string" | "concatenated_string") {
            if let Some(occurrence) = classify_literal(node, source, options) {
                found.push(occurrence);
            }
            // Parts of a concatenation or f-string internals are never separate candidates.
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    found
}

fn classify_literal(
    node: Node<'_>,
    source: &str,
    options: &ClassifyOptions,
) -> Option<LiteralOccurrence> {
    if is_docstring(node)
        || is_type_declaration_name(node, source)
        || is_constant_assignment(node, source)
        || has_ancestor(node, "case_pattern")
        || (!options.include_annotations && is_annotation(node, source))
    {
        return None;
    }

    let literal = evaluate(node, source)?;
    if let Some(allowed) = &options.allowed_values {
        if !allowed.is_match(&literal.value) {
            return None;
        }
    }

    Some(LiteralOccurrence {
        start: node.start_byte(),
        end: node.end_byte(),
        literal,
    })
}

fn has_ancestor(node: Node<'_>, kind: &str) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == kind {
            return true;
        }
        current = parent.parent();
    }
    false
}

/// First statement of a module, class or function body that is a bare string.
fn is_docstring(node: Node<'_>) -> bool {
    let Some(statement) = node.parent() else {
        return false;
    };
    if statement.kind() != "expression_statement" || statement.named_child_count() != 1 {
        return false;
    }
    let Some(body) = statement.parent() else {
        return false;
    };
    let is_body = match body.kind() {
        "module" => true,
        "block" => body
            .parent()
            .is_some_and(|owner| matches!(owner.kind(), "function_definition" | "class_definition")),
        _ => false,
    };
    if !is_body {
        return false;
    }

    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    first.is_some_and(|first| first.id() == statement.id())
}

/// Annotation content: anything under a `type` node or a `Literal[...]` subscript.
fn is_annotation(node: Node<'_>, source: &str) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        match parent.kind() {
            "type" => return true,
            "subscript" | "generic_type" => {
                let head = parent
                    .child_by_field_name("value")
                    .or_else(|| parent.named_child(0));
                if head.is_some_and(|h| {
                    let text = node_text(h, source);
                    text == "Literal" || text.ends_with(".Literal")
                }) {
                    return true;
                }
            }
            _ => {}
        }
        current = parent.parent();
    }
    false
}

/// The name argument of `TypeVar("T")` and friends.
fn is_type_declaration_name(node: Node<'_>, source: &str) -> bool {
    let Some(arguments) = node.parent().filter(|p| p.kind() == "argument_list") else {
        return false;
    };
    let Some(call) = arguments.parent().filter(|p| p.kind() == "call") else {
        return false;
    };
    let Some(function) = call.child_by_field_name("function") else {
        return false;
    };
    let callee = node_text(function, source);
    let callee = callee.rsplit('.').next().unwrap_or(callee);
    if !TYPE_DECLARATION_CALLS.contains(&callee) {
        return false;
    }

    let mut cursor = arguments.walk();
    let first = arguments
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    first.is_some_and(|first| first.id() == node.id())
}

/// Right-hand side of `NAME = "..."` where `NAME` is already a constant.
fn is_constant_assignment(node: Node<'_>, source: &str) -> bool {
    let Some(assignment) = node.parent().filter(|p| p.kind() == "assignment") else {
        return false;
    };
    if assignment
        .child_by_field_name("right")
        .map_or(true, |right| right.id() != node.id())
    {
        return false;
    }
    assignment
        .child_by_field_name("left")
        .filter(|left| left.kind() == "identifier")
        .is_some_and(|left| is_upper_name(node_text(left, source)))
}

/// Python's `str.isupper()`: at least one cased character, none lowercase.
fn is_upper_name(name: &str) -> bool {
    name.chars().any(char::is_alphabetic) && !name.chars().any(char::is_lowercase)
}

/// Parse and classify every source in parallel.
///
/// Files with syntax errors are skipped with a warning; any other failure
/// aborts. Output keeps the input order.
pub fn classify_sources(
    sources: &[SourceFile],
    options: &ClassifyOptions,
) -> AntimagicResult<Vec<FileLiterals>> {
    let results: Vec<AntimagicResult<Option<FileLiterals>>> = sources
        .par_iter()
        .map(|file| match parse_file(&file.absolute, &file.relative) {
            Ok(module) => {
                let literals = classify_module(&module, options);
                Ok(Some(FileLiterals {
                    file: file.clone(),
                    source: module.source,
                    literals,
                }))
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(path = %file.relative.display(), error = %e, "Skipping unparsable file");
                Ok(None)
            }
            Err(e) => Err(e),
        })
        .collect();

    let mut classified = Vec::with_capacity(results.len());
    for result in results {
        if let Some(file) = result? {
            classified.push(file);
        }
    }
    tracing::debug!(
        files = classified.len(),
        literals = classified.iter().map(|f| f.literals.len()).sum::<usize>(),
        "Classified sources"
    );
    Ok(classified)
}
