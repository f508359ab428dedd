//! Output formatting - plaintext and JSON.

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::constants::CandidateConstant;

/// Why a run stopped to report literals instead of rewriting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Report-only mode: every magic literal found
    ReportOnly,
    /// Literals no name could be found for (difficult policy `exception`)
    Unnameable,
    /// Literals whose names collide (duplicate policy `exception`)
    Duplicate,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReportOnly => "magic strings",
            Self::Unnameable => "unnameable strings",
            Self::Duplicate => "duplicate names",
        })
    }
}

/// Per-file listing of offending literal values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Findings {
    pub kind: FindingKind,
    /// Source file → values found there (sorted, deduplicated)
    pub by_file: BTreeMap<PathBuf, Vec<String>>,
}

impl Findings {
    /// Collect the site files of every given candidate.
    pub fn from_candidates<'a>(
        kind: FindingKind,
        candidates: impl IntoIterator<Item = &'a CandidateConstant>,
    ) -> Self {
        let mut by_file: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
        for candidate in candidates {
            for file in candidate.files() {
                by_file
                    .entry(file.to_path_buf())
                    .or_default()
                    .push(candidate.value.clone());
            }
        }
        for values in by_file.values_mut() {
            values.sort();
            values.dedup();
        }
        Self { kind, by_file }
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }

    /// Total number of (file, value) entries.
    pub fn len(&self) -> usize {
        self.by_file.values().map(Vec::len).sum()
    }
}

/// Prints findings in plain text format.
pub fn print_plain(findings: &Findings) {
    if findings.is_empty() {
        println!("No {} found.", findings.kind);
        return;
    }
    println!("{} ({}):", findings.kind.to_string().to_uppercase(), findings.len());
    for (file, values) in &findings.by_file {
        println!("{} found:", file.display());
        for value in values {
            println!("  {:?}", value);
        }
    }
}

/// Prints findings in JSON format.
///
/// Falls back to a debug rendering if serialization fails.
pub fn print_json(findings: &Findings) {
    match serde_json::to_string_pretty(&json!({ "findings": findings })) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            tracing::warn!(error = %e, "JSON serialization failed");
            println!("{{\"findings\": {:?}}}", findings.by_file);
        }
    }
}
