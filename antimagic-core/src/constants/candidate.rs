//! Fresh candidates: this run's magic literals, aggregated by value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{Constant, NameStatus, UnresolvedReason};
use crate::classify::FileLiterals;

/// One place in a source file where a value is written inline.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LiteralSite {
    /// Source file, root-relative
    pub file: PathBuf,
    pub start: usize,
    pub end: usize,
    /// Interpolated expressions for f-string sites
    pub format_args: Vec<String>,
}

impl LiteralSite {
    pub fn is_formatted(&self) -> bool {
        !self.format_args.is_empty()
    }
}

/// A value discovered in this run, with every site it occurs at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateConstant {
    pub value: String,
    /// At least one site used raw quoting
    pub is_raw: bool,
    pub sites: Vec<LiteralSite>,
    pub status: NameStatus,
    /// Output module chosen by placement
    pub import_file: Option<PathBuf>,
}

impl CandidateConstant {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_raw: false,
            sites: Vec::new(),
            status: NameStatus::Unresolved(UnresolvedReason::Unnameable),
            import_file: None,
        }
    }

    /// Every site is an f-string, so the name carries the formatted suffix.
    pub fn is_formatted(&self) -> bool {
        !self.sites.is_empty() && self.sites.iter().all(LiteralSite::is_formatted)
    }

    /// Drop the name, recording why.
    pub fn withdraw(&mut self, reason: UnresolvedReason) {
        self.status = NameStatus::Unresolved(reason);
    }

    /// Source files this value occurs in, deduplicated and sorted.
    pub fn files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = self.sites.iter().map(|s| s.file.as_path()).collect();
        files.sort();
        files.dedup();
        files
    }
}

impl Constant for CandidateConstant {
    fn value(&self) -> &str {
        &self.value
    }

    fn name(&self) -> Option<&str> {
        self.status.name()
    }

    fn assign_name(&mut self, name: String) {
        self.status = NameStatus::Resolved(name);
    }

    fn location(&self) -> Option<&Path> {
        self.import_file.as_deref()
    }

    fn relocate(&mut self, file: PathBuf) {
        self.import_file = Some(file);
    }
}

/// Merge per-file literals into one candidate per distinct value.
///
/// Candidates come out sorted by value; sites keep file then source order.
pub fn aggregate(files: &[FileLiterals]) -> Vec<CandidateConstant> {
    let mut by_value: BTreeMap<&str, CandidateConstant> = BTreeMap::new();

    for file in files {
        for occurrence in &file.literals {
            let literal = &occurrence.literal;
            let candidate = by_value
                .entry(literal.value.as_str())
                .or_insert_with(|| CandidateConstant::new(literal.value.clone()));
            candidate.is_raw |= literal.is_raw;
            candidate.sites.push(LiteralSite {
                file: file.file.relative.clone(),
                start: occurrence.start,
                end: occurrence.end,
                format_args: literal.format_args.clone(),
            });
        }
    }

    let mut candidates: Vec<CandidateConstant> = by_value.into_values().collect();
    for candidate in &mut candidates {
        candidate.sites.sort();
    }
    candidates
}
