//! Builder pattern API for antimagic runs.
//!
//! Provides a fluent interface over [`AntimagicConfig`] and runs the whole
//! pipeline:
//!
//! ```rust,ignore
//! use antimagic_core::prelude::*;
//!
//! let outcome = Antimagic::new("/path/to/project")
//!     .paths(["app"])
//!     .duplicates_solver(DuplicatePolicy::MostCommon)
//!     .run()?;
//!
//! if let RunOutcome::Modified { files } = outcome {
//!     println!("Rewrote {} files", files.len());
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::assistant::{DisabledAssistant, NamingAssistant};
use crate::classify::{classify_sources, ClassifyOptions, FileLiterals};
use crate::config::{AntimagicConfig, DifficultPolicy, DuplicatePolicy};
use crate::constants::{aggregate, CandidateConstant, ConstantPool};
use crate::emit::render_modules;
use crate::error::{AntimagicError, AntimagicResult};
use crate::placement::plan;
use crate::reconcile::reconcile;
use crate::report::{FindingKind, Findings};
use crate::resolve::{name_candidates, resolve, Resolution, ResolveOptions};
use crate::rewrite::{apply_edits, plan_edits};
use crate::scan::{canonical_root, collect_output_files, collect_sources};
use crate::state::load_state;
use crate::transaction::Transaction;

/// How a run ended, short of a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing to extract
    Clean,
    /// Files were rewritten or generated (root-relative)
    Modified { files: Vec<PathBuf> },
    /// Report-only mode or an `exception` policy stopped the run; nothing was written
    Findings(Findings),
}

impl RunOutcome {
    /// Whether the run should fail a pre-commit style check.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Clean)
    }
}

/// Builder for configuring and running an extraction.
pub struct Antimagic {
    config: AntimagicConfig,
    assistant: Option<Box<dyn NamingAssistant>>,
}

impl fmt::Debug for Antimagic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Antimagic")
            .field("config", &self.config)
            .field("assistant", &self.assistant.is_some())
            .finish()
    }
}

impl Antimagic {
    /// Create a builder with default settings for the given project root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(AntimagicConfig {
            root: root.into(),
            ..AntimagicConfig::default()
        })
    }

    /// Create a builder from a loaded configuration.
    pub fn from_config(config: AntimagicConfig) -> Self {
        Self {
            config,
            assistant: None,
        }
    }

    pub fn config(&self) -> &AntimagicConfig {
        &self.config
    }

    /// Source files or directories to scan, relative to the root.
    pub fn paths(mut self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.config.paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Rewrite files (true) or only report (false).
    pub fn modify(mut self, enabled: bool) -> Self {
        self.config.modify = enabled;
        self
    }

    pub fn include_annotations(mut self, enabled: bool) -> Self {
        self.config.include_annotations = enabled;
        self
    }

    pub fn const_name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.const_name_suffix = suffix.into();
        self
    }

    /// Add path prefixes to exclude from scanning.
    pub fn exclude(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.exclude.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn duplicates_solver(mut self, policy: DuplicatePolicy) -> Self {
        self.config.duplicates_solver = policy;
        self
    }

    pub fn difficult_string_solver(mut self, policy: DifficultPolicy) -> Self {
        self.config.difficult_string_solver = policy;
        self
    }

    /// Only extract values fully matching this regex.
    pub fn allowed_values(mut self, pattern: impl Into<String>) -> Self {
        self.config.allowed_values = Some(pattern.into());
        self
    }

    /// Use this assistant for the `ai` policies.
    pub fn with_assistant(mut self, assistant: Box<dyn NamingAssistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// Run the pipeline.
    ///
    /// Nothing is written unless every phase succeeds; a fatal error restores
    /// every touched file before it is returned.
    pub fn run(&self) -> AntimagicResult<RunOutcome> {
        let config = &self.config;
        config.validate()?;

        // 1. Discover files
        let root = canonical_root(config)?;
        let sources = collect_sources(&root, config)?;
        let output_files = collect_output_files(&root, config)?;
        tracing::info!(
            sources = sources.len(),
            generated = output_files.len(),
            "Collected files"
        );

        // 2. Classify and aggregate
        let options = ClassifyOptions {
            include_annotations: config.include_annotations,
            allowed_values: config.allowed_values_regex()?,
        };
        let classified = classify_sources(&sources, &options)?;
        let fresh = aggregate(&classified);
        tracing::info!(values = fresh.len(), "Found magic strings");

        if !config.modify {
            let findings = Findings::from_candidates(FindingKind::ReportOnly, &fresh);
            return Ok(if findings.is_empty() {
                RunOutcome::Clean
            } else {
                RunOutcome::Findings(findings)
            });
        }
        if fresh.is_empty() {
            return Ok(RunOutcome::Clean);
        }

        // 3. Everything that may be written is snapshotted before the first write
        let mut transaction = Transaction::begin(
            &root,
            sources
                .iter()
                .map(|s| s.relative.as_path())
                .chain(output_files.iter().map(PathBuf::as_path)),
        )?;

        match self.apply(&root, &output_files, &classified, fresh, &mut transaction) {
            Ok(Some(findings)) => {
                transaction.rollback()?;
                Ok(RunOutcome::Findings(findings))
            }
            Ok(None) => {
                let files = transaction.commit();
                Ok(if files.is_empty() {
                    RunOutcome::Clean
                } else {
                    RunOutcome::Modified { files }
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "Run failed");
                if let Err(rollback) = transaction.rollback() {
                    tracing::error!(error = %rollback, "Rollback incomplete");
                }
                Err(e)
            }
        }
    }

    /// Resolve, place, reconcile and write. Returns findings when a policy stopped the run.
    fn apply(
        &self,
        root: &Path,
        output_files: &[PathBuf],
        classified: &[FileLiterals],
        fresh: Vec<CandidateConstant>,
        transaction: &mut Transaction,
    ) -> AntimagicResult<Option<Findings>> {
        let config = &self.config;
        let suffix = config.const_name_suffix.as_str();

        // 4. Merge with what earlier runs generated
        let state = load_state(root, output_files, suffix)?;
        let mut pool = ConstantPool::new(fresh, state.constants);

        // 5. Names
        name_candidates(&mut pool, config.max_name_segments);
        let assistant: &dyn NamingAssistant = match &self.assistant {
            Some(assistant) => assistant.as_ref(),
            None => &DisabledAssistant,
        };
        if let Resolution::Findings(findings) =
            resolve(&mut pool, &ResolveOptions::from(config), assistant)?
        {
            return Ok(Some(findings));
        }

        // 6. Placement and reconciliation
        let placement = plan(&mut pool, &config.output_root())?;
        let changes = reconcile(&mut pool, &placement);
        tracing::debug!(changes = changes.len(), "Reconciled generated constants");

        // 7. Write generated modules, then rewrite sources
        for module in render_modules(&pool, &state.re_exports, suffix) {
            transaction.write(&module.path, &module.contents)?;
        }

        let by_path: BTreeMap<&Path, &FileLiterals> = classified
            .iter()
            .map(|f| (f.file.relative.as_path(), f))
            .collect();
        for (file, edits) in plan_edits(&pool, suffix) {
            let literals = by_path.get(file.as_path()).ok_or_else(|| {
                AntimagicError::internal(format!("no classified source for {}", file.display()))
            })?;
            let rewritten = apply_edits(&file, &literals.source, &edits)?;
            transaction.write(&file, &rewritten)?;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_config() {
        let builder = Antimagic::new("/project")
            .paths(["a", "b.py"])
            .output_dir("consts")
            .modify(false)
            .include_annotations(true)
            .const_name_suffix("_C")
            .exclude(["vendor"])
            .duplicates_solver(DuplicatePolicy::Ai)
            .difficult_string_solver(DifficultPolicy::Ignore)
            .allowed_values("[a-z]+");

        let config = builder.config();
        assert_eq!(config.root, PathBuf::from("/project"));
        assert_eq!(config.paths, vec![PathBuf::from("a"), PathBuf::from("b.py")]);
        assert_eq!(config.output_dir, "consts");
        assert!(!config.modify);
        assert!(config.include_annotations);
        assert_eq!(config.const_name_suffix, "_C");
        assert_eq!(config.exclude, vec!["vendor".to_string()]);
        assert_eq!(config.duplicates_solver, DuplicatePolicy::Ai);
        assert_eq!(config.difficult_string_solver, DifficultPolicy::Ignore);
        assert_eq!(config.allowed_values.as_deref(), Some("[a-z]+"));
    }

    #[test]
    fn test_invalid_config_fails_before_scanning() {
        let err = Antimagic::new("/definitely/not/here")
            .output_dir("../escape")
            .run()
            .unwrap_err();
        assert!(matches!(err, AntimagicError::Config { .. }));
    }

    #[test]
    fn test_outcome_failure() {
        assert!(!RunOutcome::Clean.is_failure());
        assert!(RunOutcome::Modified { files: Vec::new() }.is_failure());
    }
}
