//! antimagic-core: magic string literal extraction for Python codebases
//!
//! This library finds string literals written inline in Python sources,
//! names them, moves them into a generated constants package and rewrites
//! the sources to import them instead.
//!
//! # Features
//!
//! - **Literal classification**: docstrings, annotations, type-variable names,
//!   all-caps assignments and match patterns are never touched
//! - **Deterministic naming**: `"Hello world"` → `HELLO_WORLD`, `"3 cats"` → `THREE_CATS`
//! - **Duplicate resolution**: case-pair disambiguation, persisted-name fallback,
//!   and `exception` / `ignore` / `most_common` / `ai` policies
//! - **Placement**: a constant lives in the nearest package shared by all its users
//! - **Incremental reconciliation**: renamed or moved constants stay importable
//!   through aliases and re-exports
//! - **Transactions**: a failing run restores every touched file byte for byte
//!
//! # Quick Start
//!
//! Use the [`prelude`] module for convenient imports:
//!
//! ```rust,ignore
//! use antimagic_core::prelude::*;
//!
//! match Antimagic::new("/path/to/project").run()? {
//!     RunOutcome::Clean => println!("No magic strings"),
//!     RunOutcome::Modified { files } => println!("Rewrote {} files", files.len()),
//!     RunOutcome::Findings(findings) => print_plain(&findings),
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`scan`]: Parallel file discovery
//! - [`parse`]: tree-sitter parsing; [`literal`]: string literal evaluation and rendering
//! - [`classify`]: magic literal detection
//! - [`naming`]: value → constant name
//! - [`constants`]: candidate and persisted records, name registry
//! - [`resolve`]: difficult-string and duplicate policies
//! - [`placement`], [`state`], [`reconcile`], [`emit`], [`rewrite`]: the write plan
//! - [`transaction`]: snapshot and rollback
//! - [`builder`]: Fluent builder API running the whole pipeline
//! - [`error`]: Typed error handling
//!
//! # Cargo Features
//!
//! - `assistant` (default): HTTP chat-completions naming assistant
//! - `full`: Enable all optional features

pub mod assistant;
pub mod builder;
pub mod classify;
pub mod config;
pub mod constants;
pub mod emit;
pub mod error;
pub mod literal;
pub mod logging;
pub mod naming;
pub mod parse;
pub mod placement;
pub mod prelude;
pub mod reconcile;
pub mod report;
pub mod resolve;
pub mod rewrite;
pub mod scan;
pub mod state;
pub mod transaction;

// ============================================================================
// Explicit Re-exports (avoiding glob imports for clear API surface)
// ============================================================================

// Error types
pub use error::{AntimagicError, AntimagicResult, IoResultExt};

// Builder API
pub use builder::{Antimagic, RunOutcome};

// Configuration
pub use config::{
    load_config, load_config_file, AntimagicConfig, DifficultPolicy, DuplicatePolicy,
    CONFIG_FILE_NAME, FILEPATHS_PLACEHOLDER,
};

// Logging
pub use logging::init_logging;

// Naming
pub use naming::{derive_formatted_name, derive_name, number_to_words, NameLimits};

// Naming assistant
pub use assistant::{request_names, DisabledAssistant, NamingAssistant};
#[cfg(feature = "assistant")]
pub use assistant::ChatAssistant;

// Constants
pub use constants::{
    CandidateConstant, Constant, ConstantPool, ConstantRecord, NameStatus, PersistedConstant,
    UnresolvedReason,
};

// Reporting
pub use report::{print_json, print_plain, FindingKind, Findings};

// File scanning
pub use scan::{collect_output_files, collect_sources, gather_py_files, SourceFile};

#[cfg(test)]
mod tests;
