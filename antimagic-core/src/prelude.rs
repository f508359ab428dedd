//! Prelude module for convenient imports.
//!
//! Import commonly used types with a single line:
//!
//! ```rust,ignore
//! use antimagic_core::prelude::*;
//! ```

// Core types
pub use crate::error::{AntimagicError, AntimagicResult};

// Builder API
pub use crate::builder::{Antimagic, RunOutcome};

// Configuration
pub use crate::config::{load_config, AntimagicConfig, DifficultPolicy, DuplicatePolicy};

// Naming assistant
pub use crate::assistant::{DisabledAssistant, NamingAssistant};
#[cfg(feature = "assistant")]
pub use crate::assistant::ChatAssistant;

// Reporting
pub use crate::report::{print_json, print_plain, FindingKind, Findings};
