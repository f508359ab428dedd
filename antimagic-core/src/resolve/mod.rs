//! Name resolution: from raw candidates to a collision-free naming plan.
//!
//! ```text
//! name_candidates ──▶ difficult::resolve ──▶ duplicates::resolve
//!  (naming engine,     (exception/ignore/ai    (settle, then policy;
//!   persisted names)    for unnameable ones)    bounded AI loop)
//! ```
//!
//! Conditions a policy can absorb come back as [`Resolution::Findings`] or as
//! [`NameStatus::Unresolved`] on individual candidates. Only genuinely fatal
//! ones (assistant failure, AI non-convergence) are errors.

pub mod difficult;
pub mod duplicates;

use crate::assistant::NamingAssistant;
use crate::config::{AntimagicConfig, DifficultPolicy, DuplicatePolicy};
use crate::constants::{Constant, ConstantPool, NameStatus, UnresolvedReason};
use crate::error::AntimagicResult;
use crate::naming::{derive_formatted_name, derive_name, NameLimits};
use crate::report::Findings;

/// Settings the resolver needs, lifted out of the configuration.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub duplicates: DuplicatePolicy,
    pub difficult: DifficultPolicy,
    pub max_name_segments: usize,
    pub batch_size: usize,
    pub max_rounds: usize,
}

impl From<&AntimagicConfig> for ResolveOptions {
    fn from(config: &AntimagicConfig) -> Self {
        Self {
            duplicates: config.duplicates_solver,
            difficult: config.difficult_string_solver,
            max_name_segments: config.max_name_segments,
            batch_size: config.assistant_batch_size,
            max_rounds: config.max_resolution_rounds,
        }
    }
}

/// Result of a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Every fresh candidate is either resolved or deliberately left alone
    Planned,
    /// A policy asked to stop and report
    Findings(Findings),
}

/// Give every fresh candidate its engine-derived name.
///
/// Values the engine cannot name fall back to the name already declared for
/// them in the output tree.
pub fn name_candidates(pool: &mut ConstantPool, max_name_segments: usize) {
    let limits = NameLimits::for_values(max_name_segments);
    let fallbacks: Vec<Option<String>> = pool
        .fresh()
        .map(|c| pool.persisted_primary(&c.value).map(String::from))
        .collect();

    for (candidate, fallback) in pool.fresh_mut().zip(fallbacks) {
        let derived = if candidate.is_formatted() {
            derive_formatted_name(&candidate.value, limits)
        } else {
            derive_name(&candidate.value, limits)
        };
        match derived.or(fallback) {
            Some(name) => candidate.assign_name(name),
            None => candidate.withdraw(UnresolvedReason::Unnameable),
        }
    }
}

/// Run both policies over the pool.
pub fn resolve(
    pool: &mut ConstantPool,
    options: &ResolveOptions,
    assistant: &dyn NamingAssistant,
) -> AntimagicResult<Resolution> {
    if let Some(findings) = difficult::resolve(pool, options, assistant)? {
        return Ok(Resolution::Findings(findings));
    }
    if let Some(findings) = duplicates::resolve(pool, options, assistant)? {
        return Ok(Resolution::Findings(findings));
    }

    let unresolved = pool
        .fresh()
        .filter(|c| matches!(c.status, NameStatus::Unresolved(_)))
        .count();
    tracing::info!(
        named = pool.fresh().count() - unresolved,
        unresolved,
        "Resolved constant names"
    );
    Ok(Resolution::Planned)
}
