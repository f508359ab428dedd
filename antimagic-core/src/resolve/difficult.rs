//! Difficult-string policy: candidates the naming engine gave up on.

use crate::assistant::{request_names, NamingAssistant};
use crate::config::DifficultPolicy;
use crate::constants::{CandidateConstant, Constant, ConstantPool};
use crate::error::AntimagicResult;
use crate::report::{FindingKind, Findings};

use super::ResolveOptions;

/// Apply the difficult-string policy.
///
/// Returns findings when the policy is `exception` and something is
/// unnameable. Under `ignore`, and for whatever the assistant leaves
/// unanswered, the literals simply stay inline.
pub fn resolve(
    pool: &mut ConstantPool,
    options: &ResolveOptions,
    assistant: &dyn NamingAssistant,
) -> AntimagicResult<Option<Findings>> {
    let unnameable: Vec<&CandidateConstant> =
        pool.fresh().filter(|c| c.status.is_unnameable()).collect();
    if unnameable.is_empty() {
        return Ok(None);
    }

    match options.difficult {
        DifficultPolicy::Exception => Ok(Some(Findings::from_candidates(
            FindingKind::Unnameable,
            unnameable,
        ))),
        DifficultPolicy::Ignore => {
            tracing::info!(count = unnameable.len(), "Leaving unnameable literals in place");
            Ok(None)
        }
        DifficultPolicy::Ai => {
            let values: Vec<String> = unnameable.iter().map(|c| c.value.clone()).collect();
            let taken = pool.registry().taken();
            let value_refs: Vec<&str> = values.iter().map(String::as_str).collect();
            let names = request_names(assistant, &value_refs, &taken, options.batch_size)?;

            let mut left = 0;
            for (value, name) in values.iter().zip(names) {
                let Some(candidate) = pool.fresh_mut().find(|c| &c.value == value) else {
                    continue;
                };
                match name {
                    Some(name) => candidate.assign_name(name),
                    None => left += 1,
                }
            }
            if left > 0 {
                tracing::warn!(count = left, "Assistant could not name some literals; leaving them in place");
            }
            Ok(None)
        }
    }
}
