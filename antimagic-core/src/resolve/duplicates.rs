//! Duplicate-name resolution.
//!
//! Every round starts by settling what needs no policy at all: a fresh
//! candidate caught in a collision goes back to the name already declared for
//! its value, and pairs that differ only by letter case get case suffixes.
//! Whatever still collides is handed to the configured policy.

use std::collections::{BTreeMap, BTreeSet};

use crate::assistant::{request_names, NamingAssistant};
use crate::config::DuplicatePolicy;
use crate::constants::{
    CandidateConstant, Constant, ConstantPool, DuplicateGroup, UnresolvedReason,
};
use crate::error::{AntimagicError, AntimagicResult};
use crate::report::{FindingKind, Findings};

use super::ResolveOptions;

/// Python's `str.capitalize()`.
fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Suffix describing the letter case of a value.
fn case_suffix(value: &str) -> &'static str {
    if value == value.to_uppercase() {
        "UPPERCASE"
    } else if value == value.to_lowercase() {
        "LOWERCASE"
    } else if value == capitalize(value) {
        "CAPITALIZED"
    } else {
        "MIXEDCASE"
    }
}

/// Two values where one is the capitalized or upper-cased form of the other.
fn is_case_pair(values: &BTreeSet<String>) -> bool {
    let mut iter = values.iter();
    let (Some(a), Some(b), None) = (iter.next(), iter.next(), iter.next()) else {
        return false;
    };
    [(a, b), (b, a)]
        .iter()
        .any(|(x, y)| capitalize(x) == **y || x.to_uppercase() == **y)
}

/// Fresh candidates currently claiming `name`.
fn claimants<'a>(
    pool: &'a mut ConstantPool,
    name: &'a str,
) -> impl Iterator<Item = &'a mut CandidateConstant> + 'a {
    pool.fresh_mut().filter(move |c| c.name() == Some(name))
}

/// Apply the automatic fixes until nothing changes.
///
/// Returns the collisions that remain.
pub fn settle(pool: &mut ConstantPool) -> Vec<DuplicateGroup> {
    // Every change moves a candidate off a contested name, so this is bounded.
    let limit = pool.records.len() + 1;
    for _ in 0..limit {
        let groups = pool.registry().duplicates();
        let mut changed = false;

        for group in &groups {
            let fallbacks: BTreeMap<String, String> = group
                .values
                .iter()
                .filter_map(|v| {
                    pool.persisted_primary(v)
                        .filter(|primary| *primary != group.name)
                        .map(|primary| (v.clone(), primary.to_string()))
                })
                .collect();
            for candidate in claimants(pool, &group.name) {
                if let Some(primary) = fallbacks.get(&candidate.value) {
                    tracing::debug!(value = %candidate.value, name = %primary, "Reusing persisted name");
                    candidate.assign_name(primary.clone());
                    changed = true;
                }
            }
        }
        if changed {
            continue;
        }

        for group in &groups {
            if !is_case_pair(&group.values) {
                continue;
            }
            for candidate in claimants(pool, &group.name) {
                let name = format!("{}_{}", group.name, case_suffix(&candidate.value));
                tracing::debug!(value = %candidate.value, name = %name, "Disambiguating by case");
                candidate.assign_name(name);
                changed = true;
            }
        }
        if !changed {
            return groups;
        }
    }
    pool.registry().duplicates()
}

/// Split off groups no fresh candidate takes part in.
///
/// Those come from an output tree that already declares one name for several
/// values; no policy can rename them, so they are only reported.
fn split_persisted_only(
    pool: &ConstantPool,
    groups: Vec<DuplicateGroup>,
) -> (Vec<DuplicateGroup>, Vec<DuplicateGroup>) {
    groups
        .into_iter()
        .partition(|group| pool.fresh().any(|c| c.name() == Some(group.name.as_str())))
}

/// Value keeping a contested name under `most_common`.
///
/// A value already declared under the name wins outright; otherwise the
/// value with the most sites, ties going to the smallest value.
fn most_common_winner(pool: &ConstantPool, group: &DuplicateGroup) -> Option<String> {
    let persisted_holder = pool
        .persisted()
        .filter(|p| p.name() == Some(group.name.as_str()))
        .map(|p| p.value.clone())
        .min();
    if persisted_holder.is_some() {
        return persisted_holder;
    }

    pool.fresh()
        .filter(|c| c.name() == Some(group.name.as_str()))
        .max_by(|a, b| {
            a.sites
                .len()
                .cmp(&b.sites.len())
                .then_with(|| b.value.cmp(&a.value))
        })
        .map(|c| c.value.clone())
}

/// Fresh candidates that must give up a contested name: everyone in the
/// group except values already declared under it.
fn conflicting_values(pool: &ConstantPool, groups: &[DuplicateGroup]) -> Vec<String> {
    let mut conflicting: Vec<(String, String)> = Vec::new();
    for group in groups {
        for candidate in pool.fresh() {
            if candidate.name() != Some(group.name.as_str()) {
                continue;
            }
            let held = pool
                .persisted()
                .any(|p| p.value == candidate.value && p.name() == Some(group.name.as_str()));
            if !held {
                conflicting.push((group.name.clone(), candidate.value.clone()));
            }
        }
    }
    conflicting.sort();
    conflicting.dedup();
    conflicting.into_iter().map(|(_, value)| value).collect()
}

/// Apply the duplicate policy.
///
/// Returns findings under `exception`; errors with
/// [`AntimagicError::DuplicateResolution`] when the `ai` loop stops making
/// progress or runs out of rounds.
pub fn resolve(
    pool: &mut ConstantPool,
    options: &ResolveOptions,
    assistant: &dyn NamingAssistant,
) -> AntimagicResult<Option<Findings>> {
    let settled = settle(pool);
    let (groups, persisted_only) = split_persisted_only(pool, settled);
    for group in &persisted_only {
        tracing::warn!(name = %group.name, values = group.values.len(), "Generated constants share a name");
    }
    if groups.is_empty() {
        return Ok(None);
    }
    tracing::info!(groups = groups.len(), policy = %options.duplicates, "Resolving duplicate names");

    match options.duplicates {
        DuplicatePolicy::Exception => {
            let names: BTreeSet<&str> = groups.iter().map(|g| g.name.as_str()).collect();
            let offending: Vec<&CandidateConstant> = pool
                .fresh()
                .filter(|c| c.name().is_some_and(|n| names.contains(n)))
                .collect();
            Ok(Some(Findings::from_candidates(FindingKind::Duplicate, offending)))
        }
        DuplicatePolicy::Ignore => {
            for group in &groups {
                for candidate in claimants(pool, &group.name) {
                    candidate.withdraw(UnresolvedReason::Duplicate {
                        name: group.name.clone(),
                    });
                }
            }
            Ok(None)
        }
        DuplicatePolicy::MostCommon => {
            for group in &groups {
                let winner = most_common_winner(pool, group);
                for candidate in claimants(pool, &group.name) {
                    if winner.as_deref() != Some(candidate.value.as_str()) {
                        candidate.withdraw(UnresolvedReason::Duplicate {
                            name: group.name.clone(),
                        });
                    }
                }
            }
            Ok(None)
        }
        DuplicatePolicy::Ai => resolve_with_assistant(pool, options, assistant, groups).map(|_| None),
    }
}

/// Bounded fixed-point loop: each round must shrink the number of groups.
fn resolve_with_assistant(
    pool: &mut ConstantPool,
    options: &ResolveOptions,
    assistant: &dyn NamingAssistant,
    mut groups: Vec<DuplicateGroup>,
) -> AntimagicResult<()> {
    let mut previous = usize::MAX;
    let mut rounds = 0;

    loop {
        if groups.is_empty() {
            tracing::info!(rounds, "Duplicate names resolved");
            return Ok(());
        }
        if groups.len() >= previous || rounds >= options.max_rounds {
            let values = groups.into_iter().flat_map(|g| g.values);
            return Err(AntimagicError::duplicate_resolution(values));
        }
        previous = groups.len();
        rounds += 1;

        let values = conflicting_values(pool, &groups);
        let taken = pool.registry().taken();
        tracing::info!(round = rounds, groups = groups.len(), values = values.len(), "Asking assistant to rename duplicates");
        let value_refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let names = request_names(assistant, &value_refs, &taken, options.batch_size)?;

        for (value, name) in values.iter().zip(names) {
            if let Some(name) = name {
                if let Some(candidate) = pool.fresh_mut().find(|c| &c.value == value) {
                    candidate.assign_name(name);
                }
            }
        }
        let settled = settle(pool);
        groups = split_persisted_only(pool, settled).0;
    }
}
