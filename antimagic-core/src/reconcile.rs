//! Incremental reconciliation of persisted constants against the new plan.
//!
//! For every value present both in the plan and in the output tree, the
//! declaring record takes the planned name (a **rename**, remembered in
//! `previous_name`) and the planned module (a **move**, remembered in
//! `previous_declared_at`). Compatibility aliases travel with their value.
//! Records whose value the plan does not mention are left exactly as read.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::constants::{Constant, ConstantPool, ConstantRecord};
use crate::placement::Plan;

/// One change applied to a persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Rename {
        value: String,
        from: String,
        to: String,
    },
    Move {
        value: String,
        name: String,
        from: PathBuf,
        to: PathBuf,
    },
}

/// Apply renames and moves implied by `plan` to the persisted records.
pub fn reconcile(pool: &mut ConstantPool, plan: &Plan) -> Vec<Change> {
    // An old alias that now carries the planned name is superseded by the
    // declaration itself. One that moves away must still be re-exported from
    // its old module, so it stays.
    pool.records.retain(|record| match record {
        ConstantRecord::Persisted(p) if p.is_alias() => plan.get(&p.value).map_or(true, |placement| {
            p.name() != Some(placement.name.as_str()) || p.declared_at != placement.file
        }),
        _ => true,
    });

    let primaries = primary_records(pool, plan);
    let mut changes = Vec::new();

    for (index, record) in pool.persisted_mut().enumerate() {
        let Some(placement) = plan.get(&record.value) else {
            continue;
        };
        let is_primary = primaries.get(&record.value) == Some(&index);

        if is_primary {
            if let Some(from) = record.name().map(String::from) {
                if from != placement.name {
                    record.assign_name(placement.name.clone());
                    changes.push(Change::Rename {
                        value: record.value.clone(),
                        from,
                        to: placement.name.clone(),
                    });
                }
            }
        } else if !record.is_alias() {
            // A second declaration of the same value becomes an alias.
            record.alias_of = Some(placement.name.clone());
        }

        if record.declared_at != placement.file {
            let from = record.declared_at.clone();
            record.relocate(placement.file.clone());
            changes.push(Change::Move {
                value: record.value.clone(),
                name: record.name().unwrap_or_default().to_string(),
                from,
                to: placement.file.clone(),
            });
        }
    }

    // A second declaration under the planned name would alias itself.
    pool.records.retain(|record| match record {
        ConstantRecord::Persisted(p) => p.alias_of.is_none() || p.alias_of.as_deref() != p.name(),
        _ => true,
    });

    for change in &changes {
        match change {
            Change::Rename { from, to, .. } => {
                tracing::info!(from = %from, to = %to, "Renaming constant")
            }
            Change::Move { name, from, to, .. } => tracing::info!(
                name = %name,
                from = %from.display(),
                to = %to.display(),
                "Moving constant"
            ),
        }
    }
    changes
}

/// Index (among persisted records) of the declaration each planned value keeps.
///
/// Prefers the record already carrying the planned name, then the smallest name.
fn primary_records(pool: &ConstantPool, plan: &Plan) -> BTreeMap<String, usize> {
    let mut best: BTreeMap<String, (bool, String, usize)> = BTreeMap::new();
    for (index, record) in pool.persisted().enumerate() {
        if record.is_alias() {
            continue;
        }
        let (Some(placement), Some(name)) = (plan.get(&record.value), record.name()) else {
            continue;
        };
        // `false` sorts first, so a matching name wins.
        let key = (name != placement.name, name.to_string(), index);
        let entry = best.entry(record.value.clone()).or_insert_with(|| key.clone());
        if key < *entry {
            *entry = key;
        }
    }
    best.into_iter().map(|(value, (_, _, index))| (value, index)).collect()
}
