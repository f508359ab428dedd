//! Name registry: which values currently claim which names.
//!
//! Rebuilt from the records after every change instead of being mutated in
//! place, so it can never drift from the records it describes.

use std::collections::{BTreeMap, BTreeSet};

use super::Constant;

/// A name claimed by more than one distinct value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub name: String,
    pub values: BTreeSet<String>,
}

/// Name → distinct values bound to it.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    names: BTreeMap<String, BTreeSet<String>>,
}

impl NameRegistry {
    pub fn build<'a, C>(records: impl IntoIterator<Item = &'a C>) -> Self
    where
        C: Constant + 'a,
    {
        let mut registry = Self::default();
        for record in records {
            if let Some(name) = record.name() {
                registry.reserve(name, record.value());
            }
        }
        registry
    }

    pub fn reserve(&mut self, name: &str, value: &str) {
        self.names
            .entry(name.to_string())
            .or_default()
            .insert(value.to_string());
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Whether `name` is bound to anything other than `value`.
    pub fn is_taken_by_other(&self, name: &str, value: &str) -> bool {
        self.names
            .get(name)
            .is_some_and(|values| values.iter().any(|v| v != value))
    }

    /// Every claimed name, sorted.
    pub fn taken(&self) -> BTreeSet<String> {
        self.names.keys().cloned().collect()
    }

    /// Groups with two or more distinct values, sorted by name.
    pub fn duplicates(&self) -> Vec<DuplicateGroup> {
        self.names
            .iter()
            .filter(|(_, values)| values.len() > 1)
            .map(|(name, values)| DuplicateGroup {
                name: name.clone(),
                values: values.clone(),
            })
            .collect()
    }
}
