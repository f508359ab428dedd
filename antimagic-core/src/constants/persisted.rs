//! Persisted constants: declarations already present in the output tree.

use std::path::{Path, PathBuf};

use super::Constant;

/// One binding read from a generated module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedConstant {
    /// Bound name without the configured suffix; `None` once cleared
    pub name: Option<String>,
    pub value: String,
    pub is_raw: bool,
    /// Generated module holding the binding, root-relative
    pub declared_at: PathBuf,
    /// Set for `OLD = NEW` compatibility bindings: the name they point at
    pub alias_of: Option<String>,
    /// Name before this run renamed the constant
    pub previous_name: Option<String>,
    /// Module before this run moved the constant
    pub previous_declared_at: Option<PathBuf>,
}

impl PersistedConstant {
    pub fn new(name: impl Into<String>, value: impl Into<String>, declared_at: impl Into<PathBuf>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
            is_raw: false,
            declared_at: declared_at.into(),
            alias_of: None,
            previous_name: None,
            previous_declared_at: None,
        }
    }

    /// The name importers know this binding by.
    ///
    /// Falls back to the previous name once the current one was cleared, so
    /// the old binding stays resolvable.
    pub fn defined_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.previous_name.as_deref())
    }

    pub fn is_alias(&self) -> bool {
        self.alias_of.is_some()
    }

    pub fn was_renamed(&self) -> bool {
        self.previous_name.is_some()
    }

    pub fn was_moved(&self) -> bool {
        self.previous_declared_at.is_some()
    }

    /// Unbind the current name, keeping it as the previous one.
    pub fn clear_name(&mut self) {
        if let Some(name) = self.name.take() {
            self.previous_name.get_or_insert(name);
        }
    }
}

impl Constant for PersistedConstant {
    fn value(&self) -> &str {
        &self.value
    }

    fn name(&self) -> Option<&str> {
        self.defined_name()
    }

    fn assign_name(&mut self, name: String) {
        if self.name.as_deref() == Some(name.as_str()) {
            return;
        }
        if let Some(old) = self.name.replace(name) {
            self.previous_name.get_or_insert(old);
        }
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.declared_at)
    }

    fn relocate(&mut self, file: PathBuf) {
        if file == self.declared_at {
            return;
        }
        let old = std::mem::replace(&mut self.declared_at, file);
        self.previous_declared_at.get_or_insert(old);
    }
}
