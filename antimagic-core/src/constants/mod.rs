//! Constant records shared by every resolution phase.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐     ┌─────────────────────┐
//! │    candidate.rs     │     │    persisted.rs     │
//! │  ─────────────────  │     │  ─────────────────  │
//! │  Literals found in  │     │  Constants read     │
//! │  this run's sources │     │  from the output    │
//! └──────────┬──────────┘     └──────────┬──────────┘
//!            │                           │
//!            └───────────┬───────────────┘
//!                        ▼
//!            ┌─────────────────────┐
//!            │    registry.rs      │
//!            │  ─────────────────  │
//!            │  name → values,     │
//!            │  duplicate groups   │
//!            └─────────────────────┘
//! ```
//!
//! Both kinds live in one [`ConstantPool`] as [`ConstantRecord`] variants and
//! expose the same [`Constant`] capabilities, so registry rebuilding and
//! placement never care which kind they are looking at.

pub mod candidate;
pub mod persisted;
pub mod registry;

use std::path::{Path, PathBuf};

pub use candidate::{aggregate, CandidateConstant, LiteralSite};
pub use persisted::PersistedConstant;
pub use registry::{DuplicateGroup, NameRegistry};

/// Why a fresh candidate ended up without a usable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The naming engine (and the assistant, if asked) produced nothing
    Unnameable,
    /// The name it wanted is held by another value
    Duplicate { name: String },
}

/// Naming outcome of a fresh candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameStatus {
    Resolved(String),
    Unresolved(UnresolvedReason),
}

impl NameStatus {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Resolved(name) => Some(name),
            Self::Unresolved(_) => None,
        }
    }

    pub fn is_unnameable(&self) -> bool {
        matches!(self, Self::Unresolved(UnresolvedReason::Unnameable))
    }
}

/// Behaviour common to fresh and persisted constants.
pub trait Constant {
    /// Decoded string value.
    fn value(&self) -> &str;

    /// Name currently bound to the value, if any.
    fn name(&self) -> Option<&str>;

    /// Bind a (new) name.
    fn assign_name(&mut self, name: String);

    /// Output module the constant is declared in.
    fn location(&self) -> Option<&Path>;

    /// Move the declaration to another output module.
    fn relocate(&mut self, file: PathBuf);
}

/// A constant of either origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantRecord {
    Fresh(CandidateConstant),
    Persisted(PersistedConstant),
}

impl ConstantRecord {
    fn inner(&self) -> &dyn Constant {
        match self {
            Self::Fresh(c) => c,
            Self::Persisted(p) => p,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Constant {
        match self {
            Self::Fresh(c) => c,
            Self::Persisted(p) => p,
        }
    }
}

impl Constant for ConstantRecord {
    fn value(&self) -> &str {
        self.inner().value()
    }

    fn name(&self) -> Option<&str> {
        self.inner().name()
    }

    fn assign_name(&mut self, name: String) {
        self.inner_mut().assign_name(name)
    }

    fn location(&self) -> Option<&Path> {
        self.inner().location()
    }

    fn relocate(&mut self, file: PathBuf) {
        self.inner_mut().relocate(file)
    }
}

/// Every constant known to a run: this run's literals plus the output tree.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    pub records: Vec<ConstantRecord>,
}

impl ConstantPool {
    pub fn new(fresh: Vec<CandidateConstant>, persisted: Vec<PersistedConstant>) -> Self {
        let records = fresh
            .into_iter()
            .map(ConstantRecord::Fresh)
            .chain(persisted.into_iter().map(ConstantRecord::Persisted))
            .collect();
        Self { records }
    }

    pub fn fresh(&self) -> impl Iterator<Item = &CandidateConstant> {
        self.records.iter().filter_map(|r| match r {
            ConstantRecord::Fresh(c) => Some(c),
            ConstantRecord::Persisted(_) => None,
        })
    }

    pub fn fresh_mut(&mut self) -> impl Iterator<Item = &mut CandidateConstant> {
        self.records.iter_mut().filter_map(|r| match r {
            ConstantRecord::Fresh(c) => Some(c),
            ConstantRecord::Persisted(_) => None,
        })
    }

    pub fn persisted(&self) -> impl Iterator<Item = &PersistedConstant> {
        self.records.iter().filter_map(|r| match r {
            ConstantRecord::Persisted(p) => Some(p),
            ConstantRecord::Fresh(_) => None,
        })
    }

    pub fn persisted_mut(&mut self) -> impl Iterator<Item = &mut PersistedConstant> {
        self.records.iter_mut().filter_map(|r| match r {
            ConstantRecord::Persisted(p) => Some(p),
            ConstantRecord::Fresh(_) => None,
        })
    }

    /// Name under which a value is declared in the output tree (never an alias).
    pub fn persisted_primary(&self, value: &str) -> Option<&str> {
        self.persisted()
            .filter(|p| p.alias_of.is_none() && p.value == value)
            .filter_map(|p| p.name())
            .min()
    }

    /// Name → values index over the current state of every record.
    pub fn registry(&self) -> NameRegistry {
        NameRegistry::build(self.records.iter())
    }
}
