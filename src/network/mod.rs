//! Networks of communicating processes
//!
//! A [`Network`] maps process names to [`ProcessTerm`]s. Networks are
//! immutable snapshots in practice: every reduction produces a new network
//! that shares all untouched behavior subtrees with its predecessor.

/// Structural equivalence of network states
pub mod equivalence;

/// Removal of dead procedures and trivially terminated processes
pub mod purger;

/// Enabled actions and their application
pub mod reducer;

/// Decomposition into independent sub-networks
pub mod splitter;

/// Process terms and their continuation stacks
pub mod term;

pub use equivalence::{equivalent, fingerprint};
pub use purger::purge;
pub use reducer::{Action, ReductionError};
pub use splitter::split;
pub use term::{ProcessTerm, Procedures};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// A set of named processes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Network {
    processes: BTreeMap<String, ProcessTerm>,
}

impl Network {
    /// An empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`Network::insert`].
    pub fn with_process(mut self, name: impl Into<String>, term: ProcessTerm) -> Self {
        self.insert(name, term);
        self
    }

    /// Add or replace process `name`, returning its previous term.
    pub fn insert(&mut self, name: impl Into<String>, term: ProcessTerm) -> Option<ProcessTerm> {
        self.processes.insert(name.into(), term)
    }

    /// Remove process `name`.
    pub fn remove(&mut self, name: &str) -> Option<ProcessTerm> {
        self.processes.remove(name)
    }

    /// The term of process `name`.
    pub fn get(&self, name: &str) -> Option<&ProcessTerm> {
        self.processes.get(name)
    }

    /// Whether process `name` is part of the network.
    pub fn contains(&self, name: &str) -> bool {
        self.processes.contains_key(name)
    }

    /// Processes in name order.
    pub fn processes(&self) -> impl Iterator<Item = (&str, &ProcessTerm)> {
        self.processes.iter().map(|(name, term)| (name.as_str(), term))
    }

    pub(crate) fn processes_mut(&mut self) -> impl Iterator<Item = (&str, &mut ProcessTerm)> {
        self.processes
            .iter_mut()
            .map(|(name, term)| (name.as_str(), term))
    }

    /// Process names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.processes.keys().map(String::as_str)
    }

    /// Number of processes.
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Whether the network has no processes.
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Whether every process has reached `stop`.
    pub fn all_terminated(&self) -> bool {
        self.processes.values().all(ProcessTerm::is_terminated)
    }
}

impl<S: Into<String>> FromIterator<(S, ProcessTerm)> for Network {
    fn from_iter<T: IntoIterator<Item = (S, ProcessTerm)>>(iter: T) -> Self {
        Self {
            processes: iter
                .into_iter()
                .map(|(name, term)| (name.into(), term))
                .collect(),
        }
    }
}

impl IntoIterator for Network {
    type Item = (String, ProcessTerm);
    type IntoIter = std::collections::btree_map::IntoIter<String, ProcessTerm>;

    fn into_iter(self) -> Self::IntoIter {
        self.processes.into_iter()
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, (name, term)) in self.processes.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{name}{term}")?;
        }
        Ok(())
    }
}
