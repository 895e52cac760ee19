//! Declarative trigger predicates for optional catalog documents.
//!
//! Triggers are a closed, data-describable language rather than arbitrary
//! callbacks, so catalogs (including domain-pack catalogs) stay statically
//! inspectable. Evaluation is a pure function over the project's context
//! signals.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A predicate over the set of project context signals.
///
/// The TOML/JSON representation is externally tagged:
///
/// ```toml
/// trigger = { contains = ["migration"] }
/// trigger = { all_of = [{ contains = ["distributed"] }, { contains = ["cache"] }] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Matches when any of the listed keys is present in the signals.
    Contains(Vec<String>),
    /// Matches when every child predicate matches.
    AllOf(Vec<Trigger>),
    /// Matches when at least one child predicate matches.
    AnyOf(Vec<Trigger>),
}

impl Trigger {
    /// Evaluate this predicate against the given context signals.
    pub fn matches(&self, signals: &BTreeSet<String>) -> bool {
        match self {
            Self::Contains(keys) => keys.iter().any(|key| signals.contains(key)),
            Self::AllOf(children) => children.iter().all(|child| child.matches(signals)),
            Self::AnyOf(children) => children.iter().any(|child| child.matches(signals)),
        }
    }
}
