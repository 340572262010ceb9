//! Ending resolver - priority-ordered, total, never-downgrading.
//!
//! Resolution walks an explicit priority order rather than code order, so
//! two non-adjacent rules matching at once always resolve the same way.

use serde::{Deserialize, Serialize};

use story_state::{Condition, StateStore};

use crate::error::ContentError;

/// Unique identifier for endings. Author-assigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndingId(pub String);

impl EndingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EndingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One rule in the resolution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndingRule {
    /// Higher priority wins. Declared, not implied by order.
    pub priority: u32,
    pub ending: EndingId,
    #[serde(default)]
    pub predicate: Condition,
}

impl EndingRule {
    pub fn new(priority: u32, ending: impl Into<String>, predicate: Condition) -> Self {
        Self {
            priority,
            ending: EndingId::new(ending),
            predicate,
        }
    }

    /// The lowest-priority rule that always matches.
    pub fn catch_all(ending: impl Into<String>) -> Self {
        Self::new(0, ending, Condition::Always)
    }
}

/// The ending chosen for a session, with the priority that chose it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEnding {
    pub ending: EndingId,
    pub priority: u32,
}

/// Evaluates rules top-down by descending priority; first match wins.
#[derive(Debug, Clone, PartialEq)]
pub struct EndingResolver {
    /// Sorted by descending priority at construction; the sort is stable,
    /// so declaration order breaks priority ties.
    rules: Vec<EndingRule>,
}

impl EndingResolver {
    /// Build a resolver. The rule set must be total: at least one rule
    /// must carry an always-true predicate, and ending ids must be unique.
    pub fn from_rules(rules: impl IntoIterator<Item = EndingRule>) -> Result<Self, ContentError> {
        let mut rules: Vec<EndingRule> = rules.into_iter().collect();
        if !rules.iter().any(|r| r.predicate == Condition::Always) {
            return Err(ContentError::NoCatchAllEnding);
        }
        for (i, rule) in rules.iter().enumerate() {
            if rules[..i].iter().any(|r| r.ending == rule.ending) {
                return Err(ContentError::DuplicateEnding(rule.ending.0.clone()));
            }
        }
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(Self { rules })
    }

    /// Resolve an ending. Total by construction: the catch-all guarantees a
    /// match, so this never fails. Pure and idempotent.
    pub fn resolve(&self, store: &StateStore) -> ResolvedEnding {
        let rule = self
            .rules
            .iter()
            .find(|r| r.predicate.eval(store))
            .unwrap_or_else(|| unreachable!("rule set validated to contain a catch-all"));
        ResolvedEnding {
            ending: rule.ending.clone(),
            priority: rule.priority,
        }
    }

    /// Look up the declared rule for an ending id (used to re-anchor a
    /// loaded ending to its priority).
    pub fn rule_for(&self, id: &EndingId) -> Option<&EndingRule> {
        self.rules.iter().find(|r| &r.ending == id)
    }

    /// Whether `candidate` may replace `current` under the
    /// once-chosen-never-downgraded rule.
    pub fn upgrades(current: Option<&ResolvedEnding>, candidate: &ResolvedEnding) -> bool {
        match current {
            Some(current) => candidate.priority > current.priority,
            None => true,
        }
    }
}
