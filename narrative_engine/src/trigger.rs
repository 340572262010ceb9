//! Trigger registry - one-shot watchers over the state store.
//!
//! A trigger decouples "reveal this inbox message" from whichever mutation
//! made it due: any component can set a flag without knowing what content
//! depends on it. The registry is swept after every mutation batch; an
//! unfired watcher whose condition holds fires exactly once, in
//! registration order, and is excluded from every later sweep.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use story_state::{Condition, StateStore};

use crate::error::{ContentError, LoadError};

/// Unique identifier for triggers. Author-assigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(pub String);

impl TriggerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TriggerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A one-shot watcher: when `condition` first holds, reveal `payload`.
///
/// The payload is an opaque content id (an inbox message, a spawnable
/// object) handed to presentation subscribers; the engine never interprets
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub condition: Condition,
    pub payload: String,
}

impl Trigger {
    pub fn new(
        id: impl Into<String>,
        condition: Condition,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: TriggerId::new(id),
            condition,
            payload: payload.into(),
        }
    }
}

/// Registry of not-yet-fired and fired watchers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriggerRegistry {
    watchers: Vec<Trigger>,
    fired: BTreeSet<TriggerId>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from triggers, rejecting duplicate ids.
    pub fn from_triggers(
        triggers: impl IntoIterator<Item = Trigger>,
    ) -> Result<Self, ContentError> {
        let mut registry = Self::new();
        for trigger in triggers {
            registry.register(trigger)?;
        }
        Ok(registry)
    }

    /// Record a watcher. Registration order is firing order within a batch.
    pub fn register(&mut self, trigger: Trigger) -> Result<(), ContentError> {
        if self.watchers.iter().any(|t| t.id == trigger.id) {
            return Err(ContentError::DuplicateTrigger(trigger.id.0));
        }
        self.watchers.push(trigger);
        Ok(())
    }

    /// Re-evaluate all not-yet-fired watchers; returns the ones that fire,
    /// in registration order. Each fires at most once per session.
    pub fn sweep(&mut self, store: &StateStore) -> Vec<Trigger> {
        let mut fired = Vec::new();
        for trigger in &self.watchers {
            if self.fired.contains(&trigger.id) {
                continue;
            }
            if trigger.condition.eval(store) {
                fired.push(trigger.clone());
            }
        }
        for trigger in &fired {
            self.fired.insert(trigger.id.clone());
        }
        fired
    }

    /// Ids of triggers that have already fired this session.
    pub fn fired(&self) -> &BTreeSet<TriggerId> {
        &self.fired
    }

    /// Replay the fired set from a save document. Unknown ids are a load
    /// error: the document belongs to different content.
    pub fn restore_fired(
        &mut self,
        ids: impl IntoIterator<Item = TriggerId>,
    ) -> Result<(), LoadError> {
        let mut fired = BTreeSet::new();
        for id in ids {
            if !self.watchers.iter().any(|t| t.id == id) {
                return Err(LoadError::UnknownContent(format!("trigger `{}`", id)));
            }
            fired.insert(id);
        }
        self.fired = fired;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_exactly_once() {
        let mut registry = TriggerRegistry::new();
        registry
            .register(Trigger::new(
                "mail_from_ally",
                Condition::flag("metAllyA"),
                "inbox/ally_01",
            ))
            .unwrap();

        let mut store = StateStore::new();
        assert!(registry.sweep(&store).is_empty());

        store.set_flag("metAllyA").unwrap();
        let fired = registry.sweep(&store);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].payload, "inbox/ally_01");

        // Condition still true on later mutations; no refire.
        store.adjust_counter("noise", 1.0);
        assert!(registry.sweep(&store).is_empty());
        store.set_flag("other").unwrap();
        assert!(registry.sweep(&store).is_empty());
    }

    #[test]
    fn test_batch_firing_in_registration_order() {
        let mut registry = TriggerRegistry::new();
        registry
            .register(Trigger::new("second", Condition::flag("x"), "b"))
            .unwrap();
        registry
            .register(Trigger::new("first", Condition::flag("x"), "a"))
            .unwrap();

        let mut store = StateStore::new();
        store.set_flag("x").unwrap();

        let fired = registry.sweep(&store);
        let ids: Vec<_> = fired.iter().map(|t| t.id.as_str()).collect();
        // Registration order, not id order.
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = TriggerRegistry::new();
        registry
            .register(Trigger::new("t", Condition::Always, "p"))
            .unwrap();
        assert!(matches!(
            registry.register(Trigger::new("t", Condition::Always, "p")),
            Err(ContentError::DuplicateTrigger(_))
        ));
    }

    #[test]
    fn test_restore_fired_excludes_from_sweep() {
        let mut registry = TriggerRegistry::from_triggers([
            Trigger::new("a", Condition::flag("x"), "pa"),
            Trigger::new("b", Condition::flag("x"), "pb"),
        ])
        .unwrap();

        registry.restore_fired([TriggerId::new("a")]).unwrap();

        let mut store = StateStore::new();
        store.set_flag("x").unwrap();

        let fired = registry.sweep(&store);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, TriggerId::new("b"));
    }

    #[test]
    fn test_restore_unknown_trigger_rejected() {
        let mut registry =
            TriggerRegistry::from_triggers([Trigger::new("a", Condition::Always, "p")]).unwrap();
        assert!(matches!(
            registry.restore_fired([TriggerId::new("ghost")]),
            Err(LoadError::UnknownContent(_))
        ));
    }
}
