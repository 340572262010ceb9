//! State store - the single structure holding all accumulated player facts.
//!
//! The store holds data and invariants only; narrative meaning (what a flag
//! unlocks, what a visit costs) lives in the engine crate. Every mutator
//! pushes a journal entry synchronously before returning - the journal is
//! the subscriber channel the engine drains to drive trigger sweeps and
//! presentation events.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::StateError;
use crate::layer::LayerId;

/// A single recorded store mutation.
///
/// Mutations are recorded in the order they were applied, which is the
/// ordering guarantee replay depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    FlagSet { id: String },
    CounterAdjusted { name: String, delta: f64, value: f64 },
    CorruptionAdjusted { delta: f64, value: f64 },
    CorruptionReset { value: f64, reason: String },
    ItemAdded { id: String },
    LayerVisited { layer: LayerId, visit_count: u32 },
    PlayTimeAdded { seconds: f64 },
}

/// Deepest layer reached, by declared depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepestLayer {
    pub id: LayerId,
    pub depth: u32,
}

/// A plain-data image of the store, used for persistence and replay checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StoreSnapshot {
    pub flags: BTreeSet<String>,
    pub counters: BTreeMap<String, f64>,
    pub inventory: BTreeSet<String>,
    pub corruption: f64,
    pub layer_visits: BTreeMap<LayerId, u32>,
    pub deepest_layer: Option<DeepestLayer>,
    pub play_time_seconds: f64,
}

/// The source of truth for a session.
///
/// Collections are B-tree backed so iteration and serialization order are
/// stable, which keeps replay bit-for-bit deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateStore {
    flags: BTreeSet<String>,
    counters: BTreeMap<String, f64>,
    inventory: BTreeSet<String>,
    corruption: f64,
    layer_visits: BTreeMap<LayerId, u32>,
    deepest_layer: Option<DeepestLayer>,
    play_time_seconds: f64,

    /// Declared flag vocabulary; when present, setting an undeclared flag
    /// is an error. `None` means the story runs open.
    known_flags: Option<BTreeSet<String>>,

    /// Bumped on every effective mutation.
    revision: u64,

    /// Pending mutation records, drained by the engine after each batch.
    journal: Vec<Mutation>,
}

impl StateStore {
    /// Create a fresh, empty store with an open flag vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh store that only accepts the given flags.
    pub fn with_known_flags(flags: impl IntoIterator<Item = String>) -> Self {
        Self {
            known_flags: Some(flags.into_iter().collect()),
            ..Self::default()
        }
    }

    // --- flags ---

    /// Whether a flag has been set. Unknown flags read as false.
    pub fn flag(&self, id: &str) -> bool {
        self.flags.contains(id)
    }

    /// Set a flag. Idempotent: re-setting an already-set flag changes
    /// nothing, records nothing.
    pub fn set_flag(&mut self, id: &str) -> Result<bool, StateError> {
        if let Some(known) = &self.known_flags {
            if !known.contains(id) {
                return Err(StateError::UnknownFlag(id.to_string()));
            }
        }
        if self.flags.contains(id) {
            return Ok(false);
        }
        self.flags.insert(id.to_string());
        self.record(Mutation::FlagSet { id: id.to_string() });
        Ok(true)
    }

    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(|s| s.as_str())
    }

    // --- counters ---

    /// Current counter value; absent counters read as 0.
    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).copied().unwrap_or(0.0)
    }

    /// Adjust a counter by a delta. Counters are freely mutable.
    pub fn adjust_counter(&mut self, name: &str, delta: f64) {
        let value = self.counters.entry(name.to_string()).or_insert(0.0);
        *value += delta;
        let value = *value;
        self.record(Mutation::CounterAdjusted {
            name: name.to_string(),
            delta,
            value,
        });
    }

    // --- corruption ---

    pub fn corruption(&self) -> f64 {
        self.corruption
    }

    /// Raise corruption by a non-negative delta, clamped to 1.0.
    ///
    /// A negative delta is a contract violation: corruption only goes down
    /// through [`reset_corruption`](Self::reset_corruption).
    pub fn adjust_corruption(&mut self, delta: f64) -> Result<f64, StateError> {
        if delta < 0.0 {
            return Err(StateError::CorruptionDecay {
                current: self.corruption,
                delta,
            });
        }
        self.corruption = (self.corruption + delta).min(1.0);
        let value = self.corruption;
        self.record(Mutation::CorruptionAdjusted { delta, value });
        Ok(value)
    }

    /// Explicit, journaled corruption reset (a narrative "cleanse").
    ///
    /// This is the only path by which the scalar may go down.
    pub fn reset_corruption(&mut self, value: f64, reason: &str) {
        self.corruption = value.clamp(0.0, 1.0);
        let value = self.corruption;
        self.record(Mutation::CorruptionReset {
            value,
            reason: reason.to_string(),
        });
    }

    // --- inventory ---

    pub fn has_item(&self, id: &str) -> bool {
        self.inventory.contains(id)
    }

    /// Add an item/clue. Acquiring an already-held item is a no-op.
    pub fn add_item(&mut self, id: &str) -> bool {
        if self.inventory.contains(id) {
            return false;
        }
        self.inventory.insert(id.to_string());
        self.record(Mutation::ItemAdded { id: id.to_string() });
        true
    }

    pub fn inventory(&self) -> impl Iterator<Item = &str> {
        self.inventory.iter().map(|s| s.as_str())
    }

    // --- layers ---

    /// Visit count for a layer; never-visited layers read as 0.
    pub fn layer_visits(&self, layer: &LayerId) -> u32 {
        self.layer_visits.get(layer).copied().unwrap_or(0)
    }

    /// Record a visit to a layer, returning the new visit count.
    ///
    /// `deepest_layer` only moves downward (to strictly greater depth),
    /// never back up.
    pub fn record_layer_visit(&mut self, layer: &LayerId, depth: u32) -> u32 {
        let count = self.layer_visits.entry(layer.clone()).or_insert(0);
        *count += 1;
        let visit_count = *count;

        let deeper = match &self.deepest_layer {
            Some(current) => depth > current.depth,
            None => true,
        };
        if deeper {
            self.deepest_layer = Some(DeepestLayer {
                id: layer.clone(),
                depth,
            });
        }

        self.record(Mutation::LayerVisited {
            layer: layer.clone(),
            visit_count,
        });
        visit_count
    }

    pub fn deepest_layer(&self) -> Option<&DeepestLayer> {
        self.deepest_layer.as_ref()
    }

    // --- play time ---

    pub fn play_time_seconds(&self) -> f64 {
        self.play_time_seconds
    }

    /// Advance the session play-time counter.
    pub fn add_play_time(&mut self, seconds: f64) {
        self.play_time_seconds += seconds;
        self.record(Mutation::PlayTimeAdded { seconds });
    }

    // --- journal / revision ---

    /// Monotone revision counter; bumped once per effective mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Drain and return all pending mutation records in application order.
    pub fn drain_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.journal)
    }

    fn record(&mut self, mutation: Mutation) {
        self.revision += 1;
        self.journal.push(mutation);
    }

    // --- snapshots ---

    /// Capture a plain-data image of the store.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            flags: self.flags.clone(),
            counters: self.counters.clone(),
            inventory: self.inventory.clone(),
            corruption: self.corruption,
            layer_visits: self.layer_visits.clone(),
            deepest_layer: self.deepest_layer.clone(),
            play_time_seconds: self.play_time_seconds,
        }
    }

    /// Rebuild a store from a snapshot, validating invariants.
    ///
    /// Fails as a whole on the first inconsistency so a bad document can
    /// never partially hydrate.
    pub fn from_snapshot(
        snapshot: StoreSnapshot,
        known_flags: Option<BTreeSet<String>>,
    ) -> Result<Self, StateError> {
        if !(0.0..=1.0).contains(&snapshot.corruption) {
            return Err(StateError::CorruptSnapshot(format!(
                "corruption {} outside [0, 1]",
                snapshot.corruption
            )));
        }
        if snapshot.play_time_seconds < 0.0 {
            return Err(StateError::CorruptSnapshot(format!(
                "negative play time {}",
                snapshot.play_time_seconds
            )));
        }
        if let Some(known) = &known_flags {
            if let Some(unknown) = snapshot.flags.iter().find(|f| !known.contains(*f)) {
                return Err(StateError::CorruptSnapshot(format!(
                    "flag `{}` not in declared vocabulary",
                    unknown
                )));
            }
        }
        if let Some(deepest) = &snapshot.deepest_layer {
            if !snapshot.layer_visits.contains_key(&deepest.id) {
                return Err(StateError::CorruptSnapshot(format!(
                    "deepest layer `{}` has no visit record",
                    deepest.id
                )));
            }
        }

        Ok(Self {
            flags: snapshot.flags,
            counters: snapshot.counters,
            inventory: snapshot.inventory,
            corruption: snapshot.corruption,
            layer_visits: snapshot.layer_visits,
            deepest_layer: snapshot.deepest_layer,
            play_time_seconds: snapshot.play_time_seconds,
            known_flags,
            revision: 0,
            journal: Vec::new(),
        })
    }
}
