//! Transition state machine - guarded movement between narrative layers.
//!
//! A blocked transition is a playable outcome, not an error: it comes back
//! as a typed rejection carrying the failing guard so the presentation can
//! explain the block to the player.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use story_state::{Condition, LayerId, LayerProfile, StateStore};

use crate::corruption::CorruptionPropagator;
use crate::error::{ContentError, EngineError};

/// A layer as declared by content: its corruption profile plus the guard
/// that must pass to enter it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    #[serde(flatten)]
    pub profile: LayerProfile,

    /// Entry precondition; defaults to always-enterable.
    #[serde(default)]
    pub guard: Condition,
}

impl LayerSpec {
    pub fn new(profile: LayerProfile) -> Self {
        Self {
            profile,
            guard: Condition::Always,
        }
    }

    pub fn with_guard(mut self, guard: Condition) -> Self {
        self.guard = guard;
        self
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRejection {
    pub layer: LayerId,
    /// The guard that failed, for the presentation to render.
    pub guard: Condition,
}

/// Result of an attempted transition. Both arms are expected outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransitionOutcome {
    Entered {
        layer: LayerId,
        visit_count: u32,
        corruption: f64,
    },
    Rejected(TransitionRejection),
}

impl TransitionOutcome {
    pub fn entered(&self) -> bool {
        matches!(self, TransitionOutcome::Entered { .. })
    }
}

/// The set of layers and their entry guards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransitionMachine {
    layers: BTreeMap<LayerId, LayerSpec>,
}

impl TransitionMachine {
    /// Build the machine, rejecting duplicate layers and out-of-range
    /// corruption values.
    pub fn from_specs(specs: impl IntoIterator<Item = LayerSpec>) -> Result<Self, ContentError> {
        let mut layers = BTreeMap::new();
        for spec in specs {
            let id = spec.profile.id.clone();
            for value in [spec.profile.entry_cost, spec.profile.revisit_cost]
                .into_iter()
                .chain(spec.profile.revisit_floor)
            {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ContentError::InvalidCorruptionValue {
                        layer: id.clone(),
                        value,
                    });
                }
            }
            if layers.insert(id.clone(), spec).is_some() {
                return Err(ContentError::DuplicateLayer(id));
            }
        }
        Ok(Self { layers })
    }

    pub fn spec(&self, layer: &LayerId) -> Option<&LayerSpec> {
        self.layers.get(layer)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Whether a layer id is declared.
    pub fn knows(&self, layer: &LayerId) -> bool {
        self.layers.contains_key(layer)
    }

    /// Attempt to enter a layer.
    ///
    /// Guard failure is `Ok(Rejected)`. On success the visit counter is
    /// incremented, `deepest_layer_reached` raised if the target is deeper,
    /// and the corruption visit rule applied before control returns.
    pub fn attempt(
        &self,
        store: &mut StateStore,
        propagator: &CorruptionPropagator,
        layer: &LayerId,
    ) -> Result<TransitionOutcome, EngineError> {
        let spec = self
            .layers
            .get(layer)
            .ok_or_else(|| EngineError::UnknownLayer(layer.clone()))?;

        if !spec.guard.eval(store) {
            return Ok(TransitionOutcome::Rejected(TransitionRejection {
                layer: layer.clone(),
                guard: spec.guard.clone(),
            }));
        }

        let visit_count = store.record_layer_visit(layer, spec.profile.depth);
        let corruption = propagator.on_layer_visit(store, layer, visit_count)?;

        Ok(TransitionOutcome::Entered {
            layer: layer.clone(),
            visit_count,
            corruption,
        })
    }
}
