//! Corruption propagator - the single gateway for corruption writes.
//!
//! Presentation collaborators read the scalar and its discretized tier;
//! every write funnels through the propagator (or an explicit edge side
//! effect) so the monotonicity rule stays auditable in one place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use story_state::{LayerId, LayerProfile, StateStore};

use crate::error::EngineError;

/// Tier thresholds over the corruption scalar. A tier starts at its floor
/// and runs to the next one.
pub const LOW_TIER_FLOOR: f64 = 0.10;
pub const MEDIUM_TIER_FLOOR: f64 = 0.35;
pub const HIGH_TIER_FLOOR: f64 = 0.60;
pub const CRITICAL_TIER_FLOOR: f64 = 0.85;

/// Discretized corruption intensity consumed by presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityTier {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl IntensityTier {
    /// Pure step function from scalar to tier.
    pub fn from_scalar(corruption: f64) -> Self {
        if corruption >= CRITICAL_TIER_FLOOR {
            IntensityTier::Critical
        } else if corruption >= HIGH_TIER_FLOOR {
            IntensityTier::High
        } else if corruption >= MEDIUM_TIER_FLOOR {
            IntensityTier::Medium
        } else if corruption >= LOW_TIER_FLOOR {
            IntensityTier::Low
        } else {
            IntensityTier::None
        }
    }
}

impl std::fmt::Display for IntensityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IntensityTier::None => "none",
            IntensityTier::Low => "low",
            IntensityTier::Medium => "medium",
            IntensityTier::High => "high",
            IntensityTier::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// Applies per-layer corruption rules on visits.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CorruptionPropagator {
    profiles: BTreeMap<LayerId, LayerProfile>,
}

impl CorruptionPropagator {
    pub fn new(profiles: impl IntoIterator<Item = LayerProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
        }
    }

    pub fn profile(&self, layer: &LayerId) -> Option<&LayerProfile> {
        self.profiles.get(layer)
    }

    /// Current intensity tier for a store.
    pub fn tier(store: &StateStore) -> IntensityTier {
        IntensityTier::from_scalar(store.corruption())
    }

    /// Apply the corruption rule for entering a layer.
    ///
    /// First visit applies `entry_cost`; later visits apply `revisit_cost`,
    /// then raise the scalar to the layer's `revisit_floor` if one is
    /// declared and not yet reached. You can't undo what you've already
    /// seen: the floor only ever raises, never lowers.
    pub fn on_layer_visit(
        &self,
        store: &mut StateStore,
        layer: &LayerId,
        visit_count: u32,
    ) -> Result<f64, EngineError> {
        let profile = self
            .profiles
            .get(layer)
            .ok_or_else(|| EngineError::UnknownLayer(layer.clone()))?;

        let cost = if visit_count <= 1 {
            profile.entry_cost
        } else {
            profile.revisit_cost
        };
        if cost > 0.0 {
            store.adjust_corruption(cost)?;
        }

        if visit_count >= 2 {
            if let Some(floor) = profile.revisit_floor {
                let shortfall = floor - store.corruption();
                if shortfall > 0.0 {
                    store.adjust_corruption(shortfall)?;
                }
            }
        }

        Ok(store.corruption())
    }
}
