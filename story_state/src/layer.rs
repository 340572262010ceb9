//! Layer definitions - discrete narrative locations with a depth ordering.

use serde::{Deserialize, Serialize};

/// Unique identifier for layers (narrative locations/depth levels).
///
/// Layer ids are assigned by content authors, so they are plain strings
/// rather than generated uuids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How visiting a layer feeds the corruption scalar.
///
/// `depth` gives the partial order used for `deepest_layer_reached`; the
/// costs are corruption deltas applied on entry, and `revisit_floor` is the
/// per-layer minimum the scalar is raised to on second and later visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerProfile {
    pub id: LayerId,

    /// Position in the depth ordering; higher is deeper.
    pub depth: u32,

    /// Corruption delta applied on the first visit.
    #[serde(default)]
    pub entry_cost: f64,

    /// Corruption delta applied on every later visit.
    #[serde(default)]
    pub revisit_cost: f64,

    /// Minimum corruption after a repeat visit, if declared.
    #[serde(default)]
    pub revisit_floor: Option<f64>,
}

impl LayerProfile {
    /// Create a profile with zero costs and no floor.
    pub fn new(id: impl Into<String>, depth: u32) -> Self {
        Self {
            id: LayerId::new(id),
            depth,
            entry_cost: 0.0,
            revisit_cost: 0.0,
            revisit_floor: None,
        }
    }

    /// Set the first-visit corruption cost.
    pub fn with_entry_cost(mut self, cost: f64) -> Self {
        self.entry_cost = cost;
        self
    }

    /// Set the repeat-visit corruption cost.
    pub fn with_revisit_cost(mut self, cost: f64) -> Self {
        self.revisit_cost = cost;
        self
    }

    /// Set the repeat-visit corruption floor.
    pub fn with_revisit_floor(mut self, floor: f64) -> Self {
        self.revisit_floor = Some(floor);
        self
    }
}
