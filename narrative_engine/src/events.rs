//! Engine-to-presentation events.
//!
//! Presentation collaborators subscribe; they never poll. Dispatch is
//! synchronous and in registration order, inside the engine call that
//! caused the event.

use story_state::{Condition, LayerId, Mutation};

use crate::corruption::IntensityTier;
use crate::ending::EndingId;
use crate::trigger::TriggerId;

/// Everything the presentation layer can observe from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    FlagSet {
        id: String,
    },
    ItemAdded {
        id: String,
    },
    CounterChanged {
        name: String,
        value: f64,
    },
    CorruptionChanged {
        value: f64,
        tier: IntensityTier,
    },
    TriggerFired {
        id: TriggerId,
        payload: String,
    },
    TransitionEntered {
        layer: LayerId,
        visit_count: u32,
    },
    TransitionRejected {
        layer: LayerId,
        guard: Condition,
    },
    EndingResolved {
        ending: EndingId,
        priority: u32,
    },
}

impl EngineEvent {
    /// Map a store mutation to its presentation event.
    ///
    /// Layer visits and play time return `None`: visits surface as
    /// `TransitionEntered` (emitted by the session with full context) and
    /// play time is not presentation-facing.
    pub fn from_mutation(mutation: &Mutation) -> Option<EngineEvent> {
        match mutation {
            Mutation::FlagSet { id } => Some(EngineEvent::FlagSet { id: id.clone() }),
            Mutation::ItemAdded { id } => Some(EngineEvent::ItemAdded { id: id.clone() }),
            Mutation::CounterAdjusted { name, value, .. } => Some(EngineEvent::CounterChanged {
                name: name.clone(),
                value: *value,
            }),
            Mutation::CorruptionAdjusted { value, .. }
            | Mutation::CorruptionReset { value, .. } => Some(EngineEvent::CorruptionChanged {
                value: *value,
                tier: IntensityTier::from_scalar(*value),
            }),
            Mutation::LayerVisited { .. } | Mutation::PlayTimeAdded { .. } => None,
        }
    }
}

type Subscriber = Box<dyn FnMut(&EngineEvent)>;

/// Synchronous fan-out to registered subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Subscribers are invoked in registration
    /// order, synchronously, for every event.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&EngineEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Dispatch one event to every subscriber.
    pub fn emit(&mut self, event: &EngineEvent) {
        tracing::debug!(?event, "engine event");
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }
}
