//! Session - the facade presentation code talks to.
//!
//! A session owns the store and the compiled story components, funnels
//! every mutation through one place, and after each mutation batch drains
//! the store journal, sweeps the trigger registry, and dispatches events
//! to subscribers. Presentation receives read-only views and events; it
//! never mutates state directly.

use std::collections::BTreeSet;
use uuid::Uuid;

use story_state::{LayerId, StateStore};

use crate::content::{CompiledStory, StoryContent};
use crate::corruption::{CorruptionPropagator, IntensityTier};
use crate::dialogue::{DialogueGraph, Edge, EdgeId, EdgeTarget, NodeId, TraversalResult};
use crate::ending::{EndingResolver, ResolvedEnding};
use crate::error::{ContentError, EngineError, LoadError};
use crate::events::{EngineEvent, EventBus};
use crate::persistence::{SaveDocument, SAVE_VERSION};
use crate::transition::{TransitionMachine, TransitionOutcome};
use crate::trigger::TriggerRegistry;

/// A running (or restored) play session.
pub struct Session {
    store: StateStore,
    graph: DialogueGraph,
    triggers: TriggerRegistry,
    propagator: CorruptionPropagator,
    transitions: TransitionMachine,
    resolver: EndingResolver,
    events: EventBus,

    session_id: Uuid,
    known_flags: Option<BTreeSet<String>>,
    current_node: Option<NodeId>,
    current_layer: Option<LayerId>,
    resolved: Option<ResolvedEnding>,
}

impl Session {
    /// Start a fresh session from story content.
    pub fn new(content: &StoryContent) -> Result<Self, ContentError> {
        let CompiledStory {
            graph,
            transitions,
            triggers,
            resolver,
        } = content.compile()?;

        let known_flags: Option<BTreeSet<String>> = content
            .known_flags
            .as_ref()
            .map(|flags| flags.iter().cloned().collect());
        let store = match &known_flags {
            Some(flags) => StateStore::with_known_flags(flags.iter().cloned()),
            None => StateStore::new(),
        };
        let propagator =
            CorruptionPropagator::new(content.layers.iter().map(|l| l.profile.clone()));

        Ok(Self {
            store,
            graph,
            triggers,
            propagator,
            transitions,
            resolver,
            events: EventBus::new(),
            session_id: Uuid::new_v4(),
            known_flags,
            current_node: None,
            current_layer: None,
            resolved: None,
        })
    }

    /// Register a presentation subscriber for engine events.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&EngineEvent) + 'static) {
        self.events.subscribe(subscriber);
    }

    // --- read-only views ---

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn corruption_tier(&self) -> IntensityTier {
        CorruptionPropagator::tier(&self.store)
    }

    pub fn current_node(&self) -> Option<&NodeId> {
        self.current_node.as_ref()
    }

    pub fn current_layer(&self) -> Option<&LayerId> {
        self.current_layer.as_ref()
    }

    pub fn resolved_ending(&self) -> Option<&ResolvedEnding> {
        self.resolved.as_ref()
    }

    // --- dialogue ---

    /// Enter a dialogue at the given node.
    pub fn begin_dialogue(&mut self, node: NodeId) -> Result<(), EngineError> {
        if self.graph.node(&node).is_none() {
            return Err(EngineError::UnknownNode(node));
        }
        tracing::debug!(node = %node, "dialogue begins");
        self.current_node = Some(node);
        Ok(())
    }

    /// The currently available choices, in declaration order.
    pub fn available_edges(&self) -> Result<Vec<&Edge>, EngineError> {
        let node = self.current_node.as_ref().ok_or(EngineError::NoActiveNode)?;
        self.graph.available_edges(node, &self.store)
    }

    /// Traverse an edge out of the active node, applying its side effects.
    pub fn attempt_traverse(&mut self, edge: &EdgeId) -> Result<TraversalResult, EngineError> {
        let node = self
            .current_node
            .clone()
            .ok_or(EngineError::NoActiveNode)?;
        let result = self.graph.traverse(&node, edge, &mut self.store)?;

        tracing::debug!(node = %node, edge = %edge, "edge traversed");
        self.current_node = match &result.next {
            EdgeTarget::Node(next) => Some(next.clone()),
            EdgeTarget::End => None,
        };

        self.after_mutation();
        Ok(result)
    }

    // --- transitions ---

    /// Attempt to move to a layer. A failed guard is a rejection outcome,
    /// not an error.
    pub fn attempt_transition(
        &mut self,
        layer: &LayerId,
    ) -> Result<TransitionOutcome, EngineError> {
        let outcome = self
            .transitions
            .attempt(&mut self.store, &self.propagator, layer)?;

        match &outcome {
            TransitionOutcome::Entered {
                layer, visit_count, ..
            } => {
                tracing::info!(layer = %layer, visit_count, "layer entered");
                self.current_layer = Some(layer.clone());
                let event = EngineEvent::TransitionEntered {
                    layer: layer.clone(),
                    visit_count: *visit_count,
                };
                self.after_mutation();
                self.events.emit(&event);
            }
            TransitionOutcome::Rejected(rejection) => {
                tracing::debug!(layer = %rejection.layer, guard = %rejection.guard, "transition rejected");
                self.events.emit(&EngineEvent::TransitionRejected {
                    layer: rejection.layer.clone(),
                    guard: rejection.guard.clone(),
                });
            }
        }
        Ok(outcome)
    }

    // --- direct mutations (non-dialogue state changes) ---

    /// Set a flag outside any dialogue, e.g. an open-world pickup.
    pub fn direct_set(&mut self, flag: &str) -> Result<(), EngineError> {
        self.store.set_flag(flag)?;
        self.after_mutation();
        Ok(())
    }

    /// Add an inventory item outside any dialogue.
    pub fn direct_add_item(&mut self, item: &str) {
        self.store.add_item(item);
        self.after_mutation();
    }

    /// Adjust a counter outside any dialogue.
    pub fn direct_adjust_counter(&mut self, name: &str, delta: f64) {
        self.store.adjust_counter(name, delta);
        self.after_mutation();
    }

    /// Explicit narrative corruption reset ("cleanse").
    pub fn cleanse(&mut self, value: f64, reason: &str) {
        tracing::info!(value, reason, "corruption reset");
        self.store.reset_corruption(value, reason);
        self.after_mutation();
    }

    /// Advance the session play-time counter.
    pub fn add_play_time(&mut self, seconds: f64) {
        self.store.add_play_time(seconds);
        self.after_mutation();
    }

    // --- endings ---

    /// Resolve the ending at a terminal point.
    ///
    /// Idempotent and repeatable: a later call replaces the stored ending
    /// only with one of strictly higher priority.
    pub fn resolve_ending(&mut self) -> ResolvedEnding {
        let candidate = self.resolver.resolve(&self.store);
        if EndingResolver::upgrades(self.resolved.as_ref(), &candidate) {
            tracing::info!(ending = %candidate.ending, priority = candidate.priority, "ending resolved");
            self.events.emit(&EngineEvent::EndingResolved {
                ending: candidate.ending.clone(),
                priority: candidate.priority,
            });
            self.resolved = Some(candidate);
        }
        self.resolved
            .clone()
            .unwrap_or_else(|| unreachable!("resolve always stores an ending"))
    }

    // --- persistence ---

    /// Capture the session as a versioned save document.
    pub fn request_save(&self) -> SaveDocument {
        SaveDocument {
            version: SAVE_VERSION,
            session_id: self.session_id,
            store: self.store.snapshot(),
            fired_triggers: self.triggers.fired().clone(),
            ending: self.resolved.clone(),
        }
    }

    /// Rehydrate the session from a save document.
    ///
    /// The replacement state is built and validated in full before any
    /// field is touched, so a bad document leaves the session as it was.
    pub fn request_load(&mut self, doc: SaveDocument) -> Result<(), LoadError> {
        if doc.version > SAVE_VERSION {
            return Err(LoadError::UnsupportedVersion {
                found: doc.version,
                supported: SAVE_VERSION,
            });
        }

        for layer in doc.store.layer_visits.keys() {
            if !self.transitions.knows(layer) {
                return Err(LoadError::UnknownContent(format!("layer `{}`", layer)));
            }
        }

        let store = StateStore::from_snapshot(doc.store, self.known_flags.clone())
            .map_err(|e| LoadError::Corrupt(e.to_string()))?;

        let mut triggers = self.triggers.clone();
        triggers.restore_fired(doc.fired_triggers)?;

        if let Some(ending) = &doc.ending {
            match self.resolver.rule_for(&ending.ending) {
                None => {
                    return Err(LoadError::UnknownContent(format!(
                        "ending `{}`",
                        ending.ending
                    )))
                }
                Some(rule) if rule.priority != ending.priority => {
                    return Err(LoadError::Corrupt(format!(
                        "ending `{}` saved with priority {}, declared {}",
                        ending.ending, ending.priority, rule.priority
                    )))
                }
                Some(_) => {}
            }
        }

        tracing::info!(session = %doc.session_id, "session restored");
        self.store = store;
        self.triggers = triggers;
        self.session_id = doc.session_id;
        self.resolved = doc.ending;
        self.current_node = None;
        self.current_layer = None;
        Ok(())
    }

    /// Discard all session state and start over.
    pub fn reset(&mut self) {
        self.store = match &self.known_flags {
            Some(flags) => StateStore::with_known_flags(flags.iter().cloned()),
            None => StateStore::new(),
        };
        self.triggers
            .restore_fired(std::iter::empty())
            .unwrap_or_else(|_| unreachable!("empty fired set always restores"));
        self.session_id = Uuid::new_v4();
        self.current_node = None;
        self.current_layer = None;
        self.resolved = None;
    }

    /// Load a JSON save, falling back to a clean fresh session when the
    /// document is malformed or inconsistent.
    ///
    /// A document of a *newer version* is not a fallback case - that is an
    /// integration error and propagates. Returns whether the save was
    /// restored.
    pub fn restore_or_fresh(&mut self, json: &str) -> Result<bool, LoadError> {
        let result = SaveDocument::from_json(json).and_then(|doc| self.request_load(doc));
        match result {
            Ok(()) => Ok(true),
            Err(err @ LoadError::UnsupportedVersion { .. }) => Err(err),
            Err(err) => {
                tracing::warn!(%err, "save document rejected, starting fresh");
                self.reset();
                Ok(false)
            }
        }
    }

    // --- internals ---

    /// Drain the mutation journal, publish its events, then sweep triggers.
    ///
    /// Trigger payloads are data only, so a sweep can never cause further
    /// mutations; one pass per batch suffices.
    fn after_mutation(&mut self) {
        for mutation in self.store.drain_mutations() {
            if let Some(event) = EngineEvent::from_mutation(&mutation) {
                self.events.emit(&event);
            }
        }

        for trigger in self.triggers.sweep(&self.store) {
            tracing::info!(trigger = %trigger.id, payload = %trigger.payload, "trigger fired");
            self.events.emit(&EngineEvent::TriggerFired {
                id: trigger.id,
                payload: trigger.payload,
            });
        }
    }
}
