//! Dialogue/quest graph - nodes, guarded edges, and explicit side effects.
//!
//! Side effects are data, not callbacks: every branch of the story can be
//! inspected, serialized, and replayed without running presentation code.

mod graph;

pub use graph::*;

use serde::{Deserialize, Serialize};

use story_state::{Condition, StateStore};

use crate::error::EngineError;

/// Unique identifier for dialogue nodes. Author-assigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for edges within a node. Author-assigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single store mutation carried by an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    SetFlag(String),
    AddItem(String),
    AdjustCounter { name: String, delta: f64 },
    AdjustCorruption { delta: f64 },
    /// An explicit, journaled corruption reset (narrative "cleanse").
    ResetCorruption { value: f64 },
}

impl SideEffect {
    /// Apply this effect to the store.
    ///
    /// `origin` names the edge for journaled resets and vocabulary errors.
    pub fn apply(&self, store: &mut StateStore, origin: &EdgeId) -> Result<(), EngineError> {
        match self {
            SideEffect::SetFlag(id) => {
                store.set_flag(id)?;
            }
            SideEffect::AddItem(id) => {
                store.add_item(id);
            }
            SideEffect::AdjustCounter { name, delta } => {
                store.adjust_counter(name, *delta);
            }
            SideEffect::AdjustCorruption { delta } => {
                store.adjust_corruption(*delta)?;
            }
            SideEffect::ResetCorruption { value } => {
                store.reset_corruption(*value, origin.as_str());
            }
        }
        Ok(())
    }
}

/// Where an edge leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeTarget {
    /// Continue to another node (cycles are permitted).
    Node(NodeId),
    /// The conversation ends.
    End,
}

/// A guarded, side-effecting connection out of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,

    /// What the presentation layer shows for this choice. Opaque here.
    #[serde(default)]
    pub prompt: String,

    /// Availability guard; defaults to always-available.
    #[serde(default)]
    pub guard: Condition,

    pub target: EdgeTarget,

    /// Applied in declaration order on traversal.
    #[serde(default)]
    pub effects: Vec<SideEffect>,
}

impl Edge {
    /// Create an always-available edge with no effects.
    pub fn new(id: impl Into<String>, target: EdgeTarget) -> Self {
        Self {
            id: EdgeId::new(id),
            prompt: String::new(),
            guard: Condition::Always,
            target,
            effects: Vec::new(),
        }
    }

    /// Shorthand for an edge leading to another node.
    pub fn to_node(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(id, EdgeTarget::Node(NodeId::new(target)))
    }

    /// Shorthand for a conversation-ending edge.
    pub fn to_end(id: impl Into<String>) -> Self {
        Self::new(id, EdgeTarget::End)
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_guard(mut self, guard: Condition) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_effect(mut self, effect: SideEffect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Whether the guard currently passes.
    pub fn available(&self, store: &StateStore) -> bool {
        self.guard.eval(store)
    }
}

/// A dialogue node: a speaker and its ordered outgoing edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,

    /// Who owns/speaks this node. Opaque to the engine.
    #[serde(default)]
    pub speaker: String,

    /// Declaration order is the presentation order and the tie-break rule.
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(id),
            speaker: String::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = speaker.into();
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }
}

/// The outcome of a successful traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalResult {
    pub edge: EdgeId,
    pub next: EdgeTarget,
}
