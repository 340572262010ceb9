//! Engine error types.
//!
//! Three classes, kept deliberately separate: contract violations
//! ([`EngineError`]) fail loudly at the call site; guarded rejections are
//! *not* errors (see `TransitionOutcome::Rejected`); persistence problems
//! ([`LoadError`]) fail before any state is touched so a bad document can
//! never partially hydrate a session.

use thiserror::Error;

use story_state::{Condition, LayerId, StateError};

use crate::dialogue::{EdgeId, NodeId};

/// Contract violations: a desynchronized caller, not a playable outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("node `{0}` does not exist in the dialogue graph")]
    UnknownNode(NodeId),

    #[error("node `{node}` has no edge `{edge}`")]
    UnknownEdge { node: NodeId, edge: EdgeId },

    /// Traversing an unavailable edge means the caller skipped
    /// `available_edges`.
    #[error("edge `{edge}` is not available (guard: {guard})")]
    EdgeUnavailable { edge: EdgeId, guard: Condition },

    #[error("no dialogue node is active")]
    NoActiveNode,

    #[error("layer `{0}` is not declared in this story")]
    UnknownLayer(LayerId),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Persistence failures. All of these leave the running session untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("save document version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("malformed save document: {0}")]
    Malformed(String),

    #[error("save document references content this story does not declare: {0}")]
    UnknownContent(String),

    #[error("save document is internally inconsistent: {0}")]
    Corrupt(String),
}

/// Story content that fails structural validation at load time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContentError {
    #[error("failed to parse story content: {0}")]
    Parse(String),

    #[error("duplicate node id `{0}`")]
    DuplicateNode(NodeId),

    #[error("node `{node}` declares edge `{edge}` twice")]
    DuplicateEdge { node: NodeId, edge: EdgeId },

    #[error("edge `{edge}` on node `{node}` targets missing node `{target}`")]
    DanglingEdgeTarget {
        node: NodeId,
        edge: EdgeId,
        target: NodeId,
    },

    #[error("duplicate layer id `{0}`")]
    DuplicateLayer(LayerId),

    #[error("duplicate trigger id `{0}`")]
    DuplicateTrigger(String),

    #[error("layer `{layer}` declares an out-of-range corruption value {value}")]
    InvalidCorruptionValue { layer: LayerId, value: f64 },

    #[error("edge `{edge}` on node `{node}` adjusts corruption by a negative delta {delta}")]
    NegativeCorruptionDelta {
        node: NodeId,
        edge: EdgeId,
        delta: f64,
    },

    #[error("edge `{edge}` on node `{node}` resets corruption to out-of-range {value}")]
    InvalidResetValue {
        node: NodeId,
        edge: EdgeId,
        value: f64,
    },

    /// Only raised when the story declares a flag vocabulary.
    #[error("flag `{flag}` ({site}) is not in the declared vocabulary")]
    UndeclaredFlag { flag: String, site: String },

    /// The ending rule set must be total.
    #[error("ending rules have no always-true catch-all")]
    NoCatchAllEnding,

    #[error("duplicate ending id `{0}`")]
    DuplicateEnding(String),
}
