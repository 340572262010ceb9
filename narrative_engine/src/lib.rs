//! # Narrative Engine (Undertow)
//!
//! The flag-gated narrative state engine. This crate sits on top of
//! `story_state`, drives the branching dialogue/quest graph, propagates
//! corruption, reveals one-shot content through triggers, and resolves one
//! of several mutually exclusive endings.
//!
//! ## Core Components
//!
//! - **dialogue**: Nodes, guarded edges, and explicit side-effect lists
//! - **trigger**: One-shot watchers that reveal content when a condition first holds
//! - **corruption**: The single write gateway for the corruption scalar and its tiers
//! - **transition**: Guarded movement between narrative layers
//! - **ending**: Priority-ordered, total, never-downgrading ending resolution
//! - **persistence**: Versioned save documents
//! - **session**: The facade presentation code talks to
//! - **content**: TOML story authoring
//!
//! ## Design Philosophy
//!
//! - **State-Driven**: Everything reachable is a function of the store; side effects are data, not callbacks
//! - **Event-Driven**: Presentation subscribes to engine events, it never polls
//! - **Deterministic**: An identical call sequence replays to an identical store, fired-trigger set, and ending

pub mod content;
pub mod corruption;
pub mod dialogue;
pub mod ending;
pub mod error;
pub mod events;
pub mod persistence;
pub mod session;
pub mod transition;
pub mod trigger;

pub use content::*;
pub use corruption::*;
pub use dialogue::*;
pub use ending::*;
pub use error::*;
pub use events::*;
pub use persistence::*;
pub use session::*;
pub use transition::*;
pub use trigger::*;
