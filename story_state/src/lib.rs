//! # Story State
//!
//! The "Ledger" crate - holds every accumulated player fact (flags, counters,
//! inventory, corruption, layer visits) and the pure condition language over
//! them. This crate is the single source of truth for narrative state and
//! contains no engine logic: what a flag unlocks lives in `narrative_engine`.

pub mod condition;
pub mod error;
pub mod layer;
pub mod store;

pub use condition::*;
pub use error::*;
pub use layer::*;
pub use store::*;
