//! Error types for state mutations and snapshot hydration.

use thiserror::Error;

/// Errors raised by the state store.
///
/// These are loud by design: every variant here signals either a contract
/// violation by the caller or a save document that cannot be trusted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    /// Corruption never decreases outside an explicit reset operation.
    #[error("corruption cannot decrease outside an explicit reset (current {current}, delta {delta})")]
    CorruptionDecay { current: f64, delta: f64 },

    /// The story declared a flag vocabulary and this flag is not in it.
    #[error("flag `{0}` is not part of the declared flag vocabulary")]
    UnknownFlag(String),

    /// A snapshot failed validation during hydration.
    #[error("snapshot is inconsistent: {0}")]
    CorruptSnapshot(String),
}
