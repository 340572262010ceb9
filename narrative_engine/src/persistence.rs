//! Versioned save documents.
//!
//! The version gate runs before the full parse: a document written by a
//! newer engine is rejected outright instead of being half-understood, and
//! a malformed document never yields a partially hydrated session.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use story_state::StoreSnapshot;

use crate::ending::ResolvedEnding;
use crate::error::LoadError;
use crate::trigger::TriggerId;

/// Newest document version this engine can load.
pub const SAVE_VERSION: u32 = 1;

/// The complete persisted image of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveDocument {
    pub version: u32,
    pub session_id: Uuid,
    pub store: StoreSnapshot,
    pub fired_triggers: BTreeSet<TriggerId>,
    pub ending: Option<ResolvedEnding>,
}

/// Minimal probe so the version gate works even when the rest of the
/// document doesn't parse under this engine's schema.
#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl SaveDocument {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, LoadError> {
        serde_json::to_string_pretty(self).map_err(|e| LoadError::Malformed(e.to_string()))
    }

    /// Parse from JSON, enforcing the version gate first.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let probe: VersionProbe =
            serde_json::from_str(json).map_err(|e| LoadError::Malformed(e.to_string()))?;
        if probe.version > SAVE_VERSION {
            return Err(LoadError::UnsupportedVersion {
                found: probe.version,
                supported: SAVE_VERSION,
            });
        }
        serde_json::from_str(json).map_err(|e| LoadError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_state::{LayerId, StateStore};

    fn sample_document() -> SaveDocument {
        let mut store = StateStore::new();
        store.set_flag("metAllyA").unwrap();
        store.adjust_counter("days", 4.0);
        store.add_item("zip_password");
        store.adjust_corruption(0.42).unwrap();
        store.record_layer_visit(&LayerId::new("basement"), 3);
        store.add_play_time(321.5);

        SaveDocument {
            version: SAVE_VERSION,
            session_id: Uuid::new_v4(),
            store: store.snapshot(),
            fired_triggers: [TriggerId::new("mail_from_ally")].into_iter().collect(),
            ending: Some(ResolvedEnding {
                ending: crate::ending::EndingId::new("escaped"),
                priority: 10,
            }),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let doc = sample_document();
        let json = doc.to_json().unwrap();
        let back = SaveDocument::from_json(&json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut doc = sample_document();
        doc.version = SAVE_VERSION + 1;
        let json = doc.to_json().unwrap();

        assert_eq!(
            SaveDocument::from_json(&json),
            Err(LoadError::UnsupportedVersion {
                found: SAVE_VERSION + 1,
                supported: SAVE_VERSION,
            })
        );
    }

    #[test]
    fn test_malformed_document_rejected() {
        assert!(matches!(
            SaveDocument::from_json("not json at all"),
            Err(LoadError::Malformed(_))
        ));
        assert!(matches!(
            SaveDocument::from_json(r#"{"version": 1}"#),
            Err(LoadError::Malformed(_))
        ));
    }
}
