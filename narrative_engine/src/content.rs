//! Story content - the TOML authoring format.
//!
//! A whole story (dialogue graph, layers, triggers, ending rules, flag
//! vocabulary) is one declarative document. Parsing and structural
//! validation happen before a session exists, so a running session can
//! assume its content is internally consistent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use story_state::Condition;

use crate::dialogue::{DialogueGraph, Node, SideEffect};
use crate::ending::{EndingResolver, EndingRule};
use crate::error::ContentError;
use crate::transition::{LayerSpec, TransitionMachine};
use crate::trigger::{Trigger, TriggerRegistry};

/// A complete story definition as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StoryContent {
    #[serde(default)]
    pub title: String,

    /// Optional flag vocabulary. When declared, setting any flag outside
    /// it is a contract violation; when omitted, the story runs open.
    #[serde(default)]
    pub known_flags: Option<Vec<String>>,

    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub layers: Vec<LayerSpec>,

    #[serde(default)]
    pub triggers: Vec<Trigger>,

    #[serde(default)]
    pub endings: Vec<EndingRule>,
}

impl StoryContent {
    /// Parse a story from TOML. Structural validation is deferred to
    /// [`compile`](Self::compile).
    pub fn from_toml_str(toml: &str) -> Result<Self, ContentError> {
        toml::from_str(toml).map_err(|e| ContentError::Parse(e.to_string()))
    }

    /// Validate and build the engine components this story defines.
    pub fn compile(&self) -> Result<CompiledStory, ContentError> {
        let graph = DialogueGraph::from_nodes(self.nodes.iter().cloned())?;
        let transitions = TransitionMachine::from_specs(self.layers.iter().cloned())?;
        let triggers = TriggerRegistry::from_triggers(self.triggers.iter().cloned())?;
        let resolver = EndingResolver::from_rules(self.endings.iter().cloned())?;
        self.validate_effects()?;
        self.validate_flag_references()?;

        Ok(CompiledStory {
            graph,
            transitions,
            triggers,
            resolver,
        })
    }

    /// Reject effect payloads that would error mid-traversal: a traversal
    /// applies effects in order, so a bad payload discovered at runtime
    /// would leave earlier effects already journaled.
    fn validate_effects(&self) -> Result<(), ContentError> {
        let vocabulary = self.vocabulary();
        for node in &self.nodes {
            for edge in &node.edges {
                for effect in &edge.effects {
                    match effect {
                        SideEffect::AdjustCorruption { delta } if *delta < 0.0 => {
                            return Err(ContentError::NegativeCorruptionDelta {
                                node: node.id.clone(),
                                edge: edge.id.clone(),
                                delta: *delta,
                            });
                        }
                        SideEffect::ResetCorruption { value }
                            if !(0.0..=1.0).contains(value) =>
                        {
                            return Err(ContentError::InvalidResetValue {
                                node: node.id.clone(),
                                edge: edge.id.clone(),
                                value: *value,
                            });
                        }
                        SideEffect::SetFlag(flag) => {
                            check_flag(&vocabulary, flag, || {
                                format!("set by edge `{}` on node `{}`", edge.id, node.id)
                            })?;
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// With a declared vocabulary, a condition on an undeclared flag can
    /// never become true - an authoring mistake, caught here.
    fn validate_flag_references(&self) -> Result<(), ContentError> {
        let vocabulary = self.vocabulary();
        if vocabulary.is_none() {
            return Ok(());
        }

        for node in &self.nodes {
            for edge in &node.edges {
                check_condition(&vocabulary, &edge.guard, || {
                    format!("guard of edge `{}` on node `{}`", edge.id, node.id)
                })?;
            }
        }
        for layer in &self.layers {
            check_condition(&vocabulary, &layer.guard, || {
                format!("guard of layer `{}`", layer.profile.id)
            })?;
        }
        for trigger in &self.triggers {
            check_condition(&vocabulary, &trigger.condition, || {
                format!("condition of trigger `{}`", trigger.id)
            })?;
        }
        for rule in &self.endings {
            check_condition(&vocabulary, &rule.predicate, || {
                format!("predicate of ending `{}`", rule.ending)
            })?;
        }
        Ok(())
    }

    fn vocabulary(&self) -> Option<BTreeSet<&str>> {
        self.known_flags
            .as_ref()
            .map(|flags| flags.iter().map(|f| f.as_str()).collect())
    }
}

fn check_flag(
    vocabulary: &Option<BTreeSet<&str>>,
    flag: &str,
    site: impl Fn() -> String,
) -> Result<(), ContentError> {
    if let Some(known) = vocabulary {
        if !known.contains(flag) {
            return Err(ContentError::UndeclaredFlag {
                flag: flag.to_string(),
                site: site(),
            });
        }
    }
    Ok(())
}

fn check_condition(
    vocabulary: &Option<BTreeSet<&str>>,
    condition: &Condition,
    site: impl Fn() -> String,
) -> Result<(), ContentError> {
    for flag in condition.referenced_flags() {
        check_flag(vocabulary, flag, &site)?;
    }
    Ok(())
}

/// The validated engine components compiled from a story.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStory {
    pub graph: DialogueGraph,
    pub transitions: TransitionMachine,
    pub triggers: TriggerRegistry,
    pub resolver: EndingResolver,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::{Edge, NodeId};
    use story_state::LayerId;

    const STORY: &str = r#"
title = "The House Below"
known_flags = ["metAllyA", "foundArchiveDoor", "leftTheHouse", "tookKey"]

[[nodes]]
id = "hub"
speaker = "archivist"

[[nodes.edges]]
id = "ask"
prompt = "Ask about the vault"
target = { node = "vault" }

[[nodes.edges]]
id = "press"
prompt = "Press for details"
guard = { flag = "metAllyA" }
target = { node = "vault" }
effects = [{ adjust_counter = { name = "trust", delta = 1.0 } }]

[[nodes.edges]]
id = "leave"
target = "end"

[[nodes]]
id = "vault"
speaker = "archivist"

[[nodes.edges]]
id = "take"
target = "end"
effects = [{ set_flag = "tookKey" }, { add_item = "vault_key" }]

[[layers]]
id = "surface"
depth = 0

[[layers]]
id = "basement"
depth = 3
entry_cost = 0.3
revisit_cost = 0.05
revisit_floor = 0.9
guard = { item = "vault_key" }

[[triggers]]
id = "mail_from_ally"
condition = { flag = "metAllyA" }
payload = "inbox/ally_01"

[[endings]]
priority = 10
ending = "escaped"
predicate = { flag = "leftTheHouse" }

[[endings]]
priority = 0
ending = "consumed"
predicate = "always"
"#;

    #[test]
    fn test_full_story_parses_and_compiles() {
        let content = StoryContent::from_toml_str(STORY).unwrap();
        assert_eq!(content.title, "The House Below");
        assert_eq!(content.nodes.len(), 2);
        assert_eq!(content.layers.len(), 2);

        let compiled = content.compile().unwrap();
        assert_eq!(compiled.graph.node_count(), 2);
        assert_eq!(compiled.transitions.layer_count(), 2);
        assert!(compiled
            .transitions
            .spec(&LayerId::new("basement"))
            .unwrap()
            .profile
            .revisit_floor
            .is_some());

        let hub = compiled.graph.node(&NodeId::new("hub")).unwrap();
        assert_eq!(hub.edges.len(), 3);
        assert_eq!(hub.edges[1].effects.len(), 1);
    }

    #[test]
    fn test_unparseable_toml() {
        assert!(matches!(
            StoryContent::from_toml_str("nodes = 3"),
            Err(ContentError::Parse(_))
        ));
    }

    #[test]
    fn test_compile_catches_dangling_target() {
        let toml = r#"
[[nodes]]
id = "start"

[[nodes.edges]]
id = "go"
target = { node = "missing" }

[[endings]]
priority = 0
ending = "default"
predicate = "always"
"#;
        let content = StoryContent::from_toml_str(toml).unwrap();
        assert!(matches!(
            content.compile(),
            Err(ContentError::DanglingEdgeTarget { .. })
        ));
    }

    #[test]
    fn test_compile_rejects_negative_corruption_effect() {
        let content = StoryContent {
            nodes: vec![Node::new("hub").with_edge(
                Edge::to_end("soothe")
                    .with_effect(SideEffect::SetFlag("metAllyA".to_string()))
                    .with_effect(SideEffect::AdjustCorruption { delta: -0.1 }),
            )],
            endings: vec![EndingRule::catch_all("consumed")],
            ..StoryContent::default()
        };

        assert!(matches!(
            content.compile(),
            Err(ContentError::NegativeCorruptionDelta { delta, .. }) if delta == -0.1
        ));
    }

    #[test]
    fn test_compile_rejects_out_of_range_reset() {
        let content = StoryContent {
            nodes: vec![Node::new("hub").with_edge(
                Edge::to_end("cleanse")
                    .with_effect(SideEffect::ResetCorruption { value: 1.5 }),
            )],
            endings: vec![EndingRule::catch_all("consumed")],
            ..StoryContent::default()
        };

        assert!(matches!(
            content.compile(),
            Err(ContentError::InvalidResetValue { value, .. }) if value == 1.5
        ));
    }

    #[test]
    fn test_compile_rejects_set_flag_outside_vocabulary() {
        let content = StoryContent {
            known_flags: Some(vec!["metAllyA".to_string()]),
            nodes: vec![Node::new("hub").with_edge(
                Edge::to_end("confide")
                    .with_effect(SideEffect::SetFlag("notDeclared".to_string())),
            )],
            endings: vec![EndingRule::catch_all("consumed")],
            ..StoryContent::default()
        };

        assert!(matches!(
            content.compile(),
            Err(ContentError::UndeclaredFlag { flag, .. }) if flag == "notDeclared"
        ));
    }

    #[test]
    fn test_compile_rejects_guard_on_undeclared_flag() {
        let content = StoryContent {
            known_flags: Some(vec!["metAllyA".to_string()]),
            nodes: vec![Node::new("hub").with_edge(
                Edge::to_end("press").with_guard(Condition::flag("ghostFlag")),
            )],
            endings: vec![EndingRule::catch_all("consumed")],
            ..StoryContent::default()
        };

        assert!(matches!(
            content.compile(),
            Err(ContentError::UndeclaredFlag { flag, site }) if flag == "ghostFlag"
                && site.contains("edge `press`")
        ));
    }

    #[test]
    fn test_open_vocabulary_skips_flag_checks() {
        let content = StoryContent {
            known_flags: None,
            nodes: vec![Node::new("hub").with_edge(
                Edge::to_end("confide")
                    .with_guard(Condition::flag("anything"))
                    .with_effect(SideEffect::SetFlag("anythingElse".to_string())),
            )],
            endings: vec![EndingRule::catch_all("consumed")],
            ..StoryContent::default()
        };

        assert!(content.compile().is_ok());
    }

    #[test]
    fn test_compile_requires_catch_all_ending() {
        let toml = r#"
[[endings]]
priority = 10
ending = "escaped"
predicate = { flag = "leftTheHouse" }
"#;
        let content = StoryContent::from_toml_str(toml).unwrap();
        assert!(matches!(
            content.compile(),
            Err(ContentError::NoCatchAllEnding)
        ));
    }
}
