//! The dialogue graph: guarded availability and traversal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use story_state::StateStore;

use super::{Edge, EdgeId, Node, NodeId, TraversalResult};
use crate::error::{ContentError, EngineError};

/// A directed graph of dialogue nodes.
///
/// The graph itself is stateless: it holds no cursor and no visited-node
/// history. Loop prevention, when a story wants it, is an ordinary
/// flag-guarded edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DialogueGraph {
    nodes: BTreeMap<NodeId, Node>,
}

impl DialogueGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from nodes, rejecting duplicate ids, duplicate edge
    /// ids within a node, and edges targeting missing nodes.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Result<Self, ContentError> {
        let mut graph = Self::new();
        for node in nodes {
            if graph.nodes.contains_key(&node.id) {
                return Err(ContentError::DuplicateNode(node.id));
            }
            graph.nodes.insert(node.id.clone(), node);
        }
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> Result<(), ContentError> {
        for node in self.nodes.values() {
            for (i, edge) in node.edges.iter().enumerate() {
                if node.edges[..i].iter().any(|e| e.id == edge.id) {
                    return Err(ContentError::DuplicateEdge {
                        node: node.id.clone(),
                        edge: edge.id.clone(),
                    });
                }
                if let super::EdgeTarget::Node(target) = &edge.target {
                    if !self.nodes.contains_key(target) {
                        return Err(ContentError::DanglingEdgeTarget {
                            node: node.id.clone(),
                            edge: edge.id.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The node's outgoing edges whose guards currently pass, in
    /// declaration order (first declared, first shown).
    pub fn available_edges<'a>(
        &'a self,
        node_id: &NodeId,
        store: &StateStore,
    ) -> Result<Vec<&'a Edge>, EngineError> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.clone()))?;
        Ok(node.edges.iter().filter(|e| e.available(store)).collect())
    }

    /// Traverse an edge: apply its side effects in declaration order, then
    /// return the target.
    ///
    /// Traversing an edge whose guard is currently false is a contract
    /// violation - callers must consult `available_edges` first.
    pub fn traverse(
        &self,
        node_id: &NodeId,
        edge_id: &EdgeId,
        store: &mut StateStore,
    ) -> Result<TraversalResult, EngineError> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.clone()))?;
        let edge = node
            .edges
            .iter()
            .find(|e| &e.id == edge_id)
            .ok_or_else(|| EngineError::UnknownEdge {
                node: node_id.clone(),
                edge: edge_id.clone(),
            })?;

        if !edge.available(store) {
            return Err(EngineError::EdgeUnavailable {
                edge: edge.id.clone(),
                guard: edge.guard.clone(),
            });
        }

        for effect in &edge.effects {
            effect.apply(store, &edge.id)?;
        }

        Ok(TraversalResult {
            edge: edge.id.clone(),
            next: edge.target.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::{EdgeTarget, SideEffect};
    use story_state::Condition;

    fn two_node_graph() -> DialogueGraph {
        DialogueGraph::from_nodes([
            Node::new("hub")
                .with_speaker("archivist")
                .with_edge(Edge::to_node("ask", "vault").with_prompt("Ask about the vault"))
                .with_edge(
                    Edge::to_node("press", "vault")
                        .with_guard(Condition::flag("metAllyA"))
                        .with_prompt("Press for details"),
                )
                .with_edge(Edge::to_end("leave")),
            Node::new("vault")
                .with_speaker("archivist")
                .with_edge(
                    Edge::to_end("take")
                        .with_effect(SideEffect::AddItem("vault_key".to_string()))
                        .with_effect(SideEffect::SetFlag("tookKey".to_string())),
                )
                .with_edge(Edge::to_node("back", "hub")),
        ])
        .unwrap()
    }

    #[test]
    fn test_available_edges_filters_and_keeps_order() {
        let graph = two_node_graph();
        let mut store = StateStore::new();
        let hub = NodeId::new("hub");

        let edges = graph.available_edges(&hub, &store).unwrap();
        let ids: Vec<_> = edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["ask", "leave"]);

        // Setting the flag reveals the guarded edge in its declared slot.
        store.set_flag("metAllyA").unwrap();
        let edges = graph.available_edges(&hub, &store).unwrap();
        let ids: Vec<_> = edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["ask", "press", "leave"]);
    }

    #[test]
    fn test_traverse_applies_effects_and_returns_target() {
        let graph = two_node_graph();
        let mut store = StateStore::new();

        let result = graph
            .traverse(&NodeId::new("hub"), &EdgeId::new("ask"), &mut store)
            .unwrap();
        assert_eq!(result.next, EdgeTarget::Node(NodeId::new("vault")));

        let result = graph
            .traverse(&NodeId::new("vault"), &EdgeId::new("take"), &mut store)
            .unwrap();
        assert_eq!(result.next, EdgeTarget::End);
        assert!(store.has_item("vault_key"));
        assert!(store.flag("tookKey"));
    }

    #[test]
    fn test_traverse_unavailable_edge_is_contract_violation() {
        let graph = two_node_graph();
        let mut store = StateStore::new();

        let err = graph
            .traverse(&NodeId::new("hub"), &EdgeId::new("press"), &mut store)
            .unwrap_err();
        assert!(matches!(err, EngineError::EdgeUnavailable { .. }));
        // No effects leaked.
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_cycles_are_permitted() {
        let graph = two_node_graph();
        let mut store = StateStore::new();

        for _ in 0..3 {
            graph
                .traverse(&NodeId::new("hub"), &EdgeId::new("ask"), &mut store)
                .unwrap();
            graph
                .traverse(&NodeId::new("vault"), &EdgeId::new("back"), &mut store)
                .unwrap();
        }
    }

    #[test]
    fn test_unknown_node_and_edge() {
        let graph = two_node_graph();
        let mut store = StateStore::new();

        assert!(matches!(
            graph.available_edges(&NodeId::new("nowhere"), &store),
            Err(EngineError::UnknownNode(_))
        ));
        assert!(matches!(
            graph.traverse(&NodeId::new("hub"), &EdgeId::new("nothing"), &mut store),
            Err(EngineError::UnknownEdge { .. })
        ));
    }

    #[test]
    fn test_dangling_target_rejected() {
        let result = DialogueGraph::from_nodes([
            Node::new("start").with_edge(Edge::to_node("go", "missing"))
        ]);
        assert!(matches!(
            result,
            Err(ContentError::DanglingEdgeTarget { .. })
        ));
    }

    #[test]
    fn test_duplicate_edge_rejected() {
        let result = DialogueGraph::from_nodes([Node::new("start")
            .with_edge(Edge::to_end("leave"))
            .with_edge(Edge::to_end("leave"))]);
        assert!(matches!(result, Err(ContentError::DuplicateEdge { .. })));
    }
}
