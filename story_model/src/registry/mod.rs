//! Node registry - indexed storage for every node in the narrative graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::ModelError;
use crate::nodes::{AttractorTag, Character, LifecycleState, NodeId, NodeState};
use crate::reader_path::ReaderPath;
use crate::rules::TransformationRule;

/// The node registry.
///
/// Stores node states and maintains reverse indexes by character and attractor.
/// Every change to attached rules bumps `rules_version` so callers holding memoized
/// condition results know to drop them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, NodeState>,

    /// Index: attractor -> nodes carrying it.
    attractor_index: HashMap<AttractorTag, BTreeSet<NodeId>>,

    /// Index: character -> nodes narrated by it.
    character_index: HashMap<Character, BTreeSet<NodeId>>,

    rules_version: u64,
}

impl NodeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node. Returns its id.
    pub fn insert(&mut self, node: NodeState) -> NodeId {
        let id = node.id.clone();
        if self.nodes.contains_key(&id) {
            self.unindex(&id);
        }

        for tag in &node.attractors {
            self.attractor_index
                .entry(tag.clone())
                .or_default()
                .insert(id.clone());
        }
        self.character_index
            .entry(node.character)
            .or_default()
            .insert(id.clone());

        if !node.rules.is_empty() {
            self.rules_version += 1;
        }
        self.nodes.insert(id.clone(), node);
        id
    }

    /// Remove a node from the registry.
    pub fn remove(&mut self, id: &NodeId) -> Option<NodeState> {
        self.unindex(id);
        let removed = self.nodes.remove(id);
        if removed.as_ref().is_some_and(|n| !n.rules.is_empty()) {
            self.rules_version += 1;
        }
        removed
    }

    fn unindex(&mut self, id: &NodeId) {
        for ids in self.attractor_index.values_mut() {
            ids.remove(id);
        }
        for ids in self.character_index.values_mut() {
            ids.remove(id);
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&NodeState> {
        self.nodes.get(id)
    }

    /// Mutable access to a node. The caller may touch its rules, so this counts as a
    /// rule change and bumps `rules_version`.
    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut NodeState> {
        let node = self.nodes.get_mut(id)?;
        self.rules_version += 1;
        Some(node)
    }

    /// Look up a node, failing with `UnknownNode`.
    pub fn require(&self, id: &NodeId) -> Result<&NodeState, ModelError> {
        self.nodes
            .get(id)
            .ok_or_else(|| ModelError::UnknownNode(id.clone()))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &NodeState> {
        self.nodes.values()
    }

    /// Nodes carrying an attractor, in id order.
    pub fn nodes_with_attractor(&self, tag: &AttractorTag) -> Vec<&NodeState> {
        self.attractor_index
            .get(tag)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    /// Nodes narrated by a character, in id order.
    pub fn nodes_for_character(&self, character: Character) -> Vec<&NodeState> {
        self.character_index
            .get(&character)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    /// Every attractor tag known to the registry, sorted.
    pub fn all_attractors(&self) -> BTreeSet<&AttractorTag> {
        self.attractor_index
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(tag, _)| tag)
            .collect()
    }

    /// Count a visit to `id` and append it to `path`.
    pub fn record_visit(
        &mut self,
        id: &NodeId,
        path: &mut ReaderPath,
    ) -> Result<LifecycleState, ModelError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| ModelError::UnknownNode(id.clone()))?;
        let state = node.record_visit();
        path.record_visit(node);
        Ok(state)
    }

    /// Replace the displayed text of a node (variant re-selection).
    pub fn set_current_content(
        &mut self,
        id: &NodeId,
        content: impl Into<String>,
    ) -> Result<(), ModelError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| ModelError::UnknownNode(id.clone()))?;
        node.current_content = content.into();
        Ok(())
    }

    /// Attach a rule to a node.
    pub fn add_rule(&mut self, id: &NodeId, rule: TransformationRule) -> Result<(), ModelError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| ModelError::UnknownNode(id.clone()))?;
        node.rules.push(rule);
        self.rules_version += 1;
        Ok(())
    }

    /// Drop every rule attached to a node.
    pub fn clear_rules(&mut self, id: &NodeId) -> Result<(), ModelError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| ModelError::UnknownNode(id.clone()))?;
        node.rules.clear();
        self.rules_version += 1;
        Ok(())
    }

    /// Swap a node's whole rule set.
    pub fn replace_rules(
        &mut self,
        id: &NodeId,
        rules: Vec<TransformationRule>,
    ) -> Result<Vec<TransformationRule>, ModelError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| ModelError::UnknownNode(id.clone()))?;
        let previous = std::mem::replace(&mut node.rules, rules);
        self.rules_version += 1;
        Ok(previous)
    }

    /// Incremented on every rule-set change.
    pub fn rules_version(&self) -> u64 {
        self.rules_version
    }
}
