//! Reader path - the append-only record of a reader's journey through the graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ModelError;
use crate::nodes::{AttractorTag, Character, NodeId, NodeState, TemporalBucket};

/// One entry of the detailed visit log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisitRecord {
    pub node_id: NodeId,
    pub character: Character,
    pub temporal_value: u8,
    pub temporal_bucket: TemporalBucket,
    /// Attractors engaged by this visit.
    pub attractors: Vec<AttractorTag>,
    /// Position of this visit in the sequence.
    pub sequence_index: usize,
}

/// Everything recorded about a reader's navigation so far.
///
/// All maps are ordered so that snapshots hash and serialize deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ReaderPath {
    /// Visited node ids in order, duplicates allowed.
    pub sequence: Vec<NodeId>,

    /// Visits beyond the first, per node.
    pub revisit_counts: BTreeMap<NodeId, u32>,

    /// Detailed visit log.
    pub visits: Vec<VisitRecord>,

    pub character_visits: BTreeMap<Character, u32>,

    pub temporal_visits: BTreeMap<TemporalBucket, u32>,

    /// Cumulative engagement per attractor.
    pub attractor_engagements: BTreeMap<AttractorTag, u32>,

    /// Named orientations -> progress 0-100.
    pub endpoint_progress: BTreeMap<String, u8>,
}

impl ReaderPath {
    /// Create a new empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a visit to `node`, updating every counter.
    pub fn record_visit(&mut self, node: &NodeState) {
        if self.sequence.contains(&node.id) {
            *self.revisit_counts.entry(node.id.clone()).or_default() += 1;
        }

        let bucket = node.temporal_bucket();
        let attractors: Vec<AttractorTag> = node.attractors.iter().cloned().collect();

        for tag in &attractors {
            *self.attractor_engagements.entry(tag.clone()).or_default() += 1;
        }
        *self.character_visits.entry(node.character).or_default() += 1;
        *self.temporal_visits.entry(bucket).or_default() += 1;

        self.visits.push(VisitRecord {
            node_id: node.id.clone(),
            character: node.character,
            temporal_value: node.temporal_value,
            temporal_bucket: bucket,
            attractors,
            sequence_index: self.sequence.len(),
        });
        self.sequence.push(node.id.clone());
    }

    /// Set progress towards an endpoint orientation, clamped to 0-100.
    pub fn set_endpoint_progress(
        &mut self,
        orientation: impl Into<String>,
        progress: u32,
    ) -> Result<(), ModelError> {
        let orientation = orientation.into();
        if orientation.trim().is_empty() {
            return Err(ModelError::EmptyOrientation);
        }
        self.endpoint_progress
            .insert(orientation, progress.min(100) as u8);
        Ok(())
    }

    pub fn endpoint_progress(&self, orientation: &str) -> u8 {
        self.endpoint_progress.get(orientation).copied().unwrap_or(0)
    }

    pub fn total_visits(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Number of distinct nodes in the sequence.
    pub fn distinct_nodes(&self) -> usize {
        self.sequence.iter().collect::<BTreeSet<_>>().len()
    }

    /// 1 - distinct/total; 0 for an empty path.
    pub fn recursive_awareness(&self) -> f32 {
        if self.sequence.is_empty() {
            return 0.0;
        }
        1.0 - self.distinct_nodes() as f32 / self.sequence.len() as f32
    }

    pub fn has_visited(&self, node: &NodeId) -> bool {
        self.sequence.contains(node)
    }

    /// How many times `node` appears in the sequence.
    pub fn visit_count_of(&self, node: &NodeId) -> u32 {
        self.sequence.iter().filter(|id| *id == node).count() as u32
    }

    pub fn revisit_count(&self, node: &NodeId) -> u32 {
        self.revisit_counts.get(node).copied().unwrap_or(0)
    }

    /// The most recent visit.
    pub fn last_visit(&self) -> Option<&VisitRecord> {
        self.visits.last()
    }

    /// The visit before the most recent one.
    pub fn previous_visit(&self) -> Option<&VisitRecord> {
        self.visits.len().checked_sub(2).and_then(|i| self.visits.get(i))
    }

    /// The last `n` node ids, oldest first.
    pub fn recent_nodes(&self, n: usize) -> &[NodeId] {
        let start = self.sequence.len().saturating_sub(n);
        &self.sequence[start..]
    }

    /// Characters of the last `n` visits, oldest first.
    pub fn recent_characters(&self, n: usize) -> Vec<Character> {
        let start = self.visits.len().saturating_sub(n);
        self.visits[start..].iter().map(|v| v.character).collect()
    }

    pub fn attractor_engagement(&self, tag: &AttractorTag) -> u32 {
        self.attractor_engagements.get(tag).copied().unwrap_or(0)
    }

    /// Total engagement events across every attractor.
    pub fn total_engagements(&self) -> u32 {
        self.attractor_engagements.values().sum()
    }

    /// Whether `needle` occurs contiguously anywhere in the sequence.
    pub fn contains_subsequence(&self, needle: &[NodeId]) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.sequence.windows(needle.len()).any(|w| w == needle)
    }

    /// Whether the sequence ends with `needle`.
    pub fn ends_with(&self, needle: &[NodeId]) -> bool {
        self.sequence.ends_with(needle)
    }
}
