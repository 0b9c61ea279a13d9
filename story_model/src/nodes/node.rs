//! Node state - the registry's per-node record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{AttractorTag, Character, LifecycleState, NodeId, TemporalBucket};
use crate::rules::TransformationRule;

/// Visit-count thresholds that advance a node's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitThresholds {
    pub revisited: u32,
    pub complex: u32,
    pub fragmented: u32,
}

impl Default for VisitThresholds {
    fn default() -> Self {
        Self {
            revisited: 2,
            complex: 3,
            fragmented: 5,
        }
    }
}

impl VisitThresholds {
    /// Lifecycle state reached after `visit_count` visits.
    pub fn state_for(&self, visit_count: u32) -> LifecycleState {
        if visit_count == 0 {
            LifecycleState::Unvisited
        } else if visit_count >= self.fragmented {
            LifecycleState::Fragmented
        } else if visit_count >= self.complex {
            LifecycleState::Complex
        } else if visit_count >= self.revisited {
            LifecycleState::Revisited
        } else {
            LifecycleState::Visited
        }
    }
}

/// A narrative unit as seen by the adaptive pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub id: NodeId,

    pub title: String,

    /// Narrative voice this node belongs to.
    pub character: Character,

    /// Temporal value from 1 (deep past) to 10 (far future).
    pub temporal_value: u8,

    /// Thematic attractors carried by this node.
    pub attractors: BTreeSet<AttractorTag>,

    pub lifecycle: LifecycleState,

    pub thresholds: VisitThresholds,

    pub visit_count: u32,

    /// Annotated source text, possibly carrying variant delimiters.
    pub raw_content: String,

    /// Text currently displayed for this node.
    pub current_content: String,

    /// Condition -> transformation rules attached to this node.
    #[serde(default)]
    pub rules: Vec<TransformationRule>,
}

impl NodeState {
    /// Create a new unvisited node.
    pub fn new(id: impl Into<NodeId>, character: Character, temporal_value: u8) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            character,
            temporal_value: temporal_value.clamp(1, 10),
            attractors: BTreeSet::new(),
            lifecycle: LifecycleState::Unvisited,
            thresholds: VisitThresholds::default(),
            visit_count: 0,
            raw_content: String::new(),
            current_content: String::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_attractor(mut self, tag: impl Into<AttractorTag>) -> Self {
        self.attractors.insert(tag.into());
        self
    }

    pub fn with_attractors<T: Into<AttractorTag>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        self.attractors.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Set the annotated source; the displayed text starts out identical.
    pub fn with_content(mut self, raw: impl Into<String>) -> Self {
        self.raw_content = raw.into();
        self.current_content = self.raw_content.clone();
        self
    }

    pub fn with_rule(mut self, rule: TransformationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_thresholds(mut self, thresholds: VisitThresholds) -> Self {
        self.thresholds = thresholds;
        self.lifecycle = thresholds.state_for(self.visit_count);
        self
    }

    pub fn with_visit_count(mut self, visit_count: u32) -> Self {
        self.visit_count = visit_count;
        self.lifecycle = self.thresholds.state_for(visit_count);
        self
    }

    pub fn temporal_bucket(&self) -> TemporalBucket {
        TemporalBucket::from_value(self.temporal_value)
    }

    pub fn has_attractor(&self, tag: &AttractorTag) -> bool {
        self.attractors.contains(tag)
    }

    /// Count a visit and advance the lifecycle.
    pub fn record_visit(&mut self) -> LifecycleState {
        self.visit_count += 1;
        self.lifecycle = self.thresholds.state_for(self.visit_count);
        self.lifecycle
    }
}
