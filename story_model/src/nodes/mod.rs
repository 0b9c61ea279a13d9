//! Node definitions for the narrative graph.

mod node;

pub use node::*;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Unique identifier for narrative nodes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The narrative voices a node can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Character {
    Archaeologist,
    Algorithm,
    LastHuman,
}

impl Character {
    pub const ALL: [Character; 3] = [
        Character::Archaeologist,
        Character::Algorithm,
        Character::LastHuman,
    ];

    /// Stable lowercase name, also used to build variant section names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Character::Archaeologist => "archaeologist",
            Character::Algorithm => "algorithm",
            Character::LastHuman => "last-human",
        }
    }

    /// Human-facing name used in generated commentary.
    pub fn display_name(&self) -> &'static str {
        match self {
            Character::Archaeologist => "the Archaeologist",
            Character::Algorithm => "the Algorithm",
            Character::LastHuman => "the Last Human",
        }
    }
}

impl std::fmt::Display for Character {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse temporal position derived from a node's temporal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalBucket {
    Past,
    Present,
    Future,
}

impl TemporalBucket {
    pub const ALL: [TemporalBucket; 3] = [
        TemporalBucket::Past,
        TemporalBucket::Present,
        TemporalBucket::Future,
    ];

    /// Bucket a temporal value: past <= 3, present 4-6, future >= 7.
    pub fn from_value(value: u8) -> Self {
        match value {
            0..=3 => TemporalBucket::Past,
            4..=6 => TemporalBucket::Present,
            _ => TemporalBucket::Future,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalBucket::Past => "past",
            TemporalBucket::Present => "present",
            TemporalBucket::Future => "future",
        }
    }
}

impl std::fmt::Display for TemporalBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validate a raw temporal value.
pub fn checked_temporal_value(value: u8) -> Result<u8, ModelError> {
    if (1..=10).contains(&value) {
        Ok(value)
    } else {
        Err(ModelError::TemporalValueOutOfRange(value))
    }
}

/// A thematic attractor tag (e.g. "recursion-loop", "memory").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttractorTag(pub String);

impl AttractorTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading word of the tag, used to find the tag's motif in prose.
    ///
    /// `"recursion-loop"` has the keyword `"recursion"`.
    pub fn keyword(&self) -> &str {
        self.0
            .split(|c: char| c == '-' || c == '_')
            .find(|part| !part.is_empty())
            .unwrap_or(self.0.as_str())
    }
}

impl From<&str> for AttractorTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl std::fmt::Display for AttractorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a node as the reader keeps returning to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Unvisited,
    Visited,
    Revisited,
    Complex,
    Fragmented,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporal_buckets() {
        assert_eq!(TemporalBucket::from_value(1), TemporalBucket::Past);
        assert_eq!(TemporalBucket::from_value(3), TemporalBucket::Past);
        assert_eq!(TemporalBucket::from_value(4), TemporalBucket::Present);
        assert_eq!(TemporalBucket::from_value(6), TemporalBucket::Present);
        assert_eq!(TemporalBucket::from_value(7), TemporalBucket::Future);
        assert_eq!(TemporalBucket::from_value(10), TemporalBucket::Future);
    }

    #[test]
    fn test_checked_temporal_value() {
        assert!(checked_temporal_value(5).is_ok());
        assert!(checked_temporal_value(0).is_err());
        assert!(checked_temporal_value(11).is_err());
    }

    #[test]
    fn test_attractor_keyword() {
        assert_eq!(AttractorTag::from("recursion-loop").keyword(), "recursion");
        assert_eq!(AttractorTag::from("memory").keyword(), "memory");
        assert_eq!(AttractorTag::from("deep_time").keyword(), "deep");
    }

    #[test]
    fn test_character_serde_names() {
        let json = serde_json::to_string(&Character::LastHuman).unwrap();
        assert_eq!(json, "\"last-human\"");
        let back: Character = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Character::LastHuman);
    }

    #[test]
    fn test_lifecycle_ordering() {
        assert!(LifecycleState::Unvisited < LifecycleState::Visited);
        assert!(LifecycleState::Complex < LifecycleState::Fragmented);
    }
}
