//! Predefined clusters of attractor tags.

use serde::{Deserialize, Serialize};

use story_model::AttractorTag;

/// A cluster of related attractor tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeGroup {
    Identity,
    Memory,
    Recursion,
    Quantum,
    Consciousness,
    Entropy,
}

impl ThemeGroup {
    pub const ALL: [ThemeGroup; 6] = [
        ThemeGroup::Identity,
        ThemeGroup::Memory,
        ThemeGroup::Recursion,
        ThemeGroup::Quantum,
        ThemeGroup::Consciousness,
        ThemeGroup::Entropy,
    ];

    /// Keywords whose tags belong to this group.
    pub fn members(&self) -> &'static [&'static str] {
        match self {
            ThemeGroup::Identity => &["identity", "self", "name", "mirror", "mask"],
            ThemeGroup::Memory => &["memory", "remembrance", "archive", "nostalgia", "forgetting"],
            ThemeGroup::Recursion => &["recursion", "recursive", "loop", "echo", "fractal", "spiral"],
            ThemeGroup::Quantum => &["quantum", "superposition", "observer", "probability", "entanglement"],
            ThemeGroup::Consciousness => &["consciousness", "awareness", "mind", "dream", "awakening"],
            ThemeGroup::Entropy => &["entropy", "decay", "dissolution", "ruin", "erosion"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeGroup::Identity => "identity",
            ThemeGroup::Memory => "memory",
            ThemeGroup::Recursion => "recursion",
            ThemeGroup::Quantum => "quantum",
            ThemeGroup::Consciousness => "consciousness",
            ThemeGroup::Entropy => "entropy",
        }
    }

    /// The group a tag belongs to, by its keyword first and then by any member it contains.
    pub fn of(tag: &AttractorTag) -> Option<ThemeGroup> {
        let keyword = tag.keyword().to_lowercase();
        if let Some(group) = Self::ALL.into_iter().find(|g| g.members().contains(&keyword.as_str())) {
            return Some(group);
        }
        let whole = tag.as_str().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|g| g.members().iter().any(|m| whole.contains(m)))
    }
}

impl std::fmt::Display for ThemeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
