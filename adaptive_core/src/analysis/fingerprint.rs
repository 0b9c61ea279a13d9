//! Journey fingerprint - a composite classification of how someone reads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use story_model::{
    ExplorationStyle, NarrativeApproach, NodeRegistry, ReaderPath, TemporalPreference,
};

use super::{
    AttractorNode, CharacterIntensity, PathAnalyzer, PatternKind, ReadingPattern,
    RecursivePattern, TemporalJumpAnalysis,
};

/// Namespace for fingerprint ids, so they never collide with other name-based UUIDs.
const FINGERPRINT_NAMESPACE: Uuid = Uuid::from_u128(0x6a1d_27f4_3c55_4b0e_9e4f_52a8_d1c3_7b90);

/// Composite summary of a reader's navigation style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyFingerprint {
    /// Derived from the path contents and indices only; identical histories share it.
    pub id: Uuid,
    pub exploration_style: ExplorationStyle,
    pub temporal_preference: TemporalPreference,
    pub narrative_approach: NarrativeApproach,
    /// Mean recursive-pattern strength.
    pub recursive_index: f32,
    /// Highest character intensity.
    pub focus_index: f32,
    /// `min(1, average jump distance / 5)`.
    pub velocity_index: f32,
    pub complexity_index: f32,
}

impl PathAnalyzer {
    /// Compute the fingerprint from scratch.
    pub fn journey_fingerprint(&self, path: &ReaderPath, registry: &NodeRegistry) -> JourneyFingerprint {
        self.fingerprint_with(path, Some(registry))
    }

    /// Fingerprint using only the tags recorded at visit time.
    pub fn journey_fingerprint_visit_time(&self, path: &ReaderPath) -> JourneyFingerprint {
        self.fingerprint_with(path, None)
    }

    fn fingerprint_with(&self, path: &ReaderPath, registry: Option<&NodeRegistry>) -> JourneyFingerprint {
        let recursive = self.detect_recursive_patterns(path);
        let intensities = self.character_intensities(path);
        let jumps = self.analyze_temporal_jumps(path);
        let attractor_nodes = self.detect_attractor_nodes(path);
        let patterns = self.thematic_patterns(path, registry);
        self.fingerprint_from_parts(path, &recursive, &intensities, &jumps, &attractor_nodes, &patterns)
    }

    pub(crate) fn fingerprint_from_parts(
        &self,
        path: &ReaderPath,
        recursive: &[RecursivePattern],
        intensities: &[CharacterIntensity],
        jumps: &TemporalJumpAnalysis,
        attractor_nodes: &[AttractorNode],
        patterns: &[ReadingPattern],
    ) -> JourneyFingerprint {
        let recursive_index = if recursive.is_empty() {
            0.0
        } else {
            recursive.iter().map(|p| p.strength).sum::<f32>() / recursive.len() as f32
        };
        let focus_index = intensities
            .iter()
            .map(|i| i.intensity)
            .fold(0.0_f32, f32::max);
        let velocity_index = (jumps.average_distance / 5.0).min(1.0);
        let attractor_factor = (attractor_nodes.len() as f32 / 5.0).min(1.0);
        let complexity_index = 0.3 * recursive_index
            + 0.3 * focus_index
            + 0.2 * jumps.volatility
            + 0.2 * attractor_factor;

        let exploration_style = if jumps.volatility > 0.7 {
            ExplorationStyle::Chaotic
        } else if recursive_index > 0.6 {
            ExplorationStyle::Recursive
        } else if focus_index > 0.7 {
            ExplorationStyle::Focused
        } else if complexity_index < 0.3 {
            ExplorationStyle::Linear
        } else {
            ExplorationStyle::Wandering
        };

        let temporal_preference = match jumps.dominant_bucket() {
            Some((bucket, share)) if share >= 0.4 => TemporalPreference::from(bucket),
            _ => TemporalPreference::Fluid,
        };

        let thematic_strength = patterns
            .iter()
            .filter(|p| p.kind == PatternKind::Thematic)
            .map(|p| p.strength)
            .fold(0.0_f32, f32::max);
        let narrative_approach = if recursive_index > 0.5 && jumps.volatility < 0.3 {
            NarrativeApproach::Systematic
        } else if thematic_strength >= 0.6 {
            NarrativeApproach::Thematic
        } else if jumps.volatility > 0.5 || velocity_index > 0.6 {
            NarrativeApproach::Experimental
        } else {
            NarrativeApproach::Intuitive
        };

        JourneyFingerprint {
            id: fingerprint_id(
                path,
                [recursive_index, focus_index, velocity_index, complexity_index],
            ),
            exploration_style,
            temporal_preference,
            narrative_approach,
            recursive_index,
            focus_index,
            velocity_index,
            complexity_index,
        }
    }
}

/// Name-based UUID over the sequence and the rounded indices.
fn fingerprint_id(path: &ReaderPath, indices: [f32; 4]) -> Uuid {
    let mut name = path
        .sequence
        .iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join("\u{1f}");
    for index in indices {
        name.push_str(&format!("|{:.3}", index));
    }
    Uuid::new_v5(&FINGERPRINT_NAMESPACE, name.as_bytes())
}
