//! Temporal jumps across the timeline and the reader's transition rhythm.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use story_model::{ReaderPath, TemporalBucket};

use super::{mean, std_dev, PathAnalyzer};

/// Overall direction of temporal jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JumpDirection {
    Forward,
    Backward,
    #[default]
    Mixed,
}

/// Statistics over temporal-value changes between consecutive visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TemporalJumpAnalysis {
    pub jump_count: usize,
    pub forward_jumps: usize,
    pub backward_jumps: usize,
    pub direction: JumpDirection,
    pub average_distance: f32,
    pub max_distance: u8,
    /// Share of visits spent in each bucket.
    pub bucket_share: BTreeMap<TemporalBucket, f32>,
    /// `min(1, stdev(jump distances) / 4)`.
    pub volatility: f32,
}

impl TemporalJumpAnalysis {
    /// The bucket with the largest share of visits.
    pub fn dominant_bucket(&self) -> Option<(TemporalBucket, f32)> {
        self.bucket_share
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(bucket, share)| (*bucket, *share))
    }

    pub fn share_of(&self, bucket: TemporalBucket) -> f32 {
        self.bucket_share.get(&bucket).copied().unwrap_or(0.0)
    }
}

/// Pace of recent navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ReadingRhythm {
    /// Rapid hopping between voices and fresh nodes.
    FastTransition,
    /// Lingering on and returning to the same nodes.
    DeepEngagement,
    #[default]
    Balanced,
}

const RHYTHM_WINDOW: usize = 6;

impl PathAnalyzer {
    pub fn analyze_temporal_jumps(&self, path: &ReaderPath) -> TemporalJumpAnalysis {
        let total = path.visits.len();
        if total == 0 {
            return TemporalJumpAnalysis::default();
        }

        let mut bucket_share: BTreeMap<TemporalBucket, f32> = BTreeMap::new();
        for visit in &path.visits {
            *bucket_share.entry(visit.temporal_bucket).or_default() += 1.0;
        }
        for share in bucket_share.values_mut() {
            *share /= total as f32;
        }

        let deltas: Vec<i16> = path
            .visits
            .windows(2)
            .map(|w| w[1].temporal_value as i16 - w[0].temporal_value as i16)
            .filter(|d| *d != 0)
            .collect();
        let forward_jumps = deltas.iter().filter(|d| **d > 0).count();
        let backward_jumps = deltas.len() - forward_jumps;
        let distances: Vec<f32> = deltas.iter().map(|d| d.unsigned_abs() as f32).collect();

        let direction = if deltas.is_empty() {
            JumpDirection::Mixed
        } else if forward_jumps as f32 > backward_jumps as f32 * 1.5 {
            JumpDirection::Forward
        } else if backward_jumps as f32 > forward_jumps as f32 * 1.5 {
            JumpDirection::Backward
        } else {
            JumpDirection::Mixed
        };

        TemporalJumpAnalysis {
            jump_count: deltas.len(),
            forward_jumps,
            backward_jumps,
            direction,
            average_distance: mean(&distances),
            max_distance: deltas.iter().map(|d| d.unsigned_abs() as u8).max().unwrap_or(0),
            bucket_share,
            volatility: (std_dev(&distances) / 4.0).min(1.0),
        }
    }

    /// Rhythm over the last few transitions.
    pub fn reading_rhythm(&self, path: &ReaderPath) -> ReadingRhythm {
        let start = path.visits.len().saturating_sub(RHYTHM_WINDOW);
        let window = &path.visits[start..];
        if window.len() < 3 {
            return ReadingRhythm::Balanced;
        }

        let distinct = window.iter().map(|v| &v.node_id).collect::<BTreeSet<_>>().len();
        let repetition = 1.0 - distinct as f32 / window.len() as f32;
        if repetition >= 0.5 {
            return ReadingRhythm::DeepEngagement;
        }

        let transitions = window.len() - 1;
        let voice_changes = window
            .windows(2)
            .filter(|w| w[0].character != w[1].character)
            .count();
        if distinct == window.len() && voice_changes as f32 / transitions as f32 >= 0.6 {
            ReadingRhythm::FastTransition
        } else {
            ReadingRhythm::Balanced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{journey, simple_journey};
    use super::*;
    use story_model::Character;

    const ARCH: Character = Character::Archaeologist;
    const ALGO: Character = Character::Algorithm;
    const HUMAN: Character = Character::LastHuman;

    #[test]
    fn test_forward_bias() {
        let (_, path) = journey(&[
            ("a", ARCH, 1, &[]),
            ("b", ALGO, 3, &[]),
            ("c", HUMAN, 7, &[]),
            ("d", HUMAN, 9, &[]),
            ("e", ALGO, 8, &[]),
        ]);
        let jumps = PathAnalyzer::with_defaults().analyze_temporal_jumps(&path);

        assert_eq!(jumps.jump_count, 4);
        assert_eq!(jumps.forward_jumps, 3);
        assert_eq!(jumps.backward_jumps, 1);
        assert_eq!(jumps.direction, JumpDirection::Forward);
        assert_eq!(jumps.max_distance, 4);
        // distances 2, 4, 2, 1
        assert!((jumps.average_distance - 2.25).abs() < 0.001);
        assert!(jumps.volatility > 0.0 && jumps.volatility < 1.0);
        assert!((jumps.share_of(TemporalBucket::Future) - 0.6).abs() < 0.001);
        assert_eq!(jumps.dominant_bucket().unwrap().0, TemporalBucket::Future);
    }

    #[test]
    fn test_mixed_direction() {
        let (_, path) = journey(&[("a", ARCH, 2, &[]), ("b", ALGO, 8, &[]), ("c", ARCH, 2, &[])]);
        let jumps = PathAnalyzer::with_defaults().analyze_temporal_jumps(&path);
        assert_eq!(jumps.direction, JumpDirection::Mixed);
        assert_eq!(jumps.volatility, 0.0);
    }

    #[test]
    fn test_no_jumps_when_static() {
        let (_, path) = simple_journey(&["a", "b", "c"]);
        let jumps = PathAnalyzer::with_defaults().analyze_temporal_jumps(&path);
        assert_eq!(jumps.jump_count, 0);
        assert_eq!(jumps.average_distance, 0.0);
        assert_eq!(jumps.share_of(TemporalBucket::Present), 1.0);
    }

    #[test]
    fn test_rhythm_fast() {
        let (_, path) = journey(&[
            ("a", ARCH, 2, &[]),
            ("b", ALGO, 5, &[]),
            ("c", HUMAN, 9, &[]),
            ("d", ARCH, 2, &[]),
        ]);
        assert_eq!(
            PathAnalyzer::with_defaults().reading_rhythm(&path),
            ReadingRhythm::FastTransition
        );
    }

    #[test]
    fn test_rhythm_deep() {
        let (_, path) = simple_journey(&["a", "b", "a", "b", "a", "b"]);
        assert_eq!(
            PathAnalyzer::with_defaults().reading_rhythm(&path),
            ReadingRhythm::DeepEngagement
        );
    }

    #[test]
    fn test_rhythm_balanced_for_short_paths() {
        let (_, path) = simple_journey(&["a", "b"]);
        assert_eq!(
            PathAnalyzer::with_defaults().reading_rhythm(&path),
            ReadingRhythm::Balanced
        );
    }
}
