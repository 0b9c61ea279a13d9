//! Attractor Engagement System - thematic engagement turned into extra rules.
//!
//! The system works in four steps:
//! 1. **Engagement**: per-tag scores from the analyzer, cached for a short burst
//! 2. **Grouping**: tag scores summed into theme groups
//! 3. **Conditions**: the dominant group contributes an `anyOf` over its engaged tags
//! 4. **Transformations**: on reveal-worthy nodes, strongly engaged tags are emphasized
//!    where the node's text names them

mod scores;
mod themes;

pub use scores::*;
pub use themes::*;

use std::time::Instant;
use tracing::debug;

use story_model::{
    AttractorTag, Condition, EmphasisStyle, NodeState, ReaderPath, TextTransformation,
};

use crate::analysis::{AttractorEngagement, PathAnalyzer};
use crate::cache::{hash_of, TimedCache};
use crate::config::EngineConfig;

/// Short-lived engagement service.
pub struct AttractorEngagementSystem {
    analyzer: PathAnalyzer,
    engagement_cache: TimedCache<u64, Vec<AttractorEngagement>>,
    significance_threshold: f32,
}

impl AttractorEngagementSystem {
    pub fn new(analyzer: PathAnalyzer, config: &EngineConfig) -> Self {
        Self {
            analyzer,
            engagement_cache: TimedCache::new(config.engagement_cache_ttl()),
            significance_threshold: config.significance_threshold,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PathAnalyzer::with_defaults(), &EngineConfig::default())
    }

    pub fn significance_threshold(&self) -> f32 {
        self.significance_threshold
    }

    pub fn engagements(&mut self, path: &ReaderPath) -> Vec<AttractorEngagement> {
        self.engagements_at(path, Instant::now())
    }

    /// Engagement scores, highest first, reused within the cache window.
    pub fn engagements_at(&mut self, path: &ReaderPath, now: Instant) -> Vec<AttractorEngagement> {
        let key = hash_of(path);
        if let Some(cached) = self.engagement_cache.get_at(&key, now) {
            debug!("engagement cache hit");
            return cached;
        }
        let engagements = self.analyzer.attractor_engagements(path);
        self.engagement_cache.insert_at(key, engagements.clone(), now);
        engagements
    }

    /// Engagement score of one tag, 0 when never engaged.
    pub fn score_of(&mut self, path: &ReaderPath, tag: &AttractorTag) -> f32 {
        self.engagements(path)
            .iter()
            .find(|e| &e.tag == tag)
            .map(|e| e.score)
            .unwrap_or(0.0)
    }

    /// Raw theme group totals: the sum of member-tag engagement scores.
    pub fn theme_scores(&mut self, path: &ReaderPath) -> ThemeScores {
        let mut scores = ThemeScores::new();
        for engagement in self.engagements(path) {
            if let Some(group) = ThemeGroup::of(&engagement.tag) {
                scores.add_score(group, engagement.score);
            }
        }
        scores
    }

    /// The strongest group when its total reaches the significance threshold.
    pub fn dominant_theme(&mut self, path: &ReaderPath) -> Option<(ThemeGroup, f32)> {
        self.theme_scores(path)
            .strongest()
            .filter(|(_, score)| *score >= self.significance_threshold)
    }

    /// Conditions contributed by the dominant theme group.
    pub fn derived_conditions(&mut self, path: &ReaderPath) -> Vec<Condition> {
        let Some((group, _)) = self.dominant_theme(path) else {
            return Vec::new();
        };
        let members: Vec<Condition> = self
            .engagements(path)
            .into_iter()
            .filter(|e| ThemeGroup::of(&e.tag) == Some(group))
            .map(|e| Condition::attractors_engaged([e.tag]))
            .collect();
        if members.is_empty() {
            return Vec::new();
        }
        vec![Condition::any_of(members)]
    }

    /// Emphasis for the node's own tags that the reader engages with significantly,
    /// anchored where the text names the tag's keyword. Empty unless the node is reveal-worthy.
    pub fn derived_transformations(
        &mut self,
        node: &NodeState,
        path: &ReaderPath,
    ) -> Vec<TextTransformation> {
        if !self.is_reveal_worthy(node, path) {
            return Vec::new();
        }
        let text = if node.current_content.is_empty() {
            node.raw_content.as_str()
        } else {
            node.current_content.as_str()
        };
        let lowered = text.to_lowercase();

        let mut transformations = Vec::new();
        for tag in &node.attractors {
            let score = self.score_of(path, tag);
            if score < self.significance_threshold {
                continue;
            }
            let keyword = tag.keyword().to_lowercase();
            if keyword.is_empty() || lowered.len() != text.len() {
                continue;
            }
            if let Some(start) = lowered.find(&keyword) {
                let selector = &text[start..start + keyword.len()];
                let intensity = (score / 20.0).ceil().clamp(1.0, 5.0) as u8;
                transformations.push(TextTransformation::emphasize(
                    selector,
                    EmphasisStyle::Highlight,
                    intensity,
                ));
            }
        }
        transformations
    }

    /// Whether any of the node's tags is engaged at or above the significance threshold.
    pub fn is_reveal_worthy(&mut self, node: &NodeState, path: &ReaderPath) -> bool {
        let threshold = self.significance_threshold;
        let engagements = self.engagements(path);
        node.attractors.iter().any(|tag| {
            engagements
                .iter()
                .any(|e| &e.tag == tag && e.score >= threshold)
        })
    }

    pub fn invalidate(&mut self) {
        debug!(
            engagements = self.engagement_cache.len(),
            "invalidating engagement cache"
        );
        self.engagement_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use story_model::{Character, TransformationKind};

    fn walk(steps: &[(&str, &[&str])]) -> ReaderPath {
        let mut path = ReaderPath::new();
        for (id, tags) in steps {
            path.record_visit(
                &NodeState::new(*id, Character::Archaeologist, 2).with_attractors(tags.iter().copied()),
            );
        }
        path
    }

    #[test]
    fn test_engagement_cache_window() {
        let mut system = AttractorEngagementSystem::with_defaults();
        let path = walk(&[("a", &["memory"])]);
        let start = Instant::now();

        let first = system.engagements_at(&path, start);
        assert_eq!(system.engagement_cache.len(), 1);
        let again = system.engagements_at(&path, start + Duration::from_secs(4));
        assert_eq!(first, again);

        system.engagements_at(&path, start + Duration::from_secs(6));
        assert_eq!(system.engagement_cache.len(), 1);

        system.invalidate();
        assert!(system.engagement_cache.is_empty());
    }

    #[test]
    fn test_engagement_cache_bounded_over_long_session() {
        let mut system = AttractorEngagementSystem::with_defaults();
        let mut path = ReaderPath::new();
        let start = Instant::now();

        for i in 0..200u64 {
            let node = NodeState::new(format!("n{}", i % 7), Character::Algorithm, 5)
                .with_attractor("memory");
            path.record_visit(&node);
            system.engagements_at(&path, start + Duration::from_secs(i * 60));
        }
        assert_eq!(system.engagement_cache.len(), 1);
    }

    #[test]
    fn test_theme_scores_group_tags() {
        let mut system = AttractorEngagementSystem::with_defaults();
        let path = walk(&[
            ("a", &["memory", "recursion-loop"]),
            ("b", &["archive"]),
            ("c", &["memory"]),
        ]);

        let scores = system.theme_scores(&path);
        assert!(scores.get_score(ThemeGroup::Memory) > scores.get_score(ThemeGroup::Recursion));
        assert_eq!(scores.strongest().unwrap().0, ThemeGroup::Memory);
        assert!((scores.normalized().get_score(ThemeGroup::Memory) - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_dominant_group_condition() {
        let mut system = AttractorEngagementSystem::with_defaults();
        let path = walk(&[("a", &["memory"]), ("b", &["archive"]), ("c", &["memory"])]);

        let conditions = system.derived_conditions(&path);
        assert_eq!(conditions.len(), 1);
        match &conditions[0] {
            Condition::AnyOf(members) => assert_eq!(members.len(), 2),
            other => panic!("unexpected condition {:?}", other),
        }
    }

    #[test]
    fn test_no_dominant_group_without_engagement() {
        let mut system = AttractorEngagementSystem::with_defaults();
        let path = walk(&[("a", &[]), ("b", &["harbor"])]);
        assert!(system.dominant_theme(&path).is_none());
        assert!(system.derived_conditions(&path).is_empty());
    }

    #[test]
    fn test_reveal_worthy() {
        let mut system = AttractorEngagementSystem::with_defaults();
        let path = walk(&[("a", &["memory"]), ("b", &["memory"]), ("c", &["entropy"])]);

        let memory_node = NodeState::new("x", Character::Algorithm, 5).with_attractor("memory");
        let entropy_node = NodeState::new("y", Character::Algorithm, 5).with_attractor("entropy");
        assert!(system.is_reveal_worthy(&memory_node, &path));
        assert!(!system.is_reveal_worthy(&entropy_node, &path));
    }

    #[test]
    fn test_no_emphasis_unless_reveal_worthy() {
        let mut system = AttractorEngagementSystem::with_defaults();
        let path = walk(&[("a", &["memory"]), ("b", &["memory"]), ("c", &["entropy"])]);
        let node = NodeState::new("x", Character::Algorithm, 5)
            .with_attractor("entropy")
            .with_content("Entropy takes the memory first.");

        assert!(!system.is_reveal_worthy(&node, &path));
        assert!(system.derived_transformations(&node, &path).is_empty());
    }

    #[test]
    fn test_derived_emphasis() {
        let mut system = AttractorEngagementSystem::with_defaults();
        let path = walk(&[("a", &["memory"]), ("b", &["memory"])]);
        let node = NodeState::new("x", Character::Algorithm, 5)
            .with_attractor("memory")
            .with_content("Every Memory is a door.");

        let transformations = system.derived_transformations(&node, &path);
        assert!(system.is_reveal_worthy(&node, &path));
        assert_eq!(transformations.len(), 1);
        assert_eq!(transformations[0].selector, "Memory");
        assert!(matches!(
            transformations[0].kind,
            TransformationKind::Emphasize {
                style: EmphasisStyle::Highlight,
                intensity: 5
            }
        ));
    }
}
