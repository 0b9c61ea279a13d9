//! The adaptive engine: one owner for every service and its caches.
//!
//! `render_node` runs the whole flow for a registry node:
//! 1. parse the raw text and pick a variant
//! 2. analyze the reader's path
//! 3. gather candidates from the node's rules, character bleed and attractor engagement
//! 4. resolve priorities and apply the winners
//! 5. cache the result per (node, visit count, recent path)

use tracing::debug;

use story_model::{
    Condition, NodeId, NodeRegistry, NodeState, ReaderPath, TextTransformation,
};

use crate::analysis::{PathAnalysis, PathAnalyzer, ReadingPattern};
use crate::attractors::AttractorEngagementSystem;
use crate::bleed::CharacterBleedCalculator;
use crate::conditions::{ConditionEvaluator, EvaluatorStats};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::transform::{
    ContentCache, ContentKey, PriorityResolver, ResolutionContext, TransformationApplier,
    TransformationSource,
};
use crate::variants::{EnhancedContent, VariantContext, VariantSelector};

/// Nodes of recent history the variant selector looks at.
const VARIANT_WINDOW: usize = 5;

pub struct AdaptiveEngine {
    config: EngineConfig,
    analyzer: PathAnalyzer,
    evaluator: ConditionEvaluator,
    bleed: CharacterBleedCalculator,
    attractors: AttractorEngagementSystem,
    applier: TransformationApplier,
    selector: VariantSelector,
    content_cache: ContentCache,
    rules_version: Option<u64>,
}

impl AdaptiveEngine {
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let analyzer = PathAnalyzer::with_defaults();
        Ok(Self {
            evaluator: ConditionEvaluator::new(analyzer.clone(), &config),
            bleed: CharacterBleedCalculator::new(&config),
            attractors: AttractorEngagementSystem::new(analyzer.clone(), &config),
            applier: TransformationApplier::new(PriorityResolver::with_defaults(), &config),
            selector: VariantSelector::new(),
            content_cache: ContentCache::from_config(&config),
            rules_version: None,
            analyzer,
            config,
        })
    }

    pub fn with_defaults() -> Self {
        let config = EngineConfig::default();
        Self {
            evaluator: ConditionEvaluator::with_defaults(),
            bleed: CharacterBleedCalculator::default(),
            attractors: AttractorEngagementSystem::with_defaults(),
            applier: TransformationApplier::with_defaults(),
            selector: VariantSelector::new(),
            content_cache: ContentCache::from_config(&config),
            rules_version: None,
            analyzer: PathAnalyzer::with_defaults(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn analyze(&self, path: &ReaderPath, registry: &NodeRegistry) -> PathAnalysis {
        self.analyzer.analyze(path, registry)
    }

    pub fn detect_patterns(&self, path: &ReaderPath, registry: &NodeRegistry) -> Vec<ReadingPattern> {
        self.analyzer.detect_patterns(path, registry)
    }

    pub fn evaluate(&mut self, condition: &Condition, path: &ReaderPath, node: &NodeState) -> bool {
        self.evaluator.evaluate(condition, path, node)
    }

    pub fn evaluator_stats(&self) -> EvaluatorStats {
        self.evaluator.stats()
    }

    pub fn apply_all(&self, content: &str, transformations: &[TextTransformation]) -> String {
        self.applier.apply_all(content, transformations)
    }

    pub fn calculate_bleed(&self, node: &NodeState, path: &ReaderPath) -> Vec<TextTransformation> {
        self.bleed.calculate_bleed(node, path)
    }

    pub fn select_variant(&self, content: &EnhancedContent, context: &VariantContext) -> String {
        self.selector.select(content, context)
    }

    /// Drop every memoized result. The engine also does this on its own when the
    /// registry's rule version moves.
    pub fn invalidate_caches(&mut self) {
        debug!("invalidating engine caches");
        self.evaluator.invalidate();
        self.attractors.invalidate();
        self.content_cache.clear();
    }

    /// Tell the content cache which nodes are on screen.
    pub fn mark_visible<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        self.content_cache.mark_visible(ids);
    }

    /// Produce the text to show for `id` after `path`.
    pub fn render_node(
        &mut self,
        registry: &mut NodeRegistry,
        path: &ReaderPath,
        id: &NodeId,
    ) -> Result<String, CoreError> {
        self.sync_rules_version(registry.rules_version());

        let node = registry.require(id)?;
        let key = ContentKey::new(node, path, self.config.recent_window);
        if let Some(cached) = self.content_cache.get(&key) {
            debug!(node = %id, "content cache hit");
            return Ok(cached);
        }

        let enhanced = EnhancedContent::parse(&node.raw_content);
        let context = VariantContext::from_path(path, node, VARIANT_WINDOW);
        let text = self.selector.select(&enhanced, &context);
        registry.set_current_content(id, text.clone())?;

        let registry: &NodeRegistry = registry;
        let node = registry.require(id)?;
        let analysis = self.analyzer.analyze(path, registry);
        let candidates = self.collect_candidates(node, path);
        debug!(node = %id, candidates = candidates.len(), "rendering node");

        let context = ResolutionContext::from_analysis(&analysis, node);
        let prioritized = self.applier.resolver().prioritize(candidates, &context);
        let rendered = self.applier.apply_prioritized(&text, prioritized);

        self.content_cache.insert(key, rendered.clone());
        Ok(rendered)
    }

    fn collect_candidates(
        &mut self,
        node: &NodeState,
        path: &ReaderPath,
    ) -> Vec<(TextTransformation, TransformationSource)> {
        let mut candidates = Vec::new();

        for rule in &node.rules {
            if self.evaluator.evaluate(&rule.condition, path, node) {
                let source = TransformationSource::classify(&rule.condition);
                candidates.extend(rule.transformations.iter().cloned().map(|t| (t, source)));
            }
        }

        candidates.extend(
            self.bleed
                .calculate_bleed(node, path)
                .into_iter()
                .map(|t| (t, TransformationSource::Rhythm)),
        );

        let derived = self.attractors.derived_conditions(path);
        if !derived.is_empty() && derived.iter().all(|c| self.evaluator.evaluate(c, path, node)) {
            candidates.extend(
                self.attractors
                    .derived_transformations(node, path)
                    .into_iter()
                    .map(|t| (t, TransformationSource::Attractor)),
            );
        }

        candidates
    }

    fn sync_rules_version(&mut self, version: u64) {
        if self.rules_version != Some(version) {
            if self.rules_version.is_some() {
                self.invalidate_caches();
            }
            self.rules_version = Some(version);
        }
    }
}

impl Default for AdaptiveEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
