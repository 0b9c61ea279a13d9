//! Transformation Applier - resolves competing edits and applies the survivors.
//!
//! Application runs in three steps:
//! 1. **Prioritize**: every candidate gets a base priority by type plus signal boosts
//! 2. **Resolve**: candidates sharing a selector compete, the highest priority wins
//! 3. **Apply**: winners are spliced in descending priority, each at its selector's first occurrence
//!
//! Content that already carries transformation markers and has grown past the guard
//! threshold is returned untouched.

mod cache;
mod ops;
mod priority;

pub use cache::*;
pub use ops::*;
pub use priority::*;

use tracing::{info, warn};

use story_model::TextTransformation;

use crate::config::EngineConfig;
use crate::error::TransformError;

/// Applies resolved transformation lists to text.
#[derive(Debug, Clone)]
pub struct TransformationApplier {
    resolver: PriorityResolver,
    guard_size_threshold: usize,
}

impl TransformationApplier {
    pub fn new(resolver: PriorityResolver, config: &EngineConfig) -> Self {
        Self {
            resolver,
            guard_size_threshold: config.guard_size_threshold,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PriorityResolver::with_defaults(), &EngineConfig::default())
    }

    pub fn resolver(&self) -> &PriorityResolver {
        &self.resolver
    }

    /// Whether `content` has already been mutated enough to stop.
    pub fn is_guarded(&self, content: &str) -> bool {
        content.len() >= self.guard_size_threshold && content.contains(SENTINEL)
    }

    /// Apply a plain list with no signal context: base priorities and hints decide.
    pub fn apply_all(&self, content: &str, transformations: &[TextTransformation]) -> String {
        let candidates = transformations
            .iter()
            .cloned()
            .map(|t| (t, TransformationSource::Condition))
            .collect();
        let prioritized = self
            .resolver
            .prioritize(candidates, &ResolutionContext::neutral());
        self.apply_prioritized(content, prioritized)
    }

    /// Resolve conflicts among prioritized candidates and apply the winners in order.
    pub fn apply_prioritized(
        &self,
        content: &str,
        candidates: Vec<PrioritizedTransformation>,
    ) -> String {
        if candidates.is_empty() {
            return content.to_string();
        }
        if self.is_guarded(content) {
            info!(
                len = content.len(),
                threshold = self.guard_size_threshold,
                "content already transformed, leaving it as is"
            );
            return content.to_string();
        }

        let mut result = content.to_string();
        for candidate in self.resolver.resolve(candidates) {
            match Self::apply_one(&result, &candidate.transformation) {
                Ok(next) => result = next,
                Err(err) => warn!(
                    kind = candidate.transformation.type_name(),
                    error = %err,
                    "skipping transformation"
                ),
            }
        }
        result
    }

    pub fn apply_one(content: &str, transformation: &TextTransformation) -> Result<String, TransformError> {
        apply_transformation(content, transformation)
    }
}

impl Default for TransformationApplier {
    fn default() -> Self {
        Self::with_defaults()
    }
}
