//! Content Variant Selector - multi-variant source text.
//!
//! Raw node text may carry alternates separated by delimiter lines:
//!
//! ```text
//! The base text.
//! ---[2]---
//! Shown from the second visit on.
//! ---memory-fragment---
//! Shown to readers drawn to memory.
//! ```
//!
//! A delimiter only counts when it is the whole line (surrounding whitespace aside).
//! Selection walks a fixed precedence:
//! 1. **Bleed**: `<previous character>-bleed` when the voice just changed
//! 2. **Awareness**: `recursive-awareness` for heavily looping readers
//! 3. **Rhythm**: `deep-focus` or `oscillation` from the recent window
//! 4. **Attractors**: a themed section for tags engaged at least three times
//! 5. **Visits**: the largest visit threshold reached, else the largest defined
//! 6. **Base**: the text before the first delimiter

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use story_model::{AttractorTag, Character, NodeId, NodeState, ReaderPath};

/// Parsed multi-variant text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnhancedContent {
    pub base: String,
    pub visit_count_variants: BTreeMap<u32, String>,
    pub sections: BTreeMap<String, String>,
}

enum Delimiter {
    Visits(u32),
    Section(String),
}

impl EnhancedContent {
    /// Split raw text on delimiter lines. A repeated key keeps its last block.
    pub fn parse(raw: &str) -> Self {
        let mut content = EnhancedContent::default();
        let mut current: Option<Delimiter> = None;
        let mut block: Vec<&str> = Vec::new();

        for line in raw.lines() {
            if let Some(delimiter) = parse_delimiter(line) {
                content.store(current.take(), &block);
                block.clear();
                current = Some(delimiter);
            } else {
                block.push(line);
            }
        }
        content.store(current, &block);
        content
    }

    fn store(&mut self, target: Option<Delimiter>, lines: &[&str]) {
        let text = lines.join("\n").trim().to_string();
        match target {
            None => self.base = text,
            Some(Delimiter::Visits(threshold)) => {
                self.visit_count_variants.insert(threshold, text);
            }
            Some(Delimiter::Section(name)) => {
                self.sections.insert(name, text);
            }
        }
    }

    /// Whether the text carried any delimiter at all.
    pub fn has_variants(&self) -> bool {
        !self.visit_count_variants.is_empty() || !self.sections.is_empty()
    }

    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }

    /// Variant for the largest threshold not above `visit_count`, else for the largest threshold.
    pub fn visit_variant(&self, visit_count: u32) -> Option<(u32, &str)> {
        self.visit_count_variants
            .range(..=visit_count)
            .next_back()
            .or_else(|| self.visit_count_variants.last_key_value())
            .map(|(threshold, text)| (*threshold, text.as_str()))
    }
}

fn parse_delimiter(line: &str) -> Option<Delimiter> {
    let inner = line
        .trim()
        .strip_prefix("---")?
        .strip_suffix("---")?;
    if inner.is_empty() {
        return None;
    }
    if let Some(number) = inner.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return number.parse().ok().map(Delimiter::Visits);
    }
    inner
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        .then(|| Delimiter::Section(inner.to_string()))
}

/// Everything selection looks at, taken from the reader path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariantContext {
    pub visit_count: u32,
    /// Character of the node being shown.
    pub character: Option<Character>,
    /// Character of the node read just before it.
    pub last_character: Option<Character>,
    pub recent_nodes: Vec<NodeId>,
    pub recent_characters: Vec<Character>,
    pub attractor_engagements: BTreeMap<AttractorTag, u32>,
    pub recursive_awareness: f32,
}

impl VariantContext {
    /// A context carrying only a visit count.
    pub fn new(visit_count: u32) -> Self {
        Self {
            visit_count,
            ..Self::default()
        }
    }

    /// Context for showing `node` after `path`. The path may or may not already end with it.
    pub fn from_path(path: &ReaderPath, node: &NodeState, window: usize) -> Self {
        let preceding = match path.last_visit() {
            Some(last) if last.node_id == node.id => path.previous_visit(),
            other => other,
        };
        Self {
            visit_count: node.visit_count,
            character: Some(node.character),
            last_character: preceding.map(|v| v.character),
            recent_nodes: path.recent_nodes(window).to_vec(),
            recent_characters: path.recent_characters(window),
            attractor_engagements: path.attractor_engagements.clone(),
            recursive_awareness: path.recursive_awareness(),
        }
    }
}

/// Which rule picked the shown text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantChoice {
    CharacterBleed(String),
    RecursiveAwareness,
    Pattern(String),
    Attractor(String),
    VisitCount(u32),
    Base,
}

/// Tag keyword to themed section.
const ATTRACTOR_SECTIONS: [(&str, &str); 6] = [
    ("recursion", "recursive-echo"),
    ("memory", "memory-fragment"),
    ("identity", "identity-shift"),
    ("quantum", "quantum-superposition"),
    ("entropy", "entropy-decay"),
    ("consciousness", "consciousness-expansion"),
];

#[derive(Debug, Clone)]
pub struct VariantSelector {
    /// Recursive awareness above which the awareness section is shown.
    pub awareness_threshold: f32,

    /// Engagements a tag needs before its themed section is shown.
    pub attractor_min_engagements: u32,
}

impl Default for VariantSelector {
    fn default() -> Self {
        Self {
            awareness_threshold: 0.7,
            attractor_min_engagements: 3,
        }
    }
}

impl VariantSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the text to show.
    pub fn select(&self, content: &EnhancedContent, context: &VariantContext) -> String {
        let choice = self.choose(content, context);
        debug!(?choice, "variant selected");
        match choice {
            VariantChoice::CharacterBleed(name)
            | VariantChoice::Pattern(name)
            | VariantChoice::Attractor(name) => content.section(&name).unwrap_or_default().to_string(),
            VariantChoice::RecursiveAwareness => content
                .section("recursive-awareness")
                .unwrap_or_default()
                .to_string(),
            VariantChoice::VisitCount(threshold) => content
                .visit_count_variants
                .get(&threshold)
                .cloned()
                .unwrap_or_default(),
            VariantChoice::Base => content.base.clone(),
        }
    }

    /// Which variant applies, by precedence.
    pub fn choose(&self, content: &EnhancedContent, context: &VariantContext) -> VariantChoice {
        if let (Some(last), Some(current)) = (context.last_character, context.character) {
            let name = format!("{}-bleed", last.as_str());
            if last != current && content.sections.contains_key(&name) {
                return VariantChoice::CharacterBleed(name);
            }
        }

        if context.recursive_awareness > self.awareness_threshold
            && content.sections.contains_key("recursive-awareness")
        {
            return VariantChoice::RecursiveAwareness;
        }

        if let Some(name) = rhythm_section(context).filter(|n| content.sections.contains_key(*n)) {
            return VariantChoice::Pattern(name.to_string());
        }

        let mut engaged: Vec<(&AttractorTag, u32)> = context
            .attractor_engagements
            .iter()
            .filter(|(_, count)| **count >= self.attractor_min_engagements)
            .map(|(tag, count)| (tag, *count))
            .collect();
        engaged.sort_by(|a, b| b.1.cmp(&a.1));
        for (tag, _) in engaged {
            let keyword = tag.keyword().to_lowercase();
            let section = ATTRACTOR_SECTIONS
                .iter()
                .find(|(k, _)| *k == keyword)
                .map(|(_, section)| *section);
            if let Some(section) = section.filter(|s| content.sections.contains_key(*s)) {
                return VariantChoice::Attractor(section.to_string());
            }
        }

        if let Some((threshold, _)) = content.visit_variant(context.visit_count) {
            return VariantChoice::VisitCount(threshold);
        }
        VariantChoice::Base
    }
}

/// `deep-focus` for three identical trailing characters, `oscillation` for an A-B-A bounce.
fn rhythm_section(context: &VariantContext) -> Option<&'static str> {
    let characters = &context.recent_characters;
    if characters.len() >= 3 {
        let tail = &characters[characters.len() - 3..];
        if tail.iter().all(|c| *c == tail[0]) {
            return Some("deep-focus");
        }
    }
    context
        .recent_nodes
        .windows(3)
        .any(|w| w[0] == w[2] && w[0] != w[1])
        .then_some("oscillation")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> EnhancedContent {
        EnhancedContent::parse("base\n---[0]---\nzero\n---[2]---\ntwo\n---[5]---\nfive")
    }

    #[test]
    fn test_parse_blocks() {
        let content = EnhancedContent::parse(
            "Intro line.\n\n---[2]---\nSecond visit.\n---memory-fragment---\nRemembered.\n",
        );
        assert_eq!(content.base, "Intro line.");
        assert_eq!(content.visit_count_variants.get(&2).map(String::as_str), Some("Second visit."));
        assert_eq!(content.section("memory-fragment"), Some("Remembered."));
        assert!(content.has_variants());
    }

    #[test]
    fn test_delimiters_need_whole_line() {
        let content = EnhancedContent::parse("text ---[2]--- inline\n---\n--- not a name ---\n  ---[3]---  \nthree");
        assert_eq!(content.base, "text ---[2]--- inline\n---\n--- not a name ---");
        assert_eq!(content.visit_count_variants.len(), 1);
        assert!(content.visit_count_variants.contains_key(&3));
    }

    #[test]
    fn test_duplicate_key_keeps_last() {
        let content = EnhancedContent::parse("---echo---\nfirst\n---echo---\nsecond");
        assert_eq!(content.section("echo"), Some("second"));
        assert_eq!(content.base, "");
    }

    #[test]
    fn test_visit_count_fallback() {
        let selector = VariantSelector::new();
        let content = thresholds();
        assert_eq!(selector.select(&content, &VariantContext::new(3)), "two");
        assert_eq!(selector.select(&content, &VariantContext::new(10)), "five");
        assert_eq!(selector.select(&content, &VariantContext::new(0)), "zero");

        let sparse = EnhancedContent::parse("base\n---[2]---\ntwo\n---[5]---\nfive");
        assert_eq!(selector.select(&sparse, &VariantContext::new(1)), "five");
    }

    #[test]
    fn test_plain_text_is_base() {
        let selector = VariantSelector::new();
        assert_eq!(selector.select(&EnhancedContent::parse("Just text."), &VariantContext::new(4)), "Just text.");
        assert_eq!(selector.select(&EnhancedContent::default(), &VariantContext::new(4)), "");
    }

    #[test]
    fn test_bleed_section_first() {
        let selector = VariantSelector::new();
        let content = EnhancedContent::parse(
            "base\n---algorithm-bleed---\nbled\n---recursive-awareness---\naware",
        );
        let mut path = ReaderPath::new();
        path.record_visit(&NodeState::new("alg", Character::Algorithm, 5));
        let node = NodeState::new("arch", Character::Archaeologist, 2);
        path.record_visit(&node);

        let context = VariantContext::from_path(&path, &node, 5);
        assert_eq!(context.last_character, Some(Character::Algorithm));
        assert_eq!(
            selector.choose(&content, &context),
            VariantChoice::CharacterBleed("algorithm-bleed".to_string())
        );
    }

    #[test]
    fn test_recursive_awareness_section() {
        let selector = VariantSelector::new();
        let content = EnhancedContent::parse("base\n---recursive-awareness---\naware");
        let context = VariantContext {
            recursive_awareness: 0.75,
            ..VariantContext::new(1)
        };
        assert_eq!(selector.select(&content, &context), "aware");

        let calm = VariantContext {
            recursive_awareness: 0.7,
            ..VariantContext::new(0)
        };
        assert_eq!(selector.select(&content, &calm), "base");
    }

    #[test]
    fn test_rhythm_sections() {
        let selector = VariantSelector::new();
        let content = EnhancedContent::parse("base\n---deep-focus---\nfocus\n---oscillation---\nbounce");

        let focused = VariantContext {
            recent_characters: vec![Character::LastHuman; 3],
            ..VariantContext::new(1)
        };
        assert_eq!(selector.select(&content, &focused), "focus");

        let bouncing = VariantContext {
            recent_nodes: ["a", "b", "a"].into_iter().map(NodeId::from).collect(),
            recent_characters: vec![Character::Algorithm, Character::LastHuman, Character::Algorithm],
            ..VariantContext::new(1)
        };
        assert_eq!(selector.select(&content, &bouncing), "bounce");
    }

    #[test]
    fn test_attractor_section() {
        let selector = VariantSelector::new();
        let content = EnhancedContent::parse("base\n---[1]---\none\n---memory-fragment---\nremembered");
        let mut context = VariantContext::new(1);
        context.attractor_engagements.insert(AttractorTag::from("memory"), 2);
        assert_eq!(selector.select(&content, &context), "one");

        context.attractor_engagements.insert(AttractorTag::from("memory"), 3);
        assert_eq!(selector.select(&content, &context), "remembered");
    }
}
