//! Effect catalogue for every ordered character pair.

use rand::Rng;
use serde::{Deserialize, Serialize};

use story_model::{
    Character, CommentStyle, EmphasisStyle, ExpandStyle, FragmentStyle, TextTransformation,
};

/// Vocabulary class an effect scans for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectCategory {
    Technical,
    RepeatedWords,
    Temporal,
    Emotional,
}

const TECHNICAL_TERMS: &[&str] = &[
    "algorithm", "data", "system", "process", "signal", "code", "network", "pattern", "compute",
    "archive", "sequence", "protocol",
];

const TEMPORAL_TERMS: &[&str] = &[
    "remember", "before", "after", "ago", "future", "past", "once", "yesterday", "tomorrow",
    "then", "now", "time", "years",
];

const EMOTIONAL_TERMS: &[&str] = &[
    "fear", "hope", "love", "grief", "alone", "lost", "longing", "warmth", "sorrow", "afraid",
    "loss", "joy",
];

/// Effects for a transition, in the order they should be tried.
pub fn effects_for(from: Character, to: Character) -> &'static [EffectCategory] {
    use Character::*;
    use EffectCategory::*;
    match (from, to) {
        (Archaeologist, Algorithm) => &[Technical, Temporal, RepeatedWords],
        (Archaeologist, LastHuman) => &[Emotional, Temporal],
        (Algorithm, Archaeologist) => &[Temporal, Technical],
        (Algorithm, LastHuman) => &[Technical, Emotional],
        (LastHuman, Archaeologist) => &[Emotional, RepeatedWords],
        (LastHuman, Algorithm) => &[Emotional, RepeatedWords, Technical],
        _ => &[],
    }
}

/// Build the effect of `category` for the voice `to`, if `text` offers a target.
pub fn generate(
    category: EffectCategory,
    from: Character,
    to: Character,
    text: &str,
    intensity: u8,
) -> Option<TextTransformation> {
    match category {
        EffectCategory::Technical => {
            let term = find_term(text, TECHNICAL_TERMS)?;
            Some(match to {
                Character::Algorithm => {
                    TextTransformation::fragment(term, "\u{b7}", FragmentStyle::Character)
                }
                Character::Archaeologist => TextTransformation::meta_comment(
                    term,
                    format!("a word carried over from {}", from.display_name()),
                    CommentStyle::Inline,
                ),
                Character::LastHuman => {
                    TextTransformation::emphasize(term, EmphasisStyle::Glitch, intensity)
                }
            })
        }
        EffectCategory::RepeatedWords => {
            let word = find_repeated_word(text)?;
            Some(match to {
                Character::Algorithm => {
                    TextTransformation::fragment(word, word, FragmentStyle::Progressive)
                }
                _ => TextTransformation::emphasize(word, EmphasisStyle::Fade, intensity),
            })
        }
        EffectCategory::Temporal => {
            let term = find_term(text, TEMPORAL_TERMS)?;
            let style = if intensity >= 3 {
                ExpandStyle::Paragraph
            } else {
                ExpandStyle::Inline
            };
            let echo = match to {
                Character::Algorithm => cosmetic_timestamp(),
                Character::Archaeologist => "(another stratum beneath this one)".to_string(),
                Character::LastHuman => "(the last time it mattered)".to_string(),
            };
            Some(TextTransformation::expand(term, echo, style))
        }
        EffectCategory::Emotional => {
            let term = find_term(text, EMOTIONAL_TERMS)?;
            Some(match to {
                Character::Algorithm => TextTransformation::meta_comment(
                    term,
                    "unquantified variable",
                    CommentStyle::Interlinear,
                ),
                Character::Archaeologist => {
                    TextTransformation::emphasize(term, EmphasisStyle::Italic, intensity)
                }
                Character::LastHuman => {
                    TextTransformation::emphasize(term, EmphasisStyle::Bold, intensity)
                }
            })
        }
    }
}

/// The generic "perspective shift" note, anchored on the first word of the text.
pub fn perspective_shift(from: Character, to: Character, text: &str) -> Option<TextTransformation> {
    let anchor = words(text).next()?;
    Some(TextTransformation::meta_comment(
        anchor,
        format!(
            "perspective shift: {} bleeds into {}",
            from.display_name(),
            to.display_name()
        ),
        CommentStyle::Marginalia,
    ))
}

/// Decorative machine timestamp. Never used for scoring or conditions.
fn cosmetic_timestamp() -> String {
    let mut rng = rand::thread_rng();
    format!("[t+{:04}.{:03}]", rng.gen_range(0..10_000), rng.gen_range(0..1_000))
}

/// Alphabetic tokens of `text` as they appear in it.
fn words(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.split(|c: char| !c.is_alphabetic() && c != '\'')
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
}

/// Whether the first literal occurrence of `word` in `text`, where transformations splice,
/// is a whole word.
fn first_occurrence_is_whole_word(text: &str, word: &str) -> bool {
    let Some(start) = text.find(word) else {
        return false;
    };
    let is_word_char = |c: char| c.is_alphabetic() || c == '\'';
    let before = text[..start].chars().next_back();
    let after = text[start + word.len()..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

/// First token whose lowercase form is in `vocabulary`.
fn find_term<'a>(text: &'a str, vocabulary: &[&str]) -> Option<&'a str> {
    words(text).find(|w| {
        vocabulary.contains(&w.to_lowercase().as_str()) && first_occurrence_is_whole_word(text, w)
    })
}

/// First word of four or more letters that occurs at least twice.
fn find_repeated_word(text: &str) -> Option<&str> {
    let tokens: Vec<&str> = words(text).filter(|w| w.chars().count() >= 4).collect();
    tokens.iter().enumerate().find_map(|(i, word)| {
        (tokens[i + 1..].iter().any(|other| other.eq_ignore_ascii_case(word))
            && first_occurrence_is_whole_word(text, word))
        .then_some(*word)
    })
}
