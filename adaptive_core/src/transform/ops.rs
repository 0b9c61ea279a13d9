//! Single-transformation text operations.
//!
//! Every operation splices at the first literal occurrence of the selector and wraps what it
//! produces in a marker span carrying [`SENTINEL`] and a per-transformation signature. A
//! transformation whose signature is already present is not applied again.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use story_model::{
    CommentStyle, EmphasisStyle, ExpandStyle, FragmentStyle, TextTransformation,
    TransformationKind,
};

use crate::cache::hash_of;
use crate::error::TransformError;

/// Class carried by every span the applier writes.
pub const SENTINEL: &str = "narrative-transformed";

const FOOTNOTES_OPEN: &str = "<ol class=\"narrative-footnotes\">";

/// Markdown emphasis markers, longest first.
const MARKERS: [&str; 7] = ["***", "**", "__", "~~", "*", "_", "`"];

/// Short stable id of a transformation, written into `data-transform-id`.
pub fn signature(transformation: &TextTransformation) -> String {
    let bytes = serde_json::to_vec(transformation)
        .unwrap_or_else(|_| format!("{:?}", transformation).into_bytes());
    format!("{:08x}", hash_of(&bytes) as u32)
}

/// Whether `content` already carries the effect of `transformation`.
pub fn is_applied(content: &str, transformation: &TextTransformation) -> bool {
    content.contains(&format!("data-transform-id=\"{}\"", signature(transformation)))
}

/// Apply one transformation to the first occurrence of its selector.
pub fn apply_transformation(
    content: &str,
    transformation: &TextTransformation,
) -> Result<String, TransformError> {
    if transformation.kind == TransformationKind::Unknown {
        return Ok(content.to_string());
    }
    let selector = transformation.selector.as_str();
    if selector.is_empty() {
        return Err(TransformError::EmptySelector);
    }
    if is_applied(content, transformation) {
        return Ok(content.to_string());
    }

    let start = content
        .find(selector)
        .ok_or_else(|| TransformError::SelectorNotFound(selector.to_string()))?;
    let end = start + selector.len();
    let (before, target, after) = match (content.get(..start), content.get(start..end), content.get(end..)) {
        (Some(before), Some(target), Some(after)) => (before, target, after),
        _ => return Err(TransformError::InvalidBoundary(selector.to_string())),
    };
    let id = signature(transformation);

    let result = match &transformation.kind {
        TransformationKind::Replace {
            replacement,
            preserve_formatting,
        } => {
            let marker = if *preserve_formatting {
                emphasis_marker(target)
            } else {
                ""
            };
            format!(
                "{before}{marker}{}{marker}{after}",
                span("transform-replace", &id, replacement)
            )
        }
        TransformationKind::Fragment { pattern, style } => {
            let fragmented = fragment(target, pattern, *style);
            let classes = format!("transform-fragment fragment-{}", fragment_name(*style));
            format!("{before}{}{after}", span(&classes, &id, &fragmented))
        }
        TransformationKind::Expand { text, style } => {
            let classes = format!("transform-expand expand-{}", expand_name(*style));
            let addition = span(&classes, &id, text);
            match style {
                ExpandStyle::Inline | ExpandStyle::Reveal => {
                    format!("{before}{target} {addition}{after}")
                }
                ExpandStyle::Append => {
                    let line_end = after.find('\n').map_or(content.len(), |i| end + i);
                    format!("{} {addition}{}", &content[..line_end], &content[line_end..])
                }
                ExpandStyle::Paragraph => {
                    let paragraph_end = after.find("\n\n").map_or(content.len(), |i| end + i);
                    format!(
                        "{}\n\n{addition}{}",
                        &content[..paragraph_end],
                        &content[paragraph_end..]
                    )
                }
            }
        }
        TransformationKind::Emphasize { style, intensity } => {
            let intensity = (*intensity).clamp(1, 5);
            let classes = format!(
                "transform-emphasize emphasis-{} intensity-{}",
                emphasis_name(*style),
                intensity
            );
            format!(
                "{before}{}{after}",
                span(&classes, &id, &emphasize(target, *style, intensity))
            )
        }
        TransformationKind::MetaComment { text, style } => match style {
            CommentStyle::Inline => format!(
                "{before}{target} {}{after}",
                span(
                    "transform-comment comment-inline",
                    &id,
                    &format!("[{}]", escape_markup(text))
                )
            ),
            CommentStyle::Footnote => footnote(before, target, after, text, &id, selector),
            CommentStyle::Marginalia => format!(
                "{before}<span class=\"{SENTINEL} transform-comment comment-marginalia\" \
                 data-transform-id=\"{id}\" data-note=\"{}\">{target}</span>{after}",
                escape_markup(text)
            ),
            CommentStyle::Interlinear => {
                let inner = format!(
                    "{target}<span class=\"interlinear-gloss\">{}</span>",
                    escape_markup(text)
                );
                format!(
                    "{before}{}{after}",
                    span("transform-comment comment-interlinear", &id, &inner)
                )
            }
        },
        TransformationKind::Unknown => content.to_string(),
    };
    Ok(result)
}

fn span(classes: &str, id: &str, inner: &str) -> String {
    format!("<span class=\"{SENTINEL} {classes}\" data-transform-id=\"{id}\">{inner}</span>")
}

/// Comment text is plain text wherever it lands, inside an attribute or between tags.
fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// The markdown marker wrapping the whole selector, if any.
fn emphasis_marker(selector: &str) -> &'static str {
    MARKERS
        .into_iter()
        .find(|m| {
            selector.len() > 2 * m.len() && selector.starts_with(m) && selector.ends_with(m)
        })
        .unwrap_or("")
}

fn fragment(target: &str, pattern: &str, style: FragmentStyle) -> String {
    match style {
        FragmentStyle::Character => interleave(target, pattern),
        FragmentStyle::Word => {
            let words: Vec<&str> = target.split_whitespace().collect();
            if words.len() < 2 {
                format!("{target}{pattern}")
            } else {
                words.join(&format!(" {pattern} "))
            }
        }
        FragmentStyle::Progressive => {
            let mut out = String::with_capacity(target.len() * 2);
            for (i, c) in target.chars().enumerate() {
                if i > 0 {
                    out.push_str(&pattern.repeat(i.min(5)));
                }
                out.push(c);
            }
            out
        }
        FragmentStyle::Random => {
            // Seeded per (selector, pattern) so a render is reproducible.
            let mut rng = StdRng::seed_from_u64(hash_of(&(target, pattern)));
            target
                .split(' ')
                .map(|word| {
                    if rng.gen_bool(0.5) {
                        interleave(word, pattern)
                    } else {
                        word.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        }
    }
}

fn interleave(text: &str, pattern: &str) -> String {
    text.chars()
        .map(String::from)
        .collect::<Vec<_>>()
        .join(pattern)
}

fn emphasize(target: &str, style: EmphasisStyle, intensity: u8) -> String {
    match style {
        EmphasisStyle::Italic => format!("<em>{target}</em>"),
        EmphasisStyle::Bold => format!("<strong>{target}</strong>"),
        EmphasisStyle::Spacing => {
            let gap = " ".repeat(((intensity + 1) / 2) as usize);
            interleave(target, &gap)
        }
        EmphasisStyle::Glitch => target
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if i < intensity as usize {
                    format!("{c}\u{0337}")
                } else {
                    c.to_string()
                }
            })
            .collect(),
        EmphasisStyle::Color | EmphasisStyle::Highlight | EmphasisStyle::Fade => target.to_string(),
    }
}

/// Anchor the note at the selector and register it once in the footnote block.
fn footnote(before: &str, target: &str, after: &str, text: &str, id: &str, selector: &str) -> String {
    let key = format!("{:06x}", hash_of(selector) & 0xff_ffff);
    let mut body = format!(
        "{before}{target}<sup class=\"{SENTINEL} transform-comment comment-footnote\" \
         data-transform-id=\"{id}\"><a href=\"#fn-{key}\">*</a></sup>{after}"
    );

    if body.contains(&format!("id=\"fn-{key}\"")) {
        return body;
    }
    let entry = format!("<li id=\"fn-{key}\">{}</li>\n", escape_markup(text));
    let close = body
        .rfind(FOOTNOTES_OPEN)
        .and_then(|open| body[open..].find("</ol>").map(|i| open + i));
    match close {
        Some(at) => body.insert_str(at, &entry),
        None => body.push_str(&format!("\n\n{FOOTNOTES_OPEN}\n{entry}</ol>")),
    }
    body
}

fn fragment_name(style: FragmentStyle) -> &'static str {
    match style {
        FragmentStyle::Character => "character",
        FragmentStyle::Word => "word",
        FragmentStyle::Progressive => "progressive",
        FragmentStyle::Random => "random",
    }
}

fn expand_name(style: ExpandStyle) -> &'static str {
    match style {
        ExpandStyle::Append => "append",
        ExpandStyle::Inline => "inline",
        ExpandStyle::Paragraph => "paragraph",
        ExpandStyle::Reveal => "reveal",
    }
}

fn emphasis_name(style: EmphasisStyle) -> &'static str {
    match style {
        EmphasisStyle::Italic => "italic",
        EmphasisStyle::Bold => "bold",
        EmphasisStyle::Color => "color",
        EmphasisStyle::Spacing => "spacing",
        EmphasisStyle::Highlight => "highlight",
        EmphasisStyle::Glitch => "glitch",
        EmphasisStyle::Fade => "fade",
    }
}
