//! Highlight markup reconciliation and description normalization.
//!
//! The upstream APIs wrap matched query terms in `<span>` elements and may
//! emit that markup whether or not the caller asked for highlighting, so
//! field values are always stripped. When highlighting was requested the
//! matched snippets are re-wrapped with the caller's start/end tags into a
//! parallel `highlight_details` map. Occasionally the API double-wraps a
//! term; nested spans are collapsed to one marker pair first.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{DocumentItem, SearchArgs};

const DESCRIPTION_LIMIT: usize = 2500;

fn highlight_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<span[^>]*>([^<]*?)</span>").expect("valid highlight regex"))
}

fn nested_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<span[^>]*>\s*(<span[^>]*>[^<]*</span>)\s*</span>")
            .expect("valid nested span regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

/// Remove all highlight spans from a value, keeping their text content.
///
/// Runs to a fixed point so nested wrapping cannot leave residue, which
/// also makes the operation idempotent.
pub(crate) fn strip_highlight(value: &str) -> String {
    let mut current = value.to_string();
    loop {
        let next = highlight_re().replace_all(&current, "$1").into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Replace highlight spans with the caller's start/end markers.
fn rewrap_highlight(value: &str, start: &str, end: &str) -> String {
    let mut collapsed = value.to_string();
    loop {
        let next = nested_span_re().replace_all(&collapsed, "$1").into_owned();
        if next == collapsed {
            break;
        }
        collapsed = next;
    }
    highlight_re()
        .replace_all(&collapsed, |caps: &regex::Captures| {
            format!("{}{}{}", start, &caps[1], end)
        })
        .into_owned()
}

/// Process one display field: the stored value is always stripped; when
/// highlighting is enabled and markup was present, the re-wrapped detail is
/// returned alongside.
pub(crate) fn process_field(
    value: &str,
    enabled: bool,
    start: &str,
    end: &str,
) -> (String, Option<String>) {
    let stripped = strip_highlight(value);
    if enabled && highlight_re().is_match(value) {
        let detail = rewrap_highlight(value, start, end);
        (stripped, Some(detail))
    } else {
        (stripped, None)
    }
}

/// Reconcile highlighting over the fixed display field set
/// {title, creator -> author, description} of one document.
pub(crate) fn apply_highlighting(doc: &mut DocumentItem, args: &SearchArgs) {
    let (title, detail) = process_field(
        &doc.title,
        args.highlight,
        &args.highlight_start,
        &args.highlight_end,
    );
    doc.title = title;
    if let Some(detail) = detail {
        doc.highlight_details.insert("title".to_string(), vec![detail]);
    }

    let mut author_details = Vec::new();
    for creator in doc.creator.iter_mut() {
        let (value, detail) = process_field(
            creator,
            args.highlight,
            &args.highlight_start,
            &args.highlight_end,
        );
        *creator = value;
        if let Some(detail) = detail {
            author_details.push(detail);
        }
    }
    if !author_details.is_empty() {
        doc.highlight_details
            .insert("author".to_string(), author_details);
    }

    let (description, detail) = process_field(
        &doc.description,
        args.highlight,
        &args.highlight_start,
        &args.highlight_end,
    );
    doc.description = description;
    if let Some(detail) = detail {
        doc.highlight_details
            .insert("description".to_string(), vec![detail]);
    }
}

/// Normalize a raw description for display.
///
/// Truncates to 2500 characters, normalizes `<P>` to `<p>`, splits on
/// paragraph tags, strips the remaining markup per paragraph, drops empty
/// paragraphs and rejoins with `<br>`.
pub(crate) fn process_description(raw: &str) -> String {
    let truncated: String = raw.chars().take(DESCRIPTION_LIMIT).collect();
    let normalized = truncated.replace("<P>", "<p>");

    let paragraphs: Vec<String> = normalized
        .split("<p>")
        .map(|para| tag_re().replace_all(para, "").trim().to_string())
        .filter(|para| !para.is_empty())
        .collect();

    paragraphs.join("<br>")
}
