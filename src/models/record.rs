//! Document model representing one normalized Primo record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A flat, normalized view of one Primo document.
///
/// Constructed once per document during response parsing and immutable
/// afterwards; consumed by the record collection factory. Absent fields
/// default to empty rather than failing the parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentItem {
    /// Record identifier with its 3-character routing prefix stripped
    pub record_id: String,

    /// Display title
    pub title: String,

    /// Resource formats/types
    pub format: Vec<String>,

    /// Creators/authors
    pub creator: Vec<String>,

    /// Subject headings
    pub subjects: Vec<String>,

    /// Host item statement (journal, volume, pages as one string)
    pub is_part_of: String,

    /// Normalized description, see the description processing rules
    pub description: String,

    /// Language code
    pub language: String,

    /// Source database label
    pub source: String,

    /// Display identifier (ISBN/ISSN statement)
    pub identifier: String,

    /// Fulltext availability marker
    pub fulltext: String,

    /// ISSNs merged from the search and addata sections, deduplicated
    /// preferring the dashed form
    pub issn: Vec<String>,

    /// Publisher statement
    pub publisher: String,

    /// Whether the record is flagged as peer reviewed
    pub peer_reviewed: bool,

    /// Record landing URL
    pub url: String,

    /// Identifiers of records this one cites, `cdi_`-prefixed
    pub cites: Vec<String>,

    /// Identifiers of records citing this one, `cdi_`-prefixed
    pub cited_by: Vec<String>,

    /// Container (journal) title
    pub container_title: String,

    /// Container volume
    pub container_volume: String,

    /// Container issue
    pub container_issue: String,

    /// First page in the container
    pub container_start_page: String,

    /// Last page in the container
    pub container_end_page: String,

    /// DOIs
    pub doi: Vec<String>,

    /// Highlighted snippets per display field, present only when
    /// highlighting was requested and markup was found
    pub highlight_details: HashMap<String, Vec<String>>,

    /// Opaque structured copy of the source record
    pub full_record: serde_json::Value,
}

/// Strip the 3-character routing prefix from a raw record id.
pub(crate) fn strip_record_prefix(id: &str) -> String {
    id.get(3..).unwrap_or_default().to_string()
}

/// Prefix a citation identifier with `cdi_` unless it already carries it.
pub(crate) fn cdi_prefixed(id: &str) -> String {
    if id.starts_with("cdi_") {
        id.to_string()
    } else {
        format!("cdi_{}", id)
    }
}

/// Merge and deduplicate ISSN lists.
///
/// Values are trimmed and deduplicated preserving first-seen order; an
/// 8-character dash-less ISSN is dropped when its `XXXX-XXXX` equivalent is
/// also present.
pub fn normalize_issns<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for value in raw {
        let value = value.trim().to_string();
        if value.is_empty() || out.contains(&value) {
            continue;
        }
        out.push(value);
    }

    let dashed: Vec<String> = out
        .iter()
        .filter(|v| v.len() == 9 && v.as_bytes().get(4) == Some(&b'-'))
        .cloned()
        .collect();

    out.retain(|v| {
        if v.len() == 8 && v.chars().all(|c| c.is_ascii_alphanumeric()) {
            let equivalent = format!("{}-{}", &v[0..4], &v[4..8]);
            !dashed.contains(&equivalent)
        } else {
            true
        }
    });

    out
}
