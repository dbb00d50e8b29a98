//! Placeholder discovery.
//!
//! A placeholder token is `#` followed by a word, optionally followed by
//! whitespace and a second word (`#NAME`, `#P_ ADDRESS`). The indexer scans
//! every block of a template and reports the distinct tokens, how often each
//! occurs, and the largest occurrence count. That maximum is how many records
//! one document consumes in multi-row mode. A two-word capture whose first
//! word also appears alone (`#ITEM each` next to `#ITEM`) counts toward that
//! first word.
//!
//! The conditional markers `#IF(...)` and `#ENDIF` look like tokens but are
//! never reported.

use crate::document::TemplateDocument;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static RE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\w+(?:\s+\w+)?").expect("regex is compile-time constant"));

static RE_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\w+").expect("regex is compile-time constant"));

/// Result of scanning a template for placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDiscovery {
    /// Sorted distinct tokens.
    pub placeholders: Vec<String>,
    /// Occurrences of each token across the whole template.
    pub occurrences: BTreeMap<String, usize>,
    /// Highest occurrence count after folding run-on captures into their
    /// first word, 1 when the template has no placeholders.
    pub rows_per_document: usize,
}

impl Default for TemplateDiscovery {
    fn default() -> Self {
        Self {
            placeholders: Vec::new(),
            occurrences: BTreeMap::new(),
            rows_per_document: 1,
        }
    }
}

impl TemplateDiscovery {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    #[must_use]
    pub fn occurrences_of(&self, token: &str) -> usize {
        self.occurrences.get(token).copied().unwrap_or(0)
    }
}

/// First word of a token: `#P_ ADDRESS` gives `#P_`.
#[must_use]
pub fn token_head(token: &str) -> &str {
    RE_HEAD.find(token).map_or(token, |m| m.as_str())
}

fn is_marker(text: &str, start: usize, token: &str) -> bool {
    match token_head(token) {
        "#ENDIF" => true,
        "#IF" => text[start + 3..].starts_with('('),
        _ => false,
    }
}

/// Placeholder tokens in `text`, in order of appearance.
#[must_use]
pub fn find_tokens(text: &str) -> Vec<&str> {
    RE_TOKEN
        .find_iter(text)
        .filter(|m| !is_marker(text, m.start(), m.as_str()))
        .map(|m| m.as_str())
        .collect()
}

/// Scan every block of `document` in document order.
#[must_use]
pub fn discover(document: &TemplateDocument) -> TemplateDiscovery {
    let mut occurrences: BTreeMap<String, usize> = BTreeMap::new();
    for paragraph in document.paragraphs() {
        let text = paragraph.text();
        for token in find_tokens(&text) {
            *occurrences.entry(token.to_string()).or_insert(0) += 1;
        }
    }

    let placeholders: Vec<String> = occurrences.keys().cloned().collect();
    let mut folded: BTreeMap<&str, usize> = BTreeMap::new();
    for (token, count) in &occurrences {
        let head = token_head(token);
        let key = if occurrences.contains_key(head) { head } else { token.as_str() };
        *folded.entry(key).or_insert(0) += count;
    }
    let rows_per_document = folded.values().copied().max().unwrap_or(1);

    log::debug!(
        "Discovered {} placeholder(s), {} row(s) per document",
        placeholders.len(),
        rows_per_document
    );

    TemplateDiscovery {
        placeholders,
        occurrences,
        rows_per_document,
    }
}
