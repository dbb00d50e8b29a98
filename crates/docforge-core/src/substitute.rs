//! Placeholder substitution over runs.
//!
//! Word processors split text into runs at arbitrary points, so a token may
//! sit inside one run or straddle several. Each block is handled in two
//! passes over its run list:
//!
//! 1. Matches are located in the block's concatenated text, longest token
//!    first at every position.
//! 2. If no match crosses a run boundary, every match is replaced inside the
//!    run that holds it and all run formatting survives. Otherwise the fully
//!    substituted text goes into the first run and the other runs are
//!    emptied.
//!
//! Values come from a [`ValueSource`]. [`RecordValues`] serves one record.
//! [`OccurrenceValues`] serves a chunk of records: the K-th physical
//! occurrence of a token takes the K-th record's value. Its counters are the
//! traversal context threaded through the whole document.

use crate::document::{Paragraph, TemplateDocument};
use crate::mapping::Mapping;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tokens in match priority order: longest first, ties lexicographic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    tokens: Vec<String>,
}

/// One located token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMatch<'a> {
    pub start: usize,
    pub end: usize,
    pub token: &'a str,
}

impl TokenSet {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens: Vec<String> = tokens
            .into_iter()
            .map(Into::into)
            .filter(|t| !t.is_empty())
            .collect();
        tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        tokens.dedup();
        Self { tokens }
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Non-overlapping matches scanning left to right.
    #[must_use]
    pub fn find_matches(&self, text: &str) -> Vec<TokenMatch<'_>> {
        let mut matches = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            let rest = &text[pos..];
            if let Some(token) = self.tokens.iter().find(|t| rest.starts_with(t.as_str())) {
                matches.push(TokenMatch {
                    start: pos,
                    end: pos + token.len(),
                    token: token.as_str(),
                });
                pos += token.len();
            } else {
                pos += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
        matches
    }
}

/// Supplies the value for each token occurrence, in document order.
pub trait ValueSource {
    fn value_for(&mut self, token: &str) -> String;
}

/// Values for single-row mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordValues {
    values: HashMap<String, String>,
}

impl RecordValues {
    #[must_use]
    pub fn new(mapping: &Mapping, record: &Record) -> Self {
        Self {
            values: mapping.resolve_all(record),
        }
    }
}

impl ValueSource for RecordValues {
    fn value_for(&mut self, token: &str) -> String {
        self.values.get(token).cloned().unwrap_or_default()
    }
}

/// Values for multi-row mode, with one occurrence counter per token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccurrenceValues {
    rows: Vec<HashMap<String, String>>,
    next: HashMap<String, usize>,
}

impl OccurrenceValues {
    #[must_use]
    pub fn new(mapping: &Mapping, records: &[Record]) -> Self {
        Self {
            rows: records.iter().map(|r| mapping.resolve_all(r)).collect(),
            next: HashMap::new(),
        }
    }

    /// Occurrences of `token` consumed so far.
    #[must_use]
    pub fn consumed(&self, token: &str) -> usize {
        self.next.get(token).copied().unwrap_or(0)
    }
}

impl ValueSource for OccurrenceValues {
    fn value_for(&mut self, token: &str) -> String {
        let index = self.next.entry(token.to_string()).or_insert(0);
        let value = self
            .rows
            .get(*index)
            .and_then(|row| row.get(token))
            .cloned()
            .unwrap_or_default();
        *index += 1;
        value
    }
}

/// What happened to one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEdit {
    Untouched,
    /// Replacements made inside runs; carries the match count.
    RunLocal(usize),
    /// A token crossed a run boundary; the block was collapsed into its first run.
    Consolidated(usize),
}

/// Totals for a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionStats {
    pub replaced: usize,
    pub run_local_blocks: usize,
    pub consolidated_blocks: usize,
}

fn splice(text: &str, matches: &[TokenMatch<'_>], values: &[String], base: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (m, value) in matches.iter().zip(values) {
        out.push_str(&text[cursor..m.start - base]);
        out.push_str(value);
        cursor = m.end - base;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Substitute every token occurrence in one block.
pub fn substitute_paragraph<S>(paragraph: &mut Paragraph, tokens: &TokenSet, source: &mut S) -> BlockEdit
where
    S: ValueSource + ?Sized,
{
    let text = paragraph.text();
    let matches = tokens.find_matches(&text);
    if matches.is_empty() {
        return BlockEdit::Untouched;
    }

    let mut boundaries = Vec::with_capacity(paragraph.runs.len());
    let mut offset = 0;
    for run in &paragraph.runs {
        offset += run.text.len();
        boundaries.push(offset);
    }
    let spans_runs = matches
        .iter()
        .any(|m| boundaries.iter().any(|&b| m.start < b && b < m.end));

    let values: Vec<String> = matches.iter().map(|m| source.value_for(m.token)).collect();

    if spans_runs {
        paragraph.collapse_into_first_run(splice(&text, &matches, &values, 0));
        return BlockEdit::Consolidated(matches.len());
    }

    let mut next = 0;
    let mut run_start = 0;
    for run in &mut paragraph.runs {
        let run_end = run_start + run.text.len();
        let first = next;
        while next < matches.len() && matches[next].end <= run_end {
            next += 1;
        }
        if next > first {
            run.text = splice(&run.text, &matches[first..next], &values[first..next], run_start);
        }
        run_start = run_end;
    }
    BlockEdit::RunLocal(matches.len())
}

/// Substitute across the whole document in block order.
pub fn substitute_document<S>(
    document: &mut TemplateDocument,
    tokens: &TokenSet,
    source: &mut S,
) -> SubstitutionStats
where
    S: ValueSource + ?Sized,
{
    let mut stats = SubstitutionStats::default();
    if tokens.is_empty() {
        return stats;
    }
    for paragraph in document.paragraphs_mut() {
        match substitute_paragraph(paragraph, tokens, source) {
            BlockEdit::Untouched => {}
            BlockEdit::RunLocal(n) => {
                stats.replaced += n;
                stats.run_local_blocks += 1;
            }
            BlockEdit::Consolidated(n) => {
                stats.replaced += n;
                stats.consolidated_blocks += 1;
            }
        }
    }
    stats
}
