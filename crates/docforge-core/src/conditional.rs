//! Conditional regions: `#IF(predicate) ... #ENDIF`.
//!
//! Regions span blocks and nest. The resolver walks the blocks of a document
//! in order. For each opening marker it finds the matching `#ENDIF` by
//! counting nested markers. A true predicate strips both markers and keeps
//! everything between. A false predicate removes every block from the opening
//! block through the closing block. An opening marker without a match leaves
//! the text untouched.
//!
//! Block clearing is deferred until the scan is complete, so marker offsets
//! computed during the scan always refer to unmodified text.

use crate::condition::Predicate;
use crate::document::{Paragraph, TemplateDocument};
use crate::record::Record;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static RE_IF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#IF\(([^)]*)\)").expect("regex is compile-time constant"));

const ENDIF: &str = "#ENDIF";

/// Counts from one resolver pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalOutcome {
    /// Regions whose predicate held; markers stripped.
    pub kept: usize,
    /// Regions whose predicate failed; blocks cleared.
    pub removed: usize,
    /// Opening markers with no matching `#ENDIF`.
    pub unterminated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Marker {
    If {
        start: usize,
        end: usize,
        predicate: String,
    },
    EndIf {
        start: usize,
        end: usize,
    },
}

impl Marker {
    const fn start(&self) -> usize {
        match self {
            Self::If { start, .. } | Self::EndIf { start, .. } => *start,
        }
    }
}

/// Markers in `text` at or after byte offset `from`, in order.
fn markers(text: &str, from: usize) -> Vec<Marker> {
    let tail = &text[from..];
    let mut found: Vec<Marker> = RE_IF
        .captures_iter(tail)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Marker::If {
                start: from + whole.start(),
                end: from + whole.end(),
                predicate: caps.get(1).map_or("", |m| m.as_str()).to_string(),
            })
        })
        .collect();

    let opening: Vec<(usize, usize)> = found
        .iter()
        .filter_map(|m| match m {
            Marker::If { start, end, .. } => Some((*start, *end)),
            Marker::EndIf { .. } => None,
        })
        .collect();

    for (offset, _) in tail.match_indices(ENDIF) {
        let start = from + offset;
        if opening.iter().any(|(s, e)| start >= *s && start < *e) {
            continue;
        }
        found.push(Marker::EndIf {
            start,
            end: start + ENDIF.len(),
        });
    }

    found.sort_by_key(Marker::start);
    found
}

/// Locate the `#ENDIF` closing a region opened in `block` before `from`.
///
/// Returns `(block, start, end)` of the closing marker.
fn find_closing(texts: &[String], block: usize, from: usize) -> Option<(usize, usize, usize)> {
    let mut depth = 1usize;
    for (index, text) in texts.iter().enumerate().skip(block) {
        let offset = if index == block { from } else { 0 };
        for marker in markers(text, offset) {
            match marker {
                Marker::If { .. } => depth += 1,
                Marker::EndIf { start, end } => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((index, start, end));
                    }
                }
            }
        }
    }
    None
}

fn resolve_blocks(blocks: &mut [&mut Paragraph], record: &Record) -> ConditionalOutcome {
    let mut texts: Vec<String> = blocks.iter().map(|b| b.text()).collect();
    let mut cleared = vec![false; blocks.len()];
    let mut outcome = ConditionalOutcome::default();

    let mut block = 0;
    let mut offset = 0;
    while block < blocks.len() {
        let opening = markers(&texts[block], offset)
            .into_iter()
            .find(|m| matches!(m, Marker::If { .. }));
        let Some(Marker::If {
            start,
            end,
            predicate,
        }) = opening
        else {
            block += 1;
            offset = 0;
            continue;
        };

        let Some((close_block, close_start, close_end)) = find_closing(&texts, block, end) else {
            log::warn!("Unterminated #IF({predicate}) in block {block}, region left untouched");
            outcome.unterminated += 1;
            offset = end;
            continue;
        };

        if Predicate::parse(&predicate).evaluate(record) {
            // The closing marker sits after the opening one, so remove it
            // first to keep the opening offsets valid.
            blocks[close_block].replace_range(close_start, close_end, "");
            texts[close_block] = blocks[close_block].text();
            blocks[block].replace_range(start, end, "");
            texts[block] = blocks[block].text();
            outcome.kept += 1;
            offset = start;
        } else {
            for flag in &mut cleared[block..=close_block] {
                *flag = true;
            }
            outcome.removed += 1;
            block = close_block + 1;
            offset = 0;
        }
    }

    for (paragraph, clear) in blocks.iter_mut().zip(cleared) {
        if clear {
            paragraph.clear();
        }
    }

    outcome
}

/// Resolve every conditional region of `document` against `record`.
pub fn resolve_conditionals(document: &mut TemplateDocument, record: &Record) -> ConditionalOutcome {
    let mut blocks: Vec<&mut Paragraph> = document.paragraphs_mut().collect();
    let outcome = resolve_blocks(&mut blocks, record);
    if outcome != ConditionalOutcome::default() {
        log::debug!(
            "Conditionals: {} kept, {} removed, {} unterminated",
            outcome.kept,
            outcome.removed,
            outcome.unterminated
        );
    }
    outcome
}
