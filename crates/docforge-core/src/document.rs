//! In-memory model of a rich-text template.
//!
//! A [`TemplateDocument`] holds the text-bearing blocks the engine works on:
//! body paragraphs, paragraphs inside table cells, and header/footer
//! paragraphs of each section. Every paragraph is a list of [`Run`]s, the
//! formatting-homogeneous fragments a word processor splits text into.
//!
//! Block order is fixed: body, then tables (table, row, cell, paragraph),
//! then each section's header followed by its footer. Conditional scanning
//! and multi-row occurrence counting both rely on it.
//!
//! File codecs (see `docforge-docx`) translate their formats into this model
//! and write the edited text back. The model also serializes to JSON, which
//! is a template format in its own right.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Character formatting of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,

    /// Font size in points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
}

/// A formatting-homogeneous text fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    #[serde(default)]
    pub style: RunStyle,
}

impl Run {
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: RunStyle::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn styled(text: impl Into<String>, style: RunStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// A text-bearing block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub runs: Vec<Run>,
}

impl Paragraph {
    #[must_use]
    pub fn from_runs(runs: Vec<Run>) -> Self {
        Self { runs }
    }

    /// Single-run paragraph with default style.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            runs: vec![Run::new(text)],
        }
    }

    /// Concatenated text of all runs.
    #[must_use]
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Put `text` in the first run and clear every other run.
    ///
    /// The first run keeps its style. A paragraph without runs is left as is.
    pub fn collapse_into_first_run(&mut self, text: String) {
        let mut runs = self.runs.iter_mut();
        if let Some(first) = runs.next() {
            first.text = text;
            for run in runs {
                run.text.clear();
            }
        }
    }

    /// Empty the text of every run, keeping the runs themselves.
    pub fn clear(&mut self) {
        for run in &mut self.runs {
            run.text.clear();
        }
    }

    /// Replace the byte range `start..end` of the concatenated text.
    ///
    /// When the range lies inside one run only that run is edited; otherwise
    /// the whole paragraph collapses into its first run.
    pub fn replace_range(&mut self, start: usize, end: usize, replacement: &str) {
        let mut offset = 0;
        for run in &mut self.runs {
            let run_end = offset + run.text.len();
            if start >= offset && end <= run_end && (start < run_end || start == end) {
                run.text
                    .replace_range(start - offset..end - offset, replacement);
                return;
            }
            offset = run_end;
        }
        let mut text = self.text();
        if start <= end && end <= text.len() {
            text.replace_range(start..end, replacement);
            self.collapse_into_first_run(text);
        }
    }
}

/// A table cell holding its own paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub rows: Vec<TableRow>,
}

impl Table {
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> + '_ {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter())
            .flat_map(|cell| cell.paragraphs.iter())
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> + '_ {
        self.rows
            .iter_mut()
            .flat_map(|row| row.cells.iter_mut())
            .flat_map(|cell| cell.paragraphs.iter_mut())
    }
}

/// Header or footer content of a section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderFooter {
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

/// Physical page size in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[inline]
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// A document section: page geometry plus header and footer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderFooter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<HeaderFooter>,
}

impl Section {
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> + '_ {
        self.header
            .iter()
            .chain(self.footer.iter())
            .flat_map(|part| part.paragraphs.iter())
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> + '_ {
        self.header
            .iter_mut()
            .chain(self.footer.iter_mut())
            .flat_map(|part| part.paragraphs.iter_mut())
    }
}

/// Where a block lives in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Body,
    TableCell,
    HeaderFooter,
}

/// The template model the engine fills.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateDocument {
    #[serde(default)]
    pub body: Vec<Paragraph>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl TemplateDocument {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All blocks in document order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> + '_ {
        self.body
            .iter()
            .chain(self.tables.iter().flat_map(|t| t.paragraphs()))
            .chain(self.sections.iter().flat_map(|s| s.paragraphs()))
    }

    /// All blocks in document order, mutably.
    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> + '_ {
        self.body
            .iter_mut()
            .chain(self.tables.iter_mut().flat_map(|t| t.paragraphs_mut()))
            .chain(self.sections.iter_mut().flat_map(|s| s.paragraphs_mut()))
    }

    /// Blocks tagged with where they live, in document order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockKind, &Paragraph)> + '_ {
        self.body
            .iter()
            .map(|p| (BlockKind::Body, p))
            .chain(
                self.tables
                    .iter()
                    .flat_map(|t| t.paragraphs())
                    .map(|p| (BlockKind::TableCell, p)),
            )
            .chain(
                self.sections
                    .iter()
                    .flat_map(|s| s.paragraphs())
                    .map(|p| (BlockKind::HeaderFooter, p)),
            )
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.paragraphs().count()
    }

    /// Concatenated text of every block, one line per block.
    #[must_use]
    pub fn plain_text(&self) -> String {
        let lines: Vec<String> = self.paragraphs().map(Paragraph::text).collect();
        lines.join("\n")
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TemplateDocument {
        TemplateDocument {
            body: vec![Paragraph::from_text("body one"), Paragraph::from_text("body two")],
            tables: vec![Table {
                rows: vec![TableRow {
                    cells: vec![
                        TableCell {
                            paragraphs: vec![Paragraph::from_text("cell a")],
                        },
                        TableCell {
                            paragraphs: vec![Paragraph::from_text("cell b")],
                        },
                    ],
                }],
            }],
            sections: vec![Section {
                page: None,
                header: Some(HeaderFooter {
                    paragraphs: vec![Paragraph::from_text("header")],
                }),
                footer: Some(HeaderFooter {
                    paragraphs: vec![Paragraph::from_text("footer")],
                }),
            }],
        }
    }

    #[test]
    fn test_document_order() {
        let doc = sample();
        let texts: Vec<String> = doc.paragraphs().map(Paragraph::text).collect();
        assert_eq!(
            texts,
            vec!["body one", "body two", "cell a", "cell b", "header", "footer"]
        );
        let kinds: Vec<BlockKind> = doc.blocks().map(|(k, _)| k).collect();
        assert_eq!(kinds[2], BlockKind::TableCell);
        assert_eq!(kinds[5], BlockKind::HeaderFooter);
    }

    #[test]
    fn test_paragraphs_mut_same_order() {
        let mut doc = sample();
        for (i, p) in doc.paragraphs_mut().enumerate() {
            p.collapse_into_first_run(i.to_string());
        }
        assert_eq!(doc.plain_text(), "0\n1\n2\n3\n4\n5");
    }

    #[test]
    fn test_collapse_into_first_run() {
        let mut p = Paragraph::from_runs(vec![Run::new("#NA"), Run::new("ME"), Run::new("!")]);
        p.collapse_into_first_run("Ada!".to_string());
        assert_eq!(p.runs.len(), 3);
        assert_eq!(p.runs[0].text, "Ada!");
        assert!(p.runs[1].text.is_empty());
        assert!(p.runs[2].text.is_empty());

        let mut empty = Paragraph::default();
        empty.collapse_into_first_run("lost".to_string());
        assert!(empty.runs.is_empty());
    }

    #[test]
    fn test_replace_range_within_run() {
        let bold = RunStyle {
            bold: true,
            ..RunStyle::default()
        };
        let mut p = Paragraph::from_runs(vec![Run::new("Hello "), Run::styled("#X here", bold)]);
        p.replace_range(6, 8, "");
        assert_eq!(p.runs[0].text, "Hello ");
        assert_eq!(p.runs[1].text, " here");
        assert!(p.runs[1].style.bold);
    }

    #[test]
    fn test_replace_range_across_runs() {
        let mut p = Paragraph::from_runs(vec![Run::new("ab#E"), Run::new("NDIFcd")]);
        p.replace_range(2, 8, "");
        assert_eq!(p.runs[0].text, "abcd");
        assert_eq!(p.runs[1].text, "");
    }

    #[test]
    fn test_json_roundtrip() {
        let doc = sample();
        let json = doc.to_json_string().unwrap();
        let back = TemplateDocument::from_json_str(&json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn test_json_defaults() {
        let doc = TemplateDocument::from_json_str(r#"{"body":[{"runs":[{"text":"x"}]}]}"#).unwrap();
        assert_eq!(doc.block_count(), 1);
        assert!(doc.tables.is_empty());
        assert_eq!(doc.body[0].runs[0].style, RunStyle::default());
    }
}
