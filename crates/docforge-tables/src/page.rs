//! Per-page extraction input.
//!
//! PDF page analysis happens elsewhere; this crate consumes its result. A
//! page contributes the table fragments found on it and the text lines that
//! fell outside every table. JSON form, one object per page:
//!
//! ```json
//! {"text": "PL No\n1001\n1002", "tables": [[["Item", "Qty"], ["Bolt", null]]]}
//! ```
//!
//! `text_lines` may be given instead of `text`. Missing cells (`null`) read
//! as empty strings.

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Rows of one table as extracted from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TableFragment {
    rows: Vec<Vec<String>>,
}

impl TableFragment {
    #[must_use]
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Column count, taken from the first row.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<Vec<Vec<Option<String>>>> for TableFragment {
    fn from(raw: Vec<Vec<Option<String>>>) -> Self {
        Self {
            rows: raw
                .into_iter()
                .map(|row| row.into_iter().map(Option::unwrap_or_default).collect())
                .collect(),
        }
    }
}

impl<'de> Deserialize<'de> for TableFragment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Vec::<Vec<Option<String>>>::deserialize(deserializer)?;
        Ok(Self::from(raw))
    }
}

/// What one page contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageExtraction {
    /// Text outside every table, newline separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// The same text already split into lines; takes precedence over `text`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_lines: Vec<String>,

    #[serde(default)]
    pub tables: Vec<TableFragment>,
}

impl PageExtraction {
    #[must_use]
    pub fn new(text_lines: Vec<String>, tables: Vec<TableFragment>) -> Self {
        Self {
            text: None,
            text_lines,
            tables,
        }
    }

    /// Trimmed, non-empty stray lines in page order.
    #[must_use]
    pub fn stray_lines(&self) -> Vec<String> {
        let source: Vec<&str> = if self.text_lines.is_empty() {
            self.text.as_deref().map(|t| t.lines().collect()).unwrap_or_default()
        } else {
            self.text_lines.iter().map(String::as_str).collect()
        };
        source
            .into_iter()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

/// Read a JSON array of page extractions.
pub fn load_pages_from_reader<R: Read>(reader: R) -> Result<Vec<PageExtraction>> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn load_pages<P: AsRef<Path>>(path: P) -> Result<Vec<PageExtraction>> {
    let file = File::open(path.as_ref())?;
    let pages = load_pages_from_reader(BufReader::new(file))?;
    log::info!("Loaded {} page extraction(s)", pages.len());
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_cells_become_empty() {
        let json = r#"[{"text": "a\n\n  b  \n", "tables": [[["Item", null], ["Bolt", "4"]]]}]"#;
        let pages = load_pages_from_reader(json.as_bytes()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].tables[0].rows()[0], vec!["Item".to_string(), String::new()]);
        assert_eq!(pages[0].tables[0].column_count(), 2);
        assert_eq!(pages[0].stray_lines(), vec!["a", "b"]);
    }

    #[test]
    fn test_text_lines_take_precedence() {
        let page = PageExtraction {
            text: Some("ignored".to_string()),
            text_lines: vec![" x ".to_string(), "".to_string()],
            tables: Vec::new(),
        };
        assert_eq!(page.stray_lines(), vec!["x"]);
    }

    #[test]
    fn test_page_without_text() {
        let pages = load_pages_from_reader(r#"[{"tables": []}]"#.as_bytes()).unwrap();
        assert!(pages[0].stray_lines().is_empty());
    }

    #[test]
    fn test_load_pages_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(load_pages(&path).unwrap().is_empty());
        assert!(load_pages(dir.path().join("missing.json")).is_err());
    }
}
