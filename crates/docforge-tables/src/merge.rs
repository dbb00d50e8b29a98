//! Merging per-page fragments into logical tables.
//!
//! Fragments arrive in page order. A fragment continues the previous table
//! when both have the same column count; its first row is dropped when it
//! repeats that table's header. A different column count starts a new table.

use crate::page::TableFragment;
use serde::{Deserialize, Serialize};

/// A table assembled from one or more fragments. Row 0 is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedTable {
    rows: Vec<Vec<String>>,
}

impl MergedTable {
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Vec<String>> {
        &mut self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    #[must_use]
    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Rows after the header.
    #[must_use]
    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Column count of the header row.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Widest row.
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pad every row with empty cells up to the widest row.
    pub fn make_rectangular(&mut self) {
        let width = self.width();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
    }
}

/// Comparison key for header detection: each cell trimmed, lowercased and
/// whitespace-collapsed, cells joined by one space.
#[must_use]
pub fn header_signature(row: &[String]) -> String {
    row.iter()
        .map(|cell| {
            cell.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accumulates fragments into merged tables.
#[derive(Debug, Clone, Default)]
pub struct TableMerger {
    tables: Vec<MergedTable>,
    repeated_headers: usize,
}

impl TableMerger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the next fragment in page order. Empty fragments are ignored.
    pub fn push(&mut self, fragment: &TableFragment) {
        let Some(first) = fragment.rows().first() else {
            return;
        };

        match self.tables.last_mut() {
            Some(last) if last.column_count() == fragment.column_count() => {
                let repeated = last
                    .header()
                    .is_some_and(|header| header_signature(header) == header_signature(first));
                if repeated {
                    self.repeated_headers += 1;
                    last.rows.extend(fragment.rows()[1..].iter().cloned());
                } else {
                    last.rows.extend(fragment.rows().iter().cloned());
                }
            }
            _ => {
                log::debug!(
                    "Starting table {} with {} column(s)",
                    self.tables.len() + 1,
                    fragment.column_count()
                );
                self.tables.push(MergedTable::from_rows(fragment.rows().to_vec()));
            }
        }
    }

    #[must_use]
    pub fn tables(&self) -> &[MergedTable] {
        &self.tables
    }

    /// Fragments whose first row was dropped as a repeated header.
    #[must_use]
    pub const fn repeated_headers(&self) -> usize {
        self.repeated_headers
    }

    #[must_use]
    pub fn finish(self) -> Vec<MergedTable> {
        self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(rows: &[&[&str]]) -> TableFragment {
        TableFragment::new(
            rows.iter()
                .map(|r| r.iter().map(|c| (*c).to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_repeated_header_dropped() {
        let mut merger = TableMerger::new();
        merger.push(&fragment(&[&["Name", "Age"], &["Ada", "36"]]));
        merger.push(&fragment(&[&["Name", "Age"], &["Grace", "85"]]));
        assert_eq!(merger.repeated_headers(), 1);
        let tables = merger.finish();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows().len(), 3);
        assert_eq!(tables[0].data_rows().len(), 2);
    }

    #[test]
    fn test_header_match_ignores_case_and_spacing() {
        let mut merger = TableMerger::new();
        merger.push(&fragment(&[&["Unit Price", "Qty"], &["1", "2"]]));
        merger.push(&fragment(&[&[" unit\nprice ", "QTY"], &["3", "4"]]));
        assert_eq!(merger.finish()[0].rows().len(), 3);
    }

    #[test]
    fn test_continuation_without_header() {
        let mut merger = TableMerger::new();
        merger.push(&fragment(&[&["Name", "Age"], &["Ada", "36"]]));
        merger.push(&fragment(&[&["Grace", "85"]]));
        let tables = merger.finish();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows()[2], vec!["Grace", "85"]);
    }

    #[test]
    fn test_column_count_change_starts_new_table() {
        let mut merger = TableMerger::new();
        merger.push(&fragment(&[&["A", "B"], &["1", "2"]]));
        merger.push(&fragment(&[&["X", "Y", "Z"]]));
        merger.push(&fragment(&[]));
        merger.push(&fragment(&[&["X", "Y", "Z"], &["7", "8", "9"]]));
        let tables = merger.finish();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].rows().len(), 2);
    }

    #[test]
    fn test_signature_keeps_cell_boundaries() {
        let a = vec!["a".to_string(), String::new(), "b".to_string()];
        let b = vec!["a".to_string(), "b".to_string(), String::new()];
        assert_ne!(header_signature(&a), header_signature(&b));
    }

    #[test]
    fn test_make_rectangular() {
        let mut table = MergedTable::from_rows(vec![
            vec!["a".to_string()],
            vec!["b".to_string(), "c".to_string()],
        ]);
        table.make_rectangular();
        assert!(table.rows().iter().all(|r| r.len() == 2));
    }
}
