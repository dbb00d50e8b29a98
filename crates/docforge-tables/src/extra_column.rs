//! Reattaching a column that page extraction missed.
//!
//! Some layouts print one column outside the table ruling, so it comes back
//! as stray text lines instead of cells. When a page's stray line count lines
//! up with the page's table rows, the lines are taken as that column.

use crate::merge::MergedTable;
use crate::page::TableFragment;
use serde::Serialize;

/// How a page's stray lines were interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineMatch {
    /// No stray lines or no table on the page.
    Skipped,
    /// One line per row including the header row.
    WithHeader,
    /// One line per data row; the page had no header line.
    WithoutHeader,
    /// Counts do not line up; the page is ignored.
    Ambiguous,
}

/// Collected extra-column header and values across pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtraColumn {
    header: Option<String>,
    values: Vec<String>,
    ambiguous_pages: Vec<usize>,
}

impl ExtraColumn {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look at one page. `page` is reported back in [`Self::ambiguous_pages`].
    pub fn observe(&mut self, page: usize, lines: &[String], fragments: &[TableFragment]) -> LineMatch {
        let has_table = fragments.first().is_some_and(|f| !f.is_empty());
        if lines.is_empty() || !has_table {
            return LineMatch::Skipped;
        }

        let data_rows: usize = fragments.iter().map(TableFragment::len).sum();
        if lines.len() == data_rows {
            let first = &lines[0];
            match &self.header {
                None => {
                    log::debug!("Page {page}: extra column header {first:?}");
                    self.header = Some(first.clone());
                    self.values.extend(lines[1..].iter().cloned());
                }
                Some(header) if header.to_lowercase() == first.to_lowercase() => {
                    self.values.extend(lines[1..].iter().cloned());
                }
                Some(_) => self.values.extend(lines.iter().cloned()),
            }
            LineMatch::WithHeader
        } else if lines.len() + 1 == data_rows {
            self.values.extend(lines.iter().cloned());
            LineMatch::WithoutHeader
        } else {
            log::debug!(
                "Page {page}: {} stray line(s) against {data_rows} row(s), ignored",
                lines.len()
            );
            self.ambiguous_pages.push(page);
            LineMatch::Ambiguous
        }
    }

    #[must_use]
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    #[must_use]
    pub fn ambiguous_pages(&self) -> &[usize] {
        &self.ambiguous_pages
    }

    /// Append the column to the first table. Returns whether anything was attached.
    pub fn attach(&self, tables: &mut [MergedTable]) -> bool {
        let Some(header) = &self.header else {
            return false;
        };
        if self.values.is_empty() {
            return false;
        }
        let Some(table) = tables.first_mut() else {
            return false;
        };
        let rows = table.rows_mut();
        let Some(header_row) = rows.first_mut() else {
            return false;
        };
        header_row.push(header.clone());
        let width = header_row.len();

        for (row, value) in rows.iter_mut().skip(1).zip(&self.values) {
            pad(row, width - 1);
            row.push(value.clone());
        }
        for row in rows.iter_mut().skip(1) {
            pad(row, width);
        }
        if self.values.len() > rows.len() - 1 {
            log::warn!(
                "{} extra column value(s) had no matching row",
                self.values.len() - (rows.len() - 1)
            );
        }
        true
    }
}

fn pad(row: &mut Vec<String>, width: usize) {
    if row.len() < width {
        row.resize(width, String::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn fragment(rows: &[&[&str]]) -> TableFragment {
        TableFragment::new(rows.iter().map(|r| lines(r)).collect())
    }

    fn table(rows: &[&[&str]]) -> MergedTable {
        MergedTable::from_rows(rows.iter().map(|r| lines(r)).collect())
    }

    #[test]
    fn test_header_and_values_from_matching_page() {
        let page = fragment(&[&["Item", "Qty"], &["Bolt", "4"], &["Nut", "8"], &["Pin", "2"]]);
        let mut extra = ExtraColumn::new();
        let outcome = extra.observe(1, &lines(&["PL No", "1001", "1002", "1003"]), &[page]);
        assert_eq!(outcome, LineMatch::WithHeader);

        let mut tables = vec![table(&[&["Item", "Qty"], &["Bolt", "4"], &["Nut", "8"], &["Pin", "2"]])];
        assert!(extra.attach(&mut tables));
        assert_eq!(tables[0].rows()[0], lines(&["Item", "Qty", "PL No"]));
        assert_eq!(tables[0].rows()[1], lines(&["Bolt", "4", "1001"]));
        assert_eq!(tables[0].rows()[3], lines(&["Pin", "2", "1003"]));
    }

    #[test]
    fn test_repeated_header_line_skipped() {
        let mut extra = ExtraColumn::new();
        extra.observe(1, &lines(&["PL No", "1"]), &[fragment(&[&["A"], &["x"]])]);
        extra.observe(2, &lines(&["pl no", "2"]), &[fragment(&[&["A"], &["y"]])]);
        assert_eq!(extra.header(), Some("PL No"));
        assert_eq!(extra.values(), &["1", "2"]);
    }

    #[test]
    fn test_continuation_page_without_header() {
        let mut extra = ExtraColumn::new();
        extra.observe(1, &lines(&["PL No", "1"]), &[fragment(&[&["A"], &["x"]])]);
        let outcome = extra.observe(2, &lines(&["2", "3"]), &[fragment(&[&["A"], &["y"], &["z"]])]);
        assert_eq!(outcome, LineMatch::WithoutHeader);
        assert_eq!(extra.values(), &["1", "2", "3"]);
    }

    #[test]
    fn test_ambiguous_page_recorded() {
        let mut extra = ExtraColumn::new();
        let outcome = extra.observe(3, &lines(&["a", "b", "c", "d"]), &[fragment(&[&["A"], &["x"]])]);
        assert_eq!(outcome, LineMatch::Ambiguous);
        assert_eq!(extra.ambiguous_pages(), &[3]);
        assert!(extra.header().is_none());
    }

    #[test]
    fn test_skipped_without_lines_or_table() {
        let mut extra = ExtraColumn::new();
        assert_eq!(extra.observe(1, &[], &[fragment(&[&["A"]])]), LineMatch::Skipped);
        assert_eq!(extra.observe(1, &lines(&["x"]), &[]), LineMatch::Skipped);
        assert_eq!(extra.observe(1, &lines(&["x"]), &[fragment(&[])]), LineMatch::Skipped);
    }

    #[test]
    fn test_attach_requires_header_and_values() {
        let mut tables = vec![table(&[&["A"], &["x"]])];
        let mut extra = ExtraColumn::new();
        assert!(!extra.attach(&mut tables));
        extra.observe(1, &lines(&["only header"]), &[fragment(&[&["A"]])]);
        assert_eq!(extra.header(), Some("only header"));
        assert!(!extra.attach(&mut tables));
        assert_eq!(tables[0].rows()[0], lines(&["A"]));
    }

    #[test]
    fn test_attach_pads_rows_without_values() {
        let mut extra = ExtraColumn::new();
        extra.observe(1, &lines(&["H", "v1"]), &[fragment(&[&["A"], &["x"]])]);
        let mut tables = vec![table(&[&["A"], &["x"], &["y"]])];
        assert!(extra.attach(&mut tables));
        assert_eq!(tables[0].rows()[1], lines(&["x", "v1"]));
        assert_eq!(tables[0].rows()[2], lines(&["y", ""]));
    }
}
