//! Whole-document table reconstruction.

use crate::extra_column::ExtraColumn;
use crate::merge::{MergedTable, TableMerger};
use crate::page::PageExtraction;
use serde::Serialize;

/// Reconstructed tables plus what the heuristics decided along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconstruction {
    /// Rectangular tables in page order.
    pub tables: Vec<MergedTable>,

    /// 1-based pages whose stray lines could not be matched to table rows.
    pub ambiguous_pages: Vec<usize>,

    /// Header of the reattached column, when one was attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_column_header: Option<String>,

    /// Fragments whose repeated header row was dropped.
    pub repeated_headers: usize,
}

impl Reconstruction {
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

/// Merge fragments across pages, reattach the stray column, square off every table.
#[must_use]
pub fn reconstruct(pages: &[PageExtraction]) -> Reconstruction {
    let mut merger = TableMerger::new();
    let mut extra = ExtraColumn::new();

    for (index, page) in pages.iter().enumerate() {
        for fragment in &page.tables {
            merger.push(fragment);
        }
        extra.observe(index + 1, &page.stray_lines(), &page.tables);
    }

    let repeated_headers = merger.repeated_headers();
    let mut tables = merger.finish();
    let attached = extra.attach(&mut tables);
    for table in &mut tables {
        table.make_rectangular();
    }

    log::info!(
        "Reconstructed {} table(s) from {} page(s)",
        tables.len(),
        pages.len()
    );
    if !extra.ambiguous_pages().is_empty() {
        log::warn!(
            "Stray lines ignored on page(s) {:?}",
            extra.ambiguous_pages()
        );
    }

    Reconstruction {
        tables,
        ambiguous_pages: extra.ambiguous_pages().to_vec(),
        extra_column_header: if attached {
            extra.header().map(ToString::to_string)
        } else {
            None
        },
        repeated_headers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::TableFragment;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn page(lines: &[&str], tables: &[&[&[&str]]]) -> PageExtraction {
        PageExtraction::new(
            strings(lines),
            tables
                .iter()
                .map(|rows| TableFragment::new(rows.iter().map(|r| strings(r)).collect()))
                .collect(),
        )
    }

    #[test]
    fn test_two_page_table_with_extra_column() {
        let pages = vec![
            page(
                &["PL No", "1001", "1002"],
                &[&[&["Item", "Qty"], &["Bolt", "4"], &["Nut", "8"]]],
            ),
            page(&["1003"], &[&[&["Item", "Qty"], &["Pin", "2"]]]),
        ];
        let result = reconstruct(&pages);
        assert_eq!(result.table_count(), 1);
        assert_eq!(result.repeated_headers, 1);
        assert_eq!(result.extra_column_header.as_deref(), Some("PL No"));
        assert!(result.ambiguous_pages.is_empty());

        let rows = result.tables[0].rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], strings(&["Item", "Qty", "PL No"]));
        assert_eq!(rows[3], strings(&["Pin", "2", "1003"]));
    }

    #[test]
    fn test_tables_are_rectangular() {
        let pages = vec![page(&[], &[&[&["A", "B"], &["1"], &["2", "3"]]])];
        let result = reconstruct(&pages);
        assert!(result.tables[0].rows().iter().all(|r| r.len() == 2));
        assert!(result.extra_column_header.is_none());
    }

    #[test]
    fn test_ambiguous_page_reported_one_based() {
        let pages = vec![
            page(&[], &[&[&["A"], &["1"]]]),
            page(&["x", "y", "z", "w"], &[&[&["A"], &["2"]]]),
        ];
        let result = reconstruct(&pages);
        assert_eq!(result.ambiguous_pages, vec![2]);
        assert_eq!(result.tables[0].rows().len(), 3);
    }

    #[test]
    fn test_no_pages() {
        let result = reconstruct(&[]);
        assert!(result.tables.is_empty());
        assert_eq!(result, Reconstruction::default());
    }
}
