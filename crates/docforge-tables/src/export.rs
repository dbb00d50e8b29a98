//! Writers for reconstructed tables.

use crate::error::Result;
use crate::merge::MergedTable;
use std::fmt::Write as _;
use std::io::Write;

/// Cell text as written out: line breaks become spaces, outer whitespace goes.
#[must_use]
pub fn clean_cell(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\n', '\r'], " ").trim().to_string()
}

/// Write tables as CSV, one blank line between consecutive tables.
pub fn write_csv<W: Write>(tables: &[MergedTable], mut out: W) -> Result<()> {
    for (index, table) in tables.iter().enumerate() {
        if index > 0 {
            out.write_all(b"\n")?;
        }
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(&mut out);
        for row in table.rows() {
            writer.write_record(row.iter().map(|cell| clean_cell(cell)))?;
        }
        writer.flush()?;
    }
    Ok(())
}

/// Render tables as Markdown pipe tables separated by blank lines.
#[must_use]
pub fn to_markdown(tables: &[MergedTable]) -> String {
    tables
        .iter()
        .map(render_table_markdown)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_table_markdown(table: &MergedTable) -> String {
    let num_cols = table.width();
    if table.is_empty() || num_cols == 0 {
        return String::new();
    }

    let grid: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.iter().map(|c| clean_cell(c).replace('|', "\\|")).collect())
        .collect();

    let mut col_widths = vec![3usize; num_cols];
    for row in &grid {
        for (col_idx, cell) in row.iter().enumerate() {
            col_widths[col_idx] = col_widths[col_idx].max(cell.chars().count());
        }
    }

    let mut result = String::new();
    for (row_idx, row) in grid.iter().enumerate() {
        result.push('|');
        for (col_idx, text) in row.iter().enumerate() {
            let width = col_widths[col_idx];
            let _ = write!(result, " {text:width$} |");
        }
        for &width in col_widths.iter().skip(row.len()) {
            let _ = write!(result, " {:width$} |", "", width = width);
        }
        result.push('\n');

        if row_idx == 0 {
            result.push('|');
            for &width in &col_widths {
                result.push_str(&"-".repeat(width + 2));
                result.push('|');
            }
            result.push('\n');
        }
    }
    result
}
