//! Excel workbook output.
//!
//! Every table goes onto one sheet, top to bottom, with an empty row between
//! tables. Header rows are bold on a pale yellow fill, all cells wrap, and
//! column widths follow the longest cell text (at least 10, at most 50).

use crate::error::{Result, TableError};
use crate::export::clean_cell;
use crate::merge::MergedTable;
use std::io::Cursor;
use std::path::Path;
use umya_spreadsheet::{Spreadsheet, VerticalAlignmentValues, Worksheet};

/// Name of the sheet holding the tables.
pub const SHEET_NAME: &str = "PDF Content";

const FONT_NAME: &str = "Times New Roman";
const FONT_SIZE: f64 = 11.0;
const HEADER_FILL: &str = "FFFFF2CC";
const MIN_WIDTH: f64 = 10.0;
const MAX_WIDTH: f64 = 50.0;

/// Column widths for `tables` laid out on one sheet.
#[must_use]
pub fn column_widths(tables: &[MergedTable]) -> Vec<f64> {
    let mut longest: Vec<usize> = Vec::new();
    for row in tables.iter().flat_map(MergedTable::rows) {
        if longest.len() < row.len() {
            longest.resize(row.len(), 0);
        }
        for (col, cell) in row.iter().enumerate() {
            longest[col] = longest[col].max(clean_cell(cell).chars().count());
        }
    }
    longest
        .into_iter()
        .map(|len| ((len + 2) as f64).clamp(MIN_WIDTH, MAX_WIDTH))
        .collect()
}

fn write_table(sheet: &mut Worksheet, table: &MergedTable, first_row: u32) -> u32 {
    let mut row_number = first_row;
    for (row_idx, row) in table.rows().iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            let cell = sheet.get_cell_mut((col_idx as u32 + 1, row_number));
            cell.set_value_string(clean_cell(value));

            let style = cell.get_style_mut();
            let alignment = style.get_alignment_mut();
            alignment.set_wrap_text(true);
            alignment.set_vertical(VerticalAlignmentValues::Center);
            let font = style.get_font_mut();
            font.set_name(FONT_NAME).set_size(FONT_SIZE);
            if row_idx == 0 {
                font.set_bold(true);
                style.set_background_color(HEADER_FILL);
            }
        }
        row_number += 1;
    }
    row_number
}

/// Lay `tables` out on a new workbook.
pub fn build_workbook(tables: &[MergedTable]) -> Result<Spreadsheet> {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book
        .get_sheet_by_name_mut("Sheet1")
        .ok_or_else(|| TableError::Xlsx("new workbook has no sheet".to_string()))?;
    sheet.set_name(SHEET_NAME);

    let mut next_row = 1;
    for table in tables.iter().filter(|t| !t.is_empty()) {
        next_row = write_table(sheet, table, next_row) + 1;
    }

    for (index, width) in column_widths(tables).into_iter().enumerate() {
        let letter = umya_spreadsheet::helper::coordinate::string_from_column_index(
            &(index as u32 + 1),
        );
        sheet.get_column_dimension_mut(&letter).set_width(width);
    }
    Ok(book)
}

/// Serialize `tables` as `.xlsx` bytes.
pub fn to_xlsx(tables: &[MergedTable]) -> Result<Vec<u8>> {
    let book = build_workbook(tables)?;
    let mut out = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut out)
        .map_err(|e| TableError::Xlsx(e.to_string()))?;
    log::debug!("Wrote workbook with {} table(s)", tables.len());
    Ok(out.into_inner())
}

/// Write `tables` to an `.xlsx` file at `path`.
pub fn write_xlsx<P: AsRef<Path>>(tables: &[MergedTable], path: P) -> Result<()> {
    std::fs::write(path, to_xlsx(tables)?)?;
    Ok(())
}
