//! # docforge-tables
//!
//! Rebuilds tables that PDF extraction returned page by page.
//!
//! Input is one [`PageExtraction`] per page: the table fragments found on the
//! page and the text lines left outside them. [`reconstruct`] merges fragments
//! that continue across pages (dropping repeated header rows), reattaches a
//! column that was printed outside the table ruling, and pads every table to a
//! rectangle. [`export`] writes the result as CSV or Markdown and [`xlsx`] as a
//! styled Excel sheet.
//!
//! ```rust
//! use docforge_tables::{reconstruct, PageExtraction};
//!
//! let pages: Vec<PageExtraction> = serde_json::from_str(r#"[
//!     {"tables": [[["Name", "Age"], ["Ada", "36"]]]},
//!     {"tables": [[["Name", "Age"], ["Grace", "85"]]]}
//! ]"#).unwrap();
//! let result = reconstruct(&pages);
//! assert_eq!(result.tables.len(), 1);
//! assert_eq!(result.tables[0].data_rows().len(), 2);
//! ```

pub mod error;
pub mod export;
pub mod extra_column;
pub mod merge;
pub mod page;
pub mod reconstruct;
pub mod xlsx;

pub use error::{Result, TableError};
pub use export::{clean_cell, to_markdown, write_csv};
pub use extra_column::{ExtraColumn, LineMatch};
pub use merge::{header_signature, MergedTable, TableMerger};
pub use page::{load_pages, load_pages_from_reader, PageExtraction, TableFragment};
pub use reconstruct::{reconstruct, Reconstruction};
pub use xlsx::{build_workbook, column_widths, to_xlsx, write_xlsx};
