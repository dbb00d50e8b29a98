//! # docforge-docx
//!
//! Word (`.docx`) templates for the docforge engine.
//!
//! [`DocxDocument`] reads `word/document.xml` plus the header and footer parts
//! its sections reference, and exposes their paragraphs as a
//! [`docforge_core::TemplateDocument`]. Body paragraphs, top-level table cells
//! and header/footer paragraphs map to the model's blocks; each `w:r` holding
//! text maps to one run.
//!
//! Saving writes changes back in place:
//! - edited run text goes into the run's first `w:t`, other `w:t` elements of
//!   that run are emptied
//! - font family and size overrides are merged into the run's `w:rPr`
//! - page sizes are written to each `w:sectPr`'s `w:pgSz`
//!
//! Everything else in the package is copied unchanged.

pub mod document;
pub mod package;
mod walk;
mod write;
pub mod xml;

pub use document::{DocxDocument, DocxTemplate};
pub use package::Package;
pub use xml::XmlPart;
