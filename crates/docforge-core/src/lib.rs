//! # docforge-core
//!
//! Fills rich-text templates from tabular records.
//!
//! A template is a [`TemplateDocument`]: ordered text-bearing blocks (body
//! paragraphs, table-cell paragraphs, header/footer paragraphs), each split
//! into formatting runs. Filling one document goes through these steps:
//!
//! 1. [`record`]: CSV rows become normalized [`Record`]s.
//! 2. [`placeholder`]: the template is scanned for `#TOKEN` placeholders.
//! 3. [`conditional`]: `#IF(predicate) ... #ENDIF` regions are kept or removed.
//! 4. [`substitute`]: placeholders are replaced, run by run, from a [`Mapping`].
//! 5. [`settings`]: page size and font overrides are applied.
//!
//! [`batch`] drives the steps for a whole record set, one document per record
//! or per chunk of records, with optional PDF conversion.
//!
//! ## Example
//!
//! ```rust
//! use docforge_core::{discover, Mapping, Paragraph, Record, TemplateDocument, TemplateEngine};
//!
//! let mut doc = TemplateDocument {
//!     body: vec![Paragraph::from_text("Dear #NAME,")],
//!     ..TemplateDocument::default()
//! };
//! let discovery = discover(&doc);
//! let engine = TemplateEngine::new(Mapping::identity(&discovery, &[]), &discovery);
//! engine.fill_record(&mut doc, &Record::from_pairs([("NAME", "Ada")]));
//! assert_eq!(doc.plain_text(), "Dear Ada,");
//! ```

pub mod batch;
pub mod condition;
pub mod conditional;
pub mod document;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod placeholder;
pub mod record;
pub mod settings;
pub mod substitute;

pub use batch::{
    chunk_records, output_stem, BatchFailure, BatchGenerator, BatchOptions, BatchReport,
    CancelToken, ConversionEngine, FillableDocument, GeneratedDocument, JsonTemplate,
    NoConversion, OutputFormat, ProgressEvent, ProgressObserver, SilentProgress, TemplateSource,
};
pub use condition::Predicate;
pub use conditional::{resolve_conditionals, ConditionalOutcome};
pub use document::{
    BlockKind, HeaderFooter, PageSize, Paragraph, Run, RunStyle, Section, Table, TableCell,
    TableRow, TemplateDocument,
};
pub use engine::{FillReport, TemplateEngine};
pub use error::{ForgeError, Result};
pub use mapping::{Mapping, MappingEntry};
pub use placeholder::{discover, find_tokens, token_head, TemplateDiscovery};
pub use record::{normalize_key, Record, RecordSet, ADDRESS_ALIAS, ADDRESS_KEY};
pub use settings::{DocumentSettings, PagePreset, ResolvedSettings};
pub use substitute::{
    substitute_document, substitute_paragraph, BlockEdit, OccurrenceValues, RecordValues,
    SubstitutionStats, TokenSet, ValueSource,
};
