//! Batch generation: one output document per record or per chunk of records.
//!
//! The driver is strictly sequential. Each document is opened fresh from the
//! template, filled, saved, and optionally converted to PDF before the next
//! one starts. The conversion engine is a single session taken by `&mut`, so
//! only one open/convert/close cycle can ever be in flight.
//!
//! Progress goes to a [`ProgressObserver`] (an `mpsc::Sender` works as one),
//! and a [`CancelToken`] stops the loop between documents. Files already
//! written stay on disk after a cancel.

use crate::document::TemplateDocument;
use crate::engine::{FillReport, TemplateEngine};
use crate::error::{ForgeError, Result};
use crate::placeholder::{discover, TemplateDiscovery};
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// A document opened from a template, ready to be filled and saved.
pub trait FillableDocument {
    fn content(&self) -> &TemplateDocument;
    fn content_mut(&mut self) -> &mut TemplateDocument;
    fn save(&self, path: &Path) -> Result<()>;
}

/// Somewhere fresh documents come from.
pub trait TemplateSource {
    type Document: FillableDocument;

    /// Open a new, unfilled copy of the template.
    fn open(&self) -> Result<Self::Document>;

    /// File extension of saved documents, without the dot.
    fn extension(&self) -> &str;

    fn discover(&self) -> Result<TemplateDiscovery> {
        Ok(discover(self.open()?.content()))
    }
}

impl FillableDocument for TemplateDocument {
    fn content(&self) -> &TemplateDocument {
        self
    }

    fn content_mut(&mut self) -> &mut TemplateDocument {
        self
    }

    fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

/// A template stored as a serialized [`TemplateDocument`].
#[derive(Debug, Clone)]
pub struct JsonTemplate {
    document: TemplateDocument,
}

impl JsonTemplate {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let document = TemplateDocument::from_json_path(path).map_err(|e| {
            ForgeError::TemplateError(format!("cannot read template {}: {e}", path.display()))
        })?;
        Ok(Self { document })
    }

    #[must_use]
    pub const fn from_document(document: TemplateDocument) -> Self {
        Self { document }
    }
}

impl TemplateSource for JsonTemplate {
    type Document = TemplateDocument;

    fn open(&self) -> Result<TemplateDocument> {
        Ok(self.document.clone())
    }

    fn extension(&self) -> &str {
        "json"
    }
}

/// Fixed-layout conversion capability (a single shared session).
pub trait ConversionEngine {
    type Handle;

    /// Make sure the engine can be used. Called once before any output is produced.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn open(&mut self, path: &Path) -> Result<Self::Handle>;

    fn convert_and_close(&mut self, handle: Self::Handle, destination: &Path) -> Result<()>;
}

/// Stand-in engine for document-only batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoConversion;

impl ConversionEngine for NoConversion {
    type Handle = std::convert::Infallible;

    fn start(&mut self) -> Result<()> {
        Err(ForgeError::EngineUnavailable(
            "no conversion engine configured".to_string(),
        ))
    }

    fn open(&mut self, path: &Path) -> Result<Self::Handle> {
        Err(ForgeError::EngineUnavailable(format!(
            "cannot open {} without a conversion engine",
            path.display()
        )))
    }

    fn convert_and_close(&mut self, handle: Self::Handle, _destination: &Path) -> Result<()> {
        match handle {}
    }
}

/// Which files a batch leaves behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Filled documents only.
    #[default]
    #[serde(alias = "document")]
    Docx,
    /// PDF only; the intermediate document is deleted.
    Pdf,
    /// Document and PDF.
    Both,
}

impl OutputFormat {
    #[must_use]
    pub const fn needs_conversion(self) -> bool {
        matches!(self, Self::Pdf | Self::Both)
    }

    #[must_use]
    pub const fn keeps_document(self) -> bool {
        matches!(self, Self::Docx | Self::Both)
    }
}

impl FromStr for OutputFormat {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "docx" | "document" => Ok(Self::Docx),
            "pdf" => Ok(Self::Pdf),
            "both" => Ok(Self::Both),
            other => Err(ForgeError::ConfigError(format!("unknown output format '{other}'"))),
        }
    }
}

/// Progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub current: usize,
    pub total: usize,
    pub phase: String,
}

impl ProgressEvent {
    #[must_use]
    pub fn new(current: usize, total: usize, phase: impl Into<String>) -> Self {
        Self {
            current,
            total,
            phase: phase.into(),
        }
    }
}

pub trait ProgressObserver {
    fn notify(&self, event: ProgressEvent);
}

impl ProgressObserver for Sender<ProgressEvent> {
    fn notify(&self, event: ProgressEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.send(event);
    }
}

/// Observer that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn notify(&self, _event: ProgressEvent) {}
}

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Batch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    /// Records per document; 1 is single-row mode.
    pub rows_per_document: usize,
}

impl BatchOptions {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            format: OutputFormat::default(),
            rows_per_document: 1,
        }
    }

    #[must_use = "returns a new BatchOptions with the format set"]
    pub const fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use = "returns a new BatchOptions with rows per document set"]
    pub const fn with_rows_per_document(mut self, rows: usize) -> Self {
        self.rows_per_document = if rows == 0 { 1 } else { rows };
        self
    }
}

/// One produced output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub index: usize,
    pub stem: String,
    pub document: Option<PathBuf>,
    pub pdf: Option<PathBuf>,
    pub fill: FillReport,
}

/// A document whose conversion failed; the batch carried on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub index: usize,
    pub stem: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub documents: Vec<GeneratedDocument>,
    pub failures: Vec<BatchFailure>,
    pub cancelled: bool,
}

impl BatchReport {
    /// Every file left on disk, in production order.
    #[must_use]
    pub fn files(&self) -> Vec<&Path> {
        self.documents
            .iter()
            .flat_map(|d| d.document.iter().chain(d.pdf.iter()))
            .map(PathBuf::as_path)
            .collect()
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Output file stem: `{index:04}_{NAME}`, or `{index:04}_row_{index}` without a name.
#[must_use]
pub fn output_stem(index: usize, record: &Record) -> String {
    let name = sanitize_file_name(record.value("NAME"));
    if name.is_empty() {
        format!("{index:04}_row_{index}")
    } else {
        format!("{index:04}_{name}")
    }
}

/// Split records into chunks of `rows_per_document`, padding the last with empty records.
#[must_use]
pub fn chunk_records(records: &[Record], rows_per_document: usize) -> Vec<Vec<Record>> {
    let size = rows_per_document.max(1);
    records
        .chunks(size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize_with(size, Record::new);
            chunk
        })
        .collect()
}

fn output_error(path: &Path, err: ForgeError) -> ForgeError {
    match err {
        ForgeError::IoError(io) => {
            ForgeError::OutputError(format!("cannot write {}: {io}", path.display()))
        }
        other => other,
    }
}

/// Drives a batch for one template.
#[derive(Debug, Clone)]
pub struct BatchGenerator<T: TemplateSource> {
    template: T,
    engine: TemplateEngine,
    options: BatchOptions,
}

impl<T: TemplateSource> BatchGenerator<T> {
    #[must_use]
    pub const fn new(template: T, engine: TemplateEngine, options: BatchOptions) -> Self {
        Self {
            template,
            engine,
            options,
        }
    }

    #[must_use]
    pub const fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// [`run`](Self::run) with no way to stop early.
    pub fn run_to_end<C, P>(
        &self,
        records: &[Record],
        converter: &mut C,
        progress: &P,
    ) -> Result<BatchReport>
    where
        C: ConversionEngine,
        P: ProgressObserver + ?Sized,
    {
        self.run(records, converter, progress, &CancelToken::new())
    }

    /// Generate every document for `records`.
    ///
    /// When the output format needs PDF the converter is started before any
    /// file is written, and a missing engine aborts the batch. A document
    /// whose conversion fails is listed in [`BatchReport::failures`].
    pub fn run<C, P>(
        &self,
        records: &[Record],
        converter: &mut C,
        progress: &P,
        cancel: &CancelToken,
    ) -> Result<BatchReport>
    where
        C: ConversionEngine,
        P: ProgressObserver + ?Sized,
    {
        let rows = self.options.rows_per_document.max(1);
        let units: Vec<Vec<Record>> = if rows > 1 {
            chunk_records(records, rows)
        } else {
            records.iter().map(|r| vec![r.clone()]).collect()
        };
        let total = units.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };

        progress.notify(ProgressEvent::new(0, total, "Starting generation"));
        if total == 0 {
            progress.notify(ProgressEvent::new(0, 0, "Done"));
            return Ok(report);
        }

        let format = self.options.format;
        if format.needs_conversion() {
            progress.notify(ProgressEvent::new(0, total, "Starting conversion engine"));
            converter.start()?;
        }

        let out_dir = &self.options.output_dir;
        fs::create_dir_all(out_dir).map_err(|e| {
            ForgeError::OutputError(format!("cannot create {}: {e}", out_dir.display()))
        })?;

        let extension = self.template.extension().to_string();
        for (i, unit) in units.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Batch cancelled after {i} of {total} document(s)");
                report.cancelled = true;
                break;
            }

            let index = i + 1;
            let empty = Record::new();
            let stem = output_stem(index, unit.first().unwrap_or(&empty));

            let mut document = self.template.open()?;
            let fill = if rows > 1 {
                self.engine.fill_chunk(document.content_mut(), unit)
            } else {
                self.engine.fill_record(document.content_mut(), unit.first().unwrap_or(&empty))
            };

            let doc_path = out_dir.join(format!("{stem}.{extension}"));
            document
                .save(&doc_path)
                .map_err(|e| output_error(&doc_path, e))?;
            log::debug!("Saved {}", doc_path.display());
            progress.notify(ProgressEvent::new(index, total, format!("Generated {stem}.{extension}")));

            let mut generated = GeneratedDocument {
                index,
                stem: stem.clone(),
                document: Some(doc_path.clone()),
                pdf: None,
                fill,
            };

            if format.needs_conversion() {
                progress.notify(ProgressEvent::new(index, total, format!("Converting {stem} to PDF")));
                let pdf_path = out_dir.join(format!("{stem}.pdf"));
                let converted = converter
                    .open(&doc_path)
                    .and_then(|handle| converter.convert_and_close(handle, &pdf_path));
                match converted {
                    Ok(()) => {
                        generated.pdf = Some(pdf_path);
                        if !format.keeps_document() {
                            fs::remove_file(&doc_path).map_err(|e| {
                                ForgeError::OutputError(format!(
                                    "cannot remove {}: {e}",
                                    doc_path.display()
                                ))
                            })?;
                            generated.document = None;
                        }
                    }
                    Err(ForgeError::ConversionError(message)) => {
                        log::warn!("Conversion of {stem} failed: {message}");
                        report.failures.push(BatchFailure {
                            index,
                            stem: stem.clone(),
                            message,
                        });
                    }
                    Err(other) => return Err(other),
                }
            }

            report.documents.push(generated);
            std::thread::yield_now();
        }

        if !report.cancelled {
            progress.notify(ProgressEvent::new(total, total, "Done"));
        }
        log::info!(
            "Generated {} of {} document(s), {} conversion failure(s)",
            report.documents.len(),
            total,
            report.failures.len()
        );
        Ok(report)
    }
}
