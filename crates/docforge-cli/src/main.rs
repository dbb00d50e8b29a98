// Counts and sizes shown in progress output fit comfortably in u64/usize.
#![allow(
    clippy::cast_possible_truncation,  // progress positions - safe ranges
    clippy::needless_pass_by_value,    // clap hands over owned arguments
    clippy::too_many_lines,            // command handlers are necessarily long
    clippy::unnecessary_wraps,         // consistent Result return for CLI handlers
    clippy::unnecessary_debug_formatting, // useful for error messages
    clippy::must_use_candidate,        // CLI functions don't need must_use
)]

//! docforge - template mail merge and PDF table reconstruction
//!
//! Fills `.docx` (or JSON model) templates from CSV rows, optionally converting
//! the results to PDF with LibreOffice, and rebuilds multi-page tables from
//! per-page PDF extraction output.

mod bundle;
mod config;
mod soffice;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use config::Config;
use docforge_core::{
    normalize_key, token_head, BatchGenerator, BatchOptions, BatchReport, ConversionEngine,
    DocumentSettings, JsonTemplate, Mapping, NoConversion, OutputFormat, PagePreset,
    ProgressEvent, RecordSet, TemplateEngine, TemplateSource,
};
use docforge_docx::DocxTemplate;
use docforge_tables::{load_pages, reconstruct, to_markdown, to_xlsx, write_csv};
use indicatif::{ProgressBar, ProgressStyle};
use soffice::SofficeEngine;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::mpsc::channel;

/// Verbosity level for output control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verbosity {
    /// Only errors
    Quiet,
    /// Normal output
    Normal,
    /// Detailed output with debug info
    Verbose,
}

impl Verbosity {
    const fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    const fn should_show_output(self) -> bool {
        !matches!(self, Self::Quiet)
    }

    const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose)
    }

    const fn default_log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
        }
    }
}

#[derive(Parser)]
#[command(name = "docforge")]
#[command(about = "Fill document templates from CSV and rebuild tables from PDF pages", long_about = None)]
#[command(version)]
struct Args {
    /// Quiet mode: suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode: show detailed progress and debug info
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Configuration file to use instead of ~/.docforge.toml and ./.docforge.toml
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the placeholders a template contains
    Inspect {
        /// Template file (.docx or .json document model)
        template: PathBuf,

        /// CSV file to check placeholder columns against
        #[arg(long, value_name = "CSV")]
        data: Option<PathBuf>,

        /// Print the discovery result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate one document per CSV row (or per chunk of rows)
    Generate(GenerateCommand),

    /// Rebuild tables from per-page extraction JSON
    Tables {
        /// JSON array of page extractions
        pages: PathBuf,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<TableFormat>,

        /// Output file (default: stdout; required for xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert existing documents to PDF with LibreOffice
    Convert {
        /// Files, directories or glob patterns
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (default: next to each input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(ClapArgs)]
struct GenerateCommand {
    /// Template file (.docx or .json document model)
    template: PathBuf,

    /// CSV file with one record per row
    data: PathBuf,

    /// Mapping JSON (token -> literal/column/combined); defaults to #X -> column X
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    /// Document settings JSON (pageSize, width, height, fontName, fontSize)
    #[arg(long, value_name = "JSON")]
    settings: Option<PathBuf>,

    /// Page size preset (letter, legal, tabloid, executive, a3, a4, a5)
    #[arg(long)]
    page_size: Option<String>,

    /// Font family applied to every run
    #[arg(long)]
    font_name: Option<String>,

    /// Font size in points applied to every run
    #[arg(long)]
    font_size: Option<f32>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<DocumentFormat>,

    /// Records per document
    #[arg(long, value_name = "N")]
    rows_per_document: Option<usize>,

    /// Records per document from the template's most repeated placeholder
    #[arg(long, conflicts_with = "rows_per_document")]
    multi_row: bool,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also pack every produced file into this zip archive
    #[arg(long, value_name = "ZIP")]
    bundle: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DocumentFormat {
    /// Filled documents only
    Docx,
    /// PDF only
    Pdf,
    /// Documents and PDFs
    Both,
}

impl From<DocumentFormat> for OutputFormat {
    fn from(format: DocumentFormat) -> Self {
        match format {
            DocumentFormat::Docx => Self::Docx,
            DocumentFormat::Pdf => Self::Pdf,
            DocumentFormat::Both => Self::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TableFormat {
    Csv,
    Markdown,
    /// Styled Excel sheet
    Xlsx,
}

fn main() {
    let args = Args::parse();
    let verbosity = Verbosity::from_flags(args.quiet, args.verbose);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(verbosity.default_log_filter()),
    )
    .target(env_logger::Target::Stderr)
    .init();

    if let Err(e) = run(args, verbosity) {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn run(args: Args, verbosity: Verbosity) -> Result<()> {
    let config = Config::resolve(args.config.as_deref())?;

    match args.command {
        Commands::Inspect {
            template,
            data,
            json,
        } => run_inspect(&template, data.as_deref(), json),
        Commands::Generate(command) => run_generate(command, &config, verbosity),
        Commands::Tables {
            pages,
            format,
            output,
        } => run_tables(&pages, format, output.as_deref(), &config, verbosity),
        Commands::Convert { inputs, output_dir } => {
            run_convert(&inputs, output_dir.as_deref(), verbosity)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateKind {
    Docx,
    Json,
}

fn template_kind(path: &Path) -> Result<TemplateKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "docx" => Ok(TemplateKind::Docx),
        "json" => Ok(TemplateKind::Json),
        other => anyhow::bail!(
            "Unsupported template type '.{other}' for {} (expected .docx or .json)",
            path.display()
        ),
    }
}

fn run_inspect(template: &Path, data: Option<&Path>, json: bool) -> Result<()> {
    let discovery = match template_kind(template)? {
        TemplateKind::Docx => DocxTemplate::from_path(template)?.discover()?,
        TemplateKind::Json => JsonTemplate::from_path(template)?.discover()?,
    };

    let records = data
        .map(|path| {
            RecordSet::from_csv_path(path)
                .with_context(|| format!("Failed to read CSV: {}", path.display()))
        })
        .transpose()?;
    let columns = records.as_ref().map(RecordSet::column_choices).unwrap_or_default();
    let missing: Vec<&str> = match &records {
        Some(_) => {
            let normalized: Vec<String> = columns.iter().map(|c| normalize_key(c)).collect();
            discovery
                .placeholders
                .iter()
                .map(String::as_str)
                .filter(|token| !is_column_backed(token, &normalized))
                .collect()
        }
        None => Vec::new(),
    };

    if json {
        let mut value = serde_json::to_value(&discovery)?;
        if let Some(records) = &records {
            value["columns"] = serde_json::json!(columns);
            value["rows"] = serde_json::json!(records.len());
            value["missing_columns"] = serde_json::json!(missing);
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} {}", "Template:".bold(), template.display());
    if let Some(records) = &records {
        println!("{} {}", "Rows:".bold(), records.len());
        println!("{} {}", "Columns:".bold(), columns.join(", "));
    }
    if discovery.is_empty() {
        println!("No placeholders found");
        return Ok(());
    }
    println!("{} {}", "Placeholders:".bold(), discovery.placeholders.len());
    let width = discovery
        .placeholders
        .iter()
        .map(|p| p.chars().count())
        .max()
        .unwrap_or(0);
    for token in &discovery.placeholders {
        println!("  {token:width$}  {}", discovery.occurrences_of(token));
    }
    println!(
        "{} {}",
        "Rows per document (multi-row):".bold(),
        discovery.rows_per_document
    );
    for token in &missing {
        println!(
            "{} no CSV column for {token}, it will be left blank",
            "Missing column:".yellow().bold()
        );
    }
    Ok(())
}

/// Whether the identity mapping finds a column for `token`: the whole
/// token, or its first word when the token ran on into the next word.
fn is_column_backed(token: &str, normalized_columns: &[String]) -> bool {
    let full = normalize_key(token.trim_start_matches('#'));
    let head = normalize_key(token_head(token).trim_start_matches('#'));
    normalized_columns.contains(&full) || normalized_columns.contains(&head)
}

/// Settings file (or config table) overlaid with the command-line flags.
fn resolve_settings(
    command: &GenerateCommand,
    configured: Option<DocumentSettings>,
) -> Result<DocumentSettings> {
    let mut settings = match &command.settings {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
            serde_json::from_str::<DocumentSettings>(&content)
                .with_context(|| format!("Invalid settings file: {}", path.display()))?
        }
        None => configured.unwrap_or_default(),
    };
    if let Some(page_size) = &command.page_size {
        settings.page_size = PagePreset::from_str(page_size)?;
    }
    if let Some(font_name) = &command.font_name {
        settings.font_name = Some(font_name.clone());
    }
    if let Some(font_size) = command.font_size {
        settings.font_size = Some(font_size);
    }
    Ok(settings)
}

fn resolve_document_format(
    cli: Option<DocumentFormat>,
    configured: Option<&str>,
) -> Result<OutputFormat> {
    match (cli, configured) {
        (Some(format), _) => Ok(format.into()),
        (None, Some(name)) => {
            OutputFormat::from_str(name).context("Invalid [generate] format in configuration")
        }
        (None, None) => Ok(OutputFormat::default()),
    }
}

/// Everything `generate` needs once flags and configuration are merged.
struct GeneratePlan {
    data: PathBuf,
    mapping: Option<PathBuf>,
    settings: DocumentSettings,
    format: OutputFormat,
    rows_per_document: Option<usize>,
    multi_row: bool,
    output_dir: PathBuf,
    bundle: Option<PathBuf>,
}

fn run_generate(command: GenerateCommand, config: &Config, verbosity: Verbosity) -> Result<()> {
    let defaults = config.generate();
    let plan = GeneratePlan {
        settings: resolve_settings(&command, defaults.settings.clone())?,
        format: resolve_document_format(command.format, defaults.format.as_deref())?,
        data: command.data,
        mapping: command.mapping.or(defaults.mapping),
        rows_per_document: command.rows_per_document.or(defaults.rows_per_document),
        multi_row: command.multi_row,
        output_dir: command
            .output_dir
            .or(defaults.output_dir)
            .unwrap_or_else(|| PathBuf::from("output")),
        bundle: command.bundle.or(defaults.bundle),
    };

    let template = &command.template;
    let report = match template_kind(template)? {
        TemplateKind::Docx => generate_with(DocxTemplate::from_path(template)?, &plan, verbosity)?,
        TemplateKind::Json => generate_with(JsonTemplate::from_path(template)?, &plan, verbosity)?,
    };

    if verbosity.should_show_output() {
        let cancelled = if report.cancelled { " (cancelled)" } else { "" };
        eprintln!(
            "{} Generated {} of {} document(s) in {}{cancelled}",
            "✓".green().bold(),
            report.documents.len(),
            report.total,
            plan.output_dir.display()
        );
        if verbosity.is_verbose() {
            for document in &report.documents {
                for path in document.document.iter().chain(document.pdf.iter()) {
                    eprintln!("  {}", path.display());
                }
            }
        }
    }

    if let Some(bundle) = &plan.bundle {
        let count = bundle::write_bundle(&report.files(), bundle)?;
        if verbosity.should_show_output() {
            eprintln!(
                "{} Bundled {count} file(s) into {}",
                "✓".green().bold(),
                bundle.display()
            );
        }
    }

    if !report.failures.is_empty() {
        for failure in &report.failures {
            eprintln!(
                "{} {}: {}",
                "Failed:".red().bold(),
                failure.stem,
                failure.message
            );
        }
        anyhow::bail!("{} PDF conversion(s) failed", report.failures.len());
    }
    Ok(())
}

fn generate_with<T>(template: T, plan: &GeneratePlan, verbosity: Verbosity) -> Result<BatchReport>
where
    T: TemplateSource + Sync,
{
    let records = RecordSet::from_csv_path(&plan.data)
        .with_context(|| format!("Failed to read CSV: {}", plan.data.display()))?;
    if records.skipped_rows() > 0 {
        log::info!("Skipped {} blank row(s)", records.skipped_rows());
    }

    let discovery = template.discover()?;
    let mapping = match &plan.mapping {
        Some(path) => Mapping::from_json_path(path)
            .with_context(|| format!("Failed to read mapping: {}", path.display()))?,
        None => Mapping::identity(&discovery, &records.column_choices()),
    };
    let engine = TemplateEngine::new(mapping, &discovery).with_settings(&plan.settings)?;
    if verbosity.is_verbose() && !engine.unknown_placeholders().is_empty() {
        eprintln!(
            "{} Unmapped placeholders left blank: {}",
            "Info:".blue().bold(),
            engine.unknown_placeholders().join(", ")
        );
    }

    let rows = if plan.multi_row {
        engine.rows_per_document(&discovery)
    } else {
        plan.rows_per_document.unwrap_or(1)
    };
    let options = BatchOptions::new(&plan.output_dir)
        .with_format(plan.format)
        .with_rows_per_document(rows);
    if verbosity.is_verbose() {
        eprintln!(
            "{} {} record(s), {} per document, format {:?}",
            "Info:".blue().bold(),
            records.len(),
            options.rows_per_document,
            plan.format
        );
    }

    let generator = BatchGenerator::new(template, engine, options);
    if plan.format.needs_conversion() {
        let mut converter = SofficeEngine::locate();
        run_with_progress(&generator, &records, &mut converter, verbosity)
    } else {
        run_with_progress(&generator, &records, &mut NoConversion, verbosity)
    }
}

fn progress_bar(verbosity: Verbosity) -> ProgressBar {
    if !verbosity.should_show_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .expect("template is compile-time constant")
            .progress_chars("█▓▒░  "),
    );
    pb
}

/// Run the batch on a worker thread while the main thread draws progress.
fn run_with_progress<T, C>(
    generator: &BatchGenerator<T>,
    records: &RecordSet,
    converter: &mut C,
    verbosity: Verbosity,
) -> Result<BatchReport>
where
    T: TemplateSource + Sync,
    C: ConversionEngine + Send,
{
    let (tx, rx) = channel::<ProgressEvent>();
    let pb = progress_bar(verbosity);

    let outcome = std::thread::scope(|scope| {
        let worker = scope.spawn(move || generator.run_to_end(records.records(), converter, &tx));
        for event in rx {
            pb.set_length(event.total as u64);
            pb.set_position(event.current as u64);
            pb.set_message(event.phase);
        }
        worker.join()
    });
    pb.finish_and_clear();

    match outcome {
        Ok(result) => Ok(result?),
        Err(_) => anyhow::bail!("document generation thread panicked"),
    }
}

fn run_tables(
    pages_path: &Path,
    format: Option<TableFormat>,
    output: Option<&Path>,
    config: &Config,
    verbosity: Verbosity,
) -> Result<()> {
    let format = match (format, config.tables().format) {
        (Some(format), _) => format,
        (None, Some(name)) => <TableFormat as ValueEnum>::from_str(&name, true)
            .map_err(|e| anyhow::anyhow!("Invalid [tables] format in configuration: {e}"))?,
        (None, None) => TableFormat::Csv,
    };

    let pages = load_pages(pages_path)
        .with_context(|| format!("Failed to load pages: {}", pages_path.display()))?;
    let result = reconstruct(&pages);

    let rendered = match format {
        TableFormat::Csv => {
            let mut buffer = Vec::new();
            write_csv(&result.tables, &mut buffer)?;
            buffer
        }
        TableFormat::Markdown => to_markdown(&result.tables).into_bytes(),
        TableFormat::Xlsx => {
            if output.is_none() {
                anyhow::bail!("xlsx output needs --output <FILE>");
            }
            to_xlsx(&result.tables)?
        }
    };

    match output {
        Some(path) => fs::write(path, &rendered)
            .with_context(|| format!("Failed to write output file: {}", path.display()))?,
        None => io::stdout().lock().write_all(&rendered)?,
    }

    if verbosity.should_show_output() {
        eprintln!(
            "{} Reconstructed {} table(s) from {} page(s)",
            "✓".green().bold(),
            result.table_count(),
            pages.len()
        );
        if result.repeated_headers > 0 && verbosity.is_verbose() {
            eprintln!(
                "{} Dropped {} repeated header row(s)",
                "Info:".blue().bold(),
                result.repeated_headers
            );
        }
        if let Some(header) = &result.extra_column_header {
            eprintln!("{} Reattached column '{header}'", "Info:".blue().bold());
        }
        if !result.ambiguous_pages.is_empty() {
            eprintln!(
                "{} Stray lines ignored on page(s) {:?}",
                "Warning:".yellow().bold(),
                result.ambiguous_pages
            );
        }
    }
    Ok(())
}

const CONVERTIBLE_EXTENSIONS: &[&str] = &["docx", "doc", "odt", "rtf"];

fn is_convertible(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| CONVERTIBLE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Expand glob patterns and directories into a sorted list of documents.
fn expand_inputs(patterns: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        if pattern.is_dir() {
            let entries = fs::read_dir(pattern)
                .with_context(|| format!("Failed to read directory: {}", pattern.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.is_file() && is_convertible(&path) {
                    files.push(path);
                }
            }
            continue;
        }

        let pattern_str = pattern.to_string_lossy();
        if pattern_str.contains('*') || pattern_str.contains('?') || pattern_str.contains('[') {
            let matches = glob::glob(&pattern_str)
                .with_context(|| format!("Invalid glob pattern: {pattern_str}"))?;
            for entry in matches {
                let path = entry
                    .with_context(|| format!("Failed to read glob entry for: {pattern_str}"))?;
                if path.is_file() {
                    files.push(path);
                }
            }
        } else {
            files.push(pattern.clone());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn run_convert(inputs: &[PathBuf], output_dir: Option<&Path>, verbosity: Verbosity) -> Result<()> {
    let files = expand_inputs(inputs)?;
    if files.is_empty() {
        anyhow::bail!("No documents to convert");
    }
    if let Some(dir) = output_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let mut engine = SofficeEngine::locate();
    engine.start()?;

    let pb = progress_bar(verbosity);
    pb.set_length(files.len() as u64);

    let mut converted = 0usize;
    let mut failed = 0usize;
    for file in &files {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        pb.set_message(stem.clone());
        let destination = output_dir
            .map_or_else(|| file.with_extension("pdf"), |dir| dir.join(format!("{stem}.pdf")));

        let result = engine
            .open(file)
            .and_then(|handle| engine.convert_and_close(handle, &destination));
        match result {
            Ok(()) => {
                converted += 1;
                if verbosity.is_verbose() {
                    pb.suspend(|| eprintln!("{} {}", "✓".green(), destination.display()));
                }
            }
            Err(e) => {
                failed += 1;
                pb.suspend(|| eprintln!("{} {}: {e}", "✗".red(), file.display()));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if verbosity.should_show_output() {
        eprintln!(
            "{} Converted {converted} document(s), {failed} failed",
            if failed == 0 { "✓".green().bold() } else { "!".yellow().bold() }
        );
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} conversion(s) failed", files.len());
    }
    Ok(())
}
