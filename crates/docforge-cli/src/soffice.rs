//! PDF conversion through a headless LibreOffice (`soffice`).

use docforge_core::{ConversionEngine, ForgeError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const PROGRAMS: &[&str] = &["soffice", "libreoffice"];

/// A document accepted by [`SofficeEngine::open`].
#[derive(Debug)]
pub struct OpenDocument {
    source: PathBuf,
}

/// LibreOffice run in headless mode, one conversion at a time.
///
/// A private user profile lives in a scratch directory for the engine's
/// lifetime, so a desktop LibreOffice instance does not swallow the request.
#[derive(Debug)]
pub struct SofficeEngine {
    program: Option<PathBuf>,
    scratch: Option<TempDir>,
}

impl SofficeEngine {
    /// Engine using the first `soffice`/`libreoffice` found on `PATH`.
    #[must_use]
    pub fn locate() -> Self {
        let program = PROGRAMS.iter().find_map(|name| which::which(name).ok());
        Self {
            program,
            scratch: None,
        }
    }

    /// Engine for a specific executable.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
            scratch: None,
        }
    }

    fn program(&self) -> Result<&Path> {
        self.program.as_deref().ok_or_else(|| {
            ForgeError::EngineUnavailable(
                "LibreOffice (soffice) not found on PATH; install it or use --format docx"
                    .to_string(),
            )
        })
    }

    fn scratch(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.scratch {
            return Ok(dir.path().to_path_buf());
        }
        let dir = TempDir::new().map_err(|e| {
            ForgeError::EngineUnavailable(format!("cannot create scratch directory: {e}"))
        })?;
        let path = dir.path().to_path_buf();
        self.scratch = Some(dir);
        Ok(path)
    }
}

impl ConversionEngine for SofficeEngine {
    type Handle = OpenDocument;

    fn start(&mut self) -> Result<()> {
        let program = self.program()?.to_path_buf();
        let output = Command::new(&program)
            .arg("--version")
            .output()
            .map_err(|e| {
                ForgeError::EngineUnavailable(format!("cannot run {}: {e}", program.display()))
            })?;
        if !output.status.success() {
            return Err(ForgeError::EngineUnavailable(format!(
                "{} --version exited with {}",
                program.display(),
                output.status
            )));
        }
        log::info!(
            "Using {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        self.scratch()?;
        Ok(())
    }

    fn open(&mut self, path: &Path) -> Result<OpenDocument> {
        if !path.is_file() {
            return Err(ForgeError::ConversionError(format!(
                "File not found: {}",
                path.display()
            )));
        }
        Ok(OpenDocument {
            source: path.to_path_buf(),
        })
    }

    fn convert_and_close(&mut self, handle: OpenDocument, destination: &Path) -> Result<()> {
        let program = self.program()?.to_path_buf();
        let scratch = self.scratch()?;
        let profile = scratch.join("profile");
        let out_dir = scratch.join("out");
        fs::create_dir_all(&out_dir)?;

        let output = Command::new(&program)
            .arg(format!("-env:UserInstallation=file://{}", profile.display()))
            .args(["--headless", "--norestore", "--convert-to", "pdf", "--outdir"])
            .arg(&out_dir)
            .arg(&handle.source)
            .output()
            .map_err(|e| {
                ForgeError::ConversionError(format!("cannot run {}: {e}", program.display()))
            })?;

        if !output.status.success() {
            return Err(ForgeError::ConversionError(format!(
                "LibreOffice conversion of {} failed: {}",
                handle.source.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stem = handle
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let produced = out_dir.join(format!("{stem}.pdf"));
        if !produced.exists() {
            return Err(ForgeError::ConversionError(format!(
                "PDF not generated for {}",
                handle.source.display()
            )));
        }

        if fs::rename(&produced, destination).is_err() {
            fs::copy(&produced, destination).map_err(|e| {
                ForgeError::OutputError(format!("cannot write {}: {e}", destination.display()))
            })?;
            fs::remove_file(&produced)?;
        }
        log::debug!("Converted {} -> {}", handle.source.display(), destination.display());
        Ok(())
    }
}
