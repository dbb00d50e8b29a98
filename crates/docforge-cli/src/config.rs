//! `.docforge.toml` configuration.
//!
//! Configuration precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Project config (./.docforge.toml)
//! 3. User config (~/.docforge.toml)
//! 4. Built-in defaults

use anyhow::{Context, Result};
use colored::Colorize;
use docforge_core::DocumentSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".docforge.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Default settings for the generate command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate: Option<GenerateConfig>,

    /// Default settings for the tables command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<TablesConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Default output format (docx, pdf, both)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_per_document: Option<usize>,

    /// Mapping JSON used when `--mapping` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<PathBuf>,

    /// Zip archive receiving every produced file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<DocumentSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    /// Default output format (csv, markdown, xlsx)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Config {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            eprintln!(
                "{} Failed to parse config file: {}",
                "Error:".red().bold(),
                path.display()
            );
            eprintln!("{} {}", "Parse error:".yellow().bold(), e);
            eprintln!();
            eprintln!("{} Configuration file syntax:", "Help:".cyan().bold());
            eprintln!("  [generate]");
            eprintln!("  format = \"docx\"        # docx, pdf, or both");
            eprintln!("  output_dir = \"out\"");
            eprintln!("  rows_per_document = 1");
            eprintln!();
            eprintln!("  [generate.settings]");
            eprintln!("  pageSize = \"letter\"");
            eprintln!("  fontName = \"Calibri\"");
            eprintln!();
            eprintln!("  [tables]");
            eprintln!("  format = \"csv\"         # csv, markdown or xlsx");
            anyhow::anyhow!("Failed to parse config file: {e}")
        })?;

        Ok(config)
    }

    /// Configuration for this run: the explicit file when given, otherwise
    /// the merged user and project files.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        let (user, project) = Self::discover_configs();
        Ok(Self::merge(user, project))
    }

    /// Returns (`user_config`, `project_config`)
    fn discover_configs() -> (Option<Self>, Option<Self>) {
        let user_config = dirs::home_dir()
            .and_then(|home| Self::load_optional(&home.join(CONFIG_FILE_NAME), "user"));
        let project_config = Self::load_optional(&PathBuf::from(CONFIG_FILE_NAME), "project");
        (user_config, project_config)
    }

    fn load_optional(config_path: &Path, kind: &str) -> Option<Self> {
        if !config_path.exists() {
            return None;
        }
        match Self::load_from_file(config_path) {
            Ok(config) => {
                log::debug!("Loaded {kind} config from {}", config_path.display());
                Some(config)
            }
            Err(e) => {
                eprintln!(
                    "{} Failed to load {kind} config from {}: {}",
                    "Warning:".yellow().bold(),
                    config_path.display(),
                    e
                );
                None
            }
        }
    }

    /// Merge configs with precedence: project config > user config > defaults
    pub fn merge(user_config: Option<Self>, project_config: Option<Self>) -> Self {
        let mut merged = user_config.unwrap_or_default();

        if let Some(project) = project_config {
            if let Some(generate) = project.generate {
                let mut merged_generate = merged.generate.unwrap_or_default();
                if let Some(format) = generate.format {
                    merged_generate.format = Some(format);
                }
                if let Some(output_dir) = generate.output_dir {
                    merged_generate.output_dir = Some(output_dir);
                }
                if let Some(rows) = generate.rows_per_document {
                    merged_generate.rows_per_document = Some(rows);
                }
                if let Some(mapping) = generate.mapping {
                    merged_generate.mapping = Some(mapping);
                }
                if let Some(bundle) = generate.bundle {
                    merged_generate.bundle = Some(bundle);
                }
                if let Some(settings) = generate.settings {
                    merged_generate.settings = Some(settings);
                }
                merged.generate = Some(merged_generate);
            }

            if let Some(tables) = project.tables {
                let mut merged_tables = merged.tables.unwrap_or_default();
                if let Some(format) = tables.format {
                    merged_tables.format = Some(format);
                }
                merged.tables = Some(merged_tables);
            }
        }

        merged
    }

    pub fn generate(&self) -> GenerateConfig {
        self.generate.clone().unwrap_or_default()
    }

    pub fn tables(&self) -> TablesConfig {
        self.tables.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docforge_core::PagePreset;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [generate]
            format = "both"
            output_dir = "letters"
            rows_per_document = 3

            [generate.settings]
            pageSize = "a4"
            fontName = "Arial"
            font_size = 10.5

            [tables]
            format = "markdown"
            "#,
        )
        .unwrap();

        let generate = config.generate();
        assert_eq!(generate.format.as_deref(), Some("both"));
        assert_eq!(generate.output_dir, Some(PathBuf::from("letters")));
        assert_eq!(generate.rows_per_document, Some(3));
        let settings = generate.settings.unwrap();
        assert_eq!(settings.page_size, PagePreset::A4);
        assert_eq!(settings.font_name.as_deref(), Some("Arial"));
        assert_eq!(settings.font_size, Some(10.5));
        assert_eq!(config.tables().format.as_deref(), Some("markdown"));
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.generate(), GenerateConfig::default());
    }

    #[test]
    fn test_project_overrides_user_per_field() {
        let user: Config = toml::from_str(
            r#"
            [generate]
            format = "pdf"
            output_dir = "home-out"
            [tables]
            format = "markdown"
            "#,
        )
        .unwrap();
        let project: Config = toml::from_str(
            r#"
            [generate]
            output_dir = "project-out"
            "#,
        )
        .unwrap();

        let merged = Config::merge(Some(user), Some(project));
        let generate = merged.generate();
        assert_eq!(generate.format.as_deref(), Some("pdf"));
        assert_eq!(generate.output_dir, Some(PathBuf::from("project-out")));
        assert_eq!(merged.tables().format.as_deref(), Some("markdown"));
    }

    #[test]
    fn test_merge_nothing() {
        assert_eq!(Config::merge(None, None), Config::default());
    }

    #[test]
    fn test_load_from_file_reports_syntax_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[generate\nformat = ").unwrap();
        assert!(Config::load_from_file(&path).is_err());

        fs::write(&path, "[tables]\nformat = \"csv\"\n").unwrap();
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.tables().format.as_deref(), Some("csv"));
    }
}
