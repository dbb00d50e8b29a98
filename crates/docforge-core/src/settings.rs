//! Page geometry and font overrides applied after filling.

use crate::document::{PageSize, TemplateDocument};
use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Named page sizes. `Default` keeps the template's geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagePreset {
    #[default]
    Default,
    Letter,
    Legal,
    Tabloid,
    Executive,
    A3,
    A4,
    A5,
    Custom,
}

impl PagePreset {
    /// Portrait dimensions in inches; `None` for `Default` and `Custom`.
    #[must_use]
    pub const fn dimensions(self) -> Option<PageSize> {
        match self {
            Self::Letter => Some(PageSize::new(8.5, 11.0)),
            Self::Legal => Some(PageSize::new(8.5, 14.0)),
            Self::Tabloid => Some(PageSize::new(11.0, 17.0)),
            Self::Executive => Some(PageSize::new(7.25, 10.5)),
            Self::A3 => Some(PageSize::new(11.69, 16.54)),
            Self::A4 => Some(PageSize::new(8.27, 11.69)),
            Self::A5 => Some(PageSize::new(5.83, 8.27)),
            Self::Default | Self::Custom => None,
        }
    }
}

impl FromStr for PagePreset {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "default" => Ok(Self::Default),
            "letter" => Ok(Self::Letter),
            "legal" => Ok(Self::Legal),
            "tabloid" => Ok(Self::Tabloid),
            "executive" => Ok(Self::Executive),
            "a3" => Ok(Self::A3),
            "a4" => Ok(Self::A4),
            "a5" => Ok(Self::A5),
            "custom" => Ok(Self::Custom),
            other => Err(ForgeError::ConfigError(format!("unknown page size '{other}'"))),
        }
    }
}

/// Settings as supplied by the caller (JSON or TOML).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentSettings {
    #[serde(alias = "page_size")]
    pub page_size: PagePreset,

    /// Custom page width in inches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,

    /// Custom page height in inches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,

    #[serde(alias = "font_name", skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,

    /// Font size in points.
    #[serde(alias = "font_size", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
}

impl DocumentSettings {
    /// Validate and resolve into concrete overrides.
    pub fn resolve(&self) -> Result<ResolvedSettings> {
        let page = match self.page_size {
            PagePreset::Custom => match (self.width, self.height) {
                (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Some(PageSize::new(w, h)),
                _ => {
                    return Err(ForgeError::ConfigError(
                        "custom page size needs positive width and height (inches)".to_string(),
                    ))
                }
            },
            preset => preset.dimensions(),
        };

        if let Some(size) = self.font_size {
            if size <= 0.0 || !size.is_finite() {
                return Err(ForgeError::ConfigError(format!("invalid font size {size}")));
            }
        }

        let font_name = self
            .font_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(ToString::to_string);

        Ok(ResolvedSettings {
            page,
            font_name,
            font_size: self.font_size,
        })
    }

    /// Validate, then apply to `document`.
    pub fn apply(&self, document: &mut TemplateDocument) -> Result<()> {
        self.resolve()?.apply(document);
        Ok(())
    }
}

/// Validated overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSettings {
    pub page: Option<PageSize>,
    pub font_name: Option<String>,
    pub font_size: Option<f32>,
}

impl ResolvedSettings {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.page.is_none() && self.font_name.is_none() && self.font_size.is_none()
    }

    /// Set the page size of every section and the font of every run.
    ///
    /// Applying the same settings twice changes nothing further.
    pub fn apply(&self, document: &mut TemplateDocument) {
        if let Some(page) = self.page {
            for section in &mut document.sections {
                section.page = Some(page);
            }
        }
        if self.font_name.is_none() && self.font_size.is_none() {
            return;
        }
        for paragraph in document.paragraphs_mut() {
            for run in &mut paragraph.runs {
                if let Some(name) = &self.font_name {
                    run.style.font_name = Some(name.clone());
                }
                if let Some(size) = self.font_size {
                    run.style.font_size = Some(size);
                }
            }
        }
    }
}
