//! Configuration for the résumé generator.
//!
//! Everything the pipeline needs from the deployment (font and logo files,
//! template overrides, the pdfium library) is named here once and resolved
//! by [`crate::ResumeGenerator::new`] at startup. Requests never touch the
//! filesystem for these again.

use crate::error::ResumeError;
use std::path::PathBuf;

/// Default preview resolution.
pub const DEFAULT_PREVIEW_DPI: u32 = 150;

/// Configuration for a [`crate::ResumeGenerator`].
///
/// # Example
/// ```rust
/// use resume2pdf::GeneratorConfig;
///
/// let config = GeneratorConfig::builder()
///     .font_path("assets/fonts/calibri.ttf")
///     .logo_path("assets/logo.jpg")
///     .render_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.preview_dpi, 150);
/// ```
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// TrueType font used for body text and layout metrics.
    /// When `None` the standard Helvetica faces are used.
    pub font_path: Option<PathBuf>,

    /// Optional bold face. Without it bold text is emboldened synthetically
    /// from `font_path`.
    pub bold_font_path: Option<PathBuf>,

    /// Header logo image (PNG or JPEG).
    pub logo_path: Option<PathBuf>,

    /// Directory holding `experienced.hbs` / `fresher.hbs` overrides.
    /// Missing files fall back to the built-in templates.
    pub template_dir: Option<PathBuf>,

    /// XML-escape substituted field values. Default: false.
    ///
    /// Off by default: field content is embedded verbatim, so a value that
    /// contains markup is interpreted as markup. Enable for untrusted input.
    pub escape: bool,

    /// Preview rasterisation DPI. Range: 72–400. Default: 150.
    pub preview_dpi: u32,

    /// Explicit pdfium shared library. When `None` the system library
    /// search path is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Upper bound for rendering both variants, in seconds. Default: 60.
    pub render_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            bold_font_path: None,
            logo_path: None,
            template_dir: None,
            escape: false,
            preview_dpi: DEFAULT_PREVIEW_DPI,
            pdfium_lib_path: None,
            render_timeout_secs: 60,
        }
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn bold_font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.bold_font_path = Some(path.into());
        self
    }

    pub fn logo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.logo_path = Some(path.into());
        self
    }

    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.template_dir = Some(dir.into());
        self
    }

    pub fn escape(mut self, v: bool) -> Self {
        self.config.escape = v;
        self
    }

    pub fn preview_dpi(mut self, dpi: u32) -> Self {
        self.config.preview_dpi = dpi.clamp(72, 400);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GeneratorConfig, ResumeError> {
        let c = &self.config;
        if c.preview_dpi < 72 || c.preview_dpi > 400 {
            return Err(ResumeError::InvalidConfig(format!(
                "Preview DPI must be 72–400, got {}",
                c.preview_dpi
            )));
        }
        if c.render_timeout_secs == 0 {
            return Err(ResumeError::InvalidConfig(
                "Render timeout must be ≥ 1 second".into(),
            ));
        }
        if c.bold_font_path.is_some() && c.font_path.is_none() {
            return Err(ResumeError::InvalidConfig(
                "A bold font requires a regular font".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_behaviour() {
        let c = GeneratorConfig::default();
        assert_eq!(c.preview_dpi, 150);
        assert!(!c.escape);
        assert!(c.font_path.is_none());
    }

    #[test]
    fn dpi_is_clamped() {
        let c = GeneratorConfig::builder().preview_dpi(10).build().unwrap();
        assert_eq!(c.preview_dpi, 72);
        let c = GeneratorConfig::builder().preview_dpi(9000).build().unwrap();
        assert_eq!(c.preview_dpi, 400);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = GeneratorConfig::builder().render_timeout_secs(0).build();
        assert!(matches!(err, Err(ResumeError::InvalidConfig(_))));
    }

    #[test]
    fn bold_without_regular_is_rejected() {
        let err = GeneratorConfig::builder().bold_font_path("b.ttf").build();
        assert!(matches!(err, Err(ResumeError::InvalidConfig(_))));
    }
}
