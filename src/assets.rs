//! Static resources: fonts and the header logo.
//!
//! Resources are read, decoded and canonicalised once at startup. Templates
//! refer to them by the absolute paths in [`AssetRefs`]; at render time the
//! markup may only name those registered paths, never arbitrary files.
//! Inline `data:` images are decoded per request; the schema only lets the
//! candidate photo through in that form.

use crate::config::GeneratorConfig;
use crate::error::ResumeError;
use crate::pipeline::fonts::{FontSet, Typeface};
use crate::pipeline::layout::ImageResolver;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("inline image could not be decoded: {0}")]
    BadDataUri(String),

    #[error("'{0}' is not a registered resource")]
    Unregistered(String),
}

impl AssetError {
    /// Per-request content that may be dropped without failing the render.
    pub fn is_skippable(&self) -> bool {
        matches!(self, AssetError::BadDataUri(_))
    }
}

/// Decoded pixels, split into the planes a PDF image XObject wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// 8-bit RGB, row-major.
    pub rgb: Vec<u8>,
    /// 8-bit alpha, present only if some pixel is not opaque.
    pub alpha: Option<Vec<u8>>,
}

impl RasterImage {
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        if !img.color().has_alpha() {
            return Self {
                width,
                height,
                rgb: img.to_rgb8().into_raw(),
                alpha: None,
            };
        }
        let rgba = img.to_rgba8();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for px in rgba.pixels() {
            rgb.extend_from_slice(&px.0[..3]);
            alpha.push(px.0[3]);
        }
        let opaque = alpha.iter().all(|&a| a == u8::MAX);
        Self {
            width,
            height,
            rgb,
            alpha: (!opaque).then_some(alpha),
        }
    }
}

/// Absolute resource paths exposed to templates as `assets`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetRefs {
    pub font_path: Option<String>,
    pub bold_font_path: Option<String>,
    pub logo_path: Option<String>,
}

/// Everything loaded from disk at startup.
#[derive(Debug)]
pub struct StaticAssets {
    refs: AssetRefs,
    fonts: Option<FontSet>,
    logo: Option<Arc<RasterImage>>,
}

impl StaticAssets {
    /// Read every configured resource. Any failure is a deployment error.
    pub fn load(config: &GeneratorConfig) -> Result<Self, ResumeError> {
        let mut refs = AssetRefs::default();

        let fonts = match &config.font_path {
            Some(path) => {
                let (canonical, regular) = load_font(path)?;
                refs.font_path = Some(canonical);
                let bold = match &config.bold_font_path {
                    Some(path) => {
                        let (canonical, face) = load_font(path)?;
                        refs.bold_font_path = Some(canonical);
                        Some(face)
                    }
                    None => None,
                };
                Some(FontSet::truetype(regular, bold))
            }
            None => None,
        };

        let logo = match &config.logo_path {
            Some(path) => {
                let (canonical, bytes) = read_resource(path)?;
                let img =
                    image::load_from_memory(&bytes).map_err(|e| ResumeError::InvalidResource {
                        path: path.clone(),
                        detail: e.to_string(),
                    })?;
                debug!("Loaded logo {}x{}", img.width(), img.height());
                refs.logo_path = Some(canonical);
                Some(Arc::new(RasterImage::from_dynamic(&img)))
            }
            None => None,
        };

        info!(
            "Static assets ready (font: {}, logo: {})",
            refs.font_path.as_deref().unwrap_or("Helvetica"),
            refs.logo_path.as_deref().unwrap_or("none")
        );
        Ok(Self { refs, fonts, logo })
    }

    /// No fonts, no logo.
    pub fn empty() -> Self {
        Self {
            refs: AssetRefs::default(),
            fonts: None,
            logo: None,
        }
    }

    pub fn refs(&self) -> &AssetRefs {
        &self.refs
    }

    /// Fonts for a document, from the markup's `font` and `bold-font`
    /// attributes. Without `font` the standard faces are used; without
    /// `bold-font` bold is synthesised from the regular face.
    pub fn font_set(
        &self,
        regular: Option<&str>,
        bold: Option<&str>,
    ) -> Result<FontSet, AssetError> {
        let Some(regular) = regular else {
            return match bold {
                Some(bold) => Err(AssetError::Unregistered(bold.to_string())),
                None => Ok(FontSet::standard()),
            };
        };
        let set = match (&self.fonts, &self.refs.font_path) {
            (Some(set), Some(path)) if strip_file_scheme(regular) == path => set,
            _ => return Err(AssetError::Unregistered(regular.to_string())),
        };
        match bold {
            None => Ok(set.without_bold()),
            Some(bold) => match &self.refs.bold_font_path {
                Some(path) if strip_file_scheme(bold) == path => Ok(set.clone()),
                _ => Err(AssetError::Unregistered(bold.to_string())),
            },
        }
    }
}

impl ImageResolver for StaticAssets {
    fn resolve(&self, src: &str) -> Result<Arc<RasterImage>, AssetError> {
        if src.starts_with("data:") {
            return decode_data_uri(src).map(Arc::new);
        }
        match (&self.logo, &self.refs.logo_path) {
            (Some(logo), Some(path)) if strip_file_scheme(src) == path => Ok(Arc::clone(logo)),
            _ => Err(AssetError::Unregistered(src.to_string())),
        }
    }
}

fn strip_file_scheme(src: &str) -> &str {
    src.strip_prefix("file://").unwrap_or(src)
}

/// `data:<mime>;base64,<payload>` → pixels.
pub fn decode_data_uri(uri: &str) -> Result<RasterImage, AssetError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AssetError::BadDataUri("missing data: scheme".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::BadDataUri("missing ',' separator".into()))?;
    if !meta.ends_with(";base64") {
        return Err(AssetError::BadDataUri("only base64 payloads are supported".into()));
    }
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AssetError::BadDataUri(e.to_string()))?;
    let img = image::load_from_memory(&bytes).map_err(|e| AssetError::BadDataUri(e.to_string()))?;
    Ok(RasterImage::from_dynamic(&img))
}

fn read_resource(path: &Path) -> Result<(String, Vec<u8>), ResumeError> {
    let io_err = |source| ResumeError::ResourceLoad {
        path: path.to_path_buf(),
        source,
    };
    let canonical: PathBuf = path.canonicalize().map_err(io_err)?;
    let bytes = std::fs::read(&canonical).map_err(io_err)?;
    Ok((canonical.to_string_lossy().into_owned(), bytes))
}

fn load_font(path: &Path) -> Result<(String, Typeface), ResumeError> {
    let (canonical, bytes) = read_resource(path)?;
    let face = Typeface::from_truetype(bytes).map_err(|e| ResumeError::InvalidResource {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok((canonical, face))
}
