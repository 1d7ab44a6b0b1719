//! Preview rasterisation: page one of a generated PDF → `DynamicImage`.
//!
//! pdfium is a native library with process-global state. It is bound once
//! per process and shared. The `sync` feature makes the binding
//! `Send + Sync` and `thread_safe` serialises every call into it, so the two
//! variants may rasterise from separate blocking threads. Callers run this
//! inside `spawn_blocking`.

use crate::error::ResumeError;
use crate::model::Variant;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info};

/// PDF user space is 72 units per inch.
const POINTS_PER_INCH: f32 = 72.0;

static PDFIUM: OnceLock<Pdfium> = OnceLock::new();
static BIND_LOCK: Mutex<()> = Mutex::new(());

/// Bind the pdfium library, once per process.
///
/// `lib_path` may name the shared library itself or the directory holding
/// it. Without one the system library search path is used. Later calls
/// return the first binding regardless of their argument.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<&'static Pdfium, ResumeError> {
    if let Some(pdfium) = PDFIUM.get() {
        return Ok(pdfium);
    }
    let _guard = BIND_LOCK
        .lock()
        .map_err(|_| ResumeError::Internal("pdfium binding lock poisoned".into()))?;
    if let Some(pdfium) = PDFIUM.get() {
        return Ok(pdfium);
    }

    let bindings = match lib_path {
        Some(path) => {
            let library = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(path)
            } else {
                path.to_path_buf()
            };
            Pdfium::bind_to_library(&library).map_err(|e| {
                ResumeError::PdfiumBindingFailed(format!("{}: {}", library.display(), e))
            })?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| ResumeError::PdfiumBindingFailed(e.to_string()))?,
    };
    info!("pdfium bound");
    Ok(PDFIUM.get_or_init(|| Pdfium::new(bindings)))
}

/// Render scale that maps PDF points to pixels at `dpi`.
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / POINTS_PER_INCH
}

/// Rasterise only the first page of `pdf` at `dpi`. Blocking.
pub fn rasterize_first_page(
    pdfium: &Pdfium,
    pdf: &[u8],
    dpi: u32,
    variant: Variant,
) -> Result<DynamicImage, ResumeError> {
    let failed = |detail: String| ResumeError::RasterisationFailed { variant, detail };

    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| failed(format!("load: {:?}", e)))?;
    let pages = document.pages();
    let page = pages
        .get(0)
        .map_err(|e| failed(format!("page 1: {:?}", e)))?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale_for_dpi(dpi));
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| failed(format!("render: {:?}", e)))?;

    let image = bitmap.as_image();
    debug!(
        "Rendered {} preview at {} dpi → {}x{} px",
        variant,
        dpi,
        image.width(),
        image.height()
    );
    Ok(image)
}
