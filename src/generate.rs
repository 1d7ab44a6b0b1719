//! Request orchestration: payload → two rendered variants → envelope.
//!
//! A [`ResumeGenerator`] owns everything resolved at startup (fonts, logo,
//! compiled templates, the pdfium binding) and is cheap to share. Each
//! request validates and normalises once, then renders both variants as
//! independent blocking tasks over the same normalised value. Either
//! variant failing fails the request.

use crate::assets::StaticAssets;
use crate::config::GeneratorConfig;
use crate::error::ResumeError;
use crate::model::Variant;
use crate::output::{RenderedArtifacts, ResponseEnvelope};
use crate::pipeline::dates::{normalize, NormalizedResume};
use crate::pipeline::template::TemplateRenderer;
use crate::pipeline::{document, encode, layout, markup, render, schema};
use pdfium_render::prelude::Pdfium;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Renders résumé payloads into the experienced and fresher PDFs.
///
/// # Example
/// ```rust,no_run
/// use resume2pdf::{GeneratorConfig, ResumeGenerator};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let generator = ResumeGenerator::new(GeneratorConfig::default())?;
///     let payload = serde_json::json!({
///         "name": "Asha Rao",
///         "phone": "+91 98765 43210",
///         "email": "asha@example.com",
///         "academics": []
///     });
///     let envelope = generator.generate(&payload).await?;
///     assert_eq!(envelope.resumes.len(), 2);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ResumeGenerator {
    config: Arc<GeneratorConfig>,
    assets: Arc<StaticAssets>,
    templates: Arc<TemplateRenderer>,
    pdfium: &'static Pdfium,
}

impl std::fmt::Debug for ResumeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeGenerator")
            .field("config", &self.config)
            .field("assets", &self.assets)
            .field("templates", &self.templates)
            .finish_non_exhaustive()
    }
}

impl ResumeGenerator {
    /// Load static resources, compile templates and bind pdfium.
    ///
    /// Every failure here is a deployment problem, reported before any
    /// request is served.
    pub fn new(config: GeneratorConfig) -> Result<Self, ResumeError> {
        let assets = StaticAssets::load(&config)?;
        let templates = TemplateRenderer::new(config.template_dir.as_deref(), config.escape)?;
        let pdfium = render::bind_pdfium(config.pdfium_lib_path.as_deref())?;
        info!(
            "Generator ready (escape: {}, preview: {} dpi, timeout: {}s)",
            config.escape, config.preview_dpi, config.render_timeout_secs
        );
        Ok(Self {
            config: Arc::new(config),
            assets: Arc::new(assets),
            templates: Arc::new(templates),
            pdfium,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Render both variants from an untyped JSON payload.
    pub async fn generate(&self, payload: &Value) -> Result<ResponseEnvelope, ResumeError> {
        let input = schema::validate_payload(payload)?;
        self.generate_validated(normalize(&input)?).await
    }

    /// Render both variants from a raw request body.
    pub async fn generate_from_slice(&self, body: &[u8]) -> Result<ResponseEnvelope, ResumeError> {
        let input = schema::validate_slice(body)?;
        self.generate_validated(normalize(&input)?).await
    }

    /// Synchronous wrapper around [`generate`](Self::generate).
    ///
    /// Creates a temporary tokio runtime. Do not call from inside an
    /// existing runtime.
    pub fn generate_sync(&self, payload: &Value) -> Result<ResponseEnvelope, ResumeError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ResumeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.generate(payload))
    }

    async fn generate_validated(
        &self,
        data: NormalizedResume,
    ) -> Result<ResponseEnvelope, ResumeError> {
        let start = Instant::now();
        info!("Rendering résumé for '{}'", data.name);
        let data = Arc::new(data);

        let secs = self.config.render_timeout_secs;
        let (experienced, fresher) = tokio::time::timeout(Duration::from_secs(secs), async {
            tokio::try_join!(
                self.render_variant(Arc::clone(&data), Variant::Experienced),
                self.render_variant(Arc::clone(&data), Variant::Fresher),
            )
        })
        .await
        .map_err(|_| ResumeError::Timeout { secs })??;

        let envelope = ResponseEnvelope::assemble(&experienced, &fresher);
        info!(
            "Rendered both variants in {}ms ({} + {} pages)",
            start.elapsed().as_millis(),
            experienced.page_count,
            fresher.page_count
        );
        Ok(envelope)
    }

    /// Render one variant end to end on a blocking thread.
    pub async fn render_variant(
        &self,
        data: Arc<NormalizedResume>,
        variant: Variant,
    ) -> Result<RenderedArtifacts, ResumeError> {
        let assets = Arc::clone(&self.assets);
        let templates = Arc::clone(&self.templates);
        let pdfium = self.pdfium;
        let dpi = self.config.preview_dpi;

        tokio::task::spawn_blocking(move || {
            render_blocking(&data, variant, &assets, &templates, pdfium, dpi)
        })
        .await
        .map_err(|e| ResumeError::Internal(format!("Render task panicked: {}", e)))?
    }
}

fn render_blocking(
    data: &NormalizedResume,
    variant: Variant,
    assets: &StaticAssets,
    templates: &TemplateRenderer,
    pdfium: &Pdfium,
    dpi: u32,
) -> Result<RenderedArtifacts, ResumeError> {
    let start = Instant::now();
    let malformed = |detail: String| ResumeError::MalformedDocument { variant, detail };

    // ── Template ─────────────────────────────────────────────────────────
    let source = templates.render(data, variant, assets.refs())?;

    // ── Markup + fonts ───────────────────────────────────────────────────
    let doc = markup::parse(&source).map_err(|e| malformed(e.to_string()))?;
    let fonts = assets
        .font_set(doc.font.as_deref(), doc.bold_font.as_deref())
        .map_err(|e| malformed(e.to_string()))?;

    // ── Layout ───────────────────────────────────────────────────────────
    let pages = layout::layout(&doc, &fonts, assets).map_err(|e| malformed(e.to_string()))?;

    // ── PDF ──────────────────────────────────────────────────────────────
    let (pdf, page_count) = document::write_pdf(&pages, &fonts, doc.title.as_deref())
        .map_err(|e| ResumeError::DocumentWriteFailed {
            variant,
            detail: e.to_string(),
        })?;
    debug!("{}: {} pages, {} PDF bytes", variant, page_count, pdf.len());

    // ── Preview ──────────────────────────────────────────────────────────
    let image = render::rasterize_first_page(pdfium, &pdf, dpi, variant)?;
    let preview_png = encode::encode_png(&image).map_err(|e| ResumeError::RasterisationFailed {
        variant,
        detail: format!("PNG encoding failed: {}", e),
    })?;

    info!(
        "Rendered '{}' in {}ms ({} pages, preview {}x{})",
        variant,
        start.elapsed().as_millis(),
        page_count,
        image.width(),
        image.height()
    );
    Ok(RenderedArtifacts {
        variant,
        pdf,
        preview_png,
        page_count,
        preview_width: image.width(),
        preview_height: image.height(),
    })
}
