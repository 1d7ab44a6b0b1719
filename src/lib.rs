//! # resume2pdf
//!
//! Render résumé form data into two downloadable PDFs, an *experienced* and
//! a *fresher* variant, each with a PNG preview of its first page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! JSON payload
//!  │
//!  ├─ 1. Schema    structural + format validation (every violation reported)
//!  ├─ 2. Dates     YYYY-MM → "Month YYYY", dob → "Month DD, YYYY"
//!  ├─ 3. Template  handlebars → page-description markup (per variant)
//!  ├─ 4. Layout    parse markup, wrap lines with real font metrics, paginate
//!  ├─ 5. PDF       lopdf, Flate streams, embedded TrueType or Helvetica
//!  ├─ 6. Preview   page one via pdfium at 150 DPI (spawn_blocking)
//!  └─ 7. Encode    {"resumes": [experienced, fresher]} with base64 + data URIs
//! ```
//!
//! Steps 3–6 run once per variant, concurrently, over the same normalised
//! data. Either variant failing fails the whole request.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume2pdf::{GeneratorConfig, ResumeGenerator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GeneratorConfig::builder()
//!         .font_path("assets/fonts/calibri.ttf")
//!         .logo_path("assets/logo.jpg")
//!         .build()?;
//!     let generator = ResumeGenerator::new(config)?;
//!
//!     let body = std::fs::read("resume.json")?;
//!     match generator.generate_from_slice(&body).await {
//!         Ok(envelope) => println!("{}", serde_json::to_string(&envelope)?),
//!         Err(e) if e.is_client_error() => {
//!             eprintln!("{}", serde_json::to_string(&e.to_payload())?)
//!         }
//!         Err(e) => return Err(e.into()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume2pdf` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! resume2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime Requirements
//!
//! Previews need the pdfium shared library. Point `PDFIUM_LIB_PATH` (or
//! [`GeneratorConfig::pdfium_lib_path`]) at it, or install it on the system
//! library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assets;
pub mod config;
pub mod error;
pub mod generate;
pub mod model;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GeneratorConfig, GeneratorConfigBuilder};
pub use error::{ErrorPayload, FieldViolation, ResumeError};
pub use generate::ResumeGenerator;
pub use model::{ResumeInput, Variant};
pub use output::{RenderedArtifacts, ResponseEnvelope, ResumeEntry};
pub use pipeline::dates::{normalize, NormalizedResume};
pub use pipeline::schema::{validate_payload, validate_slice};
