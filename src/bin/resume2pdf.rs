//! CLI binary for resume2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GeneratorConfig` and prints results.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use resume2pdf::pipeline::encode::PNG_DATA_URI_PREFIX;
use resume2pdf::{
    normalize, validate_slice, GeneratorConfig, ResponseEnvelope, ResumeError, ResumeGenerator,
};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

/// Exit status for payloads rejected by validation.
const EXIT_INVALID_INPUT: u8 = 2;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the response envelope (both variants) as JSON
  resume2pdf resume.json

  # Write experienced/fresher PDFs and PNG previews to a directory
  resume2pdf resume.json -o out/

  # Read the payload from stdin, check it without rendering
  cat resume.json | resume2pdf --validate-only -

  # Embed the deployment font and logo
  resume2pdf --font assets/calibri.ttf --logo assets/logo.jpg resume.json -o out/

EXIT STATUS:
  0  success
  1  rendering or deployment failure
  2  the payload failed validation (error payload printed to stdout)

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH        Path to libpdfium (file or directory)
  RESUME2PDF_FONT        TrueType font for body text
  RESUME2PDF_BOLD_FONT   TrueType bold face
  RESUME2PDF_LOGO        Header logo (PNG or JPEG)
  RESUME2PDF_TEMPLATES   Directory with experienced.hbs / fresher.hbs overrides
  RUST_LOG               Override log filter (e.g. resume2pdf=debug)
"#;

/// Render résumé JSON into experienced and fresher PDFs with previews.
#[derive(Parser, Debug)]
#[command(
    name = "resume2pdf",
    version,
    about = "Render résumé JSON into experienced and fresher PDFs with PNG previews",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JSON payload file, or `-` for stdin.
    input: String,

    /// Write PDFs and previews into this directory instead of printing JSON.
    #[arg(short, long, env = "RESUME2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Validate and normalise only; print the normalised payload.
    #[arg(long)]
    validate_only: bool,

    /// TrueType font for body text and layout metrics.
    #[arg(long, env = "RESUME2PDF_FONT")]
    font: Option<PathBuf>,

    /// TrueType bold face. Without it bold is synthesised.
    #[arg(long, env = "RESUME2PDF_BOLD_FONT")]
    bold_font: Option<PathBuf>,

    /// Header logo image.
    #[arg(long, env = "RESUME2PDF_LOGO")]
    logo: Option<PathBuf>,

    /// Directory holding template overrides.
    #[arg(long, env = "RESUME2PDF_TEMPLATES")]
    templates: Option<PathBuf>,

    /// XML-escape field values instead of embedding them verbatim.
    #[arg(long, env = "RESUME2PDF_ESCAPE")]
    escape: bool,

    /// Preview DPI (72–400).
    #[arg(long, env = "RESUME2PDF_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// pdfium shared library, or the directory holding it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Render timeout for both variants, in seconds.
    #[arg(long, env = "RESUME2PDF_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RESUME2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RESUME2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let body = read_input(&cli.input).await?;

    // ── Validate-only mode ───────────────────────────────────────────────
    if cli.validate_only {
        let normalised = match validate_slice(&body).and_then(|input| normalize(&input)) {
            Ok(n) => n,
            Err(e) => return reject(&e),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&normalised).context("Failed to serialise payload")?
        );
        if !cli.quiet {
            eprintln!("{} payload is valid", green("✔"));
        }
        return Ok(ExitCode::SUCCESS);
    }

    // ── Render ───────────────────────────────────────────────────────────
    let generator = ResumeGenerator::new(build_config(&cli)?)
        .context("Failed to initialise the generator")?;

    let start = Instant::now();
    let envelope = match generator.generate_from_slice(&body).await {
        Ok(envelope) => envelope,
        Err(e) if e.is_client_error() => return reject(&e),
        Err(e) => return Err(e).context("Rendering failed"),
    };

    match cli.output {
        Some(ref dir) => {
            write_artifacts(&envelope, dir).await?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} résumés  {}ms  →  {}",
                    green("✔"),
                    envelope.resumes.len(),
                    start.elapsed().as_millis(),
                    bold(&dir.display().to_string()),
                );
            }
        }
        None => {
            let json =
                serde_json::to_string(&envelope).context("Failed to serialise output")?;
            println!("{json}");
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Print the error payload for a rejected request.
fn reject(e: &ResumeError) -> Result<ExitCode> {
    if !e.is_client_error() {
        return Err(anyhow::anyhow!("{e}"));
    }
    let payload =
        serde_json::to_string_pretty(&e.to_payload()).context("Failed to serialise error")?;
    println!("{payload}");
    eprintln!("{} {}", red("✘"), e);
    Ok(ExitCode::from(EXIT_INVALID_INPUT))
}

async fn read_input(input: &str) -> Result<Vec<u8>> {
    if input == "-" {
        return tokio::task::spawn_blocking(|| {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        })
        .await
        .context("stdin reader panicked")?;
    }
    tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read payload from {:?}", input))
}

/// Map CLI args to `GeneratorConfig`.
fn build_config(cli: &Cli) -> Result<GeneratorConfig> {
    let mut builder = GeneratorConfig::builder()
        .escape(cli.escape)
        .preview_dpi(cli.dpi)
        .render_timeout_secs(cli.timeout);

    if let Some(ref p) = cli.font {
        builder = builder.font_path(p);
    }
    if let Some(ref p) = cli.bold_font {
        builder = builder.bold_font_path(p);
    }
    if let Some(ref p) = cli.logo {
        builder = builder.logo_path(p);
    }
    if let Some(ref p) = cli.templates {
        builder = builder.template_dir(p);
    }
    if let Some(ref p) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(p);
    }

    builder.build().context("Invalid configuration")
}

/// Decode each entry back to files: `<name>.pdf` and `<name>.png`.
async fn write_artifacts(envelope: &ResponseEnvelope, dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {:?}", dir))?;

    for entry in &envelope.resumes {
        let pdf = STANDARD
            .decode(&entry.base64)
            .context("Generated PDF is not valid base64")?;
        let pdf_path = dir.join(&entry.filename);
        tokio::fs::write(&pdf_path, pdf)
            .await
            .with_context(|| format!("Failed to write {:?}", pdf_path))?;

        let png = entry
            .preview
            .strip_prefix(PNG_DATA_URI_PREFIX)
            .context("Preview is not a PNG data URI")
            .and_then(|b64| STANDARD.decode(b64).context("Preview is not valid base64"))?;
        let png_path = pdf_path.with_extension("png");
        tokio::fs::write(&png_path, png)
            .await
            .with_context(|| format!("Failed to write {:?}", png_path))?;
    }
    Ok(())
}
