//! Error types for the resume2pdf library.
//!
//! Every failure is fatal for the request: the caller gets both variants or
//! neither. Errors fall into two classes, exposed through
//! [`ResumeError::is_client_error`]:
//!
//! * **Client**: the submitted payload is malformed, fails schema checks, or
//!   carries a date that cannot be parsed. Nothing is rendered.
//! * **System**: a template, static resource, or the rendering engine failed.
//!   These indicate a deployment problem, not bad input.

use crate::model::Variant;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// One offending field reported by schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Dotted path with list indices, e.g. `experience[0].startDate`.
    pub field: String,
    /// Short machine-readable constraint code: `required`, `type:string`,
    /// `email`, `url`, `pattern`, …
    pub constraint: String,
    /// Human-readable description.
    pub message: String,
}

impl FieldViolation {
    pub fn new(
        field: impl Into<String>,
        constraint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

/// All errors returned by the resume2pdf library.
#[derive(Debug, Error)]
pub enum ResumeError {
    // ── Client errors ─────────────────────────────────────────────────────
    /// The request body is not JSON at all.
    #[error("Request body is not valid JSON: {0}")]
    MalformedPayload(String),

    /// One or more fields failed structural, type or format checks.
    #[error("{} field(s) failed validation: {}", .violations.len(), summarize(.violations))]
    SchemaValidation { violations: Vec<FieldViolation> },

    /// A date passed the schema but does not parse as a calendar date.
    #[error("Field '{field}' has unparsable date '{value}' (expected {expected})")]
    DateNormalization {
        field: String,
        value: String,
        expected: &'static str,
    },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// Template substitution failed.
    #[error("Template '{variant}' failed to render: {detail}")]
    TemplateFailed { variant: Variant, detail: String },

    /// The page-description markup produced by a template is not valid.
    #[error("Malformed page description for '{variant}': {detail}")]
    MalformedDocument { variant: Variant, detail: String },

    /// lopdf could not serialise the document.
    #[error("Failed to write PDF for '{variant}': {detail}")]
    DocumentWriteFailed { variant: Variant, detail: String },

    /// pdfium could not load or rasterise the generated document.
    #[error("Rasterisation failed for '{variant}': {detail}")]
    RasterisationFailed { variant: Variant, detail: String },

    // ── Resource errors ───────────────────────────────────────────────────
    /// A static resource (font, logo, template) could not be read.
    #[error("Failed to read resource '{path}': {source}")]
    ResourceLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A static resource was read but its content is unusable.
    #[error("Invalid resource '{path}': {detail}")]
    InvalidResource { path: PathBuf, detail: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib) to point at\n\
the pdfium shared library shipped with the deployment.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Both variants did not finish within the render timeout.
    #[error("Rendering timed out after {secs}s")]
    Timeout { secs: u64 },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} ({})", v.field, v.constraint))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ResumeError {
    /// `true` when the caller's payload caused the failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ResumeError::MalformedPayload(_)
                | ResumeError::SchemaValidation { .. }
                | ResumeError::DateNormalization { .. }
        )
    }

    /// Stable kind string used in the error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            ResumeError::MalformedPayload(_) => "malformed_payload",
            ResumeError::SchemaValidation { .. } => "validation_error",
            ResumeError::DateNormalization { .. } => "date_error",
            ResumeError::Timeout { .. } => "timeout",
            _ => "internal_error",
        }
    }

    /// The per-field descriptors carried by this error.
    ///
    /// A date failure is reported as a single `date` violation on its field
    /// so consumers can treat both client classes the same way.
    pub fn violations(&self) -> Vec<FieldViolation> {
        match self {
            ResumeError::SchemaValidation { violations } => violations.clone(),
            ResumeError::DateNormalization {
                field,
                value,
                expected,
            } => vec![FieldViolation::new(
                field.clone(),
                "date",
                format!("'{value}' is not a valid date ({expected})"),
            )],
            _ => Vec::new(),
        }
    }

    /// Serialise into the structured error body returned to callers.
    ///
    /// System errors carry a generic message; their detail belongs in logs.
    pub fn to_payload(&self) -> ErrorPayload {
        let message = if self.is_client_error() || matches!(self, ResumeError::Timeout { .. }) {
            self.to_string()
        } else {
            "Resume rendering failed".to_string()
        };
        ErrorPayload {
            error: self.kind().to_string(),
            message,
            errors: self.violations(),
        }
    }
}

/// Structured error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldViolation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_validation_display_lists_every_field() {
        let e = ResumeError::SchemaValidation {
            violations: vec![
                FieldViolation::new("email", "email", "not an email"),
                FieldViolation::new("experience[0].startDate", "pattern", "bad"),
            ],
        };
        let msg = e.to_string();
        assert!(msg.starts_with("2 field(s)"), "got: {msg}");
        assert!(msg.contains("email (email)"));
        assert!(msg.contains("experience[0].startDate (pattern)"));
    }

    #[test]
    fn date_error_is_client_error() {
        let e = ResumeError::DateNormalization {
            field: "dob".into(),
            value: "1995-02-30".into(),
            expected: "YYYY-MM-DD",
        };
        assert!(e.is_client_error());
        assert_eq!(e.kind(), "date_error");
        let payload = e.to_payload();
        assert_eq!(payload.errors.len(), 1);
        assert_eq!(payload.errors[0].field, "dob");
        assert_eq!(payload.errors[0].constraint, "date");
    }

    #[test]
    fn system_errors_hide_detail_in_payload() {
        let e = ResumeError::RasterisationFailed {
            variant: Variant::Fresher,
            detail: "pdfium exploded".into(),
        };
        assert!(!e.is_client_error());
        assert!(e.to_string().contains("fresher"));
        let payload = e.to_payload();
        assert_eq!(payload.error, "internal_error");
        assert!(!payload.message.contains("pdfium"));
        assert!(payload.errors.is_empty());
    }

    #[test]
    fn timeout_display() {
        let e = ResumeError::Timeout { secs: 60 };
        assert!(e.to_string().contains("60s"));
        assert_eq!(e.to_payload().error, "timeout");
    }

    #[test]
    fn payload_omits_empty_errors() {
        let json = serde_json::to_value(ResumeError::Internal("x".into()).to_payload()).unwrap();
        assert!(json.get("errors").is_none());
    }
}
