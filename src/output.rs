//! Output types: per-variant artifacts and the response envelope.

use crate::model::Variant;
use crate::pipeline::encode::{png_data_uri, to_base64};
use serde::{Deserialize, Serialize};

/// Raw artifacts produced for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifacts {
    pub variant: Variant,

    /// Complete PDF document.
    pub pdf: Vec<u8>,

    /// PNG of page one.
    pub preview_png: Vec<u8>,

    /// Pages in the PDF. The preview always shows page one only.
    pub page_count: usize,

    /// Preview size in pixels.
    pub preview_width: u32,
    pub preview_height: u32,
}

impl RenderedArtifacts {
    /// Encode for transport.
    pub fn to_entry(&self) -> ResumeEntry {
        ResumeEntry {
            preview: png_data_uri(&self.preview_png),
            base64: to_base64(&self.pdf),
            filename: self.variant.filename().to_string(),
        }
    }
}

/// One downloadable résumé as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeEntry {
    /// `data:image/png;base64,…`
    pub preview: String,
    /// Base64 PDF bytes.
    pub base64: String,
    pub filename: String,
}

/// The success body: exactly two entries, experienced first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub resumes: Vec<ResumeEntry>,
}

impl ResponseEnvelope {
    /// Package both variants. Order follows the parameters, not the
    /// artifacts' own tags, so a swapped call is caught in debug builds.
    pub fn assemble(experienced: &RenderedArtifacts, fresher: &RenderedArtifacts) -> Self {
        debug_assert_eq!(experienced.variant, Variant::Experienced);
        debug_assert_eq!(fresher.variant, Variant::Fresher);
        Self {
            resumes: vec![experienced.to_entry(), fresher.to_entry()],
        }
    }

    pub fn entry(&self, variant: Variant) -> Option<&ResumeEntry> {
        self.resumes.iter().find(|e| e.filename == variant.filename())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifacts(variant: Variant, pdf: &[u8]) -> RenderedArtifacts {
        RenderedArtifacts {
            variant,
            pdf: pdf.to_vec(),
            preview_png: b"png".to_vec(),
            page_count: 1,
            preview_width: 1240,
            preview_height: 1754,
        }
    }

    #[test]
    fn envelope_order_and_filenames() {
        let env = ResponseEnvelope::assemble(
            &artifacts(Variant::Experienced, b"%PDF-exp"),
            &artifacts(Variant::Fresher, b"%PDF-fr"),
        );
        assert_eq!(env.resumes.len(), 2);
        assert_eq!(env.resumes[0].filename, "experienced_resume.pdf");
        assert_eq!(env.resumes[1].filename, "fresher_resume.pdf");
        assert_eq!(env.resumes[0].base64, to_base64(b"%PDF-exp"));
        assert!(env.resumes[1].preview.starts_with("data:image/png;base64,"));
        assert_eq!(
            env.entry(Variant::Fresher).map(|e| e.base64.as_str()),
            Some(to_base64(b"%PDF-fr").as_str())
        );
    }

    #[test]
    fn envelope_wire_shape() {
        let env = ResponseEnvelope::assemble(
            &artifacts(Variant::Experienced, b"a"),
            &artifacts(Variant::Fresher, b"b"),
        );
        let json = serde_json::to_value(&env).unwrap();
        let entry = &json["resumes"][0];
        let mut keys: Vec<_> = entry.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["base64", "filename", "preview"]);
    }
}
