//! Typed résumé records.
//!
//! Wire names follow the form payload exactly (`startDate`, `coCurricular`,
//! `pass_year`), so the same structs serialise straight into the template
//! context. Format rules (`email`, `url`, `pattern`) are declared here with
//! `validator`; presence and type checks happen in
//! [`crate::pipeline::schema`] before these structs are ever built.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::fmt;
use validator::{Validate, ValidationError};

/// `YYYY-MM`. Syntax only: `2021-13` matches and is rejected later by the
/// date normaliser.
pub static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());

/// Prefix of an inline base64 image. Only the header is checked here; the
/// payload is decoded at render time and a broken one is skipped.
static IMAGE_DATA_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/[A-Za-z0-9.+-]+;base64,").unwrap());

pub(crate) const EMAIL_MESSAGE: &str = "value is not a valid email address";
pub(crate) const URL_MESSAGE: &str = "value is not a valid URL";
pub(crate) const YEAR_MONTH_MESSAGE: &str = "expected YYYY-MM";

/// Submitted résumé form data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ResumeInput {
    /// Photo as a `data:image/...;base64,` URI.
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(custom(function = "validate_photo"))]
    pub photo: Option<String>,
    pub name: String,
    pub phone: String,
    #[validate(email(message = "value is not a valid email address"))]
    pub email: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(url(message = "value is not a valid URL"))]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    /// Date of birth, `YYYY-MM-DD`.
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub strengths: Option<String>,
    #[serde(default)]
    pub hobbies: Option<String>,
    #[serde(default)]
    pub languages: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub proficiencies: Vec<String>,
    #[serde(rename = "coCurricular", default, deserialize_with = "null_as_empty")]
    pub co_curricular: Vec<String>,
    #[validate(nested)]
    pub academics: Vec<AcademicRecord>,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(nested)]
    pub trainings: Vec<TrainingRecord>,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(nested)]
    pub experience: Vec<ExperienceRecord>,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(nested)]
    pub projects: Vec<ProjectRecord>,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(nested)]
    pub certifications: Vec<CertificationRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AcademicRecord {
    pub course: String,
    pub institute: String,
    pub pass_year: String,
    pub grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TrainingRecord {
    pub organisation: String,
    pub project: String,
    pub learnings: Vec<String>,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ExperienceRecord {
    pub organisation: String,
    pub project: String,
    pub responsibilities: Vec<String>,
    pub designation: String,
    #[serde(rename = "startDate")]
    #[validate(regex(path = *YEAR_MONTH, code = "pattern", message = "expected YYYY-MM"))]
    pub start_date: String,
    #[serde(rename = "endDate")]
    #[validate(regex(path = *YEAR_MONTH, code = "pattern", message = "expected YYYY-MM"))]
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProjectRecord {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CertificationRecord {
    pub title: String,
    pub issuer: String,
}

/// Photos arrive inline; file paths and remote URLs are refused.
pub fn validate_photo(photo: &str) -> Result<(), ValidationError> {
    if IMAGE_DATA_URI.is_match(photo) {
        return Ok(());
    }
    let mut err = ValidationError::new("data_uri");
    err.message = Some(Cow::Borrowed("expected a data:image/...;base64, URI"));
    Err(err)
}

/// The form always sends `linkedin` and `photo`, blank when unused.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Variants ─────────────────────────────────────────────────────────────

/// The two fixed layouts rendered for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Experience-first layout.
    Experienced,
    /// Academics-first layout without an experience section.
    Fresher,
}

impl Variant {
    /// Both variants in response order.
    pub const ALL: [Variant; 2] = [Variant::Experienced, Variant::Fresher];

    /// Template registry name; also the stem of the override file.
    pub fn template_name(self) -> &'static str {
        match self {
            Variant::Experienced => "experienced",
            Variant::Fresher => "fresher",
        }
    }

    /// Fixed download filename.
    pub fn filename(self) -> &'static str {
        match self {
            Variant::Experienced => "experienced_resume.pdf",
            Variant::Fresher => "fresher_resume.pdf",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn year_month_is_syntax_only() {
        assert!(YEAR_MONTH.is_match("2021-08"));
        assert!(YEAR_MONTH.is_match("2021-13"));
        assert!(!YEAR_MONTH.is_match("2021-8"));
        assert!(!YEAR_MONTH.is_match("Aug 2021"));
    }

    #[test]
    fn optional_lists_default_to_empty() {
        let input: ResumeInput = serde_json::from_value(json!({
            "name": "A", "phone": "1", "email": "a@b.co",
            "academics": [], "experience": null
        }))
        .unwrap();
        assert!(input.experience.is_empty());
        assert!(input.trainings.is_empty());
        assert!(input.co_curricular.is_empty());
    }

    #[test]
    fn blank_linkedin_is_absent() {
        let input: ResumeInput = serde_json::from_value(json!({
            "name": "A", "phone": "1", "email": "a@b.co",
            "linkedin": "  ", "academics": []
        }))
        .unwrap();
        assert_eq!(input.linkedin, None);
    }

    #[test]
    fn photo_must_be_an_inline_image() {
        assert!(validate_photo("data:image/png;base64,iVBORw0KGgo=").is_ok());
        assert!(validate_photo("data:image/svg+xml;base64,PHN2Zz4=").is_ok());
        for bad in [
            "https://example.com/me.jpg",
            "/etc/hostname",
            "iVBORw0KGgo=",
            "data:text/plain;base64,aGk=",
            "data:image/png,raw",
        ] {
            let err = validate_photo(bad).unwrap_err();
            assert_eq!(err.code, "data_uri", "{bad}");
        }
    }

    #[test]
    fn blank_photo_is_absent() {
        let input: ResumeInput = serde_json::from_value(json!({
            "name": "A", "phone": "1", "email": "a@b.co",
            "photo": "", "academics": []
        }))
        .unwrap();
        assert_eq!(input.photo, None);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn wire_names_survive_serialisation() {
        let rec = ExperienceRecord {
            organisation: "Acme".into(),
            project: "P".into(),
            responsibilities: vec![],
            designation: "Dev".into(),
            start_date: "2021-08".into(),
            end_date: "2022-01".into(),
        };
        let v = serde_json::to_value(rec).unwrap();
        assert_eq!(v["startDate"], "2021-08");
        assert_eq!(v["endDate"], "2022-01");
    }

    #[test]
    fn variant_order_and_filenames() {
        assert_eq!(Variant::ALL[0].filename(), "experienced_resume.pdf");
        assert_eq!(Variant::ALL[1].filename(), "fresher_resume.pdf");
        assert_eq!(Variant::Fresher.to_string(), "fresher");
    }
}
