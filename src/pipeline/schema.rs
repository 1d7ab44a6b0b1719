//! Boundary validation: untyped JSON → [`ResumeInput`].
//!
//! Validation runs in two passes so that every offending field is reported,
//! not just the first one serde trips over:
//!
//! 1. A structural walk over the raw JSON against [`RESUME_FIELDS`], which
//!    collects every missing required field and every type mismatch.
//! 2. Once the shape is sound, serde builds the typed value and the
//!    `validator` rules declared on [`crate::model`] check formats.
//!
//! A payload that fails the first pass never deserialises, so the same
//! format rules are applied to its raw string values instead. A missing
//! `phone` and a malformed `email` are reported together.

use crate::error::{FieldViolation, ResumeError};
use crate::model::{
    validate_photo, ResumeInput, EMAIL_MESSAGE, URL_MESSAGE, YEAR_MONTH, YEAR_MONTH_MESSAGE,
};
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::debug;
use validator::{Validate, ValidateEmail, ValidateUrl, ValidationErrors, ValidationErrorsKind};

/// Expected JSON shape of a field.
#[derive(Debug, Clone, Copy)]
enum Shape {
    Text,
    TextList,
    Records(&'static [FieldSpec]),
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    shape: Shape,
    required: bool,
}

const fn req(name: &'static str, shape: Shape) -> FieldSpec {
    FieldSpec {
        name,
        shape,
        required: true,
    }
}

const fn opt(name: &'static str, shape: Shape) -> FieldSpec {
    FieldSpec {
        name,
        shape,
        required: false,
    }
}

const ACADEMIC_FIELDS: &[FieldSpec] = &[
    req("course", Shape::Text),
    req("institute", Shape::Text),
    req("pass_year", Shape::Text),
    req("grade", Shape::Text),
];

const TRAINING_FIELDS: &[FieldSpec] = &[
    req("organisation", Shape::Text),
    req("project", Shape::Text),
    req("learnings", Shape::TextList),
    req("duration", Shape::Text),
];

const EXPERIENCE_FIELDS: &[FieldSpec] = &[
    req("organisation", Shape::Text),
    req("project", Shape::Text),
    req("responsibilities", Shape::TextList),
    req("designation", Shape::Text),
    req("startDate", Shape::Text),
    req("endDate", Shape::Text),
];

const PROJECT_FIELDS: &[FieldSpec] = &[req("title", Shape::Text), req("description", Shape::Text)];

const CERTIFICATION_FIELDS: &[FieldSpec] = &[req("title", Shape::Text), req("issuer", Shape::Text)];

const RESUME_FIELDS: &[FieldSpec] = &[
    opt("photo", Shape::Text),
    req("name", Shape::Text),
    req("phone", Shape::Text),
    req("email", Shape::Text),
    opt("linkedin", Shape::Text),
    opt("objective", Shape::Text),
    opt("dob", Shape::Text),
    opt("address", Shape::Text),
    opt("strengths", Shape::Text),
    opt("hobbies", Shape::Text),
    opt("languages", Shape::Text),
    opt("proficiencies", Shape::TextList),
    opt("coCurricular", Shape::TextList),
    req("academics", Shape::Records(ACADEMIC_FIELDS)),
    opt("trainings", Shape::Records(TRAINING_FIELDS)),
    opt("experience", Shape::Records(EXPERIENCE_FIELDS)),
    opt("projects", Shape::Records(PROJECT_FIELDS)),
    opt("certifications", Shape::Records(CERTIFICATION_FIELDS)),
];

/// Parse raw request bytes and validate them.
pub fn validate_slice(body: &[u8]) -> Result<ResumeInput, ResumeError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ResumeError::MalformedPayload(e.to_string()))?;
    validate_payload(&value)
}

/// Validate an untyped payload and build the typed résumé.
pub fn validate_payload(payload: &Value) -> Result<ResumeInput, ResumeError> {
    let mut violations = Vec::new();
    match payload.as_object() {
        Some(map) => {
            check_record(map, RESUME_FIELDS, "", &mut violations);
            if !violations.is_empty() {
                check_formats(map, &mut violations);
            }
        }
        None => violations.push(FieldViolation::new(
            "$",
            "type:object",
            format!("request body must be an object, got {}", type_name(payload)),
        )),
    }
    if !violations.is_empty() {
        return Err(schema_error(violations));
    }

    let input: ResumeInput = serde_json::from_value(payload.clone()).map_err(|e| {
        // The structural pass mirrors the struct definitions, so this only
        // fires if the two drift apart.
        ResumeError::SchemaValidation {
            violations: vec![FieldViolation::new("$", "shape", e.to_string())],
        }
    })?;

    if let Err(errors) = input.validate() {
        let mut violations = Vec::new();
        flatten_errors(&errors, "", &mut violations);
        return Err(schema_error(violations));
    }

    debug!(
        "Payload valid: {} academics, {} experience, {} trainings",
        input.academics.len(),
        input.experience.len(),
        input.trainings.len()
    );
    Ok(input)
}

fn schema_error(mut violations: Vec<FieldViolation>) -> ResumeError {
    violations.sort_by(|a, b| a.field.cmp(&b.field));
    ResumeError::SchemaValidation { violations }
}

fn check_record(
    map: &serde_json::Map<String, Value>,
    fields: &[FieldSpec],
    prefix: &str,
    out: &mut Vec<FieldViolation>,
) {
    for spec in fields {
        let path = join_path(prefix, spec.name);
        match map.get(spec.name) {
            None | Some(Value::Null) if spec.required => {
                out.push(FieldViolation::new(path, "required", "field required"));
            }
            None | Some(Value::Null) => {}
            Some(value) => check_shape(value, spec.shape, &path, out),
        }
    }
}

fn check_shape(value: &Value, shape: Shape, path: &str, out: &mut Vec<FieldViolation>) {
    match (shape, value) {
        (Shape::Text, Value::String(_)) => {}
        (Shape::Text, other) => out.push(type_violation(path, "string", other)),
        (Shape::TextList, Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    out.push(type_violation(&format!("{path}[{i}]"), "string", item));
                }
            }
        }
        (Shape::Records(fields), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{i}]");
                match item.as_object() {
                    Some(map) => check_record(map, fields, &item_path, out),
                    None => out.push(type_violation(&item_path, "object", item)),
                }
            }
        }
        (Shape::TextList | Shape::Records(_), other) => {
            out.push(type_violation(path, "array", other))
        }
    }
}

// ── Format rules on raw values ───────────────────────────────────────────

/// The `validator` rules of [`ResumeInput`], applied to whichever of those
/// fields are strings in a payload that cannot be deserialised.
fn check_formats(map: &Map<String, Value>, out: &mut Vec<FieldViolation>) {
    let text = |name: &str| map.get(name).and_then(Value::as_str);
    let present = |s: &&str| !s.trim().is_empty();

    if let Some(email) = text("email") {
        if !email.validate_email() {
            out.push(FieldViolation::new("email", "email", EMAIL_MESSAGE));
        }
    }
    if let Some(url) = text("linkedin").filter(present) {
        if !url.validate_url() {
            out.push(FieldViolation::new("linkedin", "url", URL_MESSAGE));
        }
    }
    if let Some(photo) = text("photo").filter(present) {
        if let Err(err) = validate_photo(photo) {
            let message = err.message.unwrap_or_default();
            out.push(FieldViolation::new("photo", err.code.to_string(), message.to_string()));
        }
    }
    let experience = map.get("experience").and_then(Value::as_array);
    for (i, item) in experience.into_iter().flatten().enumerate() {
        for key in ["startDate", "endDate"] {
            match item.get(key).and_then(Value::as_str) {
                Some(date) if !YEAR_MONTH.is_match(date) => out.push(FieldViolation::new(
                    format!("experience[{i}].{key}"),
                    "pattern",
                    YEAR_MONTH_MESSAGE,
                )),
                _ => {}
            }
        }
    }
}

fn type_violation(path: &str, expected: &str, got: &Value) -> FieldViolation {
    FieldViolation::new(
        path,
        format!("type:{expected}"),
        format!("expected {expected}, got {}", type_name(got)),
    )
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Flatten nested `validator` errors into wire-named field paths.
fn flatten_errors(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldViolation>) {
    for (field, kind) in errors.errors() {
        let path = join_path(prefix, wire_name(field));
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err
                        .message
                        .clone()
                        .unwrap_or_else(|| Cow::Owned(format!("failed '{}' check", err.code)));
                    out.push(FieldViolation::new(
                        path.clone(),
                        err.code.to_string(),
                        message.to_string(),
                    ));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_errors(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (i, inner) in items {
                    flatten_errors(inner, &format!("{path}[{i}]"), out);
                }
            }
        }
    }
}

/// Map Rust field names back to the payload's names.
fn wire_name(field: &str) -> &str {
    match field {
        "start_date" => "startDate",
        "end_date" => "endDate",
        "co_curricular" => "coCurricular",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "name": "Asha Rao",
            "phone": "+91 98765 43210",
            "email": "asha@example.com",
            "linkedin": "https://www.linkedin.com/in/asha",
            "dob": "1995-03-07",
            "academics": [
                {"course": "B.Tech", "institute": "NIT", "pass_year": "2017", "grade": "8.1"}
            ],
            "experience": [{
                "organisation": "Acme", "project": "Billing", "designation": "Engineer",
                "responsibilities": ["Built APIs"], "startDate": "2021-08", "endDate": "2023-01"
            }]
        })
    }

    fn violations(err: ResumeError) -> Vec<FieldViolation> {
        match err {
            ResumeError::SchemaValidation { violations } => violations,
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid_payload() {
        let input = validate_payload(&valid()).expect("valid payload");
        assert_eq!(input.name, "Asha Rao");
        assert_eq!(input.experience[0].start_date, "2021-08");
    }

    #[test]
    fn empty_academics_is_accepted() {
        let mut payload = valid();
        payload["academics"] = json!([]);
        assert!(validate_payload(&payload).unwrap().academics.is_empty());
    }

    #[test]
    fn missing_academics_is_rejected() {
        let mut payload = valid();
        payload.as_object_mut().unwrap().remove("academics");
        let v = violations(validate_payload(&payload).unwrap_err());
        assert_eq!(v, vec![FieldViolation::new("academics", "required", "field required")]);
    }

    #[test]
    fn missing_email_names_the_field() {
        let mut payload = valid();
        payload.as_object_mut().unwrap().remove("email");
        let v = violations(validate_payload(&payload).unwrap_err());
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].field, "email");
        assert_eq!(v[0].constraint, "required");
    }

    #[test]
    fn malformed_email_names_the_field() {
        let mut payload = valid();
        payload["email"] = json!("not-an-email");
        let v = violations(validate_payload(&payload).unwrap_err());
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].field, "email");
        assert_eq!(v[0].constraint, "email");
    }

    #[test]
    fn reports_every_format_violation() {
        let mut payload = valid();
        payload["email"] = json!("nope");
        payload["linkedin"] = json!("not a url");
        payload["experience"][0]["startDate"] = json!("Aug 2021");
        let v = violations(validate_payload(&payload).unwrap_err());
        let fields: Vec<_> = v.iter().map(|v| (v.field.as_str(), v.constraint.as_str())).collect();
        assert_eq!(
            fields,
            vec![
                ("email", "email"),
                ("experience[0].startDate", "pattern"),
                ("linkedin", "url"),
            ]
        );
    }

    #[test]
    fn reports_every_type_violation() {
        let mut payload = valid();
        payload["name"] = json!(42);
        payload["academics"][0].as_object_mut().unwrap().remove("grade");
        payload["experience"][0]["responsibilities"] = json!(["ok", 7]);
        payload["projects"] = json!("none");
        let v = violations(validate_payload(&payload).unwrap_err());
        let fields: Vec<_> = v.iter().map(|v| (v.field.as_str(), v.constraint.as_str())).collect();
        assert_eq!(
            fields,
            vec![
                ("academics[0].grade", "required"),
                ("experience[0].responsibilities[1]", "type:string"),
                ("name", "type:string"),
                ("projects", "type:array"),
            ]
        );
    }

    #[test]
    fn format_violations_are_reported_alongside_structural_ones() {
        let payload = json!({"phone": "1", "email": "nope", "academics": []});
        let v = violations(validate_payload(&payload).unwrap_err());
        let fields: Vec<_> = v.iter().map(|v| (v.field.as_str(), v.constraint.as_str())).collect();
        assert_eq!(fields, vec![("email", "email"), ("name", "required")]);
    }

    #[test]
    fn raw_format_checks_match_the_typed_ones() {
        let mut payload = valid();
        payload["email"] = json!("not-an-email");
        payload["linkedin"] = json!("not a url");
        payload["photo"] = json!("https://example.com/me.jpg");
        payload["experience"][0]["endDate"] = json!("Feb 2024");
        let typed = violations(validate_payload(&payload).unwrap_err());

        payload.as_object_mut().unwrap().remove("phone");
        let raw = violations(validate_payload(&payload).unwrap_err());

        let mut expected: Vec<_> = typed
            .iter()
            .cloned()
            .chain([FieldViolation::new("phone", "required", "field required")])
            .collect();
        expected.sort_by(|a, b| a.field.cmp(&b.field));
        assert_eq!(typed.len(), 4);
        assert_eq!(raw, expected);
    }

    #[test]
    fn blank_optional_formats_are_skipped_after_structural_errors() {
        let payload = json!({
            "name": 7, "phone": "1", "email": "a@b.co",
            "linkedin": " ", "photo": "", "academics": []
        });
        let v = violations(validate_payload(&payload).unwrap_err());
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].field, "name");
    }

    #[test]
    fn photo_must_be_a_data_uri() {
        for photo in ["https://example.com/me.jpg", "iVBORw0KGgoAAAANSUhEUg==", "/etc/hostname"] {
            let mut payload = valid();
            payload["photo"] = json!(photo);
            let v = violations(validate_payload(&payload).unwrap_err());
            assert_eq!(v.len(), 1, "{photo}");
            assert_eq!(v[0].field, "photo");
            assert_eq!(v[0].constraint, "data_uri");
        }

        let mut payload = valid();
        payload["photo"] = json!("data:image/png;base64,AAAA");
        assert!(validate_payload(&payload).is_ok(), "undecodable bytes are a render-time skip");
        payload["photo"] = json!("");
        assert_eq!(validate_payload(&payload).unwrap().photo, None);
    }

    #[test]
    fn invalid_month_passes_schema() {
        let mut payload = valid();
        payload["experience"][0]["startDate"] = json!("2021-13");
        assert!(validate_payload(&payload).is_ok());
    }

    #[test]
    fn non_object_body_is_rejected() {
        let v = violations(validate_payload(&json!([1, 2])).unwrap_err());
        assert_eq!(v[0].field, "$");
        assert_eq!(v[0].constraint, "type:object");
    }

    #[test]
    fn invalid_json_is_malformed_payload() {
        let err = validate_slice(b"{not json").unwrap_err();
        assert!(matches!(err, ResumeError::MalformedPayload(_)));
        assert!(err.is_client_error());
    }
}
