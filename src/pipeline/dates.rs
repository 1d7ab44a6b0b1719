//! Date normalisation: machine dates → display dates.
//!
//! | Field | Input | Output |
//! |-------|-------|--------|
//! | `dob` | `1995-03-07` | `March 07, 1995` |
//! | `experience[i].startDate` / `endDate` | `2021-08` | `August 2021` |
//!
//! The schema only checks the *shape* of experience dates, so `2021-13`
//! reaches this stage and fails here. `dob` has no schema-level shape at all.
//! Both cases surface as [`ResumeError::DateNormalization`] for the whole
//! request.

use crate::error::ResumeError;
use crate::model::ResumeInput;
use chrono::NaiveDate;
use serde::Serialize;
use std::ops::Deref;

const DOB_FORMAT: &str = "%Y-%m-%d";
const DOB_DISPLAY: &str = "%B %d, %Y";
const MONTH_DISPLAY: &str = "%B %Y";

/// A résumé whose date fields hold display strings.
///
/// Only this type is accepted by the template stage, so un-normalised data
/// cannot reach a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedResume(ResumeInput);

impl NormalizedResume {
    pub fn into_inner(self) -> ResumeInput {
        self.0
    }
}

impl Deref for NormalizedResume {
    type Target = ResumeInput;

    fn deref(&self) -> &ResumeInput {
        &self.0
    }
}

/// Produce a normalised copy of `input`. The argument is never modified.
pub fn normalize(input: &ResumeInput) -> Result<NormalizedResume, ResumeError> {
    let mut data = input.clone();

    data.dob = Some(match input.dob.as_deref() {
        Some(raw) if !raw.is_empty() => format_dob(raw)?,
        _ => String::new(),
    });

    for (i, exp) in data.experience.iter_mut().enumerate() {
        exp.start_date = format_year_month(&exp.start_date, &format!("experience[{i}].startDate"))?;
        exp.end_date = format_year_month(&exp.end_date, &format!("experience[{i}].endDate"))?;
    }

    Ok(NormalizedResume(data))
}

fn format_dob(raw: &str) -> Result<String, ResumeError> {
    NaiveDate::parse_from_str(raw, DOB_FORMAT)
        .map(|d| d.format(DOB_DISPLAY).to_string())
        .map_err(|_| ResumeError::DateNormalization {
            field: "dob".to_string(),
            value: raw.to_string(),
            expected: "YYYY-MM-DD",
        })
}

fn format_year_month(raw: &str, field: &str) -> Result<String, ResumeError> {
    let err = || ResumeError::DateNormalization {
        field: field.to_string(),
        value: raw.to_string(),
        expected: "YYYY-MM",
    };
    // chrono needs a day to build a date; pin it to the first.
    let (year, month) = raw.split_once('-').ok_or_else(err)?;
    if year.len() != 4 || month.len() != 2 {
        return Err(err());
    }
    NaiveDate::parse_from_str(&format!("{raw}-01"), DOB_FORMAT)
        .map(|d| d.format(MONTH_DISPLAY).to_string())
        .map_err(|_| err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExperienceRecord, ProjectRecord};

    fn resume(dob: Option<&str>, start: &str, end: &str) -> ResumeInput {
        ResumeInput {
            photo: None,
            name: "Asha".into(),
            phone: "1".into(),
            email: "a@b.co".into(),
            linkedin: None,
            objective: Some("Ship things".into()),
            dob: dob.map(String::from),
            address: None,
            strengths: None,
            hobbies: None,
            languages: None,
            proficiencies: vec!["Rust".into()],
            co_curricular: vec![],
            academics: vec![],
            trainings: vec![],
            experience: vec![ExperienceRecord {
                organisation: "Acme".into(),
                project: "Billing".into(),
                responsibilities: vec!["APIs".into()],
                designation: "Engineer".into(),
                start_date: start.into(),
                end_date: end.into(),
            }],
            projects: vec![ProjectRecord {
                title: "T".into(),
                description: "2021-08".into(),
            }],
            certifications: vec![],
        }
    }

    #[test]
    fn dob_uses_full_month_and_padded_day() {
        let out = normalize(&resume(Some("1995-03-07"), "2021-08", "2022-01")).unwrap();
        assert_eq!(out.dob.as_deref(), Some("March 07, 1995"));
    }

    #[test]
    fn absent_or_empty_dob_becomes_empty() {
        for dob in [None, Some("")] {
            let out = normalize(&resume(dob, "2021-08", "2022-01")).unwrap();
            assert_eq!(out.dob.as_deref(), Some(""));
        }
    }

    #[test]
    fn dob_is_parsed_exactly() {
        for dob in [" 1995-03-07 ", "1995-03-07\n", "   "] {
            let err = normalize(&resume(Some(dob), "2021-08", "2022-01")).unwrap_err();
            match err {
                ResumeError::DateNormalization { field, value, .. } => {
                    assert_eq!(field, "dob");
                    assert_eq!(value, dob);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn experience_dates_become_month_year() {
        let out = normalize(&resume(None, "2021-08", "2022-12")).unwrap();
        assert_eq!(out.experience[0].start_date, "August 2021");
        assert_eq!(out.experience[0].end_date, "December 2022");
    }

    #[test]
    fn invalid_month_fails_with_field_path() {
        let err = normalize(&resume(None, "2021-08", "2021-13")).unwrap_err();
        match err {
            ResumeError::DateNormalization { field, value, .. } => {
                assert_eq!(field, "experience[0].endDate");
                assert_eq!(value, "2021-13");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_dob_is_a_date_error() {
        let err = normalize(&resume(Some("07/03/1995"), "2021-08", "2022-01")).unwrap_err();
        assert!(matches!(err, ResumeError::DateNormalization { ref field, .. } if field == "dob"));
        assert!(err.is_client_error());
    }

    #[test]
    fn impossible_dob_is_rejected() {
        assert!(normalize(&resume(Some("1995-02-30"), "2021-08", "2022-01")).is_err());
    }

    #[test]
    fn non_date_fields_are_untouched_and_input_is_not_mutated() {
        let input = resume(Some("1995-03-07"), "2021-08", "2022-01");
        let before = input.clone();
        let out = normalize(&input).unwrap();
        assert_eq!(input, before);

        let mut restored = out.into_inner();
        restored.dob = before.dob.clone();
        restored.experience[0].start_date = before.experience[0].start_date.clone();
        restored.experience[0].end_date = before.experience[0].end_date.clone();
        assert_eq!(restored, before);
    }
}
