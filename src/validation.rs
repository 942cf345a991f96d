//! Field rules shared by the HTTP handlers and the offline client, so a
//! draft the client accepts locally is one the server would accept too.

use std::fmt::Display;
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    CyclePatch, InjectionPatch, LoginRequest, NewComment, NewCompound, NewCycle, NewCycleCompound,
    NewInjection, NewPost, NewSideEffect, PostPatch, ProfilePatch, RegisterRequest,
    SideEffectPatch,
};

pub const POST_CONTENT: RangeInclusive<usize> = 1..=5000;
pub const COMMENT_CONTENT: RangeInclusive<usize> = 1..=1000;
pub const USERNAME: RangeInclusive<usize> = 3..=20;
pub const MIN_PASSWORD: usize = 8;
pub const SEVERITY: RangeInclusive<i32> = 1..=10;
pub const RATING: RangeInclusive<i32> = 1..=10;
pub const SYSTOLIC: RangeInclusive<i32> = 70..=200;
pub const DIASTOLIC: RangeInclusive<i32> = 40..=130;
pub const HEIGHT_CM: RangeInclusive<i32> = 100..=250;
pub const WEIGHT_KG: RangeInclusive<f64> = 30.0..=300.0;

const MAX_URL: usize = 2048;
const MAX_NOTES: usize = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Error, Serialize, Deserialize)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldError { field: field.into(), message: message.into() }])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Accumulates every failing field instead of stopping at the first one.
#[derive(Debug, Default)]
#[must_use]
pub struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(mut self, field: &str, message: String) -> Self {
        self.errors.push(FieldError { field: field.to_string(), message });
        self
    }

    pub fn text(self, field: &str, value: &str, len: RangeInclusive<usize>) -> Self {
        let count = value.trim().chars().count();
        if len.contains(&count) {
            self
        } else {
            self.fail(
                field,
                format!("must be between {} and {} characters", len.start(), len.end()),
            )
        }
    }

    pub fn optional_text(self, field: &str, value: Option<&str>, max: usize) -> Self {
        match value {
            Some(v) if v.chars().count() > max => {
                self.fail(field, format!("must be at most {max} characters"))
            }
            _ => self,
        }
    }

    pub fn range<T: PartialOrd + Display>(self, field: &str, value: T, range: &RangeInclusive<T>) -> Self {
        if range.contains(&value) {
            self
        } else {
            self.fail(field, format!("must be between {} and {}", range.start(), range.end()))
        }
    }

    pub fn optional_range<T: PartialOrd + Display>(
        self,
        field: &str,
        value: Option<T>,
        range: &RangeInclusive<T>,
    ) -> Self {
        match value {
            Some(v) => self.range(field, v, range),
            None => self,
        }
    }

    pub fn positive(self, field: &str, value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            self
        } else {
            self.fail(field, "must be a positive number".to_string())
        }
    }

    pub fn list(
        self,
        field: &str,
        values: &[String],
        count: RangeInclusive<usize>,
        len: RangeInclusive<usize>,
    ) -> Self {
        if !count.contains(&values.len()) {
            return self.fail(
                field,
                format!("must contain between {} and {} entries", count.start(), count.end()),
            );
        }
        match values.iter().position(|v| !len.contains(&v.trim().chars().count())) {
            Some(i) => self.fail(
                &format!("{field}[{i}]"),
                format!("must be between {} and {} characters", len.start(), len.end()),
            ),
            None => self,
        }
    }

    pub fn dates(self, field: &str, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        match end {
            Some(end) if end < start => self.fail(field, "must not be before the start date".to_string()),
            _ => self,
        }
    }

    pub fn email(self, field: &str, value: &str) -> Self {
        let value = value.trim();
        let well_formed = value.len() <= 255
            && !value.chars().any(char::is_whitespace)
            && value
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if well_formed {
            self
        } else {
            self.fail(field, "must be a valid email address".to_string())
        }
    }

    pub fn username(self, field: &str, value: &str) -> Self {
        let value = value.trim();
        if !USERNAME.contains(&value.chars().count()) {
            return self.fail(
                field,
                format!("must be between {} and {} characters", USERNAME.start(), USERNAME.end()),
            );
        }
        if value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            self
        } else {
            self.fail(field, "may only contain letters, numbers and underscores".to_string())
        }
    }

    pub fn password(self, field: &str, value: &str) -> Self {
        if value.chars().count() >= MIN_PASSWORD {
            self
        } else {
            self.fail(field, format!("must be at least {MIN_PASSWORD} characters long"))
        }
    }

    /// Pulls in the result of a nested validation under `prefix`.
    pub fn nested(mut self, prefix: &str, result: Result<(), ValidationErrors>) -> Self {
        if let Err(nested) = result {
            self.errors.extend(nested.0.into_iter().map(|e| FieldError {
                field: format!("{prefix}.{}", e.field),
                message: e.message,
            }));
        }
        self
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .email("email", &self.email)
            .username("username", &self.username)
            .password("password", &self.password)
            .optional_text("fullName", self.full_name.as_deref(), 100)
            .finish()
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let checks = Checks::new().email("email", &self.email);
        if self.password.is_empty() {
            return checks.fail("password", "is required".to_string()).finish();
        }
        checks.finish()
    }
}

impl Validate for ProfilePatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .optional_text("fullName", self.full_name.as_deref(), 100)
            .optional_text("bio", self.bio.as_deref(), 500)
            .optional_text("avatarUrl", self.avatar_url.as_deref(), MAX_URL)
            .optional_range("heightCm", self.height_cm, &HEIGHT_CM)
            .optional_range("weightKg", self.weight_kg, &WEIGHT_KG)
            .finish()
    }
}

impl Validate for NewPost {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .text("content", &self.content, POST_CONTENT)
            .list("compoundTags", &self.compound_tags, 0..=20, 1..=50)
            .list("mediaUrls", &self.media_urls, 0..=10, 1..=MAX_URL)
            .finish()
    }
}

impl Validate for PostPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checks = Checks::new();
        if let Some(content) = &self.content {
            checks = checks.text("content", content, POST_CONTENT);
        }
        if let Some(tags) = &self.compound_tags {
            checks = checks.list("compoundTags", tags, 0..=20, 1..=50);
        }
        if let Some(urls) = &self.media_urls {
            checks = checks.list("mediaUrls", urls, 0..=10, 1..=MAX_URL);
        }
        checks.finish()
    }
}

impl Validate for NewComment {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new().text("content", &self.content, COMMENT_CONTENT).finish()
    }
}

impl Validate for NewCompound {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checks = Checks::new()
            .text("name", &self.name, 1..=255)
            .text("category", &self.category, 1..=50)
            .optional_range("halfLifeHours", self.half_life_hours, &(0..=i32::MAX));
        if let Some(unit) = &self.dosage_unit {
            checks = checks.text("dosageUnit", unit, 1..=20);
        }
        checks.finish()
    }
}

impl Validate for NewCycleCompound {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checks = Checks::new()
            .positive("dosage", self.dosage)
            .text("frequency", &self.frequency, 1..=50)
            .optional_text("notes", self.notes.as_deref(), MAX_NOTES);
        if let Some(start) = self.start_date {
            checks = checks.dates("endDate", start, self.end_date);
        }
        checks.finish()
    }
}

impl Validate for NewCycle {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checks = Checks::new()
            .text("name", &self.name, 1..=255)
            .optional_text("description", self.description.as_deref(), MAX_NOTES)
            .dates("endDate", self.start_date, self.end_date)
            .list("goals", &self.goals, 0..=20, 1..=200)
            .optional_text("notes", self.notes.as_deref(), MAX_NOTES);
        for (i, compound) in self.compounds.iter().enumerate() {
            checks = checks.nested(&format!("compounds[{i}]"), compound.validate());
            if compound.start_date.is_none() {
                checks = checks.dates(&format!("compounds[{i}].endDate"), self.start_date, compound.end_date);
            }
        }
        checks.finish()
    }
}

impl Validate for CyclePatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checks = Checks::new()
            .optional_text("description", self.description.as_deref(), MAX_NOTES)
            .optional_text("notes", self.notes.as_deref(), MAX_NOTES);
        if let Some(name) = &self.name {
            checks = checks.text("name", name, 1..=255);
        }
        if let Some(goals) = &self.goals {
            checks = checks.list("goals", goals, 0..=20, 1..=200);
        }
        if let Some(start) = self.start_date {
            checks = checks.dates("endDate", start, self.end_date);
        }
        checks.finish()
    }
}

impl Validate for NewInjection {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .positive("dosage", self.dosage)
            .text("injectionSite", &self.injection_site, 1..=50)
            .optional_text("notes", self.notes.as_deref(), MAX_NOTES)
            .finish()
    }
}

impl Validate for InjectionPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checks = Checks::new().optional_text("notes", self.notes.as_deref(), MAX_NOTES);
        if let Some(dosage) = self.dosage {
            checks = checks.positive("dosage", dosage);
        }
        if let Some(site) = &self.injection_site {
            checks = checks.text("injectionSite", site, 1..=50);
        }
        checks.finish()
    }
}

impl Validate for NewSideEffect {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .list("symptoms", &self.symptoms, 1..=20, 1..=100)
            .range("severity", self.severity, &SEVERITY)
            .optional_range("bloodPressureSystolic", self.blood_pressure_systolic, &SYSTOLIC)
            .optional_range("bloodPressureDiastolic", self.blood_pressure_diastolic, &DIASTOLIC)
            .optional_range("moodRating", self.mood_rating, &RATING)
            .optional_range("libidoRating", self.libido_rating, &RATING)
            .optional_range("acneSeverity", self.acne_severity, &RATING)
            .optional_text("notes", self.notes.as_deref(), MAX_NOTES)
            .finish()
    }
}

impl Validate for SideEffectPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checks = Checks::new()
            .optional_range("severity", self.severity, &SEVERITY)
            .optional_range("bloodPressureSystolic", self.blood_pressure_systolic, &SYSTOLIC)
            .optional_range("bloodPressureDiastolic", self.blood_pressure_diastolic, &DIASTOLIC)
            .optional_range("moodRating", self.mood_rating, &RATING)
            .optional_range("libidoRating", self.libido_rating, &RATING)
            .optional_range("acneSeverity", self.acne_severity, &RATING)
            .optional_text("notes", self.notes.as_deref(), MAX_NOTES);
        if let Some(symptoms) = &self.symptoms {
            checks = checks.list("symptoms", symptoms, 1..=20, 1..=100);
        }
        checks.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn side_effect(severity: i32) -> NewSideEffect {
        NewSideEffect {
            symptoms: vec!["headache".into()],
            severity,
            ..Default::default()
        }
    }

    #[test]
    fn severity_bounds() {
        assert!(side_effect(1).validate().is_ok());
        assert!(side_effect(10).validate().is_ok());

        for severity in [0, 11, -3] {
            let err = side_effect(severity).validate().unwrap_err();
            assert_eq!(err.fields().collect::<Vec<_>>(), vec!["severity"]);
        }
    }

    #[test]
    fn collects_every_failing_field() {
        let draft = NewSideEffect {
            symptoms: vec![],
            severity: 0,
            mood_rating: Some(11),
            blood_pressure_systolic: Some(40),
            ..Default::default()
        };
        let err = draft.validate().unwrap_err();
        let fields: Vec<_> = err.fields().collect();
        assert_eq!(fields, vec!["symptoms", "severity", "bloodPressureSystolic", "moodRating"]);
    }

    #[test]
    fn post_content_is_trimmed_before_counting() {
        let blank = NewPost { content: "   ".into(), ..Default::default() };
        assert!(blank.validate().is_err());

        let long = NewPost { content: "x".repeat(5001), ..Default::default() };
        assert!(long.validate().is_err());

        let ok = NewPost { content: "Day 1 progress".into(), ..Default::default() };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn register_rules() {
        let good = RegisterRequest {
            email: "a@b.com".into(),
            username: "abc".into(),
            password: "longenough1".into(),
            full_name: None,
        };
        assert!(good.validate().is_ok());

        let bad = RegisterRequest {
            email: "nope".into(),
            username: "a b".into(),
            password: "short".into(),
            full_name: None,
        };
        let err = bad.validate().unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), vec!["email", "username", "password"]);
    }

    #[test]
    fn nested_cycle_compound_errors_are_prefixed() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let cycle = NewCycle {
            name: "Winter".into(),
            start_date: start,
            end_date: NaiveDate::from_ymd_opt(2024, 12, 1),
            compounds: vec![NewCycleCompound {
                compound_id: Uuid::new_v4(),
                dosage: 0.0,
                frequency: "weekly".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = cycle.validate().unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), vec!["endDate", "compounds[0].dosage"]);
    }
}
