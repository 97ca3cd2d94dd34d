// src/models/project.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use validator::Validate;

use crate::validation::{
    DATE_FORMAT, FieldErrors, NON_FIELD_ERRORS, check_date_range, check_not_in_past, check_total_target,
    collect_field_errors, parse_date, parse_whole_number, required,
};

/// Represents the 'projects' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub details: String,

    /// Funding goal, always positive.
    pub total_target: i64,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    pub created_at: DateTime<Utc>,
}

impl Project {
    /// A project is active from its start date through its end date, inclusive.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }

    pub fn into_view(self, today: NaiveDate) -> ProjectView {
        let is_active = self.is_active_on(today);
        ProjectView { project: self, is_active }
    }
}

/// A project as returned to clients, with its derived status.
#[derive(Debug, Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub is_active: bool,
}

/// Typed, validated values ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFields {
    pub title: String,
    pub details: String,
    pub total_target: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// DTO for creating a project, and the merged form of an edit.
///
/// Values are kept loosely typed so that a wrongly typed field becomes a
/// field error next to all the others instead of rejecting the whole body.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProjectRequest {
    #[validate(custom(function = required), length(max = 255, code = "too_long"))]
    pub title: Option<String>,

    #[validate(custom(function = required))]
    pub details: Option<String>,

    /// Whole number, as a JSON integer or a digit string.
    pub total_target: Option<Value>,

    /// `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`
    pub end_date: Option<String>,
}

impl ProjectRequest {
    /// Runs the whole rule set and returns either typed values or every error found.
    ///
    /// `stored_start` is the start date already on record when editing. The
    /// past-date rule is skipped when the submitted start date equals it, so
    /// a running project can still be edited.
    pub fn clean(&self, today: NaiveDate, stored_start: Option<NaiveDate>) -> Result<ProjectFields, FieldErrors> {
        let mut errors = collect_field_errors(
            self,
            &[("title", self.title.is_some()), ("details", self.details.is_some())],
        );

        let total_target = match parse_whole_number(self.total_target.as_ref()).and_then(check_total_target) {
            Ok(amount) => Some(amount),
            Err(violation) => {
                errors.add("total_target", violation);
                None
            }
        };

        let start = parse_date(self.start_date.as_deref());
        let end = parse_date(self.end_date.as_deref());
        if let Err(violation) = start {
            errors.add("start_date", violation);
        }
        if let Err(violation) = end {
            errors.add("end_date", violation);
        }

        if let (Ok(start), Ok(end)) = (start, end) {
            match check_date_range(start, end) {
                Err(violation) => errors.add(NON_FIELD_ERRORS, violation),
                Ok(()) if stored_start != Some(start) => {
                    errors.check("start_date", check_not_in_past(start, today));
                }
                Ok(()) => {}
            }
        }

        match (&self.title, &self.details, total_target, start, end) {
            (Some(title), Some(details), Some(total_target), Ok(start_date), Ok(end_date)) if errors.is_empty() => {
                Ok(ProjectFields {
                    title: title.trim().to_string(),
                    details: details.clone(),
                    total_target,
                    start_date,
                    end_date,
                })
            }
            _ => Err(errors),
        }
    }
}

/// DTO for editing a project. Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub details: Option<String>,
    pub total_target: Option<Value>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ProjectPatch {
    pub fn merge_onto(self, project: &Project) -> ProjectRequest {
        ProjectRequest {
            title: self.title.or_else(|| Some(project.title.clone())),
            details: self.details.or_else(|| Some(project.details.clone())),
            total_target: self.total_target.or_else(|| Some(Value::from(project.total_target))),
            start_date: self
                .start_date
                .or_else(|| Some(project.start_date.format(DATE_FORMAT).to_string())),
            end_date: self
                .end_date
                .or_else(|| Some(project.end_date.format(DATE_FORMAT).to_string())),
        }
    }
}

/// Query parameters for listing projects.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectListParams {
    /// Only projects running on this day (`YYYY-MM-DD`).
    pub date: Option<String>,
}

/// Ownership statistics shown on the profile page.
#[derive(Debug, FromRow)]
pub struct ProjectStats {
    pub projects_count: i64,
    pub active_projects_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Violation;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn request(target: i64, start: &str, end: &str) -> ProjectRequest {
        ProjectRequest {
            title: Some("Clean water for Qena".into()),
            details: Some("Drilling two wells".into()),
            total_target: Some(json!(target)),
            start_date: Some(start.into()),
            end_date: Some(end.into()),
        }
    }

    fn stored(start: &str, end: &str) -> Project {
        Project {
            id: 7,
            owner_id: 1,
            title: "Library".into(),
            details: "Books".into(),
            total_target: 500,
            start_date: date(start),
            end_date: date(end),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn valid_project_is_cleaned_into_typed_fields() {
        let today = date("2024-06-01");
        let fields = request(100, "2024-06-01", "2024-07-01").clean(today, None).unwrap();

        assert_eq!(fields.total_target, 100);
        assert_eq!(fields.start_date, date("2024-06-01"));
        assert_eq!(fields.end_date, date("2024-07-01"));
    }

    #[test]
    fn non_positive_target_fails() {
        let today = date("2024-06-01");
        for target in [0, -10] {
            let errors = request(target, "2024-06-02", "2024-07-01").clean(today, None).unwrap_err();
            assert!(errors.contains("total_target", Violation::NonPositiveTarget));
        }
    }

    #[test]
    fn bad_range_is_reported_regardless_of_target() {
        let today = date("2024-06-01");
        for (target, start, end) in [
            (100, "2024-06-10", "2024-06-10"),
            (100, "2024-06-20", "2024-06-10"),
            (0, "2024-06-20", "2024-06-10"),
        ] {
            let errors = request(target, start, end).clean(today, None).unwrap_err();
            assert!(errors.contains(NON_FIELD_ERRORS, Violation::InvalidDateRange));
            assert!(!errors.contains("start_date", Violation::PastStartDate));
        }
    }

    #[test]
    fn past_start_is_rejected_on_create() {
        let today = date("2024-06-15");
        let errors = request(100, "2024-06-14", "2024-07-01").clean(today, None).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("start_date", Violation::PastStartDate));
    }

    #[test]
    fn unchanged_past_start_is_accepted_on_edit() {
        let today = date("2024-06-15");
        let project = stored("2024-06-01", "2024-07-01");
        let patch = ProjectPatch {
            total_target: Some(json!(900)),
            ..ProjectPatch::default()
        };
        let fields = patch.merge_onto(&project).clean(today, Some(project.start_date)).unwrap();

        assert_eq!(fields.total_target, 900);
        assert_eq!(fields.title, "Library");
        assert_eq!(fields.start_date, date("2024-06-01"));

        let moved = ProjectPatch {
            start_date: Some("2024-06-10".into()),
            ..ProjectPatch::default()
        };
        let errors = moved.merge_onto(&project).clean(today, Some(project.start_date)).unwrap_err();
        assert!(errors.contains("start_date", Violation::PastStartDate));
    }

    #[test]
    fn missing_and_malformed_fields_are_all_reported() {
        let today = date("2024-06-01");
        let errors = ProjectRequest {
            start_date: Some("June 1st".into()),
            ..ProjectRequest::default()
        }
        .clean(today, None)
        .unwrap_err();

        assert!(errors.contains("title", Violation::Required));
        assert!(errors.contains("details", Violation::Required));
        assert!(errors.contains("total_target", Violation::Required));
        assert!(errors.contains("start_date", Violation::InvalidDate));
        assert!(errors.contains("end_date", Violation::Required));
    }

    #[test]
    fn wrongly_typed_values_are_field_errors_alongside_the_rest() {
        let today = date("2024-06-01");
        let request: ProjectRequest = serde_json::from_value(json!({
            "title": null,
            "details": "Wells",
            "total_target": "a lot",
            "start_date": "2024-07-01",
            "end_date": "2024-06-01",
        }))
        .unwrap();
        let errors = request.clean(today, None).unwrap_err();

        assert!(errors.contains("title", Violation::Required));
        assert!(errors.contains("total_target", Violation::InvalidNumber));
        assert!(errors.contains(NON_FIELD_ERRORS, Violation::InvalidDateRange));
        assert_eq!(errors.len(), 3);

        let mut request = request;
        request.title = Some("Wells".into());
        request.total_target = Some(json!("250"));
        request.end_date = Some("2024-08-01".into());
        assert_eq!(request.clean(today, None).unwrap().total_target, 250);
    }

    #[test]
    fn details_are_stored_as_submitted() {
        let today = date("2024-06-01");
        for text in ["Target: 5 < 10 & rising", "<b>bold</b> plans\nline two"] {
            let mut req = request(100, "2024-06-01", "2024-07-01");
            req.details = Some(text.into());
            assert_eq!(req.clean(today, None).unwrap().details, text);
        }
    }

    #[test]
    fn active_window_is_inclusive() {
        let project = stored("2024-06-01", "2024-06-30");
        assert!(project.is_active_on(date("2024-06-01")));
        assert!(project.is_active_on(date("2024-06-30")));
        assert!(!project.is_active_on(date("2024-07-01")));
        assert!(project.clone().into_view(date("2024-06-15")).is_active);
    }
}
