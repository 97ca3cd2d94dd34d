// src/validation.rs

//! Business rules shared by the registration and project forms.
//!
//! Submissions are checked in three stages that all feed one [`FieldErrors`]
//! list: field-level rules declared with `validator` derives on the input
//! DTOs, cross-field rules implemented here as pure functions, and store
//! lookups (uniqueness) performed by the handlers. No stage short-circuits,
//! so a client always receives every problem with its submission at once.

use std::{borrow::Cow, fmt, sync::LazyLock};

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use validator::{Validate, ValidationError, ValidationErrors};

/// Field name used for errors that do not belong to a single input.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Wire format of every date accepted or emitted by the service.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Egyptian mobile numbers: a carrier prefix followed by eight digits.
static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(010|011|012|015)[0-9]{8}$").expect("phone pattern is valid"));

/// A single broken rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Required,
    TooLong,
    InvalidEmail,
    DuplicateEmail,
    InvalidPhoneFormat,
    DuplicatePhone,
    PasswordMismatch,
    PasswordTooShort,
    InvalidNumber,
    NonPositiveTarget,
    InvalidDate,
    InvalidDateRange,
    PastStartDate,
}

impl Violation {
    const ALL: [Violation; 13] = [
        Violation::Required,
        Violation::TooLong,
        Violation::InvalidEmail,
        Violation::DuplicateEmail,
        Violation::InvalidPhoneFormat,
        Violation::DuplicatePhone,
        Violation::PasswordMismatch,
        Violation::PasswordTooShort,
        Violation::InvalidNumber,
        Violation::NonPositiveTarget,
        Violation::InvalidDate,
        Violation::InvalidDateRange,
        Violation::PastStartDate,
    ];

    /// Stable machine-readable code, also used as the `validator` error code.
    pub fn code(self) -> &'static str {
        match self {
            Violation::Required => "required",
            Violation::TooLong => "too_long",
            Violation::InvalidEmail => "invalid_email",
            Violation::DuplicateEmail => "duplicate_email",
            Violation::InvalidPhoneFormat => "invalid_phone_format",
            Violation::DuplicatePhone => "duplicate_phone",
            Violation::PasswordMismatch => "password_mismatch",
            Violation::PasswordTooShort => "password_too_short",
            Violation::InvalidNumber => "invalid_number",
            Violation::NonPositiveTarget => "non_positive_target",
            Violation::InvalidDate => "invalid_date",
            Violation::InvalidDateRange => "invalid_date_range",
            Violation::PastStartDate => "past_start_date",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Violation::Required => "This field is required.",
            Violation::TooLong => "Ensure this value is not too long.",
            Violation::InvalidEmail => "Enter a valid email address.",
            Violation::DuplicateEmail => "Email already exists.",
            Violation::InvalidPhoneFormat => "Invalid Egyptian phone number format (e.g., 010xxxxxxxx).",
            Violation::DuplicatePhone => "Phone number already exists.",
            Violation::PasswordMismatch => "Passwords do not match.",
            Violation::PasswordTooShort => "Password must be at least 6 characters.",
            Violation::InvalidNumber => "Enter a whole number.",
            Violation::NonPositiveTarget => "Total target must be positive.",
            Violation::InvalidDate => "Enter a valid date (YYYY-MM-DD).",
            Violation::InvalidDateRange => "Start date must be before end date.",
            Violation::PastStartDate => "Start date cannot be in the past.",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.code() == code)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<Violation> for ValidationError {
    fn from(violation: Violation) -> Self {
        ValidationError::new(violation.code()).with_message(Cow::Borrowed(violation.message()))
    }
}

/// One `(field, error)` pair as reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

/// Every error collected for one submission, in report order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, violation: Violation) {
        self.0.push(FieldError {
            field: field.to_string(),
            code: violation.code().to_string(),
            message: violation.message().to_string(),
        });
    }

    /// Records the outcome of a rule check against `field`.
    pub fn check(&mut self, field: &str, outcome: Result<(), Violation>) {
        if let Err(violation) = outcome {
            self.add(field, violation);
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn contains(&self, field: &str, violation: Violation) -> bool {
        self.0
            .iter()
            .any(|e| e.field == field && e.code == violation.code())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Flattens `validator` output, ordered by field name.
///
/// A field that is missing entirely reports only `required`; the format rules
/// on an empty value would just repeat the same problem.
impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<(String, Vec<ValidationError>)> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| (field.to_string(), errs.clone()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = FieldErrors::new();
        for (field, errs) in fields {
            let required = errs.iter().any(|e| e.code == Violation::Required.code());
            for err in errs {
                if required && err.code != Violation::Required.code() {
                    continue;
                }
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .or_else(|| Violation::from_code(&err.code).map(|v| v.message().to_string()))
                    .unwrap_or_else(|| err.code.to_string());
                out.0.push(FieldError {
                    field: field.clone(),
                    code: err.code.to_string(),
                    message,
                });
            }
        }
        out
    }
}

/// Runs the derived rules of `input` and adds `required` for every listed
/// field that was absent or `null`, since `validator` skips `None` values.
pub fn collect_field_errors<T: Validate>(input: &T, presence: &[(&'static str, bool)]) -> FieldErrors {
    let mut raw = input.validate().err().unwrap_or_else(ValidationErrors::new);
    for &(field, present) in presence {
        if !present {
            raw.add(field, Violation::Required.into());
        }
    }
    FieldErrors::from(raw)
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_REGEX.is_match(phone)
}

pub fn check_phone_format(phone: &str) -> Result<(), Violation> {
    if is_valid_phone(phone) { Ok(()) } else { Err(Violation::InvalidPhoneFormat) }
}

pub fn check_password_length(password: &str) -> Result<(), Violation> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Violation::PasswordTooShort);
    }
    Ok(())
}

pub fn check_password_confirmation(password: &str, confirmation: &str) -> Result<(), Violation> {
    if password != confirmation {
        return Err(Violation::PasswordMismatch);
    }
    Ok(())
}

pub fn check_total_target(total_target: i64) -> Result<i64, Violation> {
    if total_target <= 0 {
        return Err(Violation::NonPositiveTarget);
    }
    Ok(total_target)
}

/// Reads a required whole number sent either as a JSON integer or as digits in a string.
pub fn parse_whole_number(raw: Option<&Value>) -> Result<i64, Violation> {
    match raw {
        None | Some(Value::Null) => Err(Violation::Required),
        Some(Value::Number(number)) => number.as_i64().ok_or(Violation::InvalidNumber),
        Some(Value::String(text)) => match text.trim() {
            "" => Err(Violation::Required),
            digits => digits.parse().map_err(|_| Violation::InvalidNumber),
        },
        Some(_) => Err(Violation::InvalidNumber),
    }
}

pub fn check_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), Violation> {
    if start >= end {
        return Err(Violation::InvalidDateRange);
    }
    Ok(())
}

pub fn check_not_in_past(start: NaiveDate, today: NaiveDate) -> Result<(), Violation> {
    if start < today {
        return Err(Violation::PastStartDate);
    }
    Ok(())
}

/// Parses a required `YYYY-MM-DD` field.
pub fn parse_date(raw: Option<&str>) -> Result<NaiveDate, Violation> {
    match raw.map(str::trim) {
        None | Some("") => Err(Violation::Required),
        Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| Violation::InvalidDate),
    }
}

// Adapters with the signature `validator` expects from custom rules.

pub fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(Violation::Required.into());
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.trim().is_empty() {
        return Err(Violation::Required.into());
    }
    check_phone_format(phone).map_err(ValidationError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn phone_pattern_accepts_known_prefixes_only() {
        for ok in ["01012345678", "01112345678", "01212345678", "01512345678"] {
            assert!(is_valid_phone(ok), "{} should be accepted", ok);
        }
        for bad in [
            "02012345678",
            "0101234567",
            "010123456789",
            "01312345678",
            "0101234567a",
            "+201012345678",
            " 01012345678",
            "",
        ] {
            assert_eq!(check_phone_format(bad), Err(Violation::InvalidPhoneFormat), "{:?}", bad);
        }
    }

    #[test]
    fn password_rules() {
        assert_eq!(check_password_confirmation("abcdef", "abcdfe"), Err(Violation::PasswordMismatch));
        assert_eq!(check_password_confirmation("abcdef", "abcdef"), Ok(()));
        assert_eq!(check_password_length("abcde"), Err(Violation::PasswordTooShort));
        assert_eq!(check_password_length("abcdef"), Ok(()));
    }

    #[test]
    fn total_target_must_be_positive() {
        assert_eq!(check_total_target(0), Err(Violation::NonPositiveTarget));
        assert_eq!(check_total_target(-5), Err(Violation::NonPositiveTarget));
        assert_eq!(check_total_target(100), Ok(100));
    }

    #[test]
    fn whole_numbers_come_as_integers_or_digit_strings() {
        use serde_json::json;

        assert_eq!(parse_whole_number(Some(&json!(100))), Ok(100));
        assert_eq!(parse_whole_number(Some(&json!(" 100 "))), Ok(100));
        assert_eq!(parse_whole_number(Some(&json!("-3"))), Ok(-3));

        assert_eq!(parse_whole_number(None), Err(Violation::Required));
        assert_eq!(parse_whole_number(Some(&Value::Null)), Err(Violation::Required));
        assert_eq!(parse_whole_number(Some(&json!(""))), Err(Violation::Required));

        for bad in [json!(12.5), json!("12.5"), json!("lots"), json!(true), json!([1])] {
            assert_eq!(parse_whole_number(Some(&bad)), Err(Violation::InvalidNumber), "{}", bad);
        }
    }

    #[test]
    fn date_rules() {
        let today = date("2024-06-15");
        assert_eq!(check_date_range(today, today), Err(Violation::InvalidDateRange));
        assert_eq!(
            check_date_range(date("2024-06-20"), date("2024-06-16")),
            Err(Violation::InvalidDateRange)
        );
        assert_eq!(check_date_range(date("2024-06-15"), date("2024-06-16")), Ok(()));

        assert_eq!(check_not_in_past(date("2024-06-14"), today), Err(Violation::PastStartDate));
        assert_eq!(check_not_in_past(today, today), Ok(()));
    }

    #[test]
    fn parse_date_distinguishes_missing_from_malformed() {
        assert_eq!(parse_date(None), Err(Violation::Required));
        assert_eq!(parse_date(Some("  ")), Err(Violation::Required));
        assert_eq!(parse_date(Some("15/06/2024")), Err(Violation::InvalidDate));
        assert_eq!(parse_date(Some("2024-02-30")), Err(Violation::InvalidDate));
        assert_eq!(parse_date(Some("2024-06-15")), Ok(date("2024-06-15")));
    }

    #[test]
    fn codes_round_trip_through_lookup() {
        for violation in Violation::ALL {
            assert_eq!(Violation::from_code(violation.code()), Some(violation));
        }
        assert_eq!(Violation::from_code("nope"), None);
    }

    #[test]
    fn field_errors_collect_everything() {
        let mut errors = FieldErrors::new();
        errors.check("phone", check_phone_format("123"));
        errors.check("confirm_password", check_password_confirmation("a", "b"));
        errors.check("phone", Ok(()));

        assert_eq!(errors.len(), 2);
        assert!(errors.contains("phone", Violation::InvalidPhoneFormat));
        assert!(errors.contains("confirm_password", Violation::PasswordMismatch));
        assert!(!errors.has_field("email"));
        assert!(errors.clone().into_result().is_err());
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn validator_errors_keep_only_required_for_empty_fields() {
        let mut raw = ValidationErrors::new();
        raw.add("phone", Violation::Required.into());
        raw.add("phone", Violation::InvalidPhoneFormat.into());
        raw.add("email", Violation::InvalidEmail.into());

        let errors = FieldErrors::from(raw);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();

        assert_eq!(fields, vec!["email", "phone"]);
        assert!(errors.contains("phone", Violation::Required));
        assert!(!errors.contains("phone", Violation::InvalidPhoneFormat));
    }
}
