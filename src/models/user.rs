// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    utils::hash::verify_password,
    validation::{FieldErrors, Violation, check_password_confirmation, collect_field_errors, required, validate_phone},
};

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, phone, password, is_active, is_staff, date_joined, last_login";

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,

    /// Login identifier. Unique regardless of letter case.
    pub email: String,

    pub first_name: String,
    pub last_name: String,

    /// Egyptian mobile number, unique across accounts.
    pub phone: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub is_active: bool,
    pub is_staff: bool,

    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// What the login flow needs to know about an account.
pub trait Authenticatable {
    fn password_hash(&self) -> &str;

    fn is_active(&self) -> bool;

    fn check_password(&self, raw_password: &str) -> Result<bool, AppError> {
        verify_password(raw_password, self.password_hash())
    }

    /// Only an active account with a matching password may open a session.
    /// The password is checked first so inactive accounts cost the same.
    fn can_authenticate(&self, raw_password: &str) -> Result<bool, AppError> {
        Ok(self.check_password(raw_password)? && self.is_active())
    }
}

impl Authenticatable for User {
    fn password_hash(&self) -> &str {
        &self.password
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Values for a new `users` row; the password is already hashed.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: &'a str,
    pub password_hash: &'a str,
    pub is_staff: bool,
}

impl User {
    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Exact, case-sensitive lookup used by login.
    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = ? COLLATE BINARY",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Case-insensitive existence check used before registration.
    pub async fn email_taken(pool: &SqlitePool, email: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ? COLLATE NOCASE LIMIT 1")
            .bind(email)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn phone_taken(pool: &SqlitePool, phone: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE phone = ? LIMIT 1")
            .bind(phone)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    /// Inserts an active account.
    ///
    /// The UNIQUE constraints on `email` and `phone` are authoritative: a
    /// registration that slipped past the pre-check still comes back as the
    /// matching field error.
    pub async fn create(pool: &SqlitePool, new_user: NewUser<'_>) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, first_name, last_name, phone, password, is_active, is_staff)
            VALUES (?, ?, ?, ?, ?, TRUE, ?)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(new_user.email)
        .bind(new_user.first_name)
        .bind(new_user.last_name)
        .bind(new_user.phone)
        .bind(new_user.password_hash)
        .bind(new_user.is_staff)
        .fetch_one(pool)
        .await
        .map_err(|e| match duplicate_field(&e) {
            Some((field, violation)) => {
                let mut errors = FieldErrors::new();
                errors.add(field, violation);
                AppError::Validation(errors)
            }
            None => {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    pub async fn touch_last_login(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

/// Maps a UNIQUE violation on `users` to the field it concerns.
fn duplicate_field(err: &sqlx::Error) -> Option<(&'static str, Violation)> {
    let db_err = err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }
    let message = db_err.message();
    if message.contains("users.email") {
        Some(("email", Violation::DuplicateEmail))
    } else if message.contains("users.phone") {
        Some(("phone", Violation::DuplicatePhone))
    } else {
        None
    }
}

/// Current user's profile plus ownership statistics.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub projects_count: i64,
    pub active_projects_count: i64,
}

/// DTO for creating a new user (Registration).
///
/// Absent and `null` values both count as missing.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = required), length(max = 150, code = "too_long"))]
    pub first_name: Option<String>,

    #[validate(custom(function = required), length(max = 150, code = "too_long"))]
    pub last_name: Option<String>,

    #[validate(custom(function = required), email(code = "invalid_email"))]
    pub email: Option<String>,

    #[validate(custom(function = validate_phone))]
    pub phone: Option<String>,

    #[validate(custom(function = required), length(min = 6, code = "password_too_short"))]
    pub password: Option<String>,

    #[validate(custom(function = required))]
    pub confirm_password: Option<String>,
}

impl RegisterRequest {
    /// Strips surrounding whitespace from every non-secret field.
    pub fn normalized(mut self) -> Self {
        for field in [&mut self.first_name, &mut self.last_name, &mut self.email, &mut self.phone] {
            if let Some(value) = field {
                *value = value.trim().to_string();
            }
        }
        self
    }

    /// Field rules followed by the password confirmation check.
    pub fn clean(&self) -> FieldErrors {
        let mut errors = collect_field_errors(
            self,
            &[
                ("first_name", self.first_name.is_some()),
                ("last_name", self.last_name.is_some()),
                ("email", self.email.is_some()),
                ("phone", self.phone.is_some()),
                ("password", self.password.is_some()),
                ("confirm_password", self.confirm_password.is_some()),
            ],
        );

        if let (Some(password), Some(confirmation)) = (&self.password, &self.confirm_password) {
            if !password.is_empty() && !confirmation.is_empty() {
                errors.check("confirm_password", check_password_confirmation(password, confirmation));
            }
        }
        errors
    }
}

/// DTO for user login.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(custom(function = required))]
    pub email: Option<String>,
    #[validate(custom(function = required))]
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn clean(&self) -> FieldErrors {
        collect_field_errors(
            self,
            &[("email", self.email.is_some()), ("password", self.password.is_some())],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to migrate");
        pool
    }

    fn new_user<'a>(email: &'a str, phone: &'a str) -> NewUser<'a> {
        NewUser {
            email,
            first_name: "Mona",
            last_name: "Adel",
            phone,
            password_hash: "$argon2id$placeholder",
            is_staff: false,
        }
    }

    fn field_errors(result: Result<User, AppError>) -> FieldErrors {
        match result {
            Err(AppError::Validation(errors)) => errors,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    fn valid_request() -> RegisterRequest {
        RegisterRequest {
            first_name: Some("Mona".into()),
            last_name: Some("Adel".into()),
            email: Some("mona@example.com".into()),
            phone: Some("01012345678".into()),
            password: Some("abcdef".into()),
            confirm_password: Some("abcdef".into()),
        }
    }

    #[test]
    fn valid_registration_has_no_errors() {
        assert!(valid_request().clean().is_empty());
    }

    #[test]
    fn mismatched_confirmation_is_reported_on_confirm_field() {
        let request = RegisterRequest {
            confirm_password: Some("abcdfe".into()),
            ..valid_request()
        };
        let errors = request.clean();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("confirm_password", Violation::PasswordMismatch));
    }

    #[test]
    fn every_broken_field_is_reported_together() {
        let request = RegisterRequest {
            first_name: None,
            email: Some("not-an-email".into()),
            phone: Some("02012345678".into()),
            password: Some("abc".into()),
            confirm_password: Some("xyz".into()),
            ..valid_request()
        };
        let errors = request.clean();

        assert!(errors.contains("first_name", Violation::Required));
        assert!(errors.contains("email", Violation::InvalidEmail));
        assert!(errors.contains("phone", Violation::InvalidPhoneFormat));
        assert!(errors.contains("password", Violation::PasswordTooShort));
        assert!(errors.contains("confirm_password", Violation::PasswordMismatch));
    }

    #[test]
    fn empty_submission_reports_required_once_per_field() {
        let errors = RegisterRequest::default().clean();
        for field in ["confirm_password", "email", "first_name", "last_name", "password", "phone"] {
            assert!(errors.contains(field, Violation::Required), "{} should be required", field);
        }
        assert_eq!(errors.len(), 6);

        let blank = RegisterRequest {
            first_name: Some("  ".into()),
            phone: Some(String::new()),
            ..valid_request()
        };
        let errors = blank.clean();
        assert!(errors.contains("first_name", Violation::Required));
        assert!(errors.contains("phone", Violation::Required));
        assert!(!errors.contains("phone", Violation::InvalidPhoneFormat));
    }

    #[test]
    fn null_fields_are_missing_not_malformed() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "first_name": null,
            "last_name": "Adel",
            "email": "mona@",
            "phone": "0101234",
            "password": "abcdef",
            "confirm_password": "abcdeg",
        }))
        .unwrap();
        let errors = request.normalized().clean();

        assert!(errors.contains("first_name", Violation::Required));
        assert!(errors.contains("email", Violation::InvalidEmail));
        assert!(errors.contains("phone", Violation::InvalidPhoneFormat));
        assert!(errors.contains("confirm_password", Violation::PasswordMismatch));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn normalization_trims_identity_fields_only() {
        let request = RegisterRequest {
            email: Some("  mona@example.com ".into()),
            phone: Some(" 01012345678".into()),
            password: Some(" abcdef ".into()),
            ..valid_request()
        }
        .normalized();

        assert_eq!(request.email.as_deref(), Some("mona@example.com"));
        assert_eq!(request.phone.as_deref(), Some("01012345678"));
        assert_eq!(request.password.as_deref(), Some(" abcdef "));
    }

    #[test]
    fn inactive_user_cannot_authenticate() {
        let hash = crate::utils::hash::hash_password("abcdef").unwrap();
        let mut user = User {
            id: 1,
            email: "mona@example.com".into(),
            first_name: "Mona".into(),
            last_name: "Adel".into(),
            phone: "01012345678".into(),
            password: hash,
            is_active: true,
            is_staff: false,
            date_joined: Utc::now(),
            last_login: None,
        };

        assert!(user.can_authenticate("abcdef").unwrap());
        assert!(!user.can_authenticate("abcdfe").unwrap());

        user.is_active = false;
        assert!(!user.can_authenticate("abcdef").unwrap());
    }

    #[tokio::test]
    async fn unique_constraints_come_back_as_field_errors() {
        let pool = memory_pool().await;
        User::create(&pool, new_user("mona@example.com", "01012345678"))
            .await
            .expect("first insert succeeds");

        let errors = field_errors(User::create(&pool, new_user("MONA@Example.COM", "01112345678")).await);
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("email", Violation::DuplicateEmail));

        let errors = field_errors(User::create(&pool, new_user("other@example.com", "01012345678")).await);
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("phone", Violation::DuplicatePhone));

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
