// src/handlers/project.rs

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::project::{Project, ProjectListParams, ProjectPatch, ProjectRequest, ProjectView},
    utils::session::CurrentUser,
    validation::DATE_FORMAT,
};

const PROJECT_COLUMNS: &str = "id, owner_id, title, details, total_target, start_date, end_date, created_at";

const INVALID_DATE_FILTER: &str = "Invalid date format. Use YYYY-MM-DD.";

const PROJECT_FORM_FIELDS: [&str; 5] = ["title", "details", "total_target", "start_date", "end_date"];

fn project_not_found() -> AppError {
    AppError::NotFound("Project not found".to_string())
}

/// Project ids are integers; any other path segment names no project.
fn project_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    path.map(|Path(id)| id).map_err(|_| project_not_found())
}

/// Loads a project only if `owner_id` owns it.
///
/// Someone else's project is indistinguishable from a missing one.
async fn fetch_owned(pool: &SqlitePool, id: i64, owner_id: i64) -> Result<Project, AppError> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {} FROM projects WHERE id = ? AND owner_id = ?",
        PROJECT_COLUMNS
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(project_not_found)
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectView>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

/// Lists every project, newest first.
///
/// `?date=YYYY-MM-DD` keeps only projects running on that day. A date that
/// does not parse is ignored and reported as a warning instead of failing.
pub async fn list_projects(
    State(pool): State<SqlitePool>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<ProjectListParams>,
) -> Result<impl IntoResponse, AppError> {
    let (date, warning) = match params.date.as_deref().map(str::trim) {
        None | Some("") => (None, None),
        Some(raw) => match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(day) => (Some(day), None),
            Err(_) => {
                tracing::warn!(user_id = current.id(), filter = raw, "Ignoring malformed date filter");
                (None, Some(INVALID_DATE_FILTER))
            }
        },
    };

    let projects = sqlx::query_as::<_, Project>(&format!(
        r#"
        SELECT {}
        FROM projects
        WHERE ?1 IS NULL OR (start_date <= ?1 AND end_date >= ?1)
        ORDER BY created_at DESC, id DESC
        "#,
        PROJECT_COLUMNS
    ))
    .bind(date)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list projects: {:?}", e);
        AppError::from(e)
    })?;

    let today = Utc::now().date_naive();
    let projects: Vec<ProjectView> = projects.into_iter().map(|p| p.into_view(today)).collect();

    Ok(Json(ProjectListResponse {
        count: projects.len(),
        projects,
        date,
        warning,
    }))
}

/// Describes the project form.
pub async fn create_form() -> impl IntoResponse {
    Json(json!({ "fields": PROJECT_FORM_FIELDS }))
}

/// Creates a project owned by the current user.
pub async fn create_project(
    State(pool): State<SqlitePool>,
    Extension(current): Extension<CurrentUser>,
    payload: Result<Json<ProjectRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let today = Utc::now().date_naive();

    let fields = payload.clean(today, None)?;

    let project = sqlx::query_as::<_, Project>(&format!(
        r#"
        INSERT INTO projects (owner_id, title, details, total_target, start_date, end_date)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        PROJECT_COLUMNS
    ))
    .bind(current.id())
    .bind(&fields.title)
    .bind(&fields.details)
    .bind(fields.total_target)
    .bind(fields.start_date)
    .bind(fields.end_date)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create project: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(user_id = current.id(), project_id = project.id, "Project created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Project created successfully!",
            "project": project.into_view(today),
        })),
    ))
}

/// Returns the stored values of one of the current user's projects.
pub async fn edit_form(
    State(pool): State<SqlitePool>,
    Extension(current): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = project_id(path)?;
    let project = fetch_owned(&pool, id, current.id()).await?;
    let today = Utc::now().date_naive();

    Ok(Json(json!({
        "fields": PROJECT_FORM_FIELDS,
        "project": project.into_view(today),
    })))
}

/// Updates one of the current user's projects.
///
/// Omitted fields keep their stored value; the merged record is validated
/// as a whole. Concurrent edits are last-write-wins.
pub async fn edit_project(
    State(pool): State<SqlitePool>,
    Extension(current): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProjectPatch>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = project_id(path)?;
    let Json(payload) = payload?;
    let project = fetch_owned(&pool, id, current.id()).await?;
    let today = Utc::now().date_naive();

    let fields = payload
        .merge_onto(&project)
        .clean(today, Some(project.start_date))?;

    let updated = sqlx::query_as::<_, Project>(&format!(
        r#"
        UPDATE projects
        SET title = ?, details = ?, total_target = ?, start_date = ?, end_date = ?
        WHERE id = ? AND owner_id = ?
        RETURNING {}
        "#,
        PROJECT_COLUMNS
    ))
    .bind(&fields.title)
    .bind(&fields.details)
    .bind(fields.total_target)
    .bind(fields.start_date)
    .bind(fields.end_date)
    .bind(id)
    .bind(current.id())
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update project: {:?}", e);
        AppError::from(e)
    })?
    .ok_or_else(project_not_found)?;

    tracing::info!(user_id = current.id(), project_id = id, "Project updated");

    Ok(Json(json!({
        "message": "Project updated successfully!",
        "project": updated.into_view(today),
    })))
}

/// Confirmation step before deletion. Nothing is removed here.
pub async fn delete_confirm(
    State(pool): State<SqlitePool>,
    Extension(current): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = project_id(path)?;
    let project = fetch_owned(&pool, id, current.id()).await?;
    let today = Utc::now().date_naive();

    Ok(Json(json!({
        "message": format!("Are you sure you want to delete \"{}\"?", project.title),
        "confirm": "POST to this URL to delete the project.",
        "project": project.into_view(today),
    })))
}

/// Deletes one of the current user's projects.
pub async fn delete_project(
    State(pool): State<SqlitePool>,
    Extension(current): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = project_id(path)?;
    let result = sqlx::query("DELETE FROM projects WHERE id = ? AND owner_id = ?")
        .bind(id)
        .bind(current.id())
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete project: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(project_not_found());
    }

    tracing::info!(user_id = current.id(), project_id = id, "Project deleted");

    Ok(Json(json!({ "message": "Project deleted successfully!" })))
}
