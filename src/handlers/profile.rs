// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{project::ProjectStats, user::ProfileResponse},
    utils::session::CurrentUser,
};

/// Get current user's profile and project statistics.
pub async fn get_profile(
    State(pool): State<SqlitePool>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let today = Utc::now().date_naive();

    let stats = sqlx::query_as::<_, ProjectStats>(
        r#"
        SELECT
            COUNT(*) AS projects_count,
            COALESCE(SUM(CASE WHEN start_date <= ?1 AND end_date >= ?1 THEN 1 ELSE 0 END), 0) AS active_projects_count
        FROM projects
        WHERE owner_id = ?2
        "#,
    )
    .bind(today)
    .bind(current.id())
    .fetch_one(&pool)
    .await?;

    Ok(Json(ProfileResponse {
        user: current.user,
        projects_count: stats.projects_count,
        active_projects_count: stats.active_projects_count,
    }))
}
