// src/handlers/catalog.rs

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        guest::{LeaderboardEntry, LeaderboardRow, Pagination},
        quiz::QuizSummary,
    },
};

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Lists the public quizzes available to guests.
pub async fn list_quizzes(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let quizzes = sqlx::query_as::<_, QuizSummary>(
        "SELECT id, name, len, difficulty FROM quizzes ORDER BY id",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch quizzes: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(json!({ "quizzes": quizzes })))
}

#[derive(Debug, Deserialize)]
pub struct ScoreParams {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

/// Guest leaderboard: best score per display name, descending, paginated.
pub async fn get_leaderboard(
    State(pool): State<PgPool>,
    Query(params): Query<ScoreParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    let page = params.page.unwrap_or(1).max(1);
    let offset = (page - 1) * limit;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT name) FROM guests WHERE score <> 0",
    )
    .fetch_one(&pool)
    .await?;

    let rows = sqlx::query_as::<_, LeaderboardRow>(
        r#"
        SELECT name, MAX(score) AS score
        FROM guests
        WHERE score <> 0
        GROUP BY name
        ORDER BY score DESC, name
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::from(e)
    })?;

    let data: Vec<LeaderboardEntry> = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            id: row.name.clone(),
            rank: offset + i as i64 + 1,
            score: row.score,
            display_name: row.name,
        })
        .collect();

    let pagination = Pagination {
        total,
        page,
        limit,
        pages: (total + limit - 1) / limit,
    };

    Ok(Json(json!({
        "data": data,
        "pagination": pagination,
    })))
}
