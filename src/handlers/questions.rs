// src/handlers/questions.rs

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::{
        Config, GUEST_TOKEN_TTL_SECS, MAX_NAME_LEN, MAX_QUIZ_ATTEMPTS, QUESTION_LIMIT,
        TIME_PER_QUESTION_SECS,
    },
    error::AppError,
    models::{
        quiz::{Quiz, shuffled_set, strip_answers},
        user::User,
    },
    utils::{
        html::clean_text,
        jwt::{sign_guest_token, sign_user_token, token_from_headers, verify_user_token},
    },
};

#[derive(Debug, Deserialize)]
pub struct QuestionsParams {
    /// Present in guest mode: the public quiz to take.
    pub id: Option<i64>,
    /// Guest display name; generated when absent.
    pub name: Option<String>,
}

/// Starts a quiz sitting.
///
/// Two modes, dispatched on the `id` query parameter:
/// * user mode (no `id`): requires a user token, serves the wallet's
///   assigned question set. Starting does not consume an attempt.
/// * guest mode (`id` present): no token required, creates a guest session
///   for the selected public quiz.
pub async fn get_questions(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    headers: HeaderMap,
    Query(params): Query<QuestionsParams>,
) -> Result<impl IntoResponse, AppError> {
    match params.id {
        Some(quiz_id) => serve_guest(&pool, &config, quiz_id, params.name).await,
        None => serve_user(&pool, &config, &headers).await,
    }
}

async fn serve_user(
    pool: &PgPool,
    config: &Config,
    headers: &HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let token = token_from_headers(headers)
        .ok_or_else(|| AppError::AuthError("Unauthorized".to_string()))?;
    let claims = verify_user_token(&token, &config.jwt_secret)?;

    if claims.quiz_attempts >= MAX_QUIZ_ATTEMPTS {
        return Err(AppError::Forbidden("Maximum quiz attempts reached".to_string()));
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE wallet_address = $1 AND tx_hash = $2",
    )
    .bind(&claims.wallet_address)
    .bind(&claims.tx_hash)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    // The token snapshot can lag; the row is authoritative.
    if user.quiz_attempts >= MAX_QUIZ_ATTEMPTS {
        return Err(AppError::Forbidden("Maximum quiz attempts reached".to_string()));
    }

    let bank = user
        .quiz
        .as_ref()
        .ok_or_else(|| AppError::NotFound("No quiz questions found".to_string()))?;

    if bank.0.is_empty() {
        return Err(AppError::NotFound("No quiz questions found".to_string()));
    }

    let served = shuffled_set(&bank.0, QUESTION_LIMIT);
    let total_time = served.len() as u64 * TIME_PER_QUESTION_SECS;

    let token = sign_user_token(
        &user.wallet_address,
        &user.tx_hash,
        user.quiz_attempts,
        &config.jwt_secret,
    )?;

    Ok(Json(json!({
        "totalTime": total_time,
        "questions": strip_answers(&served),
        "token": token,
        "attempts": user.quiz_attempts,
        "allowed": true,
    })))
}

async fn serve_guest(
    pool: &PgPool,
    config: &Config,
    quiz_id: i64,
    name: Option<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    // Leaderboard-visible text: sanitize and cap before touching anything.
    let provided_name = match name {
        Some(raw) => {
            let cleaned = clean_text(raw.trim());
            if cleaned.chars().count() > MAX_NAME_LEN {
                return Err(AppError::BadRequest(format!(
                    "Name must be at most {} characters",
                    MAX_NAME_LEN
                )));
            }
            if cleaned.is_empty() { None } else { Some(cleaned) }
        }
        None => None,
    };

    let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    let guest_id = Uuid::new_v4();

    let name = provided_name
        .unwrap_or_else(|| format!("guest_{}", &guest_id.simple().to_string()[..8]));

    let served = shuffled_set(&quiz.questions.0, QUESTION_LIMIT);
    if served.is_empty() {
        return Err(AppError::NotFound("No quiz questions found".to_string()));
    }
    let total_time = served.len() as u64 * TIME_PER_QUESTION_SECS;

    // Abandoned sittings are dead weight once their token has expired.
    // Scored rows stay: they feed the leaderboard.
    sqlx::query(
        "DELETE FROM guests WHERE score = 0 AND created_at < NOW() - make_interval(secs => $1)",
    )
    .bind(GUEST_TOKEN_TTL_SECS as f64)
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO guests (id, name, quiz_id, questions) VALUES ($1, $2, $3, $4)",
    )
    .bind(guest_id)
    .bind(&name)
    .bind(quiz.id)
    .bind(sqlx::types::Json(&served))
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create guest session: {:?}", e);
        AppError::from(e)
    })?;

    let token = sign_guest_token(guest_id, quiz.id, &name, &config.jwt_secret)?;

    Ok(Json(json!({
        "totalTime": total_time,
        "questions": strip_answers(&served),
        "token": token,
        "name": name,
    })))
}
