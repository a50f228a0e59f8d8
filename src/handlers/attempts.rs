// src/handlers/attempts.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    config::MAX_QUIZ_ATTEMPTS,
    error::AppError,
    utils::jwt::UserClaims,
};

/// Reports the caller's attempt standing.
///
/// The token claim is only a snapshot; the database count is authoritative.
pub async fn get_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<UserClaims>,
) -> Result<impl IntoResponse, AppError> {
    let attempts: i32 = sqlx::query_scalar(
        "SELECT quiz_attempts FROM users WHERE wallet_address = $1",
    )
    .bind(&claims.wallet_address)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if attempts >= MAX_QUIZ_ATTEMPTS {
        return Ok(Json(json!({
            "message": "Maximum quiz attempts reached",
            "max": true,
            "attempts": MAX_QUIZ_ATTEMPTS,
            "walletAddress": claims.wallet_address,
        })));
    }

    Ok(Json(json!({
        "message": format!("Quiz attempts: {}", attempts),
        "attempts": attempts,
        "max": false,
        "walletAddress": claims.wallet_address,
    })))
}
