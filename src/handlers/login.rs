// src/handlers/login.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    escrow::EscrowClient,
    models::user::{LoginRequest, RestoreRequest, User},
    utils::jwt::sign_user_token,
};

/// Registers a wallet after an escrow deposit.
///
/// If the wallet is already registered, reissues a session token instead of
/// re-verifying the deposit. Otherwise the deposit transaction is checked
/// on-chain before the row is inserted.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    State(escrow): State<EscrowClient>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let wallet_address = payload.wallet_address.to_lowercase();
    let tx_hash = payload.tx_hash.to_lowercase();

    let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE wallet_address = $1")
        .bind(&wallet_address)
        .fetch_optional(&pool)
        .await?;

    if let Some(user) = existing {
        let token = sign_user_token(
            &user.wallet_address,
            &user.tx_hash,
            user.quiz_attempts,
            &config.jwt_secret,
        )?;

        return Ok((
            StatusCode::OK,
            Json(json!({
                "message": "User already registered",
                "token": token,
                "attempts": user.quiz_attempts,
            })),
        ));
    }

    escrow.verify_deposit(&tx_hash, &wallet_address).await?;

    sqlx::query(
        "INSERT INTO users (wallet_address, tx_hash) VALUES ($1, $2)",
    )
    .bind(&wallet_address)
    .bind(&tx_hash)
    .execute(&pool)
    .await
    .map_err(|e| {
        // Postgres error code for unique violation is 23505
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!("Wallet '{}' already registered", wallet_address))
        } else {
            tracing::error!("Failed to register wallet: {:?}", e);
            AppError::from(e)
        }
    })?;

    let token = sign_user_token(&wallet_address, &tx_hash, 0, &config.jwt_secret)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful",
            "token": token,
        })),
    ))
}

/// Restores a session for a registered wallet.
///
/// Issues a fresh 7-day token carrying the authoritative attempt count.
pub async fn restore_session(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<RestoreRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let wallet_address = payload.wallet_address.to_lowercase();

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE wallet_address = $1")
        .bind(&wallet_address)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let token = sign_user_token(
        &user.wallet_address,
        &user.tx_hash,
        user.quiz_attempts,
        &config.jwt_secret,
    )?;

    Ok(Json(json!({
        "message": "Session restored",
        "token": token,
        "attempts": user.quiz_attempts,
    })))
}
