// src/models/user.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::models::quiz::QuizQuestion;

static WALLET_ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap());

static TX_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").unwrap());

/// Represents the 'users' table in the database.
/// One row per registered wallet; this row is the authoritative store for
/// attempt counts, best score, pass flag and refund state.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique wallet address, stored lowercased.
    pub wallet_address: String,

    /// Hash of the deposit transaction that paid the escrow.
    pub tx_hash: String,

    /// Number of completed quiz attempts (capped at MAX_QUIZ_ATTEMPTS).
    pub quiz_attempts: i32,

    /// Best score across attempts, monotonically non-decreasing.
    pub best_score: i32,

    /// Whether the user has ever reached the passing threshold.
    pub allowed: bool,

    /// Set once the server has claimed the right to attempt a refund.
    /// Never cleared, so at most one refund attempt per wallet.
    pub refund_attempted: bool,

    /// Hash of the refund transaction, if one was sent.
    pub refund_tx_hash: Option<String>,

    /// The question set assigned to this wallet, answers included.
    /// Skipped during serialization to keep answers server-side.
    #[serde(skip)]
    pub quiz: Option<Json<Vec<QuizQuestion>>>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for `POST /api/login` (registration after deposit).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(regex(
        path = *WALLET_ADDRESS_RE,
        message = "walletAddress must be a 0x-prefixed 40-hex-digit address."
    ))]
    pub wallet_address: String,

    #[validate(regex(
        path = *TX_HASH_RE,
        message = "txHash must be a 0x-prefixed 64-hex-digit transaction hash."
    ))]
    pub tx_hash: String,
}

/// DTO for `POST /api/auth` (session restore).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    #[validate(regex(
        path = *WALLET_ADDRESS_RE,
        message = "walletAddress must be a 0x-prefixed 40-hex-digit address."
    ))]
    pub wallet_address: String,
}
