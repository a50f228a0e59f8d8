// src/models/guest.rs

use serde::Serialize;
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::models::quiz::QuizQuestion;

/// Represents the 'guests' table in the database.
/// One row per guest sitting; holds the exact shuffled set that was served
/// so submissions are scored against what the guest actually saw.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Guest {
    /// Ephemeral session id, also carried in the guest token.
    pub id: Uuid,

    /// Leaderboard display name (sanitized or generated).
    pub name: String,

    /// The public quiz this guest is taking.
    pub quiz_id: i64,

    /// The served question set, answers included. Never serialized out.
    #[serde(skip)]
    pub questions: Json<Vec<QuizQuestion>>,

    /// Best score for this sitting, monotonically non-decreasing.
    pub score: i32,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Aggregated row for the leaderboard query (best score per name).
#[derive(Debug, FromRow)]
pub struct LeaderboardRow {
    pub name: String,
    pub score: i32,
}

/// Leaderboard entry as served by `GET /api/score`.
#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    /// The original client keys entries by display name.
    pub id: String,
    pub rank: i64,
    pub score: i32,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// Pagination block accompanying the leaderboard data.
#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}
