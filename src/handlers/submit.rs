// src/handlers/submit.rs

use std::collections::HashMap;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    config::{Config, MAX_QUIZ_ATTEMPTS, PASS_THRESHOLD},
    error::AppError,
    escrow::EscrowClient,
    models::{guest::Guest, quiz::QuizQuestion, user::User},
    utils::jwt::{AuthToken, GuestClaims, UserClaims, sign_user_token},
};

/// DTO for submitting quiz answers.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// User's answers map. Key: question id, value: selected option.
    pub answers: HashMap<i64, String>,

    /// Client-side proctoring info, echoed back in the response.
    #[serde(default)]
    pub metadata: Option<SubmitMetadata>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMetadata {
    pub tab_switches: Option<i64>,
    pub time_expired: Option<bool>,
    pub elapsed_time: Option<i64>,
}

/// Submits answers for the caller's current sitting.
///
/// Scoring is always server-side against the stored question set. For
/// registered users this consumes exactly one attempt, updates the best
/// score monotonically, sets the pass flag at the threshold, and on a
/// perfect score triggers the single escrow refund attempt.
pub async fn submit(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    State(escrow): State<EscrowClient>,
    Extension(auth): Extension<AuthToken>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.answers.is_empty() {
        return Err(AppError::BadRequest("No answers submitted".to_string()));
    }

    match auth {
        AuthToken::User(claims) => submit_user(&pool, &config, &escrow, claims, req).await,
        AuthToken::Guest(claims) => submit_guest(&pool, claims, req).await,
    }
}

async fn submit_user(
    pool: &PgPool,
    config: &Config,
    escrow: &EscrowClient,
    claims: UserClaims,
    req: SubmitRequest,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE wallet_address = $1")
        .bind(&claims.wallet_address)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.quiz_attempts >= MAX_QUIZ_ATTEMPTS {
        return Err(AppError::Forbidden("Maximum quiz attempts reached".to_string()));
    }

    let bank = user
        .quiz
        .as_ref()
        .ok_or_else(|| AppError::NotFound("No quiz questions found".to_string()))?;

    let outcome = score_answers(&bank.0, &req.answers);
    let passed = outcome.fraction() >= PASS_THRESHOLD;
    let perfect = outcome.total > 0 && outcome.score == outcome.total;

    // Single conditional UPDATE so the ceiling holds under concurrent
    // submissions: the increment only lands while the count is below it.
    let new_attempts: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE users
        SET quiz_attempts = quiz_attempts + 1,
            best_score = GREATEST(best_score, $2),
            allowed = allowed OR $3
        WHERE wallet_address = $1 AND quiz_attempts < $4
        RETURNING quiz_attempts
        "#,
    )
    .bind(&user.wallet_address)
    .bind(outcome.score as i32)
    .bind(passed)
    .bind(MAX_QUIZ_ATTEMPTS)
    .fetch_optional(pool)
    .await?;

    let new_attempts = new_attempts.ok_or_else(|| {
        AppError::Forbidden("Maximum quiz attempts reached".to_string())
    })?;

    let refund = if perfect {
        attempt_refund(pool, escrow, &user.wallet_address).await?
    } else {
        json!({ "attempted": false })
    };

    let token = sign_user_token(
        &user.wallet_address,
        &user.tx_hash,
        new_attempts,
        &config.jwt_secret,
    )?;

    Ok(Json(json!({
        "score": outcome.score,
        "total": outcome.total,
        "answers": outcome.answers,
        "attempts": new_attempts,
        "token": token,
        "passed": passed,
        "refund": refund,
        "metadata": req.metadata,
    })))
}

/// Claims the wallet's one refund attempt and, if this call won the claim,
/// invokes the escrow contract. The claim is never reopened: a failed chain
/// call is logged and the wallet stays marked as attempted.
async fn attempt_refund(
    pool: &PgPool,
    escrow: &EscrowClient,
    wallet_address: &str,
) -> Result<serde_json::Value, AppError> {
    let claimed: Option<i64> = sqlx::query_scalar(
        "UPDATE users SET refund_attempted = TRUE
         WHERE wallet_address = $1 AND refund_attempted = FALSE
         RETURNING id",
    )
    .bind(wallet_address)
    .fetch_optional(pool)
    .await?;

    if claimed.is_none() {
        return Ok(json!({ "attempted": false }));
    }

    match escrow.refund(wallet_address).await {
        Ok(tx_hash) => {
            let tx_hash = format!("{:#x}", tx_hash);
            sqlx::query("UPDATE users SET refund_tx_hash = $2 WHERE wallet_address = $1")
                .bind(wallet_address)
                .bind(&tx_hash)
                .execute(pool)
                .await?;

            tracing::info!("Refund sent for {}: {}", wallet_address, tx_hash);
            Ok(json!({ "attempted": true, "txHash": tx_hash }))
        }
        Err(e) => {
            tracing::error!("Refund call failed for {}: {}", wallet_address, e);
            Ok(json!({ "attempted": true }))
        }
    }
}

async fn submit_guest(
    pool: &PgPool,
    claims: GuestClaims,
    req: SubmitRequest,
) -> Result<Json<serde_json::Value>, AppError> {
    let guest = sqlx::query_as::<_, Guest>("SELECT * FROM guests WHERE id = $1")
        .bind(claims.guest_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Guest session not found".to_string()))?;

    let outcome = score_answers(&guest.questions.0, &req.answers);

    sqlx::query("UPDATE guests SET score = GREATEST(score, $2) WHERE id = $1")
        .bind(guest.id)
        .bind(outcome.score as i32)
        .execute(pool)
        .await?;

    Ok(Json(json!({
        "score": outcome.score,
        "total": outcome.total,
        "answers": outcome.answers,
        "metadata": req.metadata,
    })))
}

struct ScoreOutcome {
    score: usize,
    total: usize,
    /// Per-question review map, keyed by question id.
    answers: serde_json::Map<String, serde_json::Value>,
}

impl ScoreOutcome {
    fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.score as f64 / self.total as f64
    }
}

/// Scores submitted answers against the stored question set.
/// One point per exact answer match; answers for unknown question ids are
/// ignored, unanswered questions count as wrong.
fn score_answers(
    questions: &[QuizQuestion],
    answers: &HashMap<i64, String>,
) -> ScoreOutcome {
    let mut score = 0;
    let mut review = serde_json::Map::new();

    for q in questions {
        let given = answers.get(&q.id);
        let correct = given.is_some_and(|a| a == &q.correct_answer);
        if correct {
            score += 1;
        }

        review.insert(
            q.id.to_string(),
            json!({
                "answer": given,
                "correct": correct,
                "correctAnswer": q.correct_answer,
            }),
        );
    }

    ScoreOutcome {
        score,
        total: questions.len(),
        answers: review,
    }
}
