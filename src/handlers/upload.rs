// src/handlers/upload.rs

use axum::{
    Json,
    extract::{Multipart, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    config::{Config, DEFAULT_QUESTION_COUNT, MAX_NAME_LEN, MAX_QUESTION_COUNT},
    error::AppError,
    models::quiz::strip_answers,
    quizgen::QuizGenerator,
    utils::{
        html::clean_text,
        jwt::{UserClaims, token_from_headers, verify_user_token},
    },
};

const DIFFICULTIES: [&str; 3] = ["easy", "medium", "hard"];

/// Accepts study material and turns it into a question bank.
///
/// Multipart form: `file` (UTF-8 text), optional `num_questions`,
/// `quiz_name` and `difficulty`. With a user token the generated set becomes
/// the wallet's assigned quiz; with `quiz_name` a public (guest-selectable)
/// quiz row is created as well. At least one of the two is required.
pub async fn upload(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    State(generator): State<QuizGenerator>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    // A token is optional here, but a present token must be valid.
    let claims: Option<UserClaims> = match token_from_headers(&headers) {
        Some(token) => Some(verify_user_token(&token, &config.jwt_secret)?),
        None => None,
    };

    let mut material: Option<String> = None;
    let mut num_questions = DEFAULT_QUESTION_COUNT;
    let mut quiz_name: Option<String> = None;
    let mut difficulty = "medium".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_lowercase();
                if filename.ends_with(".pdf") {
                    return Err(AppError::BadRequest(
                        "PDF text extraction is not supported; upload plain text (.txt/.md)"
                            .to_string(),
                    ));
                }
                if !filename.ends_with(".txt") && !filename.ends_with(".md") {
                    return Err(AppError::BadRequest(
                        "File must be a .txt or .md document".to_string(),
                    ));
                }

                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|_| AppError::BadRequest("File must be UTF-8 text".to_string()))?;
                material = Some(text);
            }
            Some("num_questions") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let n: usize = raw.trim().parse().map_err(|_| {
                    AppError::BadRequest("num_questions must be a number".to_string())
                })?;
                if n == 0 || n > MAX_QUESTION_COUNT {
                    return Err(AppError::BadRequest(format!(
                        "num_questions must be between 1 and {}",
                        MAX_QUESTION_COUNT
                    )));
                }
                num_questions = n;
            }
            Some("quiz_name") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let name = clean_text(raw.trim());
                if name.is_empty() {
                    return Err(AppError::BadRequest("Quiz name cannot be empty".to_string()));
                }
                if name.chars().count() > MAX_NAME_LEN {
                    return Err(AppError::BadRequest(format!(
                        "Quiz name must be at most {} characters",
                        MAX_NAME_LEN
                    )));
                }
                quiz_name = Some(name);
            }
            Some("difficulty") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let value = raw.trim().to_lowercase();
                if !DIFFICULTIES.contains(&value.as_str()) {
                    return Err(AppError::BadRequest(
                        "difficulty must be one of: easy, medium, hard".to_string(),
                    ));
                }
                difficulty = value;
            }
            _ => {}
        }
    }

    let material = material
        .ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;
    if material.trim().is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
    }

    if claims.is_none() && quiz_name.is_none() {
        return Err(AppError::BadRequest(
            "Provide a quiz_name or authenticate to receive an assigned quiz".to_string(),
        ));
    }

    let questions = generator.generate(&material, num_questions).await?;

    if let Some(claims) = &claims {
        let updated: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET quiz = $2 WHERE wallet_address = $1 RETURNING id",
        )
        .bind(&claims.wallet_address)
        .bind(sqlx::types::Json(&questions))
        .fetch_optional(&pool)
        .await?;

        if updated.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }
    }

    if let Some(name) = &quiz_name {
        sqlx::query(
            "INSERT INTO quizzes (name, len, difficulty, questions) VALUES ($1, $2, $3, $4)",
        )
        .bind(name)
        .bind(questions.len() as i32)
        .bind(&difficulty)
        .bind(sqlx::types::Json(&questions))
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store quiz '{}': {:?}", name, e);
            AppError::from(e)
        })?;
    }

    let mut response = json!({
        "questions": strip_answers(&questions),
        "count": questions.len(),
    });
    if let Some(name) = quiz_name {
        response["quizName"] = json!(name);
    }

    Ok(Json(response))
}
