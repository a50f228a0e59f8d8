// src/models/quiz.rs

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Represents the 'quizzes' table in the database.
/// A public question bank that guests can take by id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub name: String,

    /// Number of questions in the bank.
    pub len: i32,

    /// One of 'easy', 'medium', 'hard'.
    pub difficulty: String,

    /// The stored question bank, answers included.
    /// Stored as a JSONB array in the database.
    pub questions: Json<Vec<QuizQuestion>>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A single stored question, answer included. Never sent to clients as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizQuestion {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// DTO for sending a question to the client (excludes the answer).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
}

/// Catalog row for `GET /api/ava`.
#[derive(Debug, Serialize, FromRow)]
pub struct QuizSummary {
    pub id: i64,
    pub name: String,
    pub len: i32,
    pub difficulty: String,
}

/// Builds the set served for one sitting: Fisher-Yates shuffles the question
/// order, caps it at `limit`, and shuffles each question's options.
/// Answers stay attached; callers strip them with [`strip_answers`].
pub fn shuffled_set(bank: &[QuizQuestion], limit: usize) -> Vec<QuizQuestion> {
    let mut rng = rand::thread_rng();

    let mut questions = bank.to_vec();
    questions.shuffle(&mut rng);
    questions.truncate(limit);

    for q in &mut questions {
        q.options.shuffle(&mut rng);
    }

    questions
}

/// Maps stored questions to the client-facing DTO, dropping correct answers.
pub fn strip_answers(questions: &[QuizQuestion]) -> Vec<PublicQuestion> {
    questions
        .iter()
        .map(|q| PublicQuestion {
            id: q.id,
            question: q.question.clone(),
            options: q.options.clone(),
        })
        .collect()
}
