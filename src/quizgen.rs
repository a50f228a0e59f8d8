// src/quizgen.rs

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, MATERIAL_CHAR_LIMIT},
    error::AppError,
    models::quiz::QuizQuestion,
};

const SYSTEM_PROMPT: &str = "You are an expert at creating multiple choice questions. \
When given text, create clear and focused questions with one correct answer and three plausible but incorrect options. \
Always respond in valid JSON format with the following structure: \
{\"questions\": [{\"question\": \"question text\", \"options\": [\"correct answer\", \"wrong1\", \"wrong2\", \"wrong3\"], \"correct_answer\": \"correct answer\"}]}";

/// Client for the OpenAI-compatible chat-completions endpoint that turns
/// uploaded study material into a multiple-choice question bank.
///
/// Single-shot: one request per upload, no retry.
#[derive(Clone)]
pub struct QuizGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// The JSON document the model is instructed to emit.
#[derive(Deserialize)]
struct GeneratedQuestions {
    questions: Vec<GeneratedQuestion>,
}

#[derive(Deserialize)]
struct GeneratedQuestion {
    question: String,
    options: Vec<String>,
    correct_answer: String,
}

impl QuizGenerator {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::InternalServerError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.llm_base_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
        })
    }

    /// Generates `num_questions` multiple-choice questions from the study
    /// material. Material is truncated to stay within token limits; options
    /// of each returned question are shuffled before storage.
    pub async fn generate(
        &self,
        material: &str,
        num_questions: usize,
    ) -> Result<Vec<QuizQuestion>, AppError> {
        let excerpt: String = material.chars().take(MATERIAL_CHAR_LIMIT).collect();

        let user_prompt = format!(
            "Generate {num_questions} multiple choice questions based on this text:\n\n{excerpt}\n\n\
Remember to:\n\
1. Create clear, focused questions\n\
2. Ensure one correct answer per question\n\
3. Provide three plausible but incorrect options\n\
4. Return in the exact JSON format specified"
        );

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: 0.7,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("generator request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "generator returned {}: {}",
                status, text
            )));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("generator response unreadable: {}", e)))?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| AppError::Upstream("generator returned no choices".to_string()))?;

        let mut questions = parse_generated(content, num_questions)?;

        let mut rng = rand::thread_rng();
        for q in &mut questions {
            q.options.shuffle(&mut rng);
        }

        Ok(questions)
    }
}

/// Parses and validates the model's JSON output into stored questions.
/// Each question must be non-empty, offer at least two options, and list
/// its correct answer among the options.
fn parse_generated(content: &str, num_questions: usize) -> Result<Vec<QuizQuestion>, AppError> {
    let parsed: GeneratedQuestions = serde_json::from_str(content)
        .map_err(|e| AppError::Upstream(format!("generator returned malformed JSON: {}", e)))?;

    let mut questions = Vec::new();
    for (i, q) in parsed.questions.into_iter().take(num_questions).enumerate() {
        if q.question.trim().is_empty() {
            return Err(AppError::Upstream(
                "generator returned an empty question".to_string(),
            ));
        }
        if q.options.len() < 2 {
            return Err(AppError::Upstream(
                "generator returned a question with fewer than two options".to_string(),
            ));
        }
        if !q.options.contains(&q.correct_answer) {
            return Err(AppError::Upstream(
                "generator returned a question whose answer is not among its options".to_string(),
            ));
        }

        questions.push(QuizQuestion {
            id: (i + 1) as i64,
            question: q.question,
            options: q.options,
            correct_answer: q.correct_answer,
        });
    }

    if questions.is_empty() {
        return Err(AppError::Upstream(
            "generator returned no questions".to_string(),
        ));
    }

    Ok(questions)
}
