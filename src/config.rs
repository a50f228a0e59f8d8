// src/config.rs

use std::env;

use dotenvy::dotenv;
use url::Url;

/// Hard cap on quiz retries per registered wallet.
pub const MAX_QUIZ_ATTEMPTS: i32 = 3;

/// Registered user session tokens live for 7 days.
pub const USER_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;
/// Guest session tokens live for 6 hours.
pub const GUEST_TOKEN_TTL_SECS: u64 = 6 * 60 * 60;

/// Minimum escrow deposit: 0.0001 ETH, in wei.
pub const REQUIRED_DEPOSIT_WEI: u128 = 100_000_000_000_000;
/// The deposit transaction must have been mined within the past hour.
pub const DEPOSIT_WINDOW_SECS: u64 = 60 * 60;

/// Fraction of questions that must be answered correctly to pass.
pub const PASS_THRESHOLD: f64 = 0.7;
/// Seconds granted per served question.
pub const TIME_PER_QUESTION_SECS: u64 = 600;
/// Never serve more than this many questions in one sitting.
pub const QUESTION_LIMIT: usize = 60;

/// Cap on stored display text (guest names, quiz names).
pub const MAX_NAME_LEN: usize = 50;

/// Uploaded study material is truncated to this many characters
/// before being sent to the generator.
pub const MATERIAL_CHAR_LIMIT: usize = 4000;
pub const DEFAULT_QUESTION_COUNT: usize = 10;
pub const MAX_QUESTION_COUNT: usize = 50;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,

    /// Ethereum JSON-RPC endpoint used for deposit verification and refunds.
    pub rpc_url: String,
    /// Address of the escrow contract that receives deposits.
    pub escrow_address: String,
    /// Private key of the account allowed to trigger refunds.
    pub escrow_signer_key: String,

    /// OpenAI-compatible chat-completions endpoint base URL.
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let rpc_url = env::var("RPC_URL")
            .expect("RPC_URL must be set");
        Url::parse(&rpc_url).expect("RPC_URL must be a valid URL");

        let escrow_address = env::var("ESCROW_CONTRACT_ADDRESS")
            .expect("ESCROW_CONTRACT_ADDRESS must be set");

        let escrow_signer_key = env::var("ESCROW_SIGNER_KEY")
            .expect("ESCROW_SIGNER_KEY must be set");

        let llm_base_url = env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let llm_api_key = env::var("LLM_API_KEY")
            .expect("LLM_API_KEY must be set");

        let llm_model = env::var("LLM_MODEL")
            .unwrap_or_else(|_| "gpt-4o-mini".to_string());

        Self {
            database_url,
            jwt_secret,
            rust_log,
            rpc_url,
            escrow_address,
            escrow_signer_key,
            llm_base_url,
            llm_api_key,
            llm_model,
        }
    }
}
