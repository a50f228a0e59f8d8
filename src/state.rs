use crate::config::Config;
use crate::escrow::EscrowClient;
use crate::quizgen::QuizGenerator;
use axum::extract::FromRef;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub escrow: EscrowClient,
    pub generator: QuizGenerator,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for EscrowClient {
    fn from_ref(state: &AppState) -> Self {
        state.escrow.clone()
    }
}

impl FromRef<AppState> for QuizGenerator {
    fn from_ref(state: &AppState) -> Self {
        state.generator.clone()
    }
}
