// src/routes.rs

use std::sync::Arc;

use axum::{
    Router, http::Method, middleware,
    routing::{get, post},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempts, catalog, login, questions, submit, upload},
    state::AppState,
    utils::jwt::{any_auth_middleware, user_auth_middleware},
};

/// Assembles the main application router.
///
/// * Rate-limits the expensive routes (deposit verification, generation).
/// * Applies per-route auth middleware where a token is mandatory.
/// * Applies global middleware (Trace, CORS) and injects shared state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(5)
        .finish()
        .unwrap();

    let governor_conf = Arc::new(governor_conf);

    // Chain verification and LLM generation are the costly calls; quiz
    // starts write a guest row per unauthenticated request.
    let limited_routes = Router::new()
        .route("/login", post(login::login))
        .route("/upload", post(upload::upload))
        .route("/questions", get(questions::get_questions))
        .layer(GovernorLayer::new(governor_conf));

    let user_routes = Router::new()
        .route("/attempts", get(attempts::get_attempts))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            user_auth_middleware,
        ));

    // Submissions come from registered users and guests alike.
    let submit_routes = Router::new()
        .route("/submit", post(submit::submit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            any_auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/auth", post(login::restore_session))
        .route("/score", get(catalog::get_leaderboard))
        .route("/ava", get(catalog::list_quizzes))
        .route("/health", get(catalog::health))
        .merge(limited_routes)
        .merge(user_routes)
        .merge(submit_routes);

    Router::new()
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
