// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{self, Config},
    error::AppError,
};

/// Claims carried by a registered (deposit-backed) user session token.
///
/// `quiz_attempts` is a snapshot for client display; the database row is
/// authoritative and every state-changing response reissues a fresh token.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserClaims {
    pub wallet_address: String,
    pub tx_hash: String,
    pub quiz_attempts: i32,
    pub iat: usize,
    pub exp: usize,
}

/// Claims carried by a guest session token (no deposit).
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GuestClaims {
    pub guest_id: Uuid,
    pub quiz_id: i64,
    pub name: String,
    pub iat: usize,
    pub exp: usize,
}

/// Either kind of session token, for routes that accept both.
#[derive(Debug, Clone)]
pub enum AuthToken {
    User(UserClaims),
    Guest(GuestClaims),
}

fn unix_now() -> Result<usize, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize)
}

/// Signs a 7-day session token for a registered wallet.
pub fn sign_user_token(
    wallet_address: &str,
    tx_hash: &str,
    quiz_attempts: i32,
    secret: &str,
) -> Result<String, AppError> {
    let iat = unix_now()?;
    let claims = UserClaims {
        wallet_address: wallet_address.to_owned(),
        tx_hash: tx_hash.to_owned(),
        quiz_attempts,
        iat,
        exp: iat + config::USER_TOKEN_TTL_SECS as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Signs a 6-hour session token for a guest.
pub fn sign_guest_token(
    guest_id: Uuid,
    quiz_id: i64,
    name: &str,
    secret: &str,
) -> Result<String, AppError> {
    let iat = unix_now()?;
    let claims = GuestClaims {
        guest_id,
        quiz_id,
        name: name.to_owned(),
        iat,
        exp: iat + config::GUEST_TOKEN_TTL_SECS as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a registered-user token.
pub fn verify_user_token(token: &str, secret: &str) -> Result<UserClaims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Verifies and decodes a guest token.
pub fn verify_guest_token(token: &str, secret: &str) -> Result<GuestClaims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Verifies a token of either kind. User claims are tried first; a guest
/// token lacks `walletAddress` so the user decode fails cleanly.
pub fn verify_any_token(token: &str, secret: &str) -> Result<AuthToken, AppError> {
    if let Ok(claims) = verify_user_token(token, secret) {
        return Ok(AuthToken::User(claims));
    }
    verify_guest_token(token, secret).map(AuthToken::Guest)
}

/// Pulls the session token from 'Authorization: Bearer <token>' or,
/// failing that, from the `authToken` cookie (the original client sends both).
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if let Some(token) = bearer {
        return Some(token.to_owned());
    }

    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .map(str::trim)
                .find_map(|c| c.strip_prefix("authToken="))
                .map(str::to_owned)
        })
}

/// Axum Middleware: Registered-user authentication.
///
/// Validates the session token and injects `UserClaims` into the request
/// extensions for handlers to use. Guest tokens are rejected here.
pub async fn user_auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token =
        token_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    match verify_user_token(&token, &config.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Axum Middleware: authentication accepting user OR guest tokens.
///
/// Injects an `AuthToken` into the request extensions.
pub async fn any_auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token =
        token_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    match verify_any_token(&token, &config.jwt_secret) {
        Ok(auth) => {
            req.extensions_mut().insert(auth);
            Ok(next.run(req).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn user_token_round_trip() {
        let token =
            sign_user_token("0xabc", "0xdef", 2, SECRET).unwrap();
        let claims = verify_user_token(&token, SECRET).unwrap();
        assert_eq!(claims.wallet_address, "0xabc");
        assert_eq!(claims.tx_hash, "0xdef");
        assert_eq!(claims.quiz_attempts, 2);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn guest_token_round_trip() {
        let id = Uuid::new_v4();
        let token = sign_guest_token(id, 7, "guest_ab12", SECRET).unwrap();
        let claims = verify_guest_token(&token, SECRET).unwrap();
        assert_eq!(claims.guest_id, id);
        assert_eq!(claims.quiz_id, 7);
        assert_eq!(claims.name, "guest_ab12");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = sign_user_token("0xabc", "0xdef", 0, SECRET).unwrap();
        assert!(verify_user_token(&token, "other-secret").is_err());
    }

    #[test]
    fn guest_token_is_not_a_user_token() {
        let token =
            sign_guest_token(Uuid::new_v4(), 1, "g", SECRET).unwrap();
        assert!(verify_user_token(&token, SECRET).is_err());
        assert!(matches!(
            verify_any_token(&token, SECRET).unwrap(),
            AuthToken::Guest(_)
        ));
    }

    #[test]
    fn token_extraction_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer aaa.bbb.ccc"),
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("authToken=xxx.yyy.zzz"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("aaa.bbb.ccc"));
    }

    #[test]
    fn token_extraction_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; authToken=xxx.yyy.zzz"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("xxx.yyy.zzz"));
    }
}
