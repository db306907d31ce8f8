//! Bearer-token auth.
//!
//! - `/api/auth/register` and `/api/auth/login` issue a JWT
//! - Every task endpoint requires `Authorization: Bearer <jwt>`
//! - The middleware resolves the token subject to an [`AuthUser`] and
//!   attaches it to the request; only the id is used for authorization
//!
//! # Security notes
//! - Passwords are stored as PBKDF2-SHA256 hashes, compared in constant time.
//! - Use a strong `JWT_SECRET` in production.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::routes::AppState;
use crate::error::{ApiError, ApiResult, FieldError};
use crate::user::User;

const PBKDF2_ITERATIONS: u32 = 100_000;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject: the user id
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// Identity resolved from a verified bearer token, attached to the request
/// extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub exp: i64,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}

/// Hash a password as `pbkdf2-sha256$iterations$salt$hash` with a fresh salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut derived = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut derived);
    format!(
        "pbkdf2-sha256${}${}${}",
        PBKDF2_ITERATIONS,
        hex::encode(salt),
        hex::encode(derived)
    )
}

/// Verify a password against a stored hash. Unparseable hashes verify false.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some("pbkdf2-sha256"), Some(iters), Some(salt_hex), Some(hash_hex)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(iterations) = iters.parse::<u32>() else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let mut derived = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut derived);
    constant_time_eq(&hex::encode(derived), hash_hex)
}

fn issue_jwt(secret: &str, ttl_days: i64, user_id: Uuid) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

/// POST /api/auth/register - Create an account and issue a token.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let mut errors = Vec::new();
    let name = req.name.trim().to_string();
    if name.is_empty() {
        errors.push(FieldError::new("name", "Name is required"));
    }
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        errors.push(FieldError::new("email", "Valid email required"));
    }
    if req.password.len() < 8 {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    if state.users.find_by_email(&email).await.is_some() {
        return Err(ApiError::validation(vec![FieldError::new(
            "email",
            "Email already registered",
        )]));
    }

    let user = User::new(name, email, hash_password(&req.password));
    let user_id = user.id;
    state.users.insert(user).await?;
    tracing::info!(user_id = %user_id, "user registered");

    let (token, exp) = issue_jwt(
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_days,
        user_id,
    )?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token, exp })))
}

/// POST /api/auth/login - Verify credentials and issue a token.
///
/// One generic error message covers both unknown email and wrong password to
/// prevent account enumeration; the unknown-email path still performs a dummy
/// hash comparison so the two cases take comparable time.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let account = state.users.find_by_email(&req.email).await;

    let valid = match &account {
        Some(user) => verify_password(&req.password, &user.password_hash),
        None => {
            let dummy = hash_password("dummy_password_for_timing");
            let _ = verify_password(&req.password, &dummy);
            false
        }
    };

    if !valid {
        return Err(ApiError::Unauthenticated(
            "Invalid email or password".to_string(),
        ));
    }
    let user = account.unwrap();

    let (token, exp) = issue_jwt(
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_days,
        user.id,
    )?;
    Ok(Json(TokenResponse { token, exp }))
}

/// Middleware guarding the task endpoints. Verifies the bearer token and
/// attaches the resolved [`AuthUser`] to the request.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return ApiError::Unauthenticated("No token, authorization denied".to_string())
            .into_response();
    }

    let claims = match verify_jwt(token, &state.config.auth.jwt_secret) {
        Ok(claims) => claims,
        Err(_) => {
            return ApiError::Unauthenticated("Token is not valid".to_string()).into_response();
        }
    };

    let user_id = match claims.sub.parse::<Uuid>() {
        Ok(id) => id,
        Err(_) => {
            return ApiError::Unauthenticated("Token is not valid".to_string()).into_response();
        }
    };

    // Reject tokens whose subject no longer exists.
    let user = match state.users.get(user_id).await {
        Some(user) => user,
        None => {
            return ApiError::Unauthenticated("Token is not valid".to_string()).into_response();
        }
    };

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        name: user.name,
    });
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse battery staple");
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same password");
        let b = hash_password("same password");
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_verifies_false() {
        assert!(!verify_password("anything", "not-a-hash"));
        assert!(!verify_password("anything", "pbkdf2-sha256$abc$zz$zz"));
    }

    #[test]
    fn jwt_roundtrip() {
        let id = Uuid::new_v4();
        let (token, exp) = issue_jwt("test-secret", 1, id).unwrap();
        assert!(exp > Utc::now().timestamp());

        let claims = verify_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, id.to_string());
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let (token, _) = issue_jwt("test-secret", 1, Uuid::new_v4()).unwrap();
        assert!(verify_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn jwt_rejects_tampered_token() {
        let (token, _) = issue_jwt("test-secret", 1, Uuid::new_v4()).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(verify_jwt(&tampered, "test-secret").is_err());
    }

    #[test]
    fn expired_jwt_rejected() {
        // Hand-roll claims with an expiry in the past.
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            iat: (Utc::now() - Duration::days(2)).timestamp(),
            exp: (Utc::now() - Duration::days(1)).timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(verify_jwt(&token, "test-secret").is_err());
    }
}
