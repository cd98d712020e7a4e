// auth.rs
use axum::extract::FromRequestParts;
use http::request::Parts;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::{ApiError, FieldErrors};
use crate::models::{AuthResponse, LoginRequest, SignupRequest, User};
use crate::state::AppState;

/// Authenticated requester, resolved from the bearer token.
pub struct CurrentUser {
    pub user: User,
    pub token_hash: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
        let token_hash = digest_hex(token);

        let user = sqlx::query_as::<_, User>(
            "SELECT u.* FROM sessions s JOIN users u ON u.id = s.user_id WHERE s.token_hash = $1",
        )
        .bind(&token_hash)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(ApiError::Unauthorized)?;

        Ok(CurrentUser { user, token_hash })
    }
}

fn digest_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Salted digest in `salt$digest` form. Tokens and salts come from the
/// thread-local CSPRNG.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::rng().fill(&mut salt);
    let salt = hex::encode(salt);
    let digest = digest_hex(&format!("{salt}{password}"));
    format!("{salt}${digest}")
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    digest_hex(&format!("{salt}{password}")) == digest
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

fn validate_signup(req: &SignupRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if req.name.trim().is_empty() {
        errors.add("name", "The name field is required");
    }
    if !valid_email(&req.email) {
        errors.add("email", "The email must be a valid email address");
    }
    if req.password.len() < 8 {
        errors.add("password", "The password must be at least 8 characters");
    }
    errors
}

async fn open_session(pool: &PgPool, user: User) -> Result<AuthResponse, ApiError> {
    let token = new_token();
    sqlx::query("INSERT INTO sessions (token_hash, user_id) VALUES ($1, $2)")
        .bind(digest_hex(&token))
        .bind(user.id)
        .execute(pool)
        .await?;

    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

pub async fn signup(pool: &PgPool, req: SignupRequest) -> Result<AuthResponse, ApiError> {
    let mut errors = validate_signup(&req);

    if !errors.contains("email") {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(&req.email)
                .fetch_one(pool)
                .await?;
        if taken {
            errors.add("email", "The email has already been taken");
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(uuid::Uuid::new_v4())
    .bind(req.name.trim())
    .bind(&req.email)
    .bind(hash_password(&req.password))
    .fetch_one(pool)
    .await?;

    open_session(pool, user).await
}

pub async fn login(pool: &PgPool, req: LoginRequest) -> Result<AuthResponse, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&req.email)
        .fetch_optional(pool)
        .await?;

    match user {
        Some(user) if verify_password(&req.password, &user.password_hash) => {
            open_session(pool, user).await
        }
        _ => Err(ApiError::Validation(FieldErrors::of(
            "email",
            "The provided credentials are not correct",
        ))),
    }
}

pub async fn logout(pool: &PgPool, token_hash: &str) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let stored = hash_password("correct horse");
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
    }

    #[test]
    fn password_hashes_are_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("anything", "no-separator-here"));
    }

    #[test]
    fn tokens_are_64_hex_chars() {
        let token = new_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signup_validation_flags_each_field() {
        let errors = validate_signup(&SignupRequest {
            name: "  ".into(),
            email: "not-an-email".into(),
            password: "short".into(),
        });
        assert!(errors.contains("name"));
        assert!(errors.contains("email"));
        assert!(errors.contains("password"));
    }

    #[test]
    fn signup_validation_accepts_reasonable_input() {
        let errors = validate_signup(&SignupRequest {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "longenough".into(),
        });
        assert!(errors.is_empty());
    }

    #[test]
    fn email_shapes() {
        assert!(valid_email("a@b.com"));
        assert!(!valid_email("a@.com"));
        assert!(!valid_email("@b.com"));
        assert!(!valid_email("a@nodot"));
        assert!(!valid_email("plain"));
    }
}
