use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::jwt::issue_token;
use crate::auth::password::{hash_password, password_matches};
use crate::auth::AuthUser;
use crate::errors::{is_unique_violation, AppError};
use crate::models::user::{User, UserRow};
use crate::state::AppState;
use crate::validation::ValidatedJson;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 256, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 120, message = "is required"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: User,
}

fn token_response(user: User, state: &AppState) -> Result<AuthResponse, AppError> {
    let (token, expires_at) = issue_token(user.id, &user.email, &state.jwt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token signing failed: {e}")))?;
    Ok(AuthResponse {
        token,
        expires_at,
        user,
    })
}

/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let password_hash = hash_password(&req.password)?;

    let row: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, name, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.email.trim().to_lowercase())
    .bind(req.name.trim())
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("An account with this email already exists".to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    info!(user_id = %row.id, "User registered");
    Ok((StatusCode::CREATED, Json(token_response(row.into(), &state)?)))
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let row: Option<UserRow> =
        sqlx::query_as("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(req.email.trim())
            .fetch_optional(&state.db)
            .await?;

    let Some(row) = row else {
        warn!("Login attempt for unknown email");
        return Err(invalid());
    };

    if !password_matches(&req.password, &row.password_hash)? {
        warn!(user_id = %row.id, "Login attempt with wrong password");
        return Err(invalid());
    }

    info!(user_id = %row.id, "User logged in");
    Ok(Json(token_response(row.into(), &state)?))
}

/// GET /api/v1/auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<User>, AppError> {
    let row: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;
    Ok(Json(row.into()))
}
