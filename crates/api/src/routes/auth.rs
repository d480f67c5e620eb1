//! Authentication and account routes

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use helpdesk_shared::UserRole;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{hash_password, verify_password, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub role: UserRole,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub reputation: i32,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct UserAuthRow {
    id: Uuid,
    username: String,
    password_hash: String,
    role: UserRole,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct UserProfileRow {
    id: Uuid,
    username: String,
    role: UserRole,
    full_name: Option<String>,
    email: Option<String>,
    bio: Option<String>,
    reputation: i32,
    is_active: bool,
    created_at: OffsetDateTime,
}

impl From<UserProfileRow> for UserProfile {
    fn from(row: UserProfileRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            role: row.role,
            full_name: row.full_name,
            email: row.email,
            bio: row.bio,
            reputation: row.reputation,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new user account
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username cannot be empty".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
        .bind(username)
        .fetch_one(&state.pool)
        .await?;
    if taken {
        return Err(ApiError::UsernameTaken);
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        ApiError::Internal
    })?;
    let role = req.role.unwrap_or_default();

    let user_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO users (username, password_hash, role, full_name, email)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(username)
    .bind(&password_hash)
    .bind(role)
    .bind(&req.full_name)
    .bind(&req.email)
    .fetch_one(&state.pool)
    .await?;

    let access_token = state
        .jwt
        .generate_token(user_id, username, role)
        .map_err(|e| {
            tracing::error!(error = %e, "Token generation failed");
            ApiError::Internal
        })?;

    tracing::info!(user_id = %user_id, username = %username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: state.jwt.expiry_seconds(),
            role,
            user_id,
        }),
    ))
}

/// Log in with username and password
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user: Option<UserAuthRow> = sqlx::query_as(
        "SELECT id, username, password_hash, role, is_active FROM users WHERE username = $1",
    )
    .bind(&req.username)
    .fetch_optional(&state.pool)
    .await?;

    let user = user.ok_or(ApiError::InvalidCredentials)?;
    if !user.is_active {
        return Err(ApiError::Forbidden);
    }

    let valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
        tracing::error!(error = %e, "Password verification failed");
        ApiError::Internal
    })?;
    if !valid {
        tracing::warn!(username = %req.username, "Failed login attempt");
        return Err(ApiError::InvalidCredentials);
    }

    let access_token = state
        .jwt
        .generate_token(user.id, &user.username, user.role)
        .map_err(|e| {
            tracing::error!(error = %e, "Token generation failed");
            ApiError::Internal
        })?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.jwt.expiry_seconds(),
        role: user.role,
        user_id: user.id,
    }))
}

/// Get the current user's profile
pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<UserProfile>> {
    let row: UserProfileRow = sqlx::query_as(
        r#"
        SELECT id, username, role, full_name, email, bio, reputation, is_active, created_at
        FROM users WHERE id = $1
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(row.into()))
}

/// Update the current user's profile fields
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let row: UserProfileRow = sqlx::query_as(
        r#"
        UPDATE users
        SET full_name = COALESCE($2, full_name),
            email = COALESCE($3, email),
            bio = COALESCE($4, bio)
        WHERE id = $1
        RETURNING id, username, role, full_name, email, bio, reputation, is_active, created_at
        "#,
    )
    .bind(auth_user.user_id)
    .bind(&req.full_name)
    .bind(&req.email)
    .bind(&req.bio)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user_id = %auth_user.user_id, "Profile updated");

    Ok(Json(row.into()))
}
