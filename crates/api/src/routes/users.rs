//! User management routes

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use helpdesk_shared::UserRole;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub ok: bool,
    pub deleted_count: u64,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub reputation: i32,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Public leaderboard entry: no email, no activity flags
#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub reputation: i32,
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    role: UserRole,
    full_name: Option<String>,
    email: Option<String>,
    reputation: i32,
    is_active: bool,
    created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct LeaderboardRow {
    id: Uuid,
    username: String,
    full_name: Option<String>,
    reputation: i32,
}

// =============================================================================
// Handlers
// =============================================================================

/// List all users (admin only)
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    if !auth_user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let users: Vec<UserRow> = sqlx::query_as(
        r#"
        SELECT id, username, role, full_name, email, reputation, is_active, created_at
        FROM users
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(
        users
            .into_iter()
            .map(|u| UserSummary {
                id: u.id,
                username: u.username,
                role: u.role,
                full_name: u.full_name,
                email: u.email,
                reputation: u.reputation,
                is_active: u.is_active,
                created_at: u.created_at,
            })
            .collect(),
    ))
}

/// Delete a user (admin only)
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !auth_user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    tracing::info!(user_id = %user_id, deleted_by = %auth_user.user_id, "User deleted");

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Delete multiple users at once (admin only)
pub async fn bulk_delete_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<BulkDeleteRequest>,
) -> ApiResult<Json<BulkDeleteResponse>> {
    if !auth_user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ANY($1)")
        .bind(&req.ids)
        .execute(&state.pool)
        .await?;

    tracing::info!(
        deleted_count = result.rows_affected(),
        deleted_by = %auth_user.user_id,
        "Users bulk deleted"
    );

    Ok(Json(BulkDeleteResponse {
        ok: true,
        deleted_count: result.rows_affected(),
    }))
}

/// Top ten users by reputation (public)
pub async fn leaderboard(State(state): State<AppState>) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let rows: Vec<LeaderboardRow> = sqlx::query_as(
        r#"
        SELECT id, username, full_name, reputation
        FROM users
        ORDER BY reputation DESC
        LIMIT 10
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|u| LeaderboardEntry {
                id: u.id,
                username: u.username,
                full_name: u.full_name,
                reputation: u.reputation,
            })
            .collect(),
    ))
}
