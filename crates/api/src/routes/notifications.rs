//! Notification routes
//!
//! The durable counterpart to the identity channel: pushes are best-effort,
//! so clients that were offline catch up by listing their notifications here.

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde::Serialize;
use serde_json::json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::AuthUser, error::ApiResult, state::AppState};

#[derive(Debug, Serialize, FromRow)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub content: String,
    pub link: String,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// List the caller's notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<NotificationResponse>>> {
    let notifications: Vec<NotificationResponse> = sqlx::query_as(
        r#"
        SELECT id, content, link, is_read, created_at
        FROM notifications
        WHERE recipient_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(notifications))
}

/// Mark one of the caller's notifications as read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2",
    )
    .bind(notification_id)
    .bind(auth_user.user_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(crate::error::ApiError::NotFound);
    }

    Ok(Json(json!({ "ok": true })))
}
