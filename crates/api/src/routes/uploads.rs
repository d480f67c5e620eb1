//! File upload route
//!
//! Accepts a multipart form with a single `file` field, stores it under the
//! configured upload directory with a random name (the original filename is
//! never trusted), and returns the public URL the file is served from.

use axum::{
    extract::{Extension, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

pub async fn upload_file(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let extension = sanitized_extension(&original_name);

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;

        if data.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::BadRequest(format!(
                "File too large (max {MAX_UPLOAD_BYTES} bytes)"
            )));
        }

        let stored_name = match extension {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        let path = std::path::Path::new(&state.config.upload_dir).join(&stored_name);

        tokio::fs::write(&path, &data).await.map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "Failed to persist upload");
            ApiError::Internal
        })?;

        let url = format!("{}/static/{stored_name}", state.config.public_url);

        tracing::info!(
            user_id = %auth_user.user_id,
            size = data.len(),
            file = %stored_name,
            "File uploaded"
        );

        return Ok((StatusCode::CREATED, Json(UploadResponse { url })));
    }

    Err(ApiError::BadRequest("Missing 'file' field".to_string()))
}

/// Keeps only a short alphanumeric extension from the client-supplied name
fn sanitized_extension(filename: &str) -> Option<String> {
    let ext = filename.rsplit_once('.')?.1;
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
