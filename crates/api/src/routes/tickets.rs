//! Ticket and comment routes
//!
//! Comment creation is the event source for the real-time layer: once the
//! comment row is committed, the ticket owner gets a committed-then-pushed
//! notification on their identity channel (unless they authored the comment
//! themselves) and the comment is broadcast to the ticket's room channel.
//! Persistence always happens-before the matching publish, so a client
//! reacting to a live event can immediately re-fetch and observe the record.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use helpdesk_shared::{TicketPriority, TicketStatus, UserRole};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    realtime::Event,
    state::AppState,
};

// Reputation grants
const REPUTATION_TICKET_CREATED: i32 = 10;
const REPUTATION_COMMENT_POSTED: i32 = 5;
const REPUTATION_TICKET_SOLVED: i32 = 20;

// Input caps
const MAX_TITLE_LENGTH: usize = 500;
const MAX_BODY_LENGTH: usize = 50_000;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: TicketPriority,
    #[serde(default)]
    pub tags: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    /// Free-text search over title and description
    pub q: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub attachment_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub tags: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub owner_id: Option<Uuid>,
    pub owner_name: String,
    pub owner_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub content: String,
    pub attachment_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author_name: String,
    pub author_role: UserRole,
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct TicketRow {
    id: Uuid,
    title: String,
    description: String,
    priority: TicketPriority,
    status: TicketStatus,
    tags: String,
    created_at: OffsetDateTime,
    owner_id: Option<Uuid>,
    owner_name: Option<String>,
    owner_email: Option<String>,
}

impl From<TicketRow> for TicketResponse {
    fn from(row: TicketRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            priority: row.priority,
            status: row.status,
            tags: row.tags,
            created_at: row.created_at,
            owner_id: row.owner_id,
            owner_name: row.owner_name.unwrap_or_else(|| "Unknown".to_string()),
            owner_email: row.owner_email,
        }
    }
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: Uuid,
    content: String,
    attachment_url: Option<String>,
    created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct CommentWithAuthorRow {
    id: Uuid,
    content: String,
    attachment_url: Option<String>,
    created_at: OffsetDateTime,
    author_name: Option<String>,
    author_role: Option<UserRole>,
}

impl From<CommentWithAuthorRow> for CommentResponse {
    fn from(row: CommentWithAuthorRow) -> Self {
        Self {
            id: row.id,
            content: row.content,
            attachment_url: row.attachment_url,
            created_at: row.created_at,
            author_name: row.author_name.unwrap_or_else(|| "Unknown".to_string()),
            author_role: row.author_role.unwrap_or(UserRole::User),
        }
    }
}

const TICKET_COLUMNS: &str = r#"
    t.id, t.title, t.description, t.priority, t.status, t.tags, t.created_at,
    t.owner_id, u.username AS owner_name, u.email AS owner_email
"#;

// =============================================================================
// Ticket Handlers
// =============================================================================

/// Create a new ticket; the creator becomes its owner
pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateTicketRequest>,
) -> ApiResult<(StatusCode, Json<TicketResponse>)> {
    validate_text("Title", &req.title, MAX_TITLE_LENGTH)?;
    validate_text("Description", &req.description, MAX_BODY_LENGTH)?;

    let ticket_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO tickets (title, description, priority, tags, owner_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(req.title.trim())
    .bind(req.description.trim())
    .bind(req.priority)
    .bind(&req.tags)
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    grant_reputation(&state, auth_user.user_id, REPUTATION_TICKET_CREATED).await?;

    let ticket = fetch_ticket(&state, ticket_id).await?;

    tracing::info!(ticket_id = %ticket_id, owner_id = %auth_user.user_id, "Ticket created");

    Ok((StatusCode::CREATED, Json(ticket.into())))
}

/// List tickets with optional filters
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<ListTicketsQuery>,
) -> ApiResult<Json<Vec<TicketResponse>>> {
    let search = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let tickets: Vec<TicketRow> = sqlx::query_as(&format!(
        r#"
        SELECT {TICKET_COLUMNS}
        FROM tickets t
        LEFT JOIN users u ON u.id = t.owner_id
        WHERE ($1::text IS NULL OR t.title ILIKE '%' || $1 || '%' OR t.description ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR t.status = $2)
          AND ($3::text IS NULL OR t.priority = $3)
          AND ($4::uuid IS NULL OR t.owner_id = $4)
        ORDER BY t.created_at DESC
        "#
    ))
    .bind(search)
    .bind(query.status.map(|s| s.as_str()))
    .bind(query.priority.map(|p| p.as_str()))
    .bind(query.owner_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(tickets.into_iter().map(Into::into).collect()))
}

/// Fetch a single ticket
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> ApiResult<Json<TicketResponse>> {
    let ticket = fetch_ticket(&state, ticket_id).await?;
    Ok(Json(ticket.into()))
}

/// Update a ticket; only the owner or an admin may manage it
pub async fn update_ticket(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(ticket_id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> ApiResult<Json<TicketResponse>> {
    let current = fetch_ticket(&state, ticket_id).await?;

    if !auth_user.is_admin() && current.owner_id != Some(auth_user.user_id) {
        return Err(ApiError::Forbidden);
    }

    // Solving a ticket earns the solver reputation, once per open->solved transition
    let newly_solved =
        req.status == Some(TicketStatus::Solved) && current.status != TicketStatus::Solved;

    sqlx::query(
        r#"
        UPDATE tickets
        SET title = COALESCE($2, title),
            description = COALESCE($3, description),
            priority = COALESCE($4, priority),
            status = COALESCE($5, status),
            tags = COALESCE($6, tags)
        WHERE id = $1
        "#,
    )
    .bind(ticket_id)
    .bind(req.title.as_deref().map(str::trim))
    .bind(req.description.as_deref().map(str::trim))
    .bind(req.priority)
    .bind(req.status)
    .bind(&req.tags)
    .execute(&state.pool)
    .await?;

    if newly_solved {
        grant_reputation(&state, auth_user.user_id, REPUTATION_TICKET_SOLVED).await?;
        tracing::info!(ticket_id = %ticket_id, by = %auth_user.user_id, "Ticket marked solved");
    }

    let ticket = fetch_ticket(&state, ticket_id).await?;
    Ok(Json(ticket.into()))
}

// =============================================================================
// Comment Handlers
// =============================================================================

/// List a ticket's comments, oldest first
pub async fn list_comments(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    let comments: Vec<CommentWithAuthorRow> = sqlx::query_as(
        r#"
        SELECT c.id, c.content, c.attachment_url, c.created_at,
               u.username AS author_name, u.role AS author_role
        FROM comments c
        LEFT JOIN users u ON u.id = c.author_id
        WHERE c.ticket_id = $1
        ORDER BY c.created_at ASC
        "#,
    )
    .bind(ticket_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

/// Post a comment on a ticket
///
/// Workflow contract: commit the comment, then (for comments by anyone other
/// than the owner) commit a notification and push it to the owner's identity
/// channel, and finally broadcast the comment to the ticket's room. A failed
/// commit aborts before the corresponding publish is reached; publishes
/// themselves never fail the request.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(ticket_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    validate_text("Content", &req.content, MAX_BODY_LENGTH)?;

    let ticket = fetch_ticket(&state, ticket_id).await?;

    let comment: CommentRow = sqlx::query_as(
        r#"
        INSERT INTO comments (content, attachment_url, ticket_id, author_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, content, attachment_url, created_at
        "#,
    )
    .bind(req.content.trim())
    .bind(&req.attachment_url)
    .bind(ticket_id)
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    grant_reputation(&state, auth_user.user_id, REPUTATION_COMMENT_POSTED).await?;

    // Notify the owner, unless they commented on their own ticket
    if let Some(owner_id) = ticket.owner_id {
        if owner_id != auth_user.user_id {
            let content = format!(
                "{} commented on your ticket: {}",
                auth_user.username, ticket.title
            );
            let link = format!("/dashboard/tickets/{ticket_id}");

            sqlx::query(
                "INSERT INTO notifications (recipient_id, content, link) VALUES ($1, $2, $3)",
            )
            .bind(owner_id)
            .bind(&content)
            .bind(&link)
            .execute(&state.pool)
            .await?;

            state
                .registry
                .publish_identity(&owner_id, Event::Notification { content, link })
                .await;
        }
    }

    // Comment is durable; every live viewer of the ticket sees it now
    state
        .registry
        .publish_room(
            &ticket_id,
            Event::Chat {
                id: comment.id,
                content: comment.content.clone(),
                attachment_url: comment.attachment_url.clone(),
                created_at: comment.created_at,
                author_name: auth_user.username.clone(),
                author_role: auth_user.role,
            },
        )
        .await;

    tracing::info!(
        ticket_id = %ticket_id,
        comment_id = %comment.id,
        author_id = %auth_user.user_id,
        "Comment posted"
    );

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id: comment.id,
            content: comment.content,
            attachment_url: comment.attachment_url,
            created_at: comment.created_at,
            author_name: auth_user.username,
            author_role: auth_user.role,
        }),
    ))
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_ticket(state: &AppState, ticket_id: Uuid) -> Result<TicketRow, ApiError> {
    let ticket: Option<TicketRow> = sqlx::query_as(&format!(
        r#"
        SELECT {TICKET_COLUMNS}
        FROM tickets t
        LEFT JOIN users u ON u.id = t.owner_id
        WHERE t.id = $1
        "#
    ))
    .bind(ticket_id)
    .fetch_optional(&state.pool)
    .await?;

    ticket.ok_or(ApiError::NotFound)
}

async fn grant_reputation(state: &AppState, user_id: Uuid, amount: i32) -> Result<(), ApiError> {
    sqlx::query("UPDATE users SET reputation = reputation + $2 WHERE id = $1")
        .bind(user_id)
        .bind(amount)
        .execute(&state.pool)
        .await?;
    Ok(())
}

fn validate_text(field: &str, value: &str, max_len: usize) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} cannot be empty")));
    }
    if value.len() > max_len {
        return Err(ApiError::BadRequest(format!(
            "{field} too long (max {max_len} characters)"
        )));
    }
    Ok(())
}
