//! API routes

pub mod auth;
pub mod health;
pub mod notifications;
pub mod tickets;
pub mod uploads;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{auth::require_auth, realtime, state::AppState};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public API routes (no auth required) - under /api/v1
    let public_api_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/leaderboard", get(users::leaderboard))
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/:ticket_id", get(tickets::get_ticket))
        .route("/tickets/:ticket_id/comments", get(tickets::list_comments));

    // Protected API routes (auth required) - under /api/v1
    let protected_api_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/me", patch(auth::update_me))
        .route("/tickets", post(tickets::create_ticket))
        .route("/tickets/:ticket_id", patch(tickets::update_ticket))
        .route("/tickets/:ticket_id/comments", post(tickets::create_comment))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/:notification_id/read", post(notifications::mark_notification_read))
        .route("/uploads", post(uploads::upload_file))
        // Admin user management (role check inside handlers)
        .route("/users", get(users::list_users))
        .route("/users/bulk-delete", post(users::bulk_delete_users))
        .route("/users/:user_id", delete(users::delete_user))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // WebSocket routes (auth handled in handler via query parameter)
    let websocket_routes = Router::new()
        .route("/ws/tickets/:ticket_id", get(realtime::ticket_ws_handler))
        .route("/ws/notifications", get(realtime::notifications_ws_handler));

    // Combine API routes under /api/v1 prefix
    let api_v1_routes = Router::new()
        .merge(public_api_routes)
        .merge(protected_api_routes);

    let cors = cors_layer(&state.config.cors_origin);

    Router::new()
        .merge(health_routes)
        .merge(websocket_routes)
        .nest("/api/v1", api_v1_routes)
        .nest_service("/static", ServeDir::new(&state.config.upload_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Global request body size limit; uploads are capped separately
        .layer(DefaultBodyLimit::max(12 * 1024 * 1024))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            tracing::warn!(origin = %origin, "Invalid CORS origin, allowing none");
            layer
        }
    }
}
