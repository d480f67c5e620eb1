//! Integration tests for the ticket workflow against a live database
//!
//! ## Test Coverage
//! - Reputation recipient when a ticket transitions to solved
//! - Leaderboard ranking semantics
//!
//! ## Running Tests
//! ```bash
//! export DATABASE_URL="postgres://..."
//! cargo test --test ticket_workflow -- --ignored
//! ```

use axum::extract::{Extension, Path, State};
use axum::Json;
use helpdesk_api::auth::AuthUser;
use helpdesk_api::routes::{tickets, users};
use helpdesk_api::{AppState, Config};
use helpdesk_shared::{TicketStatus, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

// ============================================================================
// Test Utilities
// ============================================================================

async fn setup() -> AppState {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

    let pool = helpdesk_shared::create_pool(&database_url, 5)
        .await
        .expect("Failed to connect to test database");
    helpdesk_shared::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let config = Config {
        bind_address: "127.0.0.1:0".to_string(),
        public_url: "http://localhost:8000".to_string(),
        cors_origin: "http://localhost:3000".to_string(),
        database_url,
        database_max_connections: 5,
        jwt_secret: "integration-test-secret-at-least-32-chars".to_string(),
        jwt_expiry_hours: 1,
        upload_dir: "static".to_string(),
    };

    AppState::new(pool, config)
}

async fn create_user(pool: &PgPool, role: UserRole) -> AuthUser {
    let username = format!("user-{}", Uuid::new_v4());
    let user_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (username, password_hash, role) VALUES ($1, 'x', $2) RETURNING id",
    )
    .bind(&username)
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("Failed to insert user");

    AuthUser {
        user_id,
        username,
        role,
    }
}

async fn create_ticket(pool: &PgPool, owner_id: Uuid) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO tickets (title, description, owner_id) VALUES ('vpn down', 'no tunnel', $1) RETURNING id",
    )
    .bind(owner_id)
    .fetch_one(pool)
    .await
    .expect("Failed to insert ticket")
}

async fn reputation(pool: &PgPool, user_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT reputation FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("Failed to fetch reputation")
}

fn solve_request() -> tickets::UpdateTicketRequest {
    tickets::UpdateTicketRequest {
        title: None,
        description: None,
        priority: None,
        status: Some(TicketStatus::Solved),
        tags: None,
    }
}

// ============================================================================
// Reputation
// ============================================================================

#[tokio::test]
#[ignore] // Requires database
async fn solving_grants_reputation_to_the_solver() {
    let state = setup().await;
    let owner = create_user(&state.pool, UserRole::User).await;
    let admin = create_user(&state.pool, UserRole::Admin).await;
    let ticket_id = create_ticket(&state.pool, owner.user_id).await;

    let owner_before = reputation(&state.pool, owner.user_id).await;
    let admin_before = reputation(&state.pool, admin.user_id).await;

    // Admin resolves someone else's ticket
    tickets::update_ticket(
        State(state.clone()),
        Extension(admin.clone()),
        Path(ticket_id),
        Json(solve_request()),
    )
    .await
    .expect("Failed to update ticket");

    // The points go to whoever performed the solve, not the ticket owner
    assert_eq!(
        reputation(&state.pool, admin.user_id).await,
        admin_before + 20
    );
    assert_eq!(reputation(&state.pool, owner.user_id).await, owner_before);
}

#[tokio::test]
#[ignore] // Requires database
async fn re_solving_an_already_solved_ticket_grants_nothing() {
    let state = setup().await;
    let owner = create_user(&state.pool, UserRole::User).await;
    let ticket_id = create_ticket(&state.pool, owner.user_id).await;

    tickets::update_ticket(
        State(state.clone()),
        Extension(owner.clone()),
        Path(ticket_id),
        Json(solve_request()),
    )
    .await
    .expect("Failed to solve ticket");
    let after_first = reputation(&state.pool, owner.user_id).await;

    // Setting solved again is not a transition
    tickets::update_ticket(
        State(state.clone()),
        Extension(owner.clone()),
        Path(ticket_id),
        Json(solve_request()),
    )
    .await
    .expect("Failed to re-solve ticket");

    assert_eq!(reputation(&state.pool, owner.user_id).await, after_first);
}

// ============================================================================
// Leaderboard
// ============================================================================

#[tokio::test]
#[ignore] // Requires database
async fn leaderboard_ranks_by_reputation_regardless_of_activity() {
    let state = setup().await;
    let dormant = create_user(&state.pool, UserRole::User).await;

    // Make the deactivated account the top scorer
    let top: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(reputation), 0) FROM users")
        .fetch_one(&state.pool)
        .await
        .expect("Failed to fetch max reputation");
    sqlx::query("UPDATE users SET reputation = $2, is_active = FALSE WHERE id = $1")
        .bind(dormant.user_id)
        .bind(top + 1)
        .execute(&state.pool)
        .await
        .expect("Failed to update user");

    let Json(entries) = users::leaderboard(State(state.clone()))
        .await
        .expect("Failed to fetch leaderboard");

    // Deactivated accounts keep their standing
    assert_eq!(entries.first().map(|e| e.id), Some(dormant.user_id));
}
