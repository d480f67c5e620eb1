//! Helpdesk API Library
//!
//! This crate contains the API server components for Helpdesk: the HTTP
//! surface for tickets, comments, users and notifications, and the real-time
//! event distribution core that pushes comment and notification events to
//! live WebSocket sessions.

pub mod auth;
pub mod config;
pub mod error;
pub mod realtime;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use realtime::{ChannelRegistry, Event, Session};
pub use state::AppState;
