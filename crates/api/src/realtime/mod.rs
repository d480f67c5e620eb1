//! Real-time event distribution for ticket collaboration
//!
//! Fans domain events out to live WebSocket sessions across two independent
//! addressing schemes:
//!
//! - **Room channels**: one per ticket, for everyone viewing that ticket's
//!   discussion thread.
//! - **Identity channels**: one per user, for personal notifications across
//!   all of that user's open tabs.
//!
//! # Architecture
//!
//! - **Session**: one live WebSocket connection, reachable through a queue
//! - **Registry**: the two channel maps with join/leave/publish operations
//! - **Handler**: Axum WebSocket route handlers and the per-session delivery loop
//! - **Events**: the closed set of wire events (`chat`, `notification`)

pub mod events;
pub mod handler;
pub mod registry;
pub mod session;

pub use events::Event;
pub use handler::{notifications_ws_handler, ticket_ws_handler};
pub use registry::ChannelRegistry;
pub use session::Session;
