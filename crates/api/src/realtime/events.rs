//! Wire event types for real-time delivery
//!
//! The event set is deliberately closed: delivery code and serialization stay
//! exhaustive and type-checked, and adding a kind is a compile-visible change.

use helpdesk_shared::UserRole;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// An event published to a channel.
///
/// Immutable once constructed; cloned per recipient during fan-out.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new comment on a ticket, broadcast to the ticket's room channel
    Chat {
        /// Comment ID
        id: Uuid,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        attachment_url: Option<String>,
        #[serde(with = "time::serde::rfc3339")]
        created_at: OffsetDateTime,
        author_name: String,
        author_role: UserRole,
    },

    /// A personal notification, delivered to the recipient's identity channel
    Notification { content: String, link: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_chat_event_wire_shape() {
        let event = Event::Chat {
            id: Uuid::nil(),
            content: "restarting the node fixed it".to_string(),
            attachment_url: None,
            created_at: datetime!(2024-06-01 12:30:00 UTC),
            author_name: "sam".to_string(),
            author_role: UserRole::Manager,
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "chat");
        assert_eq!(json["author_name"], "sam");
        assert_eq!(json["author_role"], "manager");
        assert_eq!(json["created_at"], "2024-06-01T12:30:00Z");
        // Absent attachment is omitted, not null
        assert!(json.get("attachment_url").is_none());
    }

    #[test]
    fn test_notification_event_wire_shape() {
        let event = Event::Notification {
            content: "sam commented on your ticket: VPN down".to_string(),
            link: "/dashboard/tickets/42".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"notification""#));
        assert!(json.contains(r#""link":"/dashboard/tickets/42""#));
    }
}
