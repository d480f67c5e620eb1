//! Live connection sessions
//!
//! A `Session` is the registry's view of one WebSocket connection: an opaque
//! handle that can receive an event and report send failure. The actual socket
//! write happens in the session's own writer task (see `handler`), so sending
//! here is a non-blocking queue push and one slow peer never delays fan-out to
//! the others.

use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::Event;

/// One live real-time connection.
///
/// Owned by the delivery loop that drives it; the registry holds `Arc`
/// references for the duration of channel membership.
#[derive(Debug)]
pub struct Session {
    /// Unique ID for this connection, used for removal bookkeeping
    pub session_id: Uuid,

    /// Queue feeding this connection's writer task
    sender: mpsc::UnboundedSender<Event>,
}

impl Session {
    pub fn new(sender: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            sender,
        }
    }

    /// Create a session together with the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Queue an event for delivery to this connection.
    ///
    /// Fails only once the receiving delivery loop has gone away, which the
    /// registry treats as a terminal condition for the session.
    #[allow(clippy::result_large_err)] // SendError carries the undelivered event
    pub fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.sender.send(event)
    }
}
