//! The server's record of one connected player.

use std::time::Instant;

use burrow_protocol::{EntityId, ServerMessage};
use tokio::sync::mpsc;

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Messages that may wait in a session's outbox before the client is
    /// considered stalled and evicted.
    pub outbox_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 256,
        }
    }
}

/// Receiving end of a session's outbox, drained by the connection's writer.
pub type Outbox = mpsc::Receiver<ServerMessage>;

/// A connected player.
#[derive(Debug)]
pub struct Session {
    pub player_id: EntityId,
    pub username: String,
    pub connected_at: Instant,
    pub(crate) outbox: mpsc::Sender<ServerMessage>,
}

impl Session {
    /// Messages currently waiting in the outbox.
    pub fn queued(&self) -> usize {
        self.outbox.max_capacity() - self.outbox.capacity()
    }
}
