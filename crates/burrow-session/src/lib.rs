//! Player sessions for burrow.
//!
//! A session exists from a successful `init` until the connection ends. It
//! ties a player entity to a username and to a bounded outbox that the
//! connection's writer task drains. The game never talks to sockets; the
//! dispatcher hands each outbound event to [`SessionManager::deliver`],
//! which routes it by [`Recipient`](burrow_world::Recipient).

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::{DeliveryReport, SessionManager};
pub use session::{Outbox, Session, SessionConfig};
