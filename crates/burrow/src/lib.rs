//! # burrow
//!
//! A tick-driven multiplayer text adventure server.
//!
//! Players connect over WebSocket, register with `init`, and queue moves,
//! actions and chat lines. The world resolves at most one queued command
//! per entity on every tick and pushes the results back as JSON messages.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use burrow::BurrowServer;
//!
//! # async fn start() -> Result<(), burrow::BurrowError> {
//! let server = BurrowServer::builder()
//!     .bind("0.0.0.0:8765")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{MobSpawn, ServerConfig};
pub use error::BurrowError;
pub use server::{BurrowServer, BurrowServerBuilder};

/// Re-exports for servers and tests built on top of burrow.
pub mod prelude {
    pub use crate::{BurrowError, BurrowServer, BurrowServerBuilder, MobSpawn, ServerConfig};
    pub use burrow_protocol::{
        ClientRequest, Codec, EntityId, JsonCodec, PlayerSchema, RoomChange, RoomId,
        ServerMessage,
    };
    pub use burrow_tick::{TickConfig, TickPolicy};
    pub use burrow_world::{Command, GameHandle, MapRecord, WorldError};
}
