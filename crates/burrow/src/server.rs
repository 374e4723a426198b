//! `BurrowServer` builder and server loop.
//!
//! Ties the layers together: transport, then protocol, then session, then
//! the game actor. Outbound events take the other way round through the
//! dispatcher task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use burrow_protocol::JsonCodec;
use burrow_session::SessionManager;
use burrow_tick::TickConfig;
use burrow_transport::{PendingConnection, Transport, WebSocketTransport};
use burrow_world::{
    EventReceiver, Game, GameHandle, MapRecord, Mob, RoomGraph, WorldError, spawn_game,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::handler::handle_connection;
use crate::{BurrowError, MobSpawn, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) game: GameHandle,
    pub(crate) codec: JsonCodec,
    pub(crate) spawn: (i32, i32),
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a burrow server.
///
/// # Example
///
/// ```rust,ignore
/// let server = BurrowServer::builder()
///     .bind("0.0.0.0:8765")
///     .tick_rate(4)
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct BurrowServerBuilder {
    config: ServerConfig,
}

impl BurrowServerBuilder {
    /// Creates a builder with [`ServerConfig::default`].
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_owned();
        self
    }

    /// Ticks per second. 0 means the game only advances through
    /// [`GameHandle::step`].
    pub fn tick_rate(mut self, hz: u32) -> Self {
        self.config.tick = TickConfig {
            tick_rate_hz: hz,
            ..self.config.tick
        };
        self
    }

    pub fn tick_config(mut self, tick: TickConfig) -> Self {
        self.config.tick = tick;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn outbox_capacity(mut self, capacity: usize) -> Self {
        self.config.session.outbox_capacity = capacity;
        self
    }

    pub fn spawn(mut self, x: i32, y: i32) -> Self {
        self.config.spawn = (x, y);
        self
    }

    pub fn map(mut self, records: Vec<MapRecord>) -> Self {
        self.config.map = Some(records);
        self
    }

    /// Adds a mob to the startup list.
    pub fn mob(mut self, mob: MobSpawn) -> Self {
        self.config.mobs.push(mob);
        self
    }

    /// Clears the startup mob list.
    pub fn no_mobs(mut self) -> Self {
        self.config.mobs.clear();
        self
    }

    /// Builds the world, binds the listener and starts the game loop.
    ///
    /// # Errors
    /// Any configuration problem (unknown room type, spawn point or mob
    /// outside walkable rooms) and bind failures.
    pub async fn build(self) -> Result<BurrowServer, BurrowError> {
        let ServerConfig {
            bind_addr,
            tick,
            idle_timeout,
            handshake_timeout,
            session,
            spawn,
            map,
            mobs,
            command_channel_size,
        } = self.config;

        let records = match map {
            Some(records) => records,
            None => MapRecord::default_map()?,
        };
        let (mut game, events) = Game::new(RoomGraph::build(&records)?);

        let (sx, sy) = spawn;
        match game.room_at(sx, sy) {
            None => return Err(WorldError::NoRoomAt(sx, sy).into()),
            Some(room) if !room.walkable() => return Err(WorldError::NotWalkable(sx, sy).into()),
            Some(_) => {}
        }
        for mob in &mobs {
            let id = game.add_mob(
                Mob::new(mob.name.clone(), mob.actions.iter().cloned(), mob.health),
                mob.x,
                mob.y,
            )?;
            tracing::debug!(mob_id = %id, name = %mob.name, x = mob.x, y = mob.y, "mob spawned");
        }
        tracing::info!(rooms = game.graph().len(), mobs = mobs.len(), "world built");

        let transport = WebSocketTransport::bind(&bind_addr)
            .await?
            .with_handshake_timeout(handshake_timeout);
        let (handle, game_task) = spawn_game(game, tick, command_channel_size.max(1));

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(session)),
            game: handle,
            codec: JsonCodec,
            spawn,
            idle_timeout,
        });
        let dispatcher = tokio::spawn(dispatch(events, Arc::clone(&state)));

        Ok(BurrowServer {
            transport,
            state,
            game_task,
            dispatcher,
        })
    }
}

impl Default for BurrowServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A burrow server with its game loop already running.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct BurrowServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
    game_task: JoinHandle<Game>,
    dispatcher: JoinHandle<()>,
}

impl BurrowServer {
    pub fn builder() -> BurrowServerBuilder {
        BurrowServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the running game.
    pub fn game(&self) -> GameHandle {
        self.state.game.clone()
    }

    /// Accepts connections until the process is terminated.
    pub async fn run(self) -> Result<(), BurrowError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves, then stops the game
    /// loop after its current tick and waits for it.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), BurrowError> {
        tracing::info!(addr = ?self.local_addr().ok(), "burrow server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let conn_id = pending.id();
                            let conn = match pending.upgrade().await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    tracing::debug!(%conn_id, error = %e, "handshake failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(%conn_id, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutting down");
        if let Err(e) = self.state.game.shutdown().await {
            tracing::debug!(error = %e, "game loop already stopped");
        }
        let game = self.game_task.await?;
        tracing::info!(
            ticks = game.tick_count(),
            players = game.players().count(),
            "game loop finished"
        );
        // The outbound queue closes with the game; the dispatcher flushes
        // what is left and exits.
        drop(game);
        self.dispatcher.await?;
        Ok(())
    }
}

/// Drains the game's outbound queue into session outboxes.
async fn dispatch(mut events: EventReceiver, state: Arc<ServerState>) {
    while let Some(event) = events.recv().await {
        let report = state
            .sessions
            .lock()
            .await
            .deliver(&event.recipient, &event.message);
        tracing::trace!(
            tick = event.tick,
            kind = event.message.kind(),
            delivered = report.delivered,
            "event dispatched"
        );
        for player_id in report.evicted {
            tracing::info!(%player_id, "slow client evicted");
        }
    }
    tracing::debug!("dispatcher stopped");
}
