//! The game actor: a Tokio task that owns the [`Game`] and drives its ticks.
//!
//! Connection handlers never touch the game directly. They send commands
//! through a [`GameHandle`]; the actor applies them between ticks, so a
//! tick always sees a world nobody else is changing.

use burrow_protocol::EntityId;
use burrow_tick::{TickConfig, TickScheduler};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::entity::{Command, Player};
use crate::{Game, WorldError};

/// Requests the actor accepts.
enum GameCommand {
    Register {
        player: Player,
        x: i32,
        y: i32,
        reply: oneshot::Sender<bool>,
    },
    Enqueue {
        player: EntityId,
        command: Command,
        reply: oneshot::Sender<Result<bool, WorldError>>,
    },
    Revive {
        player: EntityId,
        x: i32,
        y: i32,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        player: EntityId,
    },
    /// Run one tick now and reply with its number.
    Step {
        reply: oneshot::Sender<u64>,
    },
    Shutdown,
}

/// Cloneable handle to a running game actor.
#[derive(Clone)]
pub struct GameHandle {
    sender: mpsc::Sender<GameCommand>,
}

impl GameHandle {
    /// Adds a player at `(x, y)`. See [`Game::add_player`].
    pub async fn register(&self, player: Player, x: i32, y: i32) -> Result<bool, WorldError> {
        let (reply, rx) = oneshot::channel();
        self.send(GameCommand::Register {
            player,
            x,
            y,
            reply,
        })
        .await?;
        rx.await.map_err(|_| WorldError::Unavailable)
    }

    /// Queues a command for a player. See [`Game::enqueue`].
    pub async fn enqueue(&self, player: EntityId, command: Command) -> Result<bool, WorldError> {
        let (reply, rx) = oneshot::channel();
        self.send(GameCommand::Enqueue {
            player,
            command,
            reply,
        })
        .await?;
        rx.await.map_err(|_| WorldError::Unavailable)?
    }

    /// Revives a dead player at `(x, y)`. See [`Game::revive_player`].
    pub async fn revive(&self, player: EntityId, x: i32, y: i32) -> Result<bool, WorldError> {
        let (reply, rx) = oneshot::channel();
        self.send(GameCommand::Revive {
            player,
            x,
            y,
            reply,
        })
        .await?;
        rx.await.map_err(|_| WorldError::Unavailable)
    }

    /// Takes a player out of the world (fire-and-forget).
    pub async fn remove(&self, player: EntityId) -> Result<(), WorldError> {
        self.send(GameCommand::Remove { player }).await
    }

    /// Runs one tick immediately, regardless of the schedule.
    pub async fn step(&self) -> Result<u64, WorldError> {
        let (reply, rx) = oneshot::channel();
        self.send(GameCommand::Step { reply }).await?;
        rx.await.map_err(|_| WorldError::Unavailable)
    }

    /// Stops the actor once the current tick, if any, has finished.
    pub async fn shutdown(&self) -> Result<(), WorldError> {
        self.send(GameCommand::Shutdown).await
    }

    async fn send(&self, cmd: GameCommand) -> Result<(), WorldError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| WorldError::Unavailable)
    }
}

/// Spawns the game actor.
///
/// The returned task resolves to the [`Game`] after shutdown, or once every
/// handle has been dropped.
pub fn spawn_game(
    game: Game,
    tick: TickConfig,
    channel_size: usize,
) -> (GameHandle, JoinHandle<Game>) {
    let (sender, receiver) = mpsc::channel(channel_size);
    let scheduler = TickScheduler::new(tick);
    let task = tokio::spawn(run(game, scheduler, receiver));
    (GameHandle { sender }, task)
}

async fn run(
    mut game: Game,
    mut scheduler: TickScheduler,
    mut commands: mpsc::Receiver<GameCommand>,
) -> Game {
    tracing::info!(
        tick_rate_hz = scheduler.tick_rate_hz(),
        rooms = game.graph().len(),
        "game loop started"
    );

    loop {
        tokio::select! {
            cmd = commands.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    GameCommand::Register { player, x, y, reply } => {
                        let _ = reply.send(game.add_player(player, x, y));
                    }
                    GameCommand::Enqueue { player, command, reply } => {
                        let _ = reply.send(game.enqueue(player, command));
                    }
                    GameCommand::Revive { player, x, y, reply } => {
                        let _ = reply.send(game.revive_player(player, x, y));
                    }
                    GameCommand::Remove { player } => {
                        game.remove_player(player);
                    }
                    GameCommand::Step { reply } => {
                        game.tick();
                        let _ = reply.send(game.tick_count());
                    }
                    GameCommand::Shutdown => break,
                }
            }
            _ = scheduler.wait_for_tick() => {
                game.tick();
                scheduler.record_tick_end();
            }
        }
    }

    tracing::info!(ticks = game.tick_count(), "game loop stopped");
    game
}
