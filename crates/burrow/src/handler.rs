//! Per-connection handler: registration, then request routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Wait for `init` and register the player at the spawn point
//!   2. Start a writer task draining the session's outbox into the socket
//!   3. Loop: receive requests and queue them as game commands
//!   4. On close, idle timeout or eviction, take the player out of the world

use std::sync::Arc;

use burrow_protocol::{
    ClientRequest, Codec, EntityId, ProtocolError, ServerMessage, decode_request,
};
use burrow_session::{Outbox, SessionError};
use burrow_transport::{Accepted, Inbound, Outbound, WebSocketInbound, WebSocketOutbound};
use burrow_world::{Command, Player, default_player_actions};

use crate::BurrowError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: Accepted<WebSocketInbound, WebSocketOutbound>,
    state: Arc<ServerState>,
) -> Result<(), BurrowError> {
    let Accepted {
        id: conn_id,
        peer,
        mut inbound,
        mut outbound,
    } = conn;
    tracing::debug!(%conn_id, %peer, "handling new connection");

    let Some((player_id, outbox)) = register(&mut inbound, &mut outbound, &state).await? else {
        let _ = outbound.close().await;
        return Ok(());
    };
    tracing::info!(%conn_id, %player_id, "player registered");

    let mut writer = tokio::spawn(write_loop(outbound, outbox, state.codec));

    let result = loop {
        tokio::select! {
            _ = &mut writer => {
                tracing::info!(%player_id, "outbox closed, dropping connection");
                break Ok(());
            }
            frame = tokio::time::timeout(state.idle_timeout, inbound.recv()) => {
                let text = match frame {
                    Ok(Ok(Some(text))) => text,
                    Ok(Ok(None)) => {
                        tracing::info!(%player_id, "connection closed cleanly");
                        break Ok(());
                    }
                    Ok(Err(e)) => break Err(BurrowError::from(e)),
                    Err(_) => {
                        tracing::info!(%player_id, "connection idle, dropping");
                        break Ok(());
                    }
                };
                if let Err(e) = handle_request(&state, player_id, &text).await {
                    break Err(e);
                }
            }
        }
    };

    // Removing the session drops the outbox sender, so the writer flushes
    // and closes the socket on its own.
    if let Err(e) = state.game.remove(player_id).await {
        tracing::debug!(%player_id, error = %e, "game already stopped");
    }
    let _ = state.sessions.lock().await.remove(player_id);
    tracing::info!(%player_id, "player disconnected");
    result
}

/// Reads frames until a valid `init` registers a player.
///
/// Returns `None` if the client leaves, idles out or registration cannot
/// complete.
async fn register(
    inbound: &mut WebSocketInbound,
    outbound: &mut WebSocketOutbound,
    state: &ServerState,
) -> Result<Option<(EntityId, Outbox)>, BurrowError> {
    loop {
        let text = match tokio::time::timeout(state.idle_timeout, inbound.recv()).await {
            Ok(Ok(Some(text))) => text,
            Ok(Ok(None)) | Err(_) => return Ok(None),
            Ok(Err(e)) => return Err(e.into()),
        };

        let username = match decode_request(&text) {
            Ok(ClientRequest::Init { username }) => username,
            Ok(other) => {
                tracing::debug!(kind = other.kind(), "request before init");
                send_direct(outbound, state, &ServerMessage::action_response("Send init first."))
                    .await?;
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected client frame");
                send_direct(outbound, state, &rejection(&e)).await?;
                continue;
            }
        };

        let username = username.trim();
        if username.is_empty() {
            send_direct(
                outbound,
                state,
                &ServerMessage::action_response("Username must not be empty."),
            )
            .await?;
            continue;
        }

        let player = Player::new(username, default_player_actions());
        let player_id = player.id();
        let schema = player.schema();

        let outbox = {
            let mut sessions = state.sessions.lock().await;
            match sessions.create(player_id, username) {
                Ok(outbox) => {
                    let welcome = ServerMessage::RegistrationSuccessful { player: schema };
                    sessions.send_to(player_id, &welcome);
                    outbox
                }
                Err(e @ SessionError::UsernameTaken(_)) => {
                    drop(sessions);
                    tracing::debug!(error = %e, "registration refused");
                    send_direct(
                        outbound,
                        state,
                        &ServerMessage::action_response(format!("Username {username:?} is taken.")),
                    )
                    .await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let (x, y) = state.spawn;
        if !state.game.register(player, x, y).await? {
            tracing::warn!(%player_id, x, y, "spawn point rejected player");
            let _ = state.sessions.lock().await.remove(player_id);
            return Ok(None);
        }
        return Ok(Some((player_id, outbox)));
    }
}

/// Turns one request from a registered player into a game command.
async fn handle_request(
    state: &ServerState,
    player_id: EntityId,
    text: &str,
) -> Result<(), BurrowError> {
    let request = match decode_request(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(%player_id, error = %e, "rejected client frame");
            reply(state, player_id, rejection(&e)).await;
            return Ok(());
        }
    };
    tracing::debug!(%player_id, kind = request.kind(), "request");

    let command = match request {
        ClientRequest::Init { .. } => {
            let (x, y) = state.spawn;
            if !state.game.revive(player_id, x, y).await? {
                reply(state, player_id, ServerMessage::action_response("You are already here.")).await;
            }
            return Ok(());
        }
        ClientRequest::Chat { chat_message, .. } => Command::chat(chat_message),
        ClientRequest::Move { direction, player } => {
            if player != player_id {
                return reject_impersonation(state, player_id, player).await;
            }
            Command::movement(direction)
        }
        ClientRequest::Action {
            action,
            player,
            target,
        } => {
            if player != player_id {
                return reject_impersonation(state, player_id, player).await;
            }
            Command::action(action, target)
        }
    };

    state.game.enqueue(player_id, command).await?;
    Ok(())
}

async fn reject_impersonation(
    state: &ServerState,
    player_id: EntityId,
    claimed: EntityId,
) -> Result<(), BurrowError> {
    tracing::warn!(%player_id, %claimed, "request for another player");
    reply(
        state,
        player_id,
        ServerMessage::action_response("You can only act for yourself."),
    )
    .await;
    Ok(())
}

fn rejection(error: &ProtocolError) -> ServerMessage {
    match error {
        ProtocolError::UnknownMessageType(kind) => {
            ServerMessage::action_response(format!("Unknown message type {kind:?}."))
        }
        _ => ServerMessage::action_response("Malformed request."),
    }
}

/// Queues a message in the player's own outbox.
async fn reply(state: &ServerState, player_id: EntityId, message: ServerMessage) {
    state.sessions.lock().await.send_to(player_id, &message);
}

/// Writes straight to the socket. Only used before the writer task exists.
async fn send_direct(
    outbound: &mut WebSocketOutbound,
    state: &ServerState,
    message: &ServerMessage,
) -> Result<(), BurrowError> {
    let text = state.codec.encode(message)?;
    outbound.send(text).await?;
    Ok(())
}

/// Drains the outbox into the socket until the session is dropped or the
/// peer stops accepting frames.
async fn write_loop(mut outbound: WebSocketOutbound, mut outbox: Outbox, codec: impl Codec) {
    while let Some(message) = outbox.recv().await {
        let text = match codec.encode(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, kind = message.kind(), "encode failed");
                continue;
            }
        };
        if let Err(e) = outbound.send(text).await {
            tracing::debug!(error = %e, "send failed, stopping writer");
            return;
        }
    }
    let _ = outbound.close().await;
}
