//! The session manager: who is connected, and how to reach them.
//!
//! Not thread-safe by itself. The server keeps it behind a mutex shared by
//! the connection handlers (register/remove) and the dispatcher (deliver).

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use burrow_protocol::{EntityId, ServerMessage};
use burrow_world::Recipient;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{Outbox, Session, SessionConfig, SessionError};

/// What happened to one [`SessionManager::deliver`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Outboxes the message was placed in.
    pub delivered: usize,
    /// Sessions dropped because their outbox was full.
    pub evicted: Vec<EntityId>,
    /// Sessions dropped because their writer had already gone away.
    pub closed: Vec<EntityId>,
}

/// Registry of connected players.
pub struct SessionManager {
    /// Keyed by player id; iteration follows registration order.
    sessions: BTreeMap<EntityId, Session>,
    usernames: HashMap<String, EntityId>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: BTreeMap::new(),
            usernames: HashMap::new(),
            config,
        }
    }

    /// Registers a session and returns its outbox.
    ///
    /// # Errors
    /// - [`SessionError::UsernameTaken`] if a connected player has the name
    /// - [`SessionError::AlreadyConnected`] if the id is already registered
    pub fn create(&mut self, player_id: EntityId, username: &str) -> Result<Outbox, SessionError> {
        if self.usernames.contains_key(username) {
            return Err(SessionError::UsernameTaken(username.to_owned()));
        }
        if self.sessions.contains_key(&player_id) {
            return Err(SessionError::AlreadyConnected(player_id));
        }

        let (tx, rx) = mpsc::channel(self.config.outbox_capacity.max(1));
        self.usernames.insert(username.to_owned(), player_id);
        self.sessions.insert(
            player_id,
            Session {
                player_id,
                username: username.to_owned(),
                connected_at: Instant::now(),
                outbox: tx,
            },
        );
        tracing::info!(%player_id, username, "session created");
        Ok(rx)
    }

    /// Drops a session. Its outbox closes once the returned value is
    /// dropped.
    pub fn remove(&mut self, player_id: EntityId) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        self.usernames.remove(&session.username);
        tracing::info!(%player_id, "session removed");
        Ok(session)
    }

    pub fn get(&self, player_id: EntityId) -> Option<&Session> {
        self.sessions.get(&player_id)
    }

    /// Looks up a connected player by name.
    pub fn find_by_username(&self, username: &str) -> Option<EntityId> {
        self.usernames.get(username).copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Places `message` in the outbox of every session `recipient` names.
    ///
    /// Never waits. A full outbox means the client is not keeping up: the
    /// session is evicted, which closes its outbox and ends the
    /// connection's writer. Recipients without a session are skipped.
    pub fn deliver(&mut self, recipient: &Recipient, message: &ServerMessage) -> DeliveryReport {
        let targets: Vec<EntityId> = match recipient {
            Recipient::All => self.sessions.keys().copied().collect(),
            Recipient::Player(id) => vec![*id],
            Recipient::Players(ids) => ids.clone(),
        };

        let mut report = DeliveryReport::default();
        for player_id in targets {
            let Some(session) = self.sessions.get(&player_id) else {
                continue;
            };
            match session.outbox.try_send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        %player_id,
                        capacity = self.config.outbox_capacity,
                        "outbox full, evicting slow client"
                    );
                    report.evicted.push(player_id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(%player_id, "outbox closed, dropping session");
                    report.closed.push(player_id);
                }
            }
        }

        for player_id in report.evicted.iter().chain(&report.closed) {
            let _ = self.remove(*player_id);
        }
        report
    }

    /// Sends one message to one player. Shorthand for
    /// `deliver(&Recipient::Player(id), message)`.
    pub fn send_to(&mut self, player_id: EntityId, message: &ServerMessage) -> bool {
        self.deliver(&Recipient::Player(player_id), message).delivered == 1
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> EntityId {
        EntityId(n)
    }

    #[test]
    fn test_create_and_remove() {
        let mut mgr = SessionManager::default();
        let _outbox = mgr.create(id(1), "xyf").unwrap();
        assert_eq!(mgr.len(), 1);
        assert_eq!(mgr.find_by_username("xyf"), Some(id(1)));
        assert_eq!(mgr.get(id(1)).unwrap().username, "xyf");

        let session = mgr.remove(id(1)).unwrap();
        assert_eq!(session.player_id, id(1));
        assert!(mgr.is_empty());
        assert_eq!(mgr.find_by_username("xyf"), None);
    }

    #[test]
    fn test_duplicate_username_is_rejected() {
        let mut mgr = SessionManager::default();
        let _outbox = mgr.create(id(1), "xyf").unwrap();
        let err = mgr.create(id(2), "xyf").unwrap_err();
        assert!(matches!(err, SessionError::UsernameTaken(name) if name == "xyf"));
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_name_is_free_again_after_remove() {
        let mut mgr = SessionManager::default();
        let _first = mgr.create(id(1), "xyf").unwrap();
        mgr.remove(id(1)).unwrap();
        assert!(mgr.create(id(2), "xyf").is_ok());
    }

    #[test]
    fn test_same_id_twice_is_rejected() {
        let mut mgr = SessionManager::default();
        let _outbox = mgr.create(id(1), "a").unwrap();
        assert!(matches!(
            mgr.create(id(1), "b"),
            Err(SessionError::AlreadyConnected(_))
        ));
        assert_eq!(mgr.find_by_username("b"), None);
    }

    #[test]
    fn test_remove_unknown() {
        let mut mgr = SessionManager::default();
        assert!(matches!(mgr.remove(id(9)), Err(SessionError::NotFound(_))));
    }
}
