//! Server configuration.

use std::time::Duration;

use burrow_session::SessionConfig;
use burrow_tick::TickConfig;
use burrow_world::MapRecord;

/// A mob placed in the world at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobSpawn {
    pub name: String,
    pub actions: Vec<String>,
    pub health: u32,
    pub x: i32,
    pub y: i32,
}

impl MobSpawn {
    pub fn new(name: impl Into<String>, health: u32, x: i32, y: i32) -> Self {
        Self {
            name: name.into(),
            actions: vec!["bite".to_owned()],
            health,
            x,
            y,
        }
    }

    /// Replaces the mob's permitted actions.
    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }
}

/// Everything needed to start a server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick: TickConfig,
    /// A connection that sends nothing for this long is dropped.
    pub idle_timeout: Duration,
    /// A peer that has not finished the WebSocket upgrade after this long
    /// is dropped.
    pub handshake_timeout: Duration,
    pub session: SessionConfig,
    /// Where new and revived players appear.
    pub spawn: (i32, i32),
    /// Map records. `None` uses the map embedded in `burrow-world`.
    pub map: Option<Vec<MapRecord>>,
    pub mobs: Vec<MobSpawn>,
    /// Capacity of the game actor's command channel.
    pub command_channel_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8765".to_owned(),
            tick: TickConfig::default(),
            idle_timeout: Duration::from_secs(300),
            handshake_timeout: Duration::from_secs(10),
            session: SessionConfig::default(),
            spawn: (1, 1),
            map: None,
            mobs: vec![
                MobSpawn::new("spider", 12, 2, 2).actions(["bite", "spit"]),
                MobSpawn::new("anta", 6, 4, 3).actions(["sting"]),
            ],
            command_channel_size: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8765");
        assert_eq!(cfg.tick.tick_rate_hz, 2);
        assert_eq!(cfg.idle_timeout, Duration::from_secs(300));
        assert_eq!(cfg.handshake_timeout, Duration::from_secs(10));
        assert_eq!(cfg.session.outbox_capacity, 256);
        assert_eq!(cfg.spawn, (1, 1));
        assert!(cfg.map.is_none());
        assert_eq!(cfg.mobs.len(), 2);
    }

    #[test]
    fn test_mob_spawn_actions() {
        let mob = MobSpawn::new("wasp", 4, 0, 0).actions(["sting"]);
        assert_eq!(mob.actions, vec!["sting".to_owned()]);
    }
}
