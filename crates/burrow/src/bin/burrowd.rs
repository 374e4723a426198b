//! The burrow server daemon.
//!
//! Configuration comes from the environment:
//!
//! | variable                | default          |
//! |-------------------------|------------------|
//! | `BURROW_BIND`           | `127.0.0.1:8765` |
//! | `BURROW_TICK_HZ`        | `2`              |
//! | `BURROW_IDLE_SECS`      | `300`            |
//! | `BURROW_HANDSHAKE_SECS` | `10`             |
//! | `BURROW_MAP`            | embedded map     |
//!
//! Log filtering follows `RUST_LOG`.

use std::time::Duration;

use burrow::{BurrowError, BurrowServer, ServerConfig};
use burrow_world::MapRecord;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

fn load_config() -> Result<ServerConfig, BurrowError> {
    let mut cfg = ServerConfig::default();
    if let Ok(bind) = std::env::var("BURROW_BIND") {
        cfg.bind_addr = bind;
    }
    if let Some(hz) = env_parse("BURROW_TICK_HZ") {
        cfg.tick.tick_rate_hz = hz;
    }
    if let Some(secs) = env_parse("BURROW_IDLE_SECS") {
        cfg.idle_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = env_parse("BURROW_HANDSHAKE_SECS") {
        cfg.handshake_timeout = Duration::from_secs(secs);
    }
    if let Ok(path) = std::env::var("BURROW_MAP") {
        let json = std::fs::read_to_string(&path)?;
        cfg.map = Some(MapRecord::parse_list(&json)?);
        tracing::info!(%path, "map loaded");
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<(), BurrowError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = load_config()?;
    tracing::info!(bind = %cfg.bind_addr, tick_hz = cfg.tick.tick_rate_hz, "starting burrowd");

    let server = BurrowServer::builder().config(cfg).build().await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
