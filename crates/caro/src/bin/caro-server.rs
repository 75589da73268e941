//! Runs a caro server with an in-memory ledger.
//!
//! Environment:
//! - `CARO_BIND`: listen address, default `127.0.0.1:8080`
//! - `CARO_TIME_BUDGET_SECS`: per-player time budget; unset plays untimed
//! - `CARO_OPENING_BALANCE`: wallet given to every new player, default 1000
//! - `RUST_LOG`: log filter, default `info`

use std::env;
use std::sync::Arc;
use std::time::Duration;

use caro::prelude::*;
use tracing_subscriber::EnvFilter;

fn env_u64(key: &str) -> Option<u64> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring non-numeric setting");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CaroError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bind = env::var("CARO_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let mut game = GameConfig::default();
    if let Some(secs) = env_u64("CARO_TIME_BUDGET_SECS").filter(|secs| *secs > 0) {
        game.time_budget = Some(Duration::from_secs(secs));
    }
    let opening = env_u64("CARO_OPENING_BALANCE").unwrap_or(1_000);
    let store = MemoryStore::with_opening_balance(Amount(i64::try_from(opening).unwrap_or(i64::MAX)));

    let server = CaroServerBuilder::new()
        .bind(&bind)
        .game_config(game)
        .store(Arc::new(store))
        .build(NumericTokenAuthenticator)
        .await?;

    tracing::info!(addr = %server.local_addr()?, "caro server ready");
    server.run().await
}
