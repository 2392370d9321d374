//! rtk-collector - edge telemetry agent.
//!
//! Samples CPU temperature, load average, uptime and four digital inputs on
//! a fixed interval and publishes each sample over MQTT under
//! `{base_topic}/{device_id}/...`. The broker may be unreachable at boot or
//! drop mid-run; the agent retries and reconnects on its own and only exits
//! on an explicit shutdown signal.

mod agent;
mod backoff;
mod config;
mod connection;
mod encode;
mod gpio;
mod sensors;
mod state;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::agent::Agent;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rtk_collector=info")),
        )
        .init();

    info!("rtk-collector v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    info!(
        "device {} -> {}:{} (base topic {}, every {}s)",
        config.device_id,
        config.broker_host,
        config.broker_port,
        config.base_topic,
        config.interval_secs
    );

    let cancel = CancellationToken::new();
    let mut agent = Agent::new(config, cancel.clone());

    tokio::select! {
        _ = agent.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
            cancel.cancel();
        }
    }

    agent.shutdown().await;
    info!("shutdown complete");
    Ok(())
}
