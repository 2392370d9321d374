//! The sampling loop.
//!
//! One pass over every metric per tick, published through the connection
//! manager. The heartbeat always goes first and is the only retained sample;
//! each remaining metric is attempted independently, so a failed read only
//! costs that metric for the current tick.

use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::encode::Scalar;
use crate::gpio;
use crate::sensors;

pub struct Agent {
    config: Config,
    connection: ConnectionManager,
    cancel: CancellationToken,
}

impl Agent {
    pub fn new(config: Config, cancel: CancellationToken) -> Self {
        let connection = ConnectionManager::start(&config, cancel.clone());
        Self {
            config,
            connection,
            cancel,
        }
    }

    /// Waits for the first broker connection, then samples on the configured
    /// interval until the cancellation token fires. The token is honored
    /// both at the top of each tick and during the inter-tick sleep.
    pub async fn run(&self) {
        self.connection.wait_connected().await;

        let mut ticker = interval(Duration::from_secs(self.config.interval_secs.max(1)));
        info!("sampling every {}s", self.config.interval_secs);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.sample_once().await,
            }
        }

        info!("sample loop stopped");
    }

    /// Tears the broker connection down. Idempotent.
    pub async fn shutdown(&mut self) {
        self.connection.shutdown().await;
    }

    async fn sample_once(&self) {
        self.publish_sample("heartbeat/alive", Scalar::Bool(true), true);

        match sensors::cpu_temp_c().await {
            Some(celsius) => self.publish_sample("sys/cpu_temp_c", Scalar::Float(celsius), false),
            None => debug!("cpu temperature unavailable, skipping this tick"),
        }

        self.publish_sample("sys/load1", Scalar::Float(sensors::load1()), false);

        let uptime = sensors::uptime_secs();
        self.publish_sample("sys/uptime_s", Scalar::Int(uptime as i64), false);
        self.publish_sample(
            "sys/uptime_dhms",
            Scalar::Text(sensors::uptime_dhms(uptime)),
            false,
        );

        match gpio::read_inputs(&self.config.gpio_chip, &self.config.gpio_pins) {
            Ok(snapshot) => {
                for (name, value) in snapshot {
                    self.publish_sample(&format!("gpio/{name}"), Scalar::Int(value), false);
                }
            }
            Err(e) => warn!("gpio snapshot skipped: {}", e),
        }
    }

    fn publish_sample(&self, path: &str, value: Scalar, retain: bool) {
        let now = Utc::now();
        let payload = self
            .config
            .payload_format
            .encode(&self.config.device_id, path, &value, &now);
        let topic = topic(&self.config.base_topic, &self.config.device_id, path);
        self.connection.publish(&topic, payload, retain);
    }
}

/// `"{base}/{device}/{path}"` — fixed at startup, stable for the process
/// lifetime.
pub fn topic(base: &str, device: &str, path: &str) -> String {
    format!("{base}/{device}/{path}")
}
