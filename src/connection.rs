//! Broker connection lifecycle: connect-with-retry, supervised reconnect and
//! fire-and-forget publishing.
//!
//! The manager owns the MQTT client; a spawned supervision task drives the
//! event loop for the whole process lifetime. Until the broker has been
//! reached once every failure retries on a fixed short delay (the broker may
//! simply not be up yet at boot); afterwards failures back off exponentially
//! up to a cap, resetting on each successful reconnect. The sample loop only
//! ever calls `publish` and never sees connectivity errors.

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::Config;
use crate::state::ConnectionState;

/// Fixed delay between attempts before the broker has ever been reached.
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(2);

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Capacity of the client request channel. Publishes issued while
/// disconnected queue here and flush on reconnect; once full, further
/// samples are dropped with a warning.
const REQUEST_CHANNEL_CAP: usize = 10;

pub struct ConnectionManager {
    client: AsyncClient,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    supervisor: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Builds the client and spawns the supervision task. The returned
    /// manager is not connected yet; `wait_connected` blocks until the first
    /// CONNACK or cancellation.
    pub fn start(config: &Config, cancel: CancellationToken) -> Self {
        let client_id = format!("{}-collector", config.device_id);
        let mut options = MqttOptions::new(&client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAP);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let supervisor = tokio::spawn(supervise(
            client.clone(),
            event_loop,
            state_tx,
            cancel.clone(),
        ));

        info!(
            "mqtt client {} -> {}:{}",
            client_id, config.broker_host, config.broker_port
        );

        Self {
            client,
            state_rx,
            cancel,
            supervisor: Some(supervisor),
        }
    }

    /// Read handle on connection state transitions, for diagnostics.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Blocks until the broker has accepted the connection once, or shutdown
    /// is signaled. Never fails: a broker that is down at boot is simply
    /// retried by the supervision task until it appears.
    pub async fn wait_connected(&self) {
        let mut rx = self.state();
        loop {
            if rx.borrow().is_connected() {
                return;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// QoS-1 publish, fire and forget. Transient failure never reaches the
    /// caller: a full request queue drops the sample with a warning.
    pub fn publish(&self, topic: &str, payload: String, retain: bool) {
        if let Err(e) = self
            .client
            .try_publish(topic, QoS::AtLeastOnce, retain, payload)
        {
            warn!("publish to {} dropped: {}", topic, e);
        }
    }

    /// Stops the supervision task (which sends a best-effort DISCONNECT) and
    /// waits for it. Safe to call repeatedly, and safe if the broker was
    /// never reached.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.supervisor.take() {
            if let Err(e) = handle.await {
                warn!("connection supervisor ended abnormally: {}", e);
            }
        }
    }
}

/// Drives the event loop until cancelled, broadcasting state transitions.
async fn supervise(
    client: AsyncClient,
    mut event_loop: EventLoop,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::default();
    let mut ever_connected = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = client.disconnect().await {
                    debug!("disconnect on shutdown: {}", e);
                }
                set_state(&state_tx, ConnectionState::Disconnected("shutdown".to_string()));
                return;
            }

            polled = event_loop.poll() => match polled {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        ever_connected = true;
                        backoff.reset();
                        set_state(&state_tx, ConnectionState::Connected);
                    } else {
                        warn!("broker refused connection: {:?}", ack.code);
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    set_state(
                        &state_tx,
                        ConnectionState::Disconnected("disconnected by broker".to_string()),
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    let delay = if ever_connected {
                        backoff.next_sleep()
                    } else {
                        INITIAL_RETRY_DELAY
                    };
                    warn!("mqtt connection error: {}; retrying in {:?}", e, delay);
                    set_state(&state_tx, ConnectionState::Reconnecting(delay.as_secs_f64()));
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

fn set_state(tx: &watch::Sender<ConnectionState>, state: ConnectionState) {
    let changed = *tx.borrow() != state;
    if changed {
        info!("connection state: {}", state);
        let _ = tx.send(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            device_id: "test-device".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_shutdown_without_broker_is_clean_and_idempotent() {
        let cancel = CancellationToken::new();
        let mut conn = ConnectionManager::start(&test_config(), cancel.clone());

        // Queued while disconnected; must not error or block.
        conn.publish("rtk/test-device/heartbeat/alive", "{}".to_string(), true);

        conn.shutdown().await;
        conn.shutdown().await; // second call is a no-op
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_connected_returns_on_cancellation() {
        let cancel = CancellationToken::new();
        let mut conn = ConnectionManager::start(&test_config(), cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), conn.wait_connected())
            .await
            .expect("wait_connected must unblock on cancellation");

        conn.shutdown().await;
    }

    #[tokio::test]
    async fn test_initial_state_is_connecting() {
        let cancel = CancellationToken::new();
        let mut conn = ConnectionManager::start(&test_config(), cancel);

        assert_eq!(*conn.state().borrow(), ConnectionState::Connecting);
        conn.shutdown().await;
    }
}
