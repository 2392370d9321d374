//! Runtime configuration, read once from the environment at startup.
//!
//! Every option has a documented default; a missing or malformed value falls
//! back with a warning. Configuration is never fatal — an agent with a bad
//! environment still boots and reports.

use serde::Serialize;
use tracing::warn;

use crate::encode::PayloadFormat;

/// Default line offsets for IO0..IO3.
const DEFAULT_PINS: [u32; 4] = [17, 27, 22, 23];

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub broker_host: String,
    pub broker_port: u16,
    /// Identity segment in topics and the MQTT client id.
    pub device_id: String,
    pub base_topic: String,
    pub interval_secs: u64,
    pub payload_format: PayloadFormat,
    /// Line controller device path.
    pub gpio_chip: String,
    /// Line offsets for IO0..IO3.
    pub gpio_pins: [u32; 4],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            device_id: default_device_id(),
            base_topic: "rtk".to_string(),
            interval_secs: 5,
            payload_format: PayloadFormat::Json,
            gpio_chip: "/dev/gpiochip0".to_string(),
            gpio_pins: DEFAULT_PINS,
        }
    }
}

impl Config {
    /// Reads every option from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            broker_host: env_string("MQTT_HOST").unwrap_or(defaults.broker_host),
            broker_port: env_parsed("MQTT_PORT").unwrap_or(defaults.broker_port),
            device_id: env_string("DEVICE_ID").unwrap_or(defaults.device_id),
            base_topic: env_string("BASE_TOPIC").unwrap_or(defaults.base_topic),
            // a zero interval would make the tick timer meaningless
            interval_secs: env_parsed("INTERVAL_SEC")
                .unwrap_or(defaults.interval_secs)
                .max(1),
            payload_format: env_string("PAYLOAD_FORMAT")
                .and_then(|raw| {
                    let format = PayloadFormat::from_name(&raw);
                    if format.is_none() {
                        warn!("PAYLOAD_FORMAT={} not recognized, using json", raw);
                    }
                    format
                })
                .unwrap_or(defaults.payload_format),
            gpio_chip: env_string("GPIO_CHIP").unwrap_or(defaults.gpio_chip),
            gpio_pins: [
                env_parsed("GPIO_IO0").unwrap_or(DEFAULT_PINS[0]),
                env_parsed("GPIO_IO1").unwrap_or(DEFAULT_PINS[1]),
                env_parsed("GPIO_IO2").unwrap_or(DEFAULT_PINS[2]),
                env_parsed("GPIO_IO3").unwrap_or(DEFAULT_PINS[3]),
            ],
        }
    }
}

fn default_device_id() -> String {
    gethostname::gethostname().to_string_lossy().to_string()
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("{}={} is not a valid value, using default", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.broker_host, "localhost");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.base_topic, "rtk");
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.payload_format, PayloadFormat::Json);
        assert_eq!(config.gpio_chip, "/dev/gpiochip0");
        assert_eq!(config.gpio_pins, [17, 27, 22, 23]);
        assert!(!config.device_id.is_empty());
    }

    // The remaining config tests mutate the process environment, so they all
    // live in this single test to avoid racing each other.
    #[test]
    fn test_from_env_overrides_and_fallbacks() {
        std::env::set_var("MQTT_HOST", "broker.local");
        std::env::set_var("MQTT_PORT", "8883");
        std::env::set_var("DEVICE_ID", "edge-01");
        std::env::set_var("BASE_TOPIC", "plant");
        std::env::set_var("INTERVAL_SEC", "not-a-number");
        std::env::set_var("PAYLOAD_FORMAT", "line");
        std::env::set_var("GPIO_IO2", "5");

        let config = Config::from_env();
        assert_eq!(config.broker_host, "broker.local");
        assert_eq!(config.broker_port, 8883);
        assert_eq!(config.device_id, "edge-01");
        assert_eq!(config.base_topic, "plant");
        assert_eq!(config.interval_secs, 5); // malformed -> default
        assert_eq!(config.payload_format, PayloadFormat::Line);
        assert_eq!(config.gpio_pins, [17, 27, 5, 23]);

        std::env::set_var("INTERVAL_SEC", "0");
        let config = Config::from_env();
        assert_eq!(config.interval_secs, 1); // clamped

        for key in [
            "MQTT_HOST",
            "MQTT_PORT",
            "DEVICE_ID",
            "BASE_TOPIC",
            "INTERVAL_SEC",
            "PAYLOAD_FORMAT",
            "GPIO_IO2",
        ] {
            std::env::remove_var(key);
        }
    }
}
