//! Local sensor reads: CPU temperature with tiered fallback, load average
//! and uptime.
//!
//! Temperature is the only metric without a single reliable source on the
//! target boards, so it resolves through an ordered chain of tiers; each
//! tier swallows its own failures so a broken tier never masks the next one.
//! Load average and uptime come straight from the OS and are assumed
//! available on the target platform.

use sysinfo::{Components, System};
use tracing::debug;

/// Sensor labels probed, in order, against the structured temperature
/// facility. Covers Raspberry Pi (cpu-thermal / cpu_thermal), Intel
/// (coretemp) and common ARM SoCs (soc_thermal).
const TEMP_SENSOR_LABELS: [&str; 4] = ["cpu-thermal", "cpu_thermal", "coretemp", "soc_thermal"];

/// Raw thermal-zone values above this are millidegrees and get divided by
/// 1000; smaller values are taken as already in degrees.
const MILLIDEGREE_THRESHOLD: f64 = 200.0;

/// One tier of the temperature resolution chain. Tiers run in declaration
/// order; the first to yield a reading wins and the rest are skipped.
#[derive(Debug, Clone, Copy)]
enum TempTier {
    /// Labelled hardware sensors via the structured query facility.
    Labelled,
    /// Raw `/sys/class/thermal` zone files.
    ThermalZone,
    /// The `vcgencmd measure_temp` firmware probe.
    Probe,
}

const TEMP_TIERS: [TempTier; 3] = [TempTier::Labelled, TempTier::ThermalZone, TempTier::Probe];

impl TempTier {
    fn name(self) -> &'static str {
        match self {
            TempTier::Labelled => "labelled sensor",
            TempTier::ThermalZone => "thermal zone",
            TempTier::Probe => "vcgencmd",
        }
    }

    async fn read(self) -> Option<f64> {
        match self {
            TempTier::Labelled => temp_from_components(),
            TempTier::ThermalZone => temp_from_thermal_zones().await,
            TempTier::Probe => temp_from_vcgencmd().await,
        }
    }
}

/// CPU temperature in degrees Celsius, or `None` when every tier fails.
/// Never errors: an unreadable temperature only means the metric is skipped
/// for the current tick.
pub async fn cpu_temp_c() -> Option<f64> {
    for tier in TEMP_TIERS {
        if let Some(celsius) = tier.read().await {
            debug!("cpu temperature {:.1}C via {}", celsius, tier.name());
            return Some(celsius);
        }
    }
    debug!("cpu temperature unavailable on this host");
    None
}

fn temp_from_components() -> Option<f64> {
    let components = Components::new_with_refreshed_list();
    for label in TEMP_SENSOR_LABELS {
        for component in &components {
            if component.label().to_ascii_lowercase().contains(label) {
                let celsius = component.temperature();
                if celsius.is_finite() {
                    return Some(celsius as f64);
                }
            }
        }
    }
    None
}

async fn temp_from_thermal_zones() -> Option<f64> {
    let mut zones = Vec::new();
    let mut entries = tokio::fs::read_dir("/sys/class/thermal").await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Ok(name) = entry.file_name().into_string() {
            if name.starts_with("thermal_zone") {
                zones.push(name);
            }
        }
    }
    // readdir order is not stable; sort so the same zone wins every tick
    zones.sort();

    for zone in zones {
        let path = format!("/sys/class/thermal/{zone}/temp");
        let Ok(raw) = tokio::fs::read_to_string(&path).await else {
            continue;
        };
        if let Some(celsius) = parse_zone_temp(&raw) {
            return Some(celsius);
        }
    }
    None
}

fn parse_zone_temp(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    if value > MILLIDEGREE_THRESHOLD {
        Some(value / 1000.0)
    } else {
        Some(value)
    }
}

async fn temp_from_vcgencmd() -> Option<f64> {
    let output = tokio::process::Command::new("vcgencmd")
        .arg("measure_temp")
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_vcgencmd_temp(&String::from_utf8_lossy(&output.stdout))
}

/// Parses the `temp=51.5'C` form printed by the firmware probe.
fn parse_vcgencmd_temp(out: &str) -> Option<f64> {
    let start = out.find("temp=")? + "temp=".len();
    let rest = &out[start..];
    let end = rest.find('\'')?;
    rest[..end].parse().ok()
}

/// 1-minute load average.
pub fn load1() -> f64 {
    System::load_average().one
}

/// Whole seconds since boot.
pub fn uptime_secs() -> u64 {
    System::uptime()
}

/// Renders whole seconds as `"{d}d {h}h {m}m {s}s"` with exact integer
/// truncation and no rounding.
pub fn uptime_dhms(total: u64) -> String {
    let days = total / 86_400;
    let rem = total % 86_400;
    let hours = rem / 3_600;
    let rem = rem % 3_600;
    let minutes = rem / 60;
    let seconds = rem % 60;
    format!("{days}d {hours}h {minutes}m {seconds}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_dhms_known_values() {
        assert_eq!(uptime_dhms(0), "0d 0h 0m 0s");
        assert_eq!(uptime_dhms(59), "0d 0h 0m 59s");
        assert_eq!(uptime_dhms(86_399), "0d 23h 59m 59s");
        assert_eq!(uptime_dhms(86_400), "1d 0h 0m 0s");
        assert_eq!(uptime_dhms(90_061), "1d 1h 1m 1s");
    }

    #[test]
    fn test_uptime_dhms_decomposes_exactly() {
        for total in [0u64, 1, 59, 60, 3_599, 3_600, 86_399, 86_400, 90_061, 31_536_000] {
            let rendered = uptime_dhms(total);
            let parts: Vec<u64> = rendered
                .split_whitespace()
                .map(|p| p.trim_end_matches(&['d', 'h', 'm', 's'][..]).parse().unwrap())
                .collect();
            assert_eq!(parts.len(), 4);
            assert_eq!(
                parts[0] * 86_400 + parts[1] * 3_600 + parts[2] * 60 + parts[3],
                total,
                "lossy decomposition for {total}"
            );
            assert!(parts[1] < 24 && parts[2] < 60 && parts[3] < 60);
        }
    }

    #[test]
    fn test_zone_temp_millidegrees_are_scaled() {
        assert_eq!(parse_zone_temp("45000\n"), Some(45.0));
        assert_eq!(parse_zone_temp("201"), Some(0.201));
    }

    #[test]
    fn test_zone_temp_small_values_pass_through() {
        assert_eq!(parse_zone_temp("42"), Some(42.0));
        assert_eq!(parse_zone_temp("55.5"), Some(55.5));
    }

    #[test]
    fn test_zone_temp_rejects_empty_and_junk() {
        assert_eq!(parse_zone_temp(""), None);
        assert_eq!(parse_zone_temp("   \n"), None);
        assert_eq!(parse_zone_temp("not-a-number"), None);
    }

    #[test]
    fn test_vcgencmd_output_parses() {
        assert_eq!(parse_vcgencmd_temp("temp=51.5'C\n"), Some(51.5));
        assert_eq!(parse_vcgencmd_temp("temp=40.0'C"), Some(40.0));
    }

    #[test]
    fn test_vcgencmd_garbage_is_rejected() {
        assert_eq!(parse_vcgencmd_temp(""), None);
        assert_eq!(parse_vcgencmd_temp("error: command not found"), None);
        assert_eq!(parse_vcgencmd_temp("temp='C"), None);
    }

    #[tokio::test]
    async fn test_temp_chain_never_panics() {
        // Whatever this host exposes, resolution must complete without
        // escaping an error.
        let _ = cpu_temp_c().await;
    }
}
