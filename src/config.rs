//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `dashboard.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: Bind address, port and request timeout.
//!     - StoreConfig: Window capacity, default listing size, stats window.
//!     - ThresholdsConfig: Alert bounds in effect at startup.
//!     - FeedConfig: Optional external reading provider.
//!     - SimulatorConfig: Optional simulated device posting readings.
//!     - LoggingConfig: Log filter and whether to log every reading.
//!
//! every section (and every key) is optional; a missing key takes its default.
//!
//! ==============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{Thresholds, DEFAULT_DEVICE_ID};
use crate::error::DashboardError;
use crate::store::{AggregatorSettings, DEFAULT_CAPACITY, DEFAULT_LIMIT, DEFAULT_WINDOW_HOURS};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub thresholds: ThresholdsConfig,
    pub feed: FeedConfig,
    pub simulator: SimulatorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub capacity: usize,
    pub default_limit: usize,
    pub stats_window_hours: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_limit: DEFAULT_LIMIT,
            stats_window_hours: DEFAULT_WINDOW_HOURS,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub temperature_max: f64,
    pub humidity_min: f64,
    pub light_min: i64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        let t = Thresholds::default();
        Self {
            temperature_max: t.temperature_max,
            humidity_min: t.humidity_min,
            light_min: t.light_min,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    pub enabled: bool,
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub device_id: String,
    pub target_url: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: 5,
            device_id: DEFAULT_DEVICE_ID.to_string(),
            target_url: "http://127.0.0.1:3000/api/sensor-data".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: true,
        }
    }
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Invalid { path: PathBuf, error: String },
    Defaults,
}

impl DashboardConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DashboardError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DashboardError::Config(format!("Failed to read config file: {}", e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, DashboardError> {
        toml::from_str(content)
            .map_err(|e| DashboardError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load with default fallback
    ///
    /// runs before logging is up, so it reports where the config came from
    /// instead of logging it.
    pub fn discover() -> (Self, ConfigOrigin) {
        let paths = [
            PathBuf::from("config").join("dashboard.toml"),
            PathBuf::from("..").join("config").join("dashboard.toml"),
        ];

        for path in paths {
            if path.exists() {
                return match Self::load(&path) {
                    Ok(config) => (config, ConfigOrigin::File(path)),
                    Err(e) => (
                        Self::default(),
                        ConfigOrigin::Invalid {
                            path,
                            error: e.to_string(),
                        },
                    ),
                };
            }
        }

        (Self::default(), ConfigOrigin::Defaults)
    }

    /// Applies `DASHBOARD_PORT` and `DASHBOARD_FEED_URL` on top of the file.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("DASHBOARD_PORT").ok(),
            std::env::var("DASHBOARD_FEED_URL").ok(),
        );
    }

    fn apply_overrides(&mut self, port: Option<String>, feed_url: Option<String>) {
        if let Some(port) = port.and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(url) = feed_url.filter(|u| !u.trim().is_empty()) {
            self.feed.url = url.trim().to_string();
            self.feed.enabled = true;
        }
    }

    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            capacity: self.store.capacity,
            default_limit: self.store.default_limit,
            stats_window: chrono::Duration::hours(self.store.stats_window_hours),
            thresholds: Thresholds {
                temperature_max: self.thresholds.temperature_max,
                humidity_min: self.thresholds.humidity_min,
                light_min: self.thresholds.light_min,
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            bind = %self.bind_addr(),
            capacity = self.store.capacity,
            default_limit = self.store.default_limit,
            stats_window_hours = self.store.stats_window_hours,
            "Server configuration"
        );
        tracing::info!(
            temperature_max = self.thresholds.temperature_max,
            humidity_min = self.thresholds.humidity_min,
            light_min = self.thresholds.light_min,
            "Initial thresholds"
        );
        if self.feed.enabled {
            tracing::info!(url = %self.feed.url, timeout_ms = self.feed.timeout_ms, "External feed enabled");
        }
        if self.simulator.enabled {
            tracing::info!(
                device_id = %self.simulator.device_id,
                interval_seconds = self.simulator.interval_seconds,
                "Simulated device enabled"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(DashboardConfig::parse("").unwrap(), DashboardConfig::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = DashboardConfig::parse(
            r#"
            [server]
            port = 8080

            [thresholds]
            humidity_min = 35.5

            [feed]
            enabled = true
            url = "http://feed.local/readings"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.thresholds.humidity_min, 35.5);
        assert_eq!(config.thresholds.temperature_max, 30.0);
        assert_eq!(config.feed.timeout_ms, 3_000);
        assert_eq!(config.store.capacity, 100);

        let settings = config.aggregator_settings();
        assert_eq!(settings.thresholds.humidity_min, 35.5);
        assert_eq!(settings.stats_window, chrono::Duration::hours(24));
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        assert!(matches!(
            DashboardConfig::parse("[server\nport = "),
            Err(DashboardError::Config(_))
        ));
    }

    #[test]
    fn env_overrides() {
        let mut config = DashboardConfig::default();
        config.apply_overrides(Some("4000".into()), Some("http://feed/x".into()));
        assert_eq!(config.server.port, 4000);
        assert!(config.feed.enabled);
        assert_eq!(config.feed.url, "http://feed/x");

        let mut config = DashboardConfig::default();
        config.apply_overrides(Some("not-a-port".into()), Some("  ".into()));
        assert_eq!(config.server.port, 3000);
        assert!(!config.feed.enabled);
    }
}
