//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

use crate::hub::HubSettings;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Live observer fan-out settings.
    #[serde(default)]
    pub hub: HubConfig,

    /// In-process crowd reading generator.
    #[serde(default)]
    pub simulator: SimulatorConfig,

    #[serde(default)]
    pub cors: CorsConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "devasthan_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Upper bound on one write to one observer before it is dropped.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Events buffered per observer before it counts as stalled.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl HubConfig {
    pub fn settings(&self) -> HubSettings {
        HubSettings {
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            queue_capacity: self.queue_capacity,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Zones the generator picks from.
    #[serde(default = "default_simulator_zones")]
    pub zones: Vec<String>,

    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the API. Empty means any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "devasthan.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_send_timeout_ms() -> u64 {
    2_000
}

fn default_queue_capacity() -> usize {
    256
}

fn default_simulator_zones() -> Vec<String> {
    [
        "main_entrance",
        "east_corridor",
        "west_corridor",
        "sanctum_sanctorum",
        "parking_area",
    ]
    .iter()
    .map(|z| z.to_string())
    .collect()
}

fn default_min_interval_ms() -> u64 {
    2_000
}

fn default_max_interval_ms() -> u64 {
    3_000
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:3001".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            zones: default_simulator_zones(),
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `DEVASTHAN_HOST` overrides `server.host`
/// - `DEVASTHAN_PORT` overrides `server.port`
/// - `DEVASTHAN_DB_PATH` overrides `database.path`
/// - `DEVASTHAN_LOG_LEVEL` overrides `logging.level`
/// - `DEVASTHAN_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `DEVASTHAN_SIMULATOR` overrides `simulator.enabled`
/// - `FRONTEND_URL` is appended to `cors.allowed_origins`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("DEVASTHAN_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("DEVASTHAN_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = var("DEVASTHAN_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("DEVASTHAN_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("DEVASTHAN_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(enabled) = var("DEVASTHAN_SIMULATOR") {
        config.simulator.enabled = enabled == "true" || enabled == "1";
    }
    if let Some(frontend) = var("FRONTEND_URL") {
        if !frontend.trim().is_empty() && !config.cors.allowed_origins.contains(&frontend) {
            config.cors.allowed_origins.push(frontend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.hub.send_timeout_ms, 2_000);
        assert_eq!(config.simulator.zones.len(), 5);
        assert!(!config.simulator.enabled);
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9100\n\n[hub]\nsend_timeout_ms = 750\n\n[simulator]\nenabled = true\n",
        )
        .unwrap();

        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, default_host());
        assert_eq!(config.hub.settings().send_timeout, Duration::from_millis(750));
        assert_eq!(config.hub.queue_capacity, 256);
        assert!(config.simulator.enabled);
        assert_eq!(config.database.path, "devasthan.db");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(load_config(path.to_str()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DEVASTHAN_PORT", "9200"),
            ("DEVASTHAN_DB_PATH", "/tmp/crowd.db"),
            ("DEVASTHAN_LOG_JSON", "1"),
            ("DEVASTHAN_SIMULATOR", "true"),
            ("DEVASTHAN_HOST", "not-an-ip"),
            ("FRONTEND_URL", "https://dashboard.example.org"),
        ]);
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9200);
        assert_eq!(config.server.host, default_host(), "unparseable host is ignored");
        assert_eq!(config.database.path, "/tmp/crowd.db");
        assert!(config.logging.json);
        assert!(config.simulator.enabled);
        assert!(config
            .cors
            .allowed_origins
            .contains(&"https://dashboard.example.org".to_string()));
    }
}
