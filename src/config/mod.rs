//! Configuration management.
//!
//! TOML configuration with typed sections, sensible defaults, and async
//! load/save. Sections:
//!
//! - [`ServerConfig`] - bind address and instance name
//! - [`StorageConfig`] - data directory and upload limits
//! - [`GamesConfig`] - puzzle turn budget bounds, the flag, the final hint
//! - [`LoggingConfig`] - level and optional log file
//! - [`SecurityConfig`] - optional Argon2 tuning
//!
//! ```toml
//! [server]
//! bind_addr = "127.0.0.1:8080"
//! name = "Campus CTF"
//!
//! [storage]
//! data_dir = "./data"
//!
//! [games]
//! default_turn_limit = 25
//! flag = "MJSEC{dev-flag}"
//! ```
//!
//! The flag and hint ship with dev placeholders; a deployment overrides them
//! in its config file.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub games: GamesConfig,
    pub logging: LoggingConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Upload size cap in bytes (request bodies above this are rejected).
    pub max_upload_bytes: usize,
    /// Assignment upload extension allow-list (lower-case, no dots).
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamesConfig {
    /// Puzzle move budget when the request does not specify one.
    pub default_turn_limit: u32,
    /// Hard ceiling for a requested move budget.
    pub max_turn_limit: u32,
    /// The flag revealed by the upload trigger.
    pub flag: String,
    /// Opaque hint string served at game level 3.
    pub final_hint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub argon2: Option<Argon2Config>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Argon2Config {
    #[serde(default)]
    pub memory_kib: Option<u32>,
    #[serde(default)]
    pub time_cost: Option<u32>,
    #[serde(default)]
    pub parallelism: Option<u32>,
}

impl GamesConfig {
    /// Clamp a requested turn limit into [1, max_turn_limit], falling back to
    /// the default when absent or unparseable.
    pub fn clamp_turn_limit(&self, requested: Option<i64>) -> u32 {
        let n = requested.unwrap_or(self.default_turn_limit as i64);
        n.clamp(1, self.max_turn_limit as i64) as u32
    }
}

impl Default for GamesConfig {
    fn default() -> Self {
        GamesConfig {
            default_turn_limit: 25,
            max_turn_limit: 999,
            flag: "MJSEC{dev-flag}".to_string(),
            // Delivered to level 3 as an opaque string; decoding it is part
            // of the exercise.
            final_hint: "VGhlcmUgaXMgYSBoaWRkZW4gZW5kcG9pbnQgd2l0aCAvZ3JhZGVzL3VwZ3JhZGU="
                .to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Write a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                bind_addr: "127.0.0.1:8080".to_string(),
                name: "Campus CTF".to_string(),
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                max_upload_bytes: 5 * 1024 * 1024,
                allowed_extensions: ["hwp", "ppt", "pptx", "pdf"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            games: GamesConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("ctfboard.log".to_string()),
            },
            security: Some(SecurityConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_limit_clamping() {
        let games = GamesConfig::default();
        assert_eq!(games.clamp_turn_limit(None), 25);
        assert_eq!(games.clamp_turn_limit(Some(0)), 1);
        assert_eq!(games.clamp_turn_limit(Some(-5)), 1);
        assert_eq!(games.clamp_turn_limit(Some(1)), 1);
        assert_eq!(games.clamp_turn_limit(Some(500)), 500);
        assert_eq!(games.clamp_turn_limit(Some(1000)), 999);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.server.bind_addr, config.server.bind_addr);
        assert_eq!(parsed.games.default_turn_limit, 25);
        assert_eq!(parsed.storage.allowed_extensions.len(), 4);
    }

    #[test]
    fn games_section_is_optional() {
        let minimal = r#"
[server]
bind_addr = "0.0.0.0:9000"
name = "Test"

[storage]
data_dir = "/tmp/ctf"
max_upload_bytes = 1024
allowed_extensions = ["pdf"]

[logging]
level = "debug"
"#;
        let parsed: Config = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.games.max_turn_limit, 999);
        assert!(parsed.logging.file.is_none());
    }
}
