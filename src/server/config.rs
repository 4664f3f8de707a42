use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_tick_interval_seconds")]
    pub tick_interval_seconds: u64,

    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_addr: Option<String>,
    database_url: Option<String>,
    log_dir: Option<String>,
    tick_interval_seconds: Option<u64>,
    max_concurrent_probes: Option<usize>,
    telegram_bot_token: Option<String>,
    telegram_api_base: Option<String>,
}

/// Environment overrides, read with `envy`. Field names are the variable names, lowercased.
#[derive(Deserialize, Default, Debug)]
struct EnvOverrides {
    uptime_listen_addr: Option<String>,
    database_url: Option<String>,
    uptime_log_dir: Option<String>,
    uptime_tick_seconds: Option<u64>,
    uptime_max_concurrent_probes: Option<usize>,
    telegram_bot_token: Option<String>,
    telegram_api_base: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<EnvOverrides> for PartialServerConfig {
    fn from(env: EnvOverrides) -> Self {
        PartialServerConfig {
            listen_addr: non_blank(env.uptime_listen_addr),
            database_url: non_blank(env.database_url),
            log_dir: non_blank(env.uptime_log_dir),
            tick_interval_seconds: env.uptime_tick_seconds,
            max_concurrent_probes: env.uptime_max_concurrent_probes,
            telegram_bot_token: non_blank(env.telegram_bot_token),
            telegram_api_base: non_blank(env.telegram_api_base),
        }
    }
}

/// Selects [`crate::db::memory::InMemoryStore`] instead of a database.
pub const MEMORY_DATABASE_URL: &str = "memory";

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite://data/monitor.db?mode=rwc".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_tick_interval_seconds() -> u64 {
    60
}

fn default_max_concurrent_probes() -> usize {
    8
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr(),
            database_url: default_database_url(),
            log_dir: default_log_dir(),
            tick_interval_seconds: default_tick_interval_seconds(),
            max_concurrent_probes: default_max_concurrent_probes(),
            telegram_bot_token: None,
            telegram_api_base: default_telegram_api_base(),
        }
    }
}

impl PartialServerConfig {
    fn from_env() -> Result<Self, String> {
        envy::from_env::<EnvOverrides>()
            .map(Self::from)
            .map_err(|e| format!("Failed to load config from environment: {e}"))
    }

    fn from_file(config_path: Option<&str>) -> Result<Self, String> {
        let Some(path_str) = config_path else {
            return Ok(PartialServerConfig::default());
        };
        let path = Path::new(path_str);
        if !path.exists() {
            return Ok(PartialServerConfig::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
    }
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config = PartialServerConfig::from_file(config_path)?;

        // 2. Load from environment variables
        let env_config = PartialServerConfig::from_env()?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn merge(env_config: PartialServerConfig, file_config: PartialServerConfig) -> Result<Self, String> {
        let final_config = ServerConfig {
            listen_addr: env_config.listen_addr.or(file_config.listen_addr)
                .unwrap_or_else(default_listen_addr),
            database_url: env_config.database_url.or(file_config.database_url)
                .unwrap_or_else(default_database_url),
            log_dir: env_config.log_dir.or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            tick_interval_seconds: env_config.tick_interval_seconds.or(file_config.tick_interval_seconds)
                .unwrap_or_else(default_tick_interval_seconds),
            max_concurrent_probes: env_config.max_concurrent_probes.or(file_config.max_concurrent_probes)
                .unwrap_or_else(default_max_concurrent_probes),
            telegram_bot_token: env_config.telegram_bot_token.or(file_config.telegram_bot_token)
                .filter(|t| !t.trim().is_empty()),
            telegram_api_base: env_config.telegram_api_base.or(file_config.telegram_api_base)
                .unwrap_or_else(default_telegram_api_base),
        };

        if final_config.tick_interval_seconds == 0 {
            return Err("tick_interval_seconds must be greater than zero".to_string());
        }
        if final_config.max_concurrent_probes == 0 {
            return Err("max_concurrent_probes must be greater than zero".to_string());
        }
        Ok(final_config)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }
}
