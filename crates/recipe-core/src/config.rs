use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config as cfg;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Prefix for environment overrides, e.g. `RECIPE__SERVER__PORT=8080`.
pub const ENV_PREFIX: &str = "RECIPE";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:` for a throwaway database
    pub path: String,
    /// How many times startup retries opening the database
    pub wait_attempts: u32,
    pub wait_interval_ms: u64,
}

impl DatabaseConfig {
    fn default_wait_attempts() -> u32 {
        30
    }

    fn default_wait_interval_ms() -> u64 {
        1000
    }

    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.wait_interval_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/recipes.db".into(),
            wait_attempts: Self::default_wait_attempts(),
            wait_interval_ms: Self::default_wait_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SecurityConfig {
    /// Origins allowed by CORS. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "SecurityConfig::default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

impl SecurityConfig {
    fn default_rate_limit() -> u32 {
        1200
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            rate_limit_per_minute: Self::default_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Settings {
    #[serde(default = "Settings::default_env")]
    pub env: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Self::default_env(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Settings {
    fn default_env() -> String {
        env::var("APP_ENV").unwrap_or_else(|_| "development".to_string())
    }

    /// In-memory database settings for tests and one-off runs.
    pub fn in_memory() -> Self {
        let mut settings = Self::default();
        settings.database.path = ":memory:".into();
        settings
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.server.host.trim().is_empty(),
            "server.host cannot be empty"
        );
        anyhow::ensure!(self.server.port > 0, "server.port must be > 0");
        anyhow::ensure!(
            !self.database.path.trim().is_empty(),
            "database.path cannot be empty"
        );
        anyhow::ensure!(
            self.database.wait_attempts > 0,
            "database.wait_attempts must be > 0"
        );
        anyhow::ensure!(
            self.security.rate_limit_per_minute > 0,
            "security.rate_limit_per_minute must be > 0"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigManager {
    settings: Settings,
    config_dir: PathBuf,
    env: String,
}

impl ConfigManager {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    /// Reports where the settings came from. Call once logging is up.
    pub fn log_loaded(&self) {
        info!(
            config_dir = %self.config_dir.display(),
            env = %self.env,
            "Configuration loaded"
        );
    }

    pub fn load(config_dir: Option<PathBuf>, env_override: Option<String>) -> Result<Self> {
        let env_name = env_override.unwrap_or_else(Settings::default_env);
        let config_dir = config_dir.unwrap_or_else(Self::default_config_dir);
        let settings = Self::load_from_sources(&config_dir, &env_name)?;
        settings.validate()?;
        Ok(Self {
            settings,
            config_dir,
            env: env_name,
        })
    }

    /// Get the default configuration directory.
    ///
    /// Priority order:
    /// 1. ./config/ (project-level config)
    /// 2. ~/.recipe-api/ (user-level config)
    /// 3. Current directory (fallback)
    pub fn default_config_dir() -> PathBuf {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_config = cwd.join("config");
        if project_config.exists() {
            return project_config;
        }

        if let Some(home_dir) = dirs::home_dir() {
            let user_dir = home_dir.join(".recipe-api");
            if user_dir.exists() {
                return user_dir;
            }
        }

        cwd
    }

    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Settings> {
        let settings: Settings = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.toml", env_name))).required(false),
            )
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                cfg::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.allowed_origins")
                    .try_parsing(true),
            )
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        Ok(settings)
    }
}
