use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default)]
    pub auth_enabled: bool,
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default = "default_true")]
    pub migrate_on_start: bool,
}

fn default_database() -> String {
    Config::database_file().to_string_lossy().to_string()
}
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_pool_size() -> usize {
    4
}
fn default_token_secret() -> String {
    "change-me".to_string()
}
fn default_token_ttl() -> u64 {
    12 * 60 * 60
}
fn default_debounce_ms() -> u64 {
    150
}
fn default_heartbeat_secs() -> u64 {
    30
}
fn default_shutdown_grace_ms() -> u64 {
    5000
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            bind: default_bind(),
            pool_size: default_pool_size(),
            auth_enabled: false,
            token_secret: default_token_secret(),
            token_ttl_secs: default_token_ttl(),
            debounce_ms: default_debounce_ms(),
            heartbeat_secs: default_heartbeat_secs(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            log_json: false,
            migrate_on_start: true,
        }
    }
}

pub(crate) fn env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|v| match v.as_str() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    })
}

pub(crate) fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

impl Config {
    /// Return the standard configuration directory depending on the platform
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(appdata).join("worktrack")
        } else {
            let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".worktrack")
        }
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        match env::var("WORKTRACK_CONFIG") {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => Self::config_dir().join("worktrack.conf"),
        }
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("worktrack.sqlite")
    }

    /// Load configuration from `path` (or the default location), falling back
    /// to defaults when the file does not exist, then apply env overrides.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_file);

        let mut cfg = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_yaml::from_str(&content)?
        } else {
            Config::default()
        };

        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Ok(db) = env::var("WORKTRACK_DB") {
            self.database = db;
        }
        if let Ok(bind) = env::var("WORKTRACK_BIND") {
            self.bind = bind;
        }
        if let Some(v) = env_bool("WORKTRACK_AUTH") {
            self.auth_enabled = v;
        }
        if let Ok(secret) = env::var("WORKTRACK_TOKEN_SECRET") {
            self.token_secret = secret;
        }
        if let Some(v) = env_u64("WORKTRACK_TOKEN_TTL_SECS") {
            self.token_ttl_secs = v;
        }
        if let Some(v) = env_u64("WORKTRACK_DEBOUNCE_MS") {
            self.debounce_ms = v;
        }
        if let Some(v) = env_u64("WORKTRACK_HEARTBEAT_SECS") {
            self.heartbeat_secs = v;
        }
        if let Some(v) = env_bool("WORKTRACK_LOG_JSON") {
            self.log_json = v;
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.database.trim().is_empty() {
            return Err(AppError::Config("database path is empty".into()));
        }
        if self.pool_size == 0 {
            return Err(AppError::Config("pool_size must be at least 1".into()));
        }
        if self.heartbeat_secs == 0 {
            return Err(AppError::Config("heartbeat_secs must be at least 1".into()));
        }
        if self.auth_enabled && self.token_secret.len() < 8 {
            return Err(AppError::Config(
                "token_secret must be at least 8 characters when auth is enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Write the default configuration file and make sure the database file
    /// location exists. Returns the database path in use.
    pub fn init_all(custom_db: Option<String>, is_test: bool) -> AppResult<PathBuf> {
        let dir = Self::config_dir();
        fs::create_dir_all(&dir)?;

        // DB name: user provided or default
        let db_path = match custom_db {
            Some(name) => {
                let p = Path::new(&name);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    dir.join(p)
                }
            }
            None => Self::database_file(),
        };

        let config = Config {
            database: db_path.to_string_lossy().to_string(),
            ..Config::default()
        };

        if !is_test {
            let yaml = serde_yaml::to_string(&config)?;
            let file = Self::config_file();
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&file, yaml)?;
        }

        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("database: /tmp/x.sqlite\nauth_enabled: true\n")
            .expect("parse");
        assert_eq!(cfg.database, "/tmp/x.sqlite");
        assert!(cfg.auth_enabled);
        assert_eq!(cfg.debounce_ms, 150);
        assert_eq!(cfg.heartbeat_secs, 30);
        assert_eq!(cfg.pool_size, 4);
        assert!(cfg.migrate_on_start);
    }

    #[test]
    fn validate_rejects_weak_secret_with_auth() {
        let cfg = Config {
            auth_enabled: true,
            token_secret: "short".into(),
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn validate_rejects_empty_pool() {
        let cfg = Config {
            pool_size: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
