//! Sync engine configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides.
//! Default config path: `/etc/hn-sync/hn-sync.toml`.
//!
//! # Required fields
//! - `schema_version = 1`
//! - `database.path`
//! - `http.base_url`

use serde::Deserialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Config types (validated, fully populated)
// ---------------------------------------------------------------------------

/// Top-level sync engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub schema_version: u32,
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub workers: WorkersConfig,
    pub log: LogConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub user_agent: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct WorkersConfig {
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub batch_write_size: u32,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub bind: String,
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types (all-Option)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    schema_version: Option<u32>,
    database: Option<RawDatabaseConfig>,
    http: Option<RawHttpConfig>,
    workers: Option<RawWorkersConfig>,
    log: Option<RawLogConfig>,
    metrics: Option<RawMetricsConfig>,
}

#[derive(Debug, Deserialize)]
struct RawDatabaseConfig {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHttpConfig {
    base_url: Option<String>,
    user_agent: Option<String>,
    from: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawWorkersConfig {
    count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawLogConfig {
    batch_write_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawMetricsConfig {
    bind: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub const DEFAULT_CONFIG_PATH: &str = "/etc/hn-sync/hn-sync.toml";

/// Load config from a custom path.
pub fn load_config_from_path(path: &Path) -> Result<SyncConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

/// Load config from [`DEFAULT_CONFIG_PATH`].
pub fn load_config() -> Result<SyncConfig, ConfigError> {
    load_config_from_path(Path::new(DEFAULT_CONFIG_PATH))
}

/// Load config from a TOML string.
pub fn load_config_from_str(toml_str: &str) -> Result<SyncConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let schema_version = raw
        .schema_version
        .ok_or_else(|| ConfigError::MissingField("schema_version".to_owned()))?;
    if schema_version != 1 {
        return Err(ConfigError::InvalidValue(format!(
            "schema_version must be 1, got {}",
            schema_version
        )));
    }

    let raw_database = raw
        .database
        .ok_or_else(|| ConfigError::MissingField("database".to_owned()))?;
    let database = DatabaseConfig {
        path: raw_database
            .path
            .ok_or_else(|| ConfigError::MissingField("database.path".to_owned()))?,
    };

    let raw_http = raw
        .http
        .ok_or_else(|| ConfigError::MissingField("http".to_owned()))?;
    let http = HttpConfig {
        base_url: raw_http
            .base_url
            .ok_or_else(|| ConfigError::MissingField("http.base_url".to_owned()))?,
        user_agent: raw_http.user_agent.unwrap_or_else(|| "hn-sync".to_owned()),
        from: raw_http
            .from
            .unwrap_or_else(|| "hn-sync@example.invalid".to_owned()),
    };

    let workers = match raw.workers {
        Some(w) => WorkersConfig {
            count: w.count.unwrap_or(400),
        },
        None => WorkersConfig { count: 400 },
    };
    if workers.count == 0 {
        return Err(ConfigError::InvalidValue(
            "workers.count must be at least 1".to_owned(),
        ));
    }

    let log = match raw.log {
        Some(l) => LogConfig {
            batch_write_size: l.batch_write_size.unwrap_or(100),
        },
        None => LogConfig {
            batch_write_size: 100,
        },
    };
    if log.batch_write_size == 0 {
        return Err(ConfigError::InvalidValue(
            "log.batch_write_size must be at least 1".to_owned(),
        ));
    }

    let metrics = match raw.metrics {
        Some(m) => MetricsConfig {
            bind: m.bind.unwrap_or_else(|| "0.0.0.0:9898".to_owned()),
        },
        None => MetricsConfig {
            bind: "0.0.0.0:9898".to_owned(),
        },
    };

    Ok(SyncConfig {
        schema_version,
        database,
        http,
        workers,
        log,
        metrics,
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {}", s),
            ConfigError::Parse(s) => write!(f, "Parse error: {}", s),
            ConfigError::MissingField(s) => write!(f, "Missing required field: {}", s),
            ConfigError::InvalidValue(s) => write!(f, "Invalid config value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        schema_version = 1
        [database]
        path = "/var/lib/hn-sync/store.sqlite3"
        [http]
        base_url = "https://hacker-news.firebaseio.com"
    "#;

    #[test]
    fn minimal_config_applies_defaults() {
        let cfg = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(cfg.workers.count, 400);
        assert_eq!(cfg.log.batch_write_size, 100);
        assert_eq!(cfg.metrics.bind, "0.0.0.0:9898");
        assert_eq!(cfg.http.user_agent, "hn-sync");
    }

    #[test]
    fn missing_schema_version_is_an_error() {
        let toml = r#"
            [database]
            path = "/tmp/x.sqlite3"
            [http]
            base_url = "https://example.invalid"
        "#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "schema_version"));
    }

    #[test]
    fn wrong_schema_version_is_rejected() {
        let toml = r#"
            schema_version = 2
            [database]
            path = "/tmp/x.sqlite3"
            [http]
            base_url = "https://example.invalid"
        "#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn missing_base_url_is_an_error() {
        let toml = r#"
            schema_version = 1
            [database]
            path = "/tmp/x.sqlite3"
            [http]
        "#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "http.base_url"));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let toml = format!("{MINIMAL}\n[workers]\ncount = 0\n");
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn load_config_from_path_reads_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hn-sync.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let cfg = load_config_from_path(&path).unwrap();
        assert_eq!(cfg.schema_version, 1);
    }
}
