//! Configuration structures.
//!
//! Configuration is loaded from layered JSON files (later files win, objects
//! are deep-merged) followed by `VERTICORE_*` environment overrides.

use crate::address::EntitySchema;
use crate::types::{Error, Result};
use crate::value::{self, Value};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable → configuration path.
const ENV_OVERRIDES: &[(&str, &[&str])] = &[
    ("VERTICORE_REQUEST_TIMEOUT", &["bus", "request_timeout"]),
    ("VERTICORE_MAX_REQUEST_TIMEOUT", &["bus", "max_request_timeout"]),
    ("VERTICORE_WORKER_POOL_SIZE", &["worker_pool", "size"]),
    ("VERTICORE_LISTEN_ADDR", &["transport", "listen_addr"]),
    ("VERTICORE_MAX_CONNECTIONS", &["transport", "max_connections"]),
    ("VERTICORE_LOG_LEVEL", &["observability", "log_level"]),
];

/// Global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Dispatcher configuration.
    #[serde(default)]
    pub bus: BusConfig,

    /// Blocking worker pool configuration.
    #[serde(default)]
    pub worker_pool: WorkerPoolConfig,

    /// TCP transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Diagnostic logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Entities served by the in-memory store, one component each.
    #[serde(default)]
    pub entities: Vec<EntitySchema>,
}

impl Config {
    /// Load configuration from JSON files merged in order, then apply
    /// `VERTICORE_*` overrides from the process environment.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        Self::load_with_env(paths, std::env::vars())
    }

    /// Like [`Config::load`], with an explicit environment.
    pub fn load_with_env<P, I>(paths: &[P], env: I) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = (String, String)>,
    {
        let mut merged = Value::Object(value::Map::new());
        for path in paths {
            let path = path.as_ref();
            let raw = std::fs::read_to_string(path)?;
            let layer: Value = serde_json::from_str(&raw)?;
            if !layer.is_object() {
                return Err(Error::bad_request(format!(
                    "config layer {} must be a JSON object",
                    path.display()
                )));
            }
            value::merge_in(&mut merged, layer);
            tracing::debug!("Merged config layer {}", path.display());
        }
        apply_env_overrides(&mut merged, env);
        Ok(serde_json::from_value(merged)?)
    }
}

fn apply_env_overrides<I>(target: &mut Value, env: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, raw) in env {
        let Some((_, path)) = ENV_OVERRIDES.iter().find(|(name, _)| *name == key) else {
            continue;
        };
        // Numbers and booleans parse as JSON, anything else stays a string.
        let leaf = serde_json::from_str::<Value>(&raw)
            .ok()
            .filter(|v| v.is_number() || v.is_boolean())
            .unwrap_or(Value::String(raw));
        let overlay = path
            .iter()
            .rev()
            .fold(leaf, |inner, segment| {
                let mut object = value::Map::new();
                object.insert((*segment).to_string(), inner);
                Value::Object(object)
            });
        value::merge_in(target, overlay);
        tracing::debug!("Applied config override {}", key);
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Caller-side deadline applied when a request has no explicit timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Upper bound for caller-supplied timeouts.
    #[serde(with = "humantime_serde")]
    pub max_request_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_request_timeout: Duration::from_secs(300),
        }
    }
}

/// Blocking worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Maximum number of blocking jobs running at once.
    pub size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self { size: 20 }
    }
}

/// TCP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Bind address (TCP).
    pub listen_addr: String,

    /// Maximum frame payload size in bytes.
    pub max_frame_bytes: u32,

    /// Maximum concurrent TCP connections. Connections beyond this limit
    /// are rejected.
    pub max_connections: usize,

    /// Per-frame read timeout. Idle connections are dropped after it.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Per-frame write timeout. Slow consumers are dropped after it.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7070".to_string(),
            max_frame_bytes: 5 * 1024 * 1024,
            max_connections: 1000,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error), used when
    /// `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Diagnostic logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Keys masked in every request body before it is logged.
    pub redact_fields: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            redact_fields: vec!["password".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_layer(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bus.request_timeout, Duration::from_secs(30));
        assert_eq!(config.worker_pool.size, 20);
        assert_eq!(config.logging.redact_fields, vec!["password".to_string()]);
    }

    #[test]
    fn test_layers_merge_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_layer(
            &dir,
            "base.json",
            r#"{"bus": {"request_timeout": "5s"}, "worker_pool": {"size": 4}}"#,
        );
        let local = write_layer(&dir, "local.json", r#"{"worker_pool": {"size": 8}}"#);

        let config = Config::load_with_env(&[base, local], Vec::new()).unwrap();
        assert_eq!(config.bus.request_timeout, Duration::from_secs(5));
        assert_eq!(config.bus.max_request_timeout, Duration::from_secs(300));
        assert_eq!(config.worker_pool.size, 8);
    }

    #[test]
    fn test_env_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_layer(&dir, "base.json", r#"{"worker_pool": {"size": 4}}"#);
        let env = vec![
            ("VERTICORE_WORKER_POOL_SIZE".to_string(), "2".to_string()),
            ("VERTICORE_REQUEST_TIMEOUT".to_string(), "250ms".to_string()),
            ("UNRELATED".to_string(), "1".to_string()),
        ];

        let config = Config::load_with_env(&[base], env).unwrap();
        assert_eq!(config.worker_pool.size, 2);
        assert_eq!(config.bus.request_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_non_object_layer_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_layer(&dir, "bad.json", "[1, 2]");
        let err = Config::load_with_env(&[bad], Vec::new()).unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn test_entities_section() {
        let dir = tempfile::tempdir().unwrap();
        let layer = write_layer(
            &dir,
            "entities.json",
            r#"{"entities": [{"name": "project", "fields": [{"name": "title", "type": "string", "required": true}]}]}"#,
        );
        let config = Config::load_with_env(&[layer], Vec::new()).unwrap();
        assert_eq!(config.entities.len(), 1);
        assert_eq!(config.entities[0].name, "project");
    }
}
