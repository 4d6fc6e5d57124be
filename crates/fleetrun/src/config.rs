//! Runtime configuration for an rpc node.
//!
//! Resolution order: environment variables → config file → defaults.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// How long a caller waits for a response before giving up.
    #[serde(rename = "call_timeout_ms", with = "millis")]
    pub call_timeout: Duration,
    /// Chains executed concurrently on the blocking pool.
    pub worker_permits: usize,
    /// Longest chain a listener accepts.
    pub max_chain_length: i32,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            worker_permits: 64,
            max_chain_length: 1024,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("{key} must be at most {max}")]
    TooLarge { key: &'static str, max: usize },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ── Loading ───────────────────────────────────────────────────────────────────

impl RpcConfig {
    /// Parses a TOML document, then applies `FLEETRUN_*` overrides.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: RpcConfig = toml::from_str(text)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise starts from the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let mut config = RpcConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        Self::from_toml_str(&text)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(ms) = env_parse::<u64>("FLEETRUN_CALL_TIMEOUT_MS") {
            self.call_timeout = Duration::from_millis(ms);
        }
        if let Some(permits) = env_parse("FLEETRUN_WORKER_PERMITS") {
            self.worker_permits = permits;
        }
        if let Some(max) = env_parse("FLEETRUN_MAX_CHAIN_LENGTH") {
            self.max_chain_length = max;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.call_timeout.is_zero() {
            return Err(ConfigError::NotPositive("call_timeout_ms"));
        }
        if self.worker_permits == 0 {
            return Err(ConfigError::NotPositive("worker_permits"));
        }
        if self.worker_permits > Semaphore::MAX_PERMITS {
            return Err(ConfigError::TooLarge { key: "worker_permits", max: Semaphore::MAX_PERMITS });
        }
        if self.max_chain_length <= 0 {
            return Err(ConfigError::NotPositive("max_chain_length"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable config override");
            None
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
