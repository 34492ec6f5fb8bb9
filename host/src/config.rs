// Client configuration.
//
// Loaded from an optional JSON file, then overridden by environment
// variables. Anything not given falls back to the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use duel_core::GameKind;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

pub const ENV_GATEWAY_URL: &str = "DUEL_GATEWAY_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "DUEL_POLL_INTERVAL_MS";
pub const ENV_CACHE_DIR: &str = "DUEL_CACHE_DIR";
pub const ENV_SNARKJS: &str = "DUEL_SNARKJS";

/// Compiled circuit for one game family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitArtifact {
    pub wasm: PathBuf,
    pub zkey: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitArtifacts {
    pub shot: CircuitArtifact,
    pub guess: CircuitArtifact,
}

impl Default for CircuitArtifacts {
    fn default() -> Self {
        Self {
            shot: CircuitArtifact {
                wasm: PathBuf::from("circuits/resolve_shot_js/resolve_shot.wasm"),
                zkey: PathBuf::from("circuits/resolve_shot_final.zkey"),
            },
            guess: CircuitArtifact {
                wasm: PathBuf::from("circuits/resolve_guess_js/resolve_guess.wasm"),
                zkey: PathBuf::from("circuits/resolve_guess_final.zkey"),
            },
        }
    }
}

impl CircuitArtifacts {
    pub fn for_kind(&self, kind: GameKind) -> &CircuitArtifact {
        match kind {
            GameKind::Battleship => &self.shot,
            GameKind::Wordle => &self.guess,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Ledger gateway. `None` plays against an in-process ledger.
    pub gateway_url: Option<String>,
    pub poll_interval_ms: u64,
    /// Attempts for an idempotent session read before giving up.
    pub poll_retries: u32,
    pub cache_dir: PathBuf,
    pub snarkjs: String,
    pub artifacts: CircuitArtifacts,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            poll_interval_ms: 2_000,
            poll_retries: 3,
            cache_dir: PathBuf::from(".duel-cache"),
            snarkjs: "snarkjs".to_string(),
            artifacts: CircuitArtifacts::default(),
        }
    }
}

impl ClientConfig {
    /// File (if any) plus process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("reading {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| ClientError::Config(format!("parsing {}: {}", path.display(), e)))
    }

    /// Applies overrides from `lookup` (normally the environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_GATEWAY_URL) {
            self.gateway_url = if url.trim().is_empty() { None } else { Some(url) };
        }
        if let Some(ms) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = ms
                .trim()
                .parse()
                .map_err(|_| ClientError::Config(format!("{} must be an integer, got {:?}", ENV_POLL_INTERVAL_MS, ms)))?;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(bin) = lookup(ENV_SNARKJS) {
            self.snarkjs = bin;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ClientError::Config("poll interval must be positive".into()));
        }
        if self.poll_retries == 0 {
            return Err(ClientError::Config("poll retries must be at least 1".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert!(config.gateway_url.is_none());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: ClientConfig =
            serde_json::from_str(r#"{"gateway_url":"http://a","poll_interval_ms":500}"#).unwrap();
        assert_eq!(config.poll_retries, 3);

        config
            .apply_overrides(env(&[(ENV_GATEWAY_URL, "http://b"), (ENV_CACHE_DIR, "/tmp/x")]))
            .unwrap();
        assert_eq!(config.gateway_url.as_deref(), Some("http://b"));
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/x"));
    }

    #[test]
    fn bad_poll_interval_is_a_config_error() {
        let mut config = ClientConfig::default();
        let err = config.apply_overrides(env(&[(ENV_POLL_INTERVAL_MS, "soon")])).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));

        let err = config.apply_overrides(env(&[(ENV_POLL_INTERVAL_MS, "0")])).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn empty_gateway_means_local_ledger() {
        let mut config = ClientConfig { gateway_url: Some("http://a".into()), ..Default::default() };
        config.apply_overrides(env(&[(ENV_GATEWAY_URL, "")])).unwrap();
        assert!(config.gateway_url.is_none());
    }
}
