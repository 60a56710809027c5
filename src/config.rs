// src/config.rs
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::controller::PendingPolicy;
use crate::error::{NfcError, NfcResult};

pub const CONFIG_ENV: &str = "SIMPLENFC_CONFIG";
pub const BIND_ENV: &str = "SIMPLENFC_BIND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfcConfig {
    /// Scope of the identity record type, `application/<app_scope>`.
    pub app_scope: String,
    /// Where the handler table is persisted. In-memory only when unset.
    pub handler_store: Option<PathBuf>,
    pub pending_policy: PendingPolicy,
    pub bind_addr: SocketAddr,
    pub poll_interval_ms: u64,
}

impl Default for NfcConfig {
    fn default() -> Self {
        NfcConfig {
            app_scope: "de.simplenfc".to_string(),
            handler_store: None,
            pending_policy: PendingPolicy::Replace,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3500)),
            poll_interval_ms: 500,
        }
    }
}

impl NfcConfig {
    pub fn load(path: &Path) -> NfcResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| NfcError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: NfcConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the file named by `SIMPLENFC_CONFIG` (defaults when unset), then
    /// applies `SIMPLENFC_BIND`.
    pub fn from_env() -> NfcResult<Self> {
        let mut config = match env::var_os(CONFIG_ENV) {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                Self::load(Path::new(&path))?
            }
            None => NfcConfig::default(),
        };
        if let Ok(bind) = env::var(BIND_ENV) {
            config.bind_addr = bind
                .parse()
                .map_err(|e| NfcError::Config(format!("{}={}: {}", BIND_ENV, bind, e)))?;
        }
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> NfcResult<()> {
        if self.app_scope.is_empty() {
            return Err(NfcError::Config("app_scope must not be empty".into()));
        }
        if self.app_scope.len() > 243 {
            // "application/" plus the scope must fit the one-byte type length
            return Err(NfcError::Config("app_scope is too long".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(NfcError::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }
}
