//! Configuration of a persistent state.
//!
//! Defaults:
//! - scope = Durable, key = "json-joy-state.client"
//! - Session scope uses key "json-joy-state.session"
//! - durable states follow external changes, session states do not
//!
//! Env (see [`PersistConfig::from_env`]):
//! - JSON_JOY_STATE_KEY = storage key
//! - JSON_JOY_STATE_SCOPE = durable|session
//! - JSON_JOY_STATE_WATCH = 0|1|true|false|on|off|yes|no

use serde::Deserialize;

/// Lifetime class of the storage slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// Survives restarts; other contexts may write the same slot.
    #[default]
    Durable,
    /// Lives as long as the hosting session.
    Session,
}

impl StorageScope {
    pub fn default_key(self) -> &'static str {
        match self {
            StorageScope::Durable => "json-joy-state.client",
            StorageScope::Session => "json-joy-state.session",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Storage key. `None` (or empty) selects the scope's default key.
    pub key: Option<String>,

    pub scope: StorageScope,

    /// Restore whenever the backend reports an external change.
    /// `None` follows the scope: durable watches, session does not.
    pub watch_external: Option<bool>,
}

impl PersistConfig {
    pub fn durable() -> Self {
        Self::default()
    }

    pub fn session() -> Self {
        Self::default().scope(StorageScope::Session)
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn scope(mut self, scope: StorageScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn watch_external(mut self, watch: bool) -> Self {
        self.watch_external = Some(watch);
        self
    }

    /// Effective storage key.
    pub fn storage_key(&self) -> &str {
        match self.key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => self.scope.default_key(),
        }
    }

    pub fn watches_external(&self) -> bool {
        self.watch_external
            .unwrap_or(self.scope == StorageScope::Durable)
    }

    /// Load configuration from environment variables.
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("JSON_JOY_STATE_KEY") {
            let v = v.trim();
            if !v.is_empty() {
                cfg.key = Some(v.to_string());
            }
        }

        if let Ok(v) = std::env::var("JSON_JOY_STATE_SCOPE") {
            match v.trim().to_ascii_lowercase().as_str() {
                "durable" => cfg.scope = StorageScope::Durable,
                "session" => cfg.scope = StorageScope::Session,
                _ => {}
            }
        }

        if let Ok(v) = std::env::var("JSON_JOY_STATE_WATCH") {
            let s = v.trim().to_ascii_lowercase();
            cfg.watch_external = Some(s == "1" || s == "true" || s == "on" || s == "yes");
        }

        cfg
    }
}
