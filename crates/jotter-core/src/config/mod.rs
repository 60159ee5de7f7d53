//! Client configuration.
//!
//! Values come from an optional JSON config file and are then overridden by
//! `JOTTER_*` environment variables. Only public endpoints and the anon key
//! belong here; session tokens live in secure storage.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::{resolve_optional_supabase_config, AuthResult};
use crate::routing::DEFAULT_SPLASH_DURATION;
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_SUPABASE_URL: &str = "JOTTER_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "JOTTER_SUPABASE_ANON_KEY";
pub const ENV_SPLASH_MS: &str = "JOTTER_SPLASH_MS";
pub const ENV_CONNECTIVITY_URL: &str = "JOTTER_CONNECTIVITY_URL";
pub const ENV_CONNECTIVITY_INTERVAL_SECS: &str = "JOTTER_CONNECTIVITY_INTERVAL_SECS";
pub const ENV_SESSION_REFRESH_SECS: &str = "JOTTER_SESSION_REFRESH_SECS";
pub const ENV_SESSION_STORE: &str = "JOTTER_SESSION_STORE";

const DEFAULT_CONNECTIVITY_INTERVAL_SECS: u64 = 10;
const DEFAULT_SESSION_REFRESH_SECS: u64 = 30;

/// Where the signed-in session is persisted between launches.
///
/// The private file works on every platform; the OS keychain is opt-in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStorageKind {
    Keyring,
    #[default]
    File,
}

impl std::str::FromStr for SessionStorageKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "file" => Ok(Self::File),
            other => Err(format!(
                "unknown session store '{other}' (expected keyring or file)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default = "default_splash_ms")]
    pub splash_ms: u64,
    #[serde(default)]
    pub connectivity_url: Option<String>,
    #[serde(default = "default_connectivity_interval_secs")]
    pub connectivity_interval_secs: u64,
    #[serde(default = "default_session_refresh_secs")]
    pub session_refresh_secs: u64,
    #[serde(default)]
    pub session_store: SessionStorageKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            splash_ms: default_splash_ms(),
            connectivity_url: None,
            connectivity_interval_secs: default_connectivity_interval_secs(),
            session_refresh_secs: default_session_refresh_secs(),
            session_store: SessionStorageKind::default(),
        }
    }
}

impl ClientConfig {
    /// Parse a JSON config file payload.
    pub fn from_json(payload: &str) -> Result<Self, String> {
        serde_json::from_str(payload).map_err(|error| format!("invalid config JSON: {error}"))
    }

    /// Read a JSON config file.
    pub fn load_file(path: &Path) -> Result<Self, String> {
        let payload = std::fs::read_to_string(path)
            .map_err(|error| format!("failed to read config {}: {error}", path.display()))?;
        Self::from_json(&payload)
    }

    /// Apply `JOTTER_*` overrides read through `lookup`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| normalize_text_option(lookup(name));

        if let Some(url) = lookup(ENV_SUPABASE_URL) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = lookup(ENV_SUPABASE_ANON_KEY) {
            self.supabase_anon_key = Some(key);
        }
        if let Some(url) = lookup(ENV_CONNECTIVITY_URL) {
            self.connectivity_url = Some(url);
        }
        if let Some(value) = lookup(ENV_SPLASH_MS) {
            self.splash_ms = parse_number(ENV_SPLASH_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_CONNECTIVITY_INTERVAL_SECS) {
            self.connectivity_interval_secs = parse_number(ENV_CONNECTIVITY_INTERVAL_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_SESSION_REFRESH_SECS) {
            self.session_refresh_secs = parse_number(ENV_SESSION_REFRESH_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_SESSION_STORE) {
            self.session_store = value.parse()?;
        }
        Ok(self)
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(url) = normalize_text_option(self.supabase_url.clone()) {
            if !is_http_url(&url) {
                return Err(format!(
                    "supabase_url must include http:// or https://: {url}"
                ));
            }
        }
        if let Some(url) = normalize_text_option(self.connectivity_url.clone()) {
            if !is_http_url(&url) {
                return Err(format!(
                    "connectivity_url must include http:// or https://: {url}"
                ));
            }
        }
        if self.connectivity_interval_secs == 0 {
            return Err("connectivity_interval_secs must be greater than zero".to_string());
        }
        if self.session_refresh_secs == 0 {
            return Err("session_refresh_secs must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Supabase URL and anon key, or `None` when neither is configured.
    pub fn supabase(&self) -> AuthResult<Option<(String, String)>> {
        resolve_optional_supabase_config(self.supabase_url.clone(), self.supabase_anon_key.clone())
    }

    pub const fn splash_duration(&self) -> Duration {
        Duration::from_millis(self.splash_ms)
    }

    pub const fn connectivity_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity_interval_secs)
    }

    pub const fn session_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.session_refresh_secs)
    }

    /// URL probed for reachability; defaults to the auth health endpoint.
    pub fn connectivity_probe_url(&self) -> Option<String> {
        normalize_text_option(self.connectivity_url.clone()).or_else(|| {
            normalize_text_option(self.supabase_url.clone())
                .map(|url| format!("{}/auth/v1/health", url.trim_end_matches('/')))
        })
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64, String> {
    value
        .parse()
        .map_err(|_| format!("{name} must be a whole number, got '{value}'"))
}

fn default_splash_ms() -> u64 {
    u64::try_from(DEFAULT_SPLASH_DURATION.as_millis()).unwrap_or(2_000)
}

const fn default_connectivity_interval_secs() -> u64 {
    DEFAULT_CONNECTIVITY_INTERVAL_SECS
}

const fn default_session_refresh_secs() -> u64 {
    DEFAULT_SESSION_REFRESH_SECS
}
