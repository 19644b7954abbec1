use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File the configuration is read from, relative to the working directory.
pub const CONFIG_FILE: &str = "PollClient.toml";

/// Prefix of environment variables that override the file, e.g. `POLL_API_BASE_URL`.
pub const ENV_PREFIX: &str = "POLL_";

/// Client configuration, derived from built-in defaults, `PollClient.toml`
/// and `POLL_*` environment variables, in increasing priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // non-secrets
    api_base_url: String,
    request_timeout_secs: u64,
    session_file: PathBuf,
    // secrets
    admin_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            session_file: PathBuf::from(".pollctl-session.json"),
            admin_token: None,
        }
    }
}

impl Config {
    /// The layered configuration sources.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load from all sources.
    pub fn load() -> Result<Self> {
        Ok(Self::figment().extract()?)
    }

    /// Point the client at a different service.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Root URL of the poll service, without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// How long to wait for the service before giving up on a request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Where the signed-in user is remembered between runs.
    pub fn session_file(&self) -> &Path {
        &self.session_file
    }

    /// Token for registering admin accounts, sent as `X-Admin-Token`.
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }
}
