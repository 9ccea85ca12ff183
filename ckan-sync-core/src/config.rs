use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection settings for one repository, fixed for the life of a client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl ClientConfig {
    /// `endpoint` is the site root, e.g. `https://demo.ckan.org`. Trailing slashes are dropped.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        ClientConfig {
            endpoint,
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn action_url(&self, action: &str) -> String {
        format!("{}/api/3/action/{}", self.endpoint, action)
    }

    pub fn trace_loaded(&self) {
        info!(
            endpoint = %self.endpoint,
            api_key_set = !self.api_key.is_empty(),
            timeout_secs = self.timeout.as_secs(),
            "Loaded ClientConfig"
        );
        debug!(?self, "ClientConfig loaded (full debug)");
    }
}

// The key never reaches logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
