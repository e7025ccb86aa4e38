use std::time::Duration;

use markload_core::BackoffPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Root of the conversion service; endpoints are appended to its path.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub client: ClientSettings,
    pub backoff: BackoffPolicy,
}
