use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
pub struct IngestConfig {
    /// shared secret accepted in the `X-API-KEY` header
    pub api_key: Option<String>,
    #[serde(default = "default_freshness_window_ms")]
    pub freshness_window_ms: u64,
}

impl IngestConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_millis(self.freshness_window_ms)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            freshness_window_ms: default_freshness_window_ms(),
        }
    }
}

fn default_freshness_window_ms() -> u64 {
    5000
}
