use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub freshness_window: Duration,
    pub probe_timeout: Duration,
    pub probe_concurrency: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(8),
            probe_concurrency: 8,
        }
    }
}
