use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.backend_timeout_seconds))
            .user_agent("casaora-property-overview/1.0")
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }
}
