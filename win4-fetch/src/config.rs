use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const APP_TOKEN_ENV: &str = "SOCRATA_APP_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub domain: String,
    pub dataset_id: String,
    pub chunk_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub timeout_secs: u64,
    /// Pause entre deux pages réussies (0 = pas de pause)
    pub throttle_ms: u64,
    #[serde(skip)]
    pub app_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            domain: "data.ny.gov".to_string(),
            dataset_id: "hsys-3def".to_string(),
            chunk_size: 10_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            max_retry_delay_ms: 20_000,
            timeout_secs: 30,
            throttle_ms: 0,
            app_token: None,
        }
    }
}

impl ApiConfig {
    pub fn resource_url(&self) -> String {
        format!("https://{}/resource/{}.json", self.domain, self.dataset_id)
    }

    pub fn metadata_url(&self) -> String {
        format!("https://{}/api/views/{}.json", self.domain, self.dataset_id)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Jeton lu dans l'environnement ; son absence n'est jamais bloquante.
    pub fn with_env_token(mut self) -> Self {
        if let Ok(token) = std::env::var(APP_TOKEN_ENV) {
            let token = token.trim().to_string();
            if !token.is_empty() {
                self.app_token = Some(token);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls() {
        let config = ApiConfig::default();
        assert_eq!(config.resource_url(), "https://data.ny.gov/resource/hsys-3def.json");
        assert_eq!(config.metadata_url(), "https://data.ny.gov/api/views/hsys-3def.json");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ApiConfig = serde_json::from_str(r#"{"chunk_size": 500}"#).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.domain, "data.ny.gov");
    }

    #[test]
    fn test_token_never_serialized() {
        let config = ApiConfig {
            app_token: Some("secret".into()),
            ..ApiConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
