use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use win4_analysis::config::{AnalyticsConfig, PayoutConfig};
use win4_db::db::db_path;
use win4_fetch::config::ApiConfig;

pub const DEFAULT_CONFIG_FILE: &str = "win4.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub analytics: AnalyticsConfig,
    pub payouts: PayoutConfig,
    /// Chemin de la base SQLite, `data/win4.db` par défaut
    pub database: Option<PathBuf>,
}

impl AppConfig {
    /// Fichier absent : valeurs par défaut. Fichier invalide : erreur.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Pas de fichier de configuration {:?}, valeurs par défaut", path);
            return Ok(Self::default().with_env());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Impossible de lire {:?}", path))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Configuration invalide dans {:?}", path))?;
        log::info!("Configuration chargée depuis {:?}", path);
        Ok(config.with_env())
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(db_path)
    }

    fn with_env(mut self) -> Self {
        self.api = self.api.with_env_token();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("win4-config-inexistant-7f3a.json");
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.api.chunk_size, 10_000);
        assert_eq!(config.analytics.default_window_days, 60);
        assert_eq!(config.payouts.straight, 5000);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::parse(r#"{"api": {"chunk_size": 500}, "analytics": {"default_top_n": 7}}"#).unwrap();
        assert_eq!(config.api.chunk_size, 500);
        assert_eq!(config.api.domain, "data.ny.gov");
        assert_eq!(config.analytics.default_top_n, 7);
        assert_eq!(config.payouts.box_24, 208);
        assert_eq!(config.database_path(), db_path());
    }

    #[test]
    fn test_database_path_from_config() {
        let config = AppConfig::parse(r#"{"database": "/tmp/tirages/ny.db"}"#).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/tirages/ny.db"));
    }

    #[test]
    fn test_malformed_is_error() {
        assert!(AppConfig::parse("{ pas du json").is_err());
        assert!(AppConfig::parse(r#"{"api": {"chunk_size": "beaucoup"}}"#).is_err());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let path = std::env::temp_dir().join(format!("win4-config-{}.json", std::process::id()));
        std::fs::write(&path, "[1, 2").unwrap();
        let result = AppConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }
}
