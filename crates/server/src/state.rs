use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sofa_core::{Config, MediaRepository, Pipeline, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    config_hash: String,
    started_at: DateTime<Utc>,
    repository: Arc<dyn MediaRepository>,
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(
        config: Config,
        repository: Arc<dyn MediaRepository>,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self {
            config_hash: config_hash(&config),
            config,
            started_at: Utc::now(),
            repository,
            pipeline,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// First 16 hex digits of the SHA-256 of the loaded config.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn repository(&self) -> &dyn MediaRepository {
        self.repository.as_ref()
    }

    pub fn pipeline(&self) -> &Pipeline {
        self.pipeline.as_ref()
    }
}

fn config_hash(config: &Config) -> String {
    let config_json = serde_json::to_string(config).unwrap_or_default();
    let digest = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    digest[..16].to_string()
}
