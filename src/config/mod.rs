#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::adapters::http::{DEFAULT_LOOKUP_TIMEOUT_SECONDS, DEFAULT_VIACEP_ENDPOINT};
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_one_of, validate_path, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const STORAGE_FILE: &str = "file";
pub const STORAGE_MEMORY: &str = "memory";
pub const STORAGE_BACKENDS: [&str; 2] = [STORAGE_FILE, STORAGE_MEMORY];

/// 解析後的服務設定（預設值 → TOML → 命令列）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub lookup_endpoint: String,
    pub lookup_timeout_seconds: u64,
    pub storage_backend: String,
    pub data_dir: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lookup_endpoint: DEFAULT_VIACEP_ENDPOINT.to_string(),
            lookup_timeout_seconds: DEFAULT_LOOKUP_TIMEOUT_SECONDS,
            storage_backend: STORAGE_FILE.to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_seconds)
    }
}

impl ConfigProvider for ServiceConfig {
    fn lookup_endpoint(&self) -> &str {
        &self.lookup_endpoint
    }

    fn lookup_timeout_seconds(&self) -> u64 {
        self.lookup_timeout_seconds
    }

    fn storage_backend(&self) -> &str {
        &self.storage_backend
    }

    fn data_dir(&self) -> &str {
        &self.data_dir
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validate_url("lookup.endpoint", &self.lookup_endpoint)?;
        validate_range("lookup.timeout_seconds", self.lookup_timeout_seconds, 1, 120)?;
        validate_one_of("storage.backend", &self.storage_backend, &STORAGE_BACKENDS)?;
        if self.storage_backend == STORAGE_FILE {
            validate_path("storage.data_dir", &self.data_dir)?;
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
