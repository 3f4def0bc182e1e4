//! Configuration management for the workspace access-control core

pub mod roles;

pub use roles::{RoleCatalogConfig, RoleDefinition};

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Optional JSON role catalog; the built-in catalog is used when unset
    pub role_catalog_path: Option<PathBuf>,
    /// Propagation configuration
    pub propagation: PropagationConfig,
    /// Telemetry configuration
    pub telemetry: TelemetryConfig,
}

/// Limits applied when fanning policy changes out to dependents
#[derive(Debug, Clone)]
pub struct PropagationConfig {
    /// Upper bound for updating every dependent of one workspace
    pub timeout_ms: u64,
    /// Dependents updated at the same time
    pub max_concurrency: usize,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_concurrency: 8,
        }
    }
}

impl PropagationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "text" or "json"
    pub log_format: String,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            service_name: "workspace-acl".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let max_concurrency: usize = env::var("ACL_PROPAGATION_MAX_CONCURRENCY")
            .unwrap_or_else(|_| "8".to_string())
            .parse()
            .context("Invalid ACL_PROPAGATION_MAX_CONCURRENCY")?;
        if max_concurrency == 0 {
            anyhow::bail!("ACL_PROPAGATION_MAX_CONCURRENCY must be at least 1");
        }

        Ok(Self {
            role_catalog_path: env::var("ACL_ROLE_CATALOG_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            propagation: PropagationConfig {
                timeout_ms: env::var("ACL_PROPAGATION_TIMEOUT_MS")
                    .unwrap_or_else(|_| "30000".to_string())
                    .parse()
                    .context("Invalid ACL_PROPAGATION_TIMEOUT_MS")?,
                max_concurrency,
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT")
                    .map(|s| s.to_lowercase())
                    .unwrap_or_else(|_| "text".to_string()),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "workspace-acl".to_string()),
            },
        })
    }

    /// Role catalog from `role_catalog_path`, or the built-in one
    pub fn load_role_catalog(&self) -> Result<RoleCatalogConfig> {
        match &self.role_catalog_path {
            Some(path) => RoleCatalogConfig::from_file(path),
            None => Ok(RoleCatalogConfig::default()),
        }
    }
}
