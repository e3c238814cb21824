//! Process-wide operator settings read from the environment.

use crate::automation_config::DEFAULT_CLUSTER_DOMAIN;
use crate::logging::{LogFormat, LoggingConfig};
use std::env;
use thiserror::Error;

pub const CLUSTER_DNS_NAME_ENV: &str = "CLUSTER_DNS_NAME";
pub const AGENT_IMAGE_ENV: &str = "AGENT_IMAGE";
pub const VERSION_UPGRADE_HOOK_IMAGE_ENV: &str = "VERSION_UPGRADE_HOOK_IMAGE";
pub const READINESS_PROBE_IMAGE_ENV: &str = "READINESS_PROBE_IMAGE";
pub const MONGODB_IMAGE_ENV: &str = "MONGODB_IMAGE";
pub const MONGODB_REPO_URL_ENV: &str = "MONGODB_REPO_URL";
pub const MANAGED_SECURITY_CONTEXT_ENV: &str = "MANAGED_SECURITY_CONTEXT";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_MONGODB_IMAGE: &str = "mongo";
const DEFAULT_MONGODB_REPO_URL: &str = "quay.io/mongodb";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {name} is not set")]
    MissingVariable { name: String },
    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

/// Settings shared by every reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    pub cluster_domain: String,
    pub agent_image: String,
    pub version_upgrade_hook_image: String,
    pub readiness_probe_image: String,
    pub mongodb_image: String,
    pub mongodb_repo_url: String,
    /// When set, the platform assigns pod security contexts itself.
    pub managed_security_context: bool,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let required = |name: &str| {
            optional(name).ok_or_else(|| ConfigError::MissingVariable {
                name: name.to_string(),
            })
        };
        let managed_security_context = match optional(MANAGED_SECURITY_CONTEXT_ENV) {
            None => false,
            Some(value) => parse_bool(MANAGED_SECURITY_CONTEXT_ENV, &value)?,
        };
        let log_format = match optional(LOG_FORMAT_ENV) {
            None => LogFormat::Text,
            Some(value) => value
                .parse()
                .map_err(|reason: String| ConfigError::InvalidValue {
                    name: LOG_FORMAT_ENV.to_string(),
                    value,
                    reason,
                })?,
        };
        Ok(Self {
            cluster_domain: optional(CLUSTER_DNS_NAME_ENV)
                .unwrap_or_else(|| DEFAULT_CLUSTER_DOMAIN.to_string()),
            agent_image: required(AGENT_IMAGE_ENV)?,
            version_upgrade_hook_image: required(VERSION_UPGRADE_HOOK_IMAGE_ENV)?,
            readiness_probe_image: required(READINESS_PROBE_IMAGE_ENV)?,
            mongodb_image: optional(MONGODB_IMAGE_ENV)
                .unwrap_or_else(|| DEFAULT_MONGODB_IMAGE.to_string()),
            mongodb_repo_url: optional(MONGODB_REPO_URL_ENV)
                .unwrap_or_else(|| DEFAULT_MONGODB_REPO_URL.to_string()),
            managed_security_context,
            log_level: optional(LOG_LEVEL_ENV).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_format,
        })
    }

    /// `<repo>/<image>:<version>`
    pub fn mongodb_image_for(&self, version: &str) -> String {
        format!(
            "{}/{}:{}",
            self.mongodb_repo_url.trim_end_matches('/'),
            self.mongodb_image,
            version
        )
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            filter: self.log_level.clone(),
            format: self.log_format,
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
