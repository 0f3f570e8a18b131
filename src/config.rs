//! Service Configuration - Table and Bucket Names from the Environment

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use tracing::info;

use crate::validation::FailureMode;

pub const PAGES_TABLE_VAR: &str = "PAGES_TABLE_NAME";
pub const WIDGETS_TABLE_VAR: &str = "WIDGETS_TABLE_NAME";
pub const PAGE_TEMPLATES_TABLE_VAR: &str = "PAGE_TEMPLATES_TABLE_NAME";
pub const DEFINITIONS_BUCKET_VAR: &str = "DEFINITIONS_BUCKET";
pub const TARGET_SITE_BUCKET_VAR: &str = "TARGET_SITE_BUCKET";
pub const LINT_FAILURE_MODE_VAR: &str = "LINT_FAILURE_MODE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {key} value: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub pages_table: String,
    pub widgets_table: String,
    pub page_templates_table: String,
    /// Holds page templates and widget HTML fragments.
    pub definitions_bucket: String,
    /// Receives published pages.
    pub target_site_bucket: String,
    #[serde(default)]
    pub lint_failure_mode: FailureMode,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            pages_table: "pages".to_string(),
            widgets_table: "widgets".to_string(),
            page_templates_table: "page-templates".to_string(),
            definitions_bucket: "definitions".to_string(),
            target_site_bucket: "site".to_string(),
            lint_failure_mode: FailureMode::default(),
        }
    }
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let name = |key: &'static str, default: String| -> Result<String, ConfigError> {
            match lookup(key) {
                Some(value) if value.trim().is_empty() => Err(ConfigError::Empty { key }),
                Some(value) => Ok(value.trim().to_string()),
                None => {
                    info!("{key} not set, using default: {default}");
                    Ok(default)
                }
            }
        };

        let lint_failure_mode = match lookup(LINT_FAILURE_MODE_VAR) {
            Some(value) => value.parse().map_err(|message| ConfigError::InvalidValue {
                key: LINT_FAILURE_MODE_VAR,
                message,
            })?,
            None => defaults.lint_failure_mode,
        };

        Ok(Self {
            pages_table: name(PAGES_TABLE_VAR, defaults.pages_table)?,
            widgets_table: name(WIDGETS_TABLE_VAR, defaults.widgets_table)?,
            page_templates_table: name(PAGE_TEMPLATES_TABLE_VAR, defaults.page_templates_table)?,
            definitions_bucket: name(DEFINITIONS_BUCKET_VAR, defaults.definitions_bucket)?,
            target_site_bucket: name(TARGET_SITE_BUCKET_VAR, defaults.target_site_bucket)?,
            lint_failure_mode,
        })
    }
}
