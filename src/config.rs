//! Extraction configuration

use crate::derive::DerivationScope;
use crate::encoder::DEFAULT_LIST_SEPARATOR;
use crate::error::ComputeError;
use crate::types::TemplateKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one extraction run
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Template whose audio rules and columns apply; required for response tables
    #[serde(default)]
    pub template: Option<TemplateKind>,

    /// Where sequence-sensitive derivations restart
    #[serde(default)]
    pub scope: DerivationScope,

    /// Parallel participant workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Substring the exercise application id must contain.
    /// Response tables default to the template's application prefix.
    #[serde(default)]
    pub application_filter: Option<String>,

    /// Separator for stimulus lists inside one cell
    #[serde(default = "default_list_separator")]
    pub list_separator: String,
}

fn default_workers() -> usize {
    1
}

fn default_list_separator() -> String {
    DEFAULT_LIST_SEPARATOR.to_string()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            template: None,
            scope: DerivationScope::default(),
            workers: default_workers(),
            application_filter: None,
            list_separator: default_list_separator(),
        }
    }
}

impl ExtractionConfig {
    pub fn for_template(template: TemplateKind) -> Self {
        Self {
            template: Some(template),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ComputeError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ComputeError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ComputeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.workers == 0 {
            return Err(ComputeError::ConfigError(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.list_separator.is_empty() {
            return Err(ComputeError::ConfigError(
                "list_separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured template, or an error naming the missing setting
    pub fn require_template(&self) -> Result<TemplateKind, ComputeError> {
        self.template.ok_or_else(|| {
            ComputeError::ConfigError("a template is required for response tables".to_string())
        })
    }

    /// Application filter for response tables of `template`
    pub fn response_filter(&self, template: TemplateKind) -> String {
        self.application_filter
            .clone()
            .unwrap_or_else(|| template.application_prefix().to_string())
    }
}
