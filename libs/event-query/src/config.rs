//! Query engine configuration
//!
//! Values are threaded explicitly through the planner, resolver and serializer.
//! Loading supports:
//! - Reasonable defaults
//! - An optional configuration file
//! - Environment variable overrides (`LINKEDEVENTS__QUERY__MAX_PAGE_SIZE=50`)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::Language;

/// Configuration for planning and serializing searches.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct QueryConfig {
    /// Fallback language when none of the requested languages is present.
    #[serde(default = "default_language")]
    pub default_language: Language,

    /// Languages the catalogue is published in.
    #[serde(default = "default_supported_languages")]
    pub supported_languages: Vec<Language>,

    /// Page size used when the request does not specify one.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Hard upper bound on the page size.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Candidate count at which post-filters are evaluated in parallel.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_post_filter_threshold: usize,

    /// Whether the PostGIS backend evaluates polygon containment in SQL.
    #[serde(default)]
    pub polygon_native: bool,
}

fn default_language() -> Language {
    Language::Fi
}

fn default_supported_languages() -> Vec<Language> {
    Language::ALL.to_vec()
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

fn default_parallel_threshold() -> usize {
    512
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            supported_languages: default_supported_languages(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            parallel_post_filter_threshold: default_parallel_threshold(),
            polygon_native: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Root {
    #[serde(default)]
    query: Option<QueryConfig>,
}

impl QueryConfig {
    /// Load configuration with precedence (highest first):
    /// 1. `LINKEDEVENTS__QUERY__*` environment variables
    /// 2. The given file, if any
    /// 3. Defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("LINKEDEVENTS")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("query.supported_languages"),
        );

        let root: Root = builder.build()?.try_deserialize()?;
        let config = root.query.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 {
            return Err(ConfigError::Message(
                "query.max_page_size must be > 0".to_string(),
            ));
        }

        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::Message(format!(
                "query.default_page_size must be between 1 and max_page_size ({})",
                self.max_page_size
            )));
        }

        if self.supported_languages.is_empty() {
            return Err(ConfigError::Message(
                "query.supported_languages must not be empty".to_string(),
            ));
        }

        if !self.supported_languages.contains(&self.default_language) {
            return Err(ConfigError::Message(format!(
                "query.default_language '{}' is not among supported_languages",
                self.default_language
            )));
        }

        Ok(())
    }
}
