//! Engine configuration.
//!
//! Every field has a default, so a configuration file only needs the values
//! it changes:
//!
//! ```yaml
//! default_page_size: 25
//! max_page_size: 200
//! weights:
//!   exact_field: 20.0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    /// YAML parse error.
    #[error("invalid configuration{}: {message}", in_file(.path))]
    Parse {
        path: Option<PathBuf>,
        message: String,
    },

    /// Values parsed but are inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn in_file(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

/// Per-match weights used by the search scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Whole field equals the query.
    pub exact_field: f64,
    /// Field contains the whole query.
    pub phrase: f64,
    /// A word in the field equals a query token.
    pub token_exact: f64,
    /// A word in the field starts with a query token.
    pub token_prefix: f64,
    /// The field contains a query token anywhere else.
    pub token_partial: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            exact_field: 10.0,
            phrase: 4.0,
            token_exact: 2.0,
            token_prefix: 1.5,
            token_partial: 1.0,
        }
    }
}

/// Settings shared by every query an engine runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Page size used when a request does not give one.
    pub default_page_size: usize,
    /// Upper bound on any page size.
    pub max_page_size: usize,
    /// Reject oversized pages instead of clamping them.
    pub strict_page_size: bool,
    pub weights: ScoringWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_page_size: 20,
            max_page_size: 100,
            strict_page_size: false,
            weights: ScoringWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates configuration from YAML.
    ///
    /// ```
    /// use listing_query::EngineConfig;
    ///
    /// let config = EngineConfig::from_yaml("max_page_size: 50").unwrap();
    /// assert_eq!(config.max_page_size, 50);
    /// assert_eq!(config.default_page_size, 20);
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse(yaml, None)
    }

    /// Reads configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content, Some(path))
    }

    fn parse(yaml: &str, path: Option<&Path>) -> Result<Self, ConfigError> {
        // An empty document means "all defaults".
        if yaml.trim().is_empty() {
            return Ok(EngineConfig::default());
        }
        let config: EngineConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
                path: path.map(Path::to_path_buf),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that page sizes and weights are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 {
            return Err(ConfigError::Invalid(
                "max_page_size must be at least 1".to_string(),
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        let w = &self.weights;
        let weights = [
            w.exact_field,
            w.phrase,
            w.token_exact,
            w.token_prefix,
            w.token_partial,
        ];
        if weights.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return Err(ConfigError::Invalid(
                "search weights must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
