//! Resolver runtime configuration.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```yaml
//! array_delimiter: "|"
//! null_placeholders: ["", "nan", "NaN", "null", "None"]
//! normalize_field_keys: true
//! dedup: false
//! parallel: true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Separator for delimiter-joined array values.
    pub array_delimiter: char,
    /// Raw values treated as absent (compared after trimming).
    pub null_placeholders: Vec<String>,
    /// Lowercase raw field keys and map spaces/hyphens to `_` before matching.
    pub normalize_field_keys: bool,
    /// Suppress repeated node/edge keys within one run.
    pub dedup: bool,
    pub parallel: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            array_delimiter: '|',
            null_placeholders: ["", "nan", "NaN", "null", "None"]
                .into_iter()
                .map(String::from)
                .collect(),
            normalize_field_keys: true,
            dedup: false,
            parallel: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read resolver config `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid resolver config (YAML): {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid resolver config (JSON): {0}")]
    Json(#[from] serde_json::Error),
}

impl ResolverConfig {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn is_placeholder(&self, raw: &str) -> bool {
        let raw = raw.trim();
        raw.is_empty() || self.null_placeholders.iter().any(|p| p == raw)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load from `.json`, or YAML for any other extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Self::from_yaml_str(&text)
        }
    }
}

/// `"Secondary IDs"` → `"secondary_ids"`, `"gene-name"` → `"gene_name"`.
pub fn normalize_field_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
