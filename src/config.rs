// src/config.rs

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{Result, SourceError};

/// Runtime settings for the ingestion pipeline. Every field has a default, so an
/// empty file (or no file at all) is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root holding one directory per local dataset id.
    pub data_root: PathBuf,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub cache_ttl_secs: u64,
    pub default_locale: String,
    /// Optional YAML override for the column-name keyword table.
    pub keywords: Option<PathBuf>,
    /// Optional newline-delimited place-name list.
    pub gazetteer: Option<PathBuf>,
    /// Directory of pre-built `<local_id>.json` datasets, served before any CSV work.
    pub prebuilt_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("source_data/nsi"),
            request_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 250,
            cache_ttl_secs: 60 * 60,
            default_locale: "en".to_string(),
            keywords: None,
            gazetteer: None,
            prebuilt_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SourceError::Config(format!("reading {}: {}", path.display(), e)))?;
        parse_by_extension(path, &text)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Picks JSON or YAML by file extension; anything that isn't `.json` is read as YAML.
pub(crate) fn parse_by_extension<T: serde::de::DeserializeOwned>(
    path: &Path,
    text: &str,
) -> Result<T> {
    let is_json = path
        .extension()
        .and_then(|s| s.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(text)
            .map_err(|e| SourceError::Config(format!("parsing {}: {}", path.display(), e)))
    } else {
        serde_yaml::from_str(text)
            .map_err(|e| SourceError::Config(format!("parsing {}: {}", path.display(), e)))
    }
}
