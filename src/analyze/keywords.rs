// src/analyze/keywords.rs

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use super::DimensionKind;
use crate::error::{Result, SourceError};

/// Built-in column-name keywords (English and Bulgarian).
const DEFAULT_KEYWORDS: &[(&str, DimensionKind)] = &[
    ("year", DimensionKind::Temporal),
    ("година", DimensionKind::Temporal),
    ("month", DimensionKind::Temporal),
    ("месец", DimensionKind::Temporal),
    ("quarter", DimensionKind::Temporal),
    ("тримесечие", DimensionKind::Temporal),
    ("date", DimensionKind::Temporal),
    ("дата", DimensionKind::Temporal),
    ("time", DimensionKind::Temporal),
    ("време", DimensionKind::Temporal),
    ("period", DimensionKind::Temporal),
    ("период", DimensionKind::Temporal),
    ("region", DimensionKind::Geographic),
    ("област", DimensionKind::Geographic),
    ("district", DimensionKind::Geographic),
    ("район", DimensionKind::Geographic),
    ("municipality", DimensionKind::Geographic),
    ("община", DimensionKind::Geographic),
    ("city", DimensionKind::Geographic),
    ("град", DimensionKind::Geographic),
    ("country", DimensionKind::Geographic),
    ("държава", DimensionKind::Geographic),
    ("location", DimensionKind::Geographic),
    ("локация", DimensionKind::Geographic),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub kind: DimensionKind,
}

/// Substring keywords that mark a column name as a given kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordTable {
    rules: Vec<KeywordRule>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            rules: DEFAULT_KEYWORDS
                .iter()
                .map(|(k, kind)| KeywordRule {
                    keyword: k.to_string(),
                    kind: *kind,
                })
                .collect(),
        }
    }
}

impl KeywordTable {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|r| KeywordRule {
                    keyword: r.keyword.to_lowercase(),
                    kind: r.kind,
                })
                .collect(),
        }
    }

    /// YAML list of `{keyword, kind}` entries.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let rules: Vec<KeywordRule> = serde_yaml::from_str(text)
            .map_err(|e| SourceError::Config(format!("keyword table: {}", e)))?;
        Ok(Self::new(rules))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SourceError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    /// Whether the (lower-cased) column name contains any keyword of `kind`.
    pub fn name_matches(&self, name: &str, kind: DimensionKind) -> bool {
        let lower = name.to_lowercase();
        self.rules
            .iter()
            .any(|r| r.kind == kind && lower.contains(&r.keyword))
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }
}
