// src/registry/mod.rs

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};
use url::Url;

use crate::analyze::DimensionHint;
use crate::config::parse_by_extension;
use crate::error::{Result, SourceError};

/// Locale → text (or URL).
pub type Localized = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetFormat {
    Csv,
    JsonStat,
    MultiCsv,
    Local,
}

fn default_value_column() -> String {
    "Population".to_string()
}

fn default_delimiter() -> char {
    ','
}

/// One dataset the pipeline knows how to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub id: String,
    #[serde(default)]
    pub title: Localized,
    #[serde(default)]
    pub description: Localized,
    #[serde(default)]
    pub category: Option<String>,
    pub format: DatasetFormat,
    #[serde(default)]
    pub urls: Localized,
    #[serde(default)]
    pub fields_url: Localized,
    #[serde(default)]
    pub codelists_url: Localized,
    /// Directory name under the local data root.
    #[serde(default)]
    pub local_id: Option<String>,
    /// Name given to the observation value column.
    #[serde(default = "default_value_column")]
    pub value_column: String,
    /// Field separator of flat CSV sources; must be ASCII.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Declared dimension types; override inference when present.
    #[serde(default)]
    pub dimensions: Vec<DimensionHint>,
}

impl DatasetEntry {
    /// URL for `locale`, falling back to any configured locale.
    pub fn url_for(&self, locale: &str) -> Option<&str> {
        pick(&self.urls, locale)
    }

    pub fn fields_url_for(&self, locale: &str) -> Option<&str> {
        pick(&self.fields_url, locale)
    }

    pub fn codelists_url_for(&self, locale: &str) -> Option<&str> {
        pick(&self.codelists_url, locale)
    }

    /// The separator as a byte. `Registry::new` rejects non-ASCII separators.
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .unwrap_or(b',')
    }

    /// Both auxiliary resources are configured, so the multi-file path applies.
    pub fn is_multi_csv(&self) -> bool {
        self.format == DatasetFormat::MultiCsv
            || (!self.fields_url.is_empty() && !self.codelists_url.is_empty())
    }

    fn text_matches(&self, text: &Localized, locale: &str, needle: &str) -> bool {
        text.get(locale)
            .map_or(false, |t| t.to_lowercase().contains(needle))
    }
}

fn pick<'a>(map: &'a Localized, locale: &str) -> Option<&'a str> {
    map.get(locale)
        .or_else(|| map.values().next())
        .map(String::as_str)
}

/// Ordered collection of dataset entries, loaded from YAML or JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Registry {
    datasets: Vec<DatasetEntry>,
}

impl Registry {
    pub fn new(datasets: Vec<DatasetEntry>) -> Result<Self> {
        let mut ids = HashSet::new();
        for d in &datasets {
            if !ids.insert(d.id.as_str()) {
                return Err(SourceError::Config(format!("duplicate dataset id `{}`", d.id)));
            }
            for (locale, raw) in d.urls.iter().chain(&d.fields_url).chain(&d.codelists_url) {
                Url::parse(raw).map_err(|e| {
                    SourceError::Config(format!("dataset `{}` ({}): bad url {}: {}", d.id, locale, raw, e))
                })?;
            }
            if !d.delimiter.is_ascii() {
                return Err(SourceError::Config(format!(
                    "dataset `{}`: delimiter {:?} is not ASCII",
                    d.id, d.delimiter
                )));
            }
            if d.format == DatasetFormat::Local && d.local_id.is_none() {
                return Err(SourceError::Config(format!(
                    "dataset `{}` has format local but no local_id",
                    d.id
                )));
            }
        }
        Ok(Self { datasets })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SourceError::Config(format!("reading {}: {}", path.display(), e)))?;
        let datasets: Vec<DatasetEntry> = parse_by_extension(path, &text)?;
        Self::new(datasets)
    }

    pub fn get(&self, id: &str) -> Option<&DatasetEntry> {
        self.datasets.iter().find(|d| d.id == id)
    }

    /// Like [`get`](Self::get) but an absent id is an error.
    pub fn require(&self, id: &str) -> Result<&DatasetEntry> {
        self.get(id)
            .ok_or_else(|| SourceError::UnknownDataset(id.to_string()))
    }

    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a DatasetEntry> {
        self.datasets
            .iter()
            .filter(move |d| d.category.as_deref() == Some(category))
    }

    pub fn all(&self) -> &[DatasetEntry] {
        &self.datasets
    }

    /// Case-insensitive substring search over id, title and description in `locale`.
    pub fn search(&self, query: &str, locale: &str) -> Vec<&DatasetEntry> {
        let needle = query.to_lowercase();
        self.datasets
            .iter()
            .filter(|d| {
                d.id.to_lowercase().contains(&needle)
                    || d.text_matches(&d.title, locale, &needle)
                    || d.text_matches(&d.description, locale, &needle)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::DimensionKind;
    use tempfile::tempdir;

    const YAML: &str = r#"
- id: population-demographics
  title: { en: "Population by districts, residence and sex", bg: "Население по области" }
  description: { en: "Demographic statistics by NUTS regions" }
  category: demographics
  format: multi-csv
  urls: { en: "http://nsi/data?l=en", bg: "http://nsi/data?l=bg" }
  fields_url: { en: "http://nsi/fields?l=en" }
  codelists_url: { en: "http://nsi/codes?l=en" }
  local_id: "1942"
  dimensions:
    - { name: NUTS, type: geographic }
- id: gdp-regional
  title: { en: "GDP by Districts" }
  category: economy
  format: csv
  urls: { en: "http://nsi/gdp.csv" }
  value_column: GDP
  delimiter: ";"
"#;

    fn registry() -> Registry {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("datasets.yaml");
        fs::write(&path, YAML).unwrap();
        Registry::load(&path).unwrap()
    }

    #[test]
    fn test_load_and_lookup() {
        let r = registry();
        assert_eq!(r.all().len(), 2);

        let pop = r.get("population-demographics").unwrap();
        assert_eq!(pop.format, DatasetFormat::MultiCsv);
        assert_eq!(pop.value_column, "Population");
        assert_eq!(pop.local_id.as_deref(), Some("1942"));
        assert_eq!(pop.dimensions[0].kind, DimensionKind::Geographic);
        assert!(pop.is_multi_csv());

        let gdp = r.get("gdp-regional").unwrap();
        assert_eq!(gdp.value_column, "GDP");
        assert_eq!(gdp.delimiter_byte(), b';');
        assert_eq!(pop.delimiter_byte(), b',');
        assert!(!gdp.is_multi_csv());
        assert!(r.get("nope").is_none());
        assert!(matches!(r.require("nope"), Err(SourceError::UnknownDataset(_))));
    }

    #[test]
    fn test_url_locale_fallback() {
        let r = registry();
        let pop = r.get("population-demographics").unwrap();
        assert_eq!(pop.url_for("bg"), Some("http://nsi/data?l=bg"));
        assert_eq!(pop.fields_url_for("bg"), Some("http://nsi/fields?l=en"));
        let gdp = r.get("gdp-regional").unwrap();
        assert_eq!(gdp.fields_url_for("en"), None);
    }

    #[test]
    fn test_category_and_search() {
        let r = registry();
        let econ: Vec<_> = r.by_category("economy").map(|d| d.id.as_str()).collect();
        assert_eq!(econ, vec!["gdp-regional"]);

        let hits: Vec<_> = r.search("NUTS", "en").iter().map(|d| d.id.as_str()).collect();
        assert_eq!(hits, vec!["population-demographics"]);
        assert_eq!(r.search("население", "bg").len(), 1);
        assert_eq!(r.search("население", "en").len(), 0);
        assert_eq!(r.search("gdp", "bg").len(), 1, "id always searched");
    }

    #[test]
    fn test_invalid_registries() {
        let entry = |id: &str, format| DatasetEntry {
            id: id.into(),
            title: Localized::new(),
            description: Localized::new(),
            category: None,
            format,
            urls: Localized::new(),
            fields_url: Localized::new(),
            codelists_url: Localized::new(),
            local_id: None,
            value_column: default_value_column(),
            delimiter: default_delimiter(),
            dimensions: vec![],
        };
        assert!(matches!(
            Registry::new(vec![entry("a", DatasetFormat::Csv), entry("a", DatasetFormat::Csv)]),
            Err(SourceError::Config(_))
        ));
        assert!(matches!(
            Registry::new(vec![entry("a", DatasetFormat::Local)]),
            Err(SourceError::Config(_))
        ));
        let mut bad = entry("b", DatasetFormat::Csv);
        bad.urls.insert("en".into(), "not a url".into());
        assert!(matches!(Registry::new(vec![bad]), Err(SourceError::Config(_))));
        let mut wide = entry("c", DatasetFormat::Csv);
        wide.delimiter = '§';
        assert!(matches!(Registry::new(vec![wide]), Err(SourceError::Config(_))));
    }
}
