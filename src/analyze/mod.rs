// src/analyze/mod.rs

pub mod gazetteer;
pub mod keywords;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use tracing::debug;

use crate::record::{RawRecord, Value};

pub use gazetteer::{Gazetteer, PlaceList};
pub use keywords::{KeywordRule, KeywordTable};

/// Distinct values inspected by the year-range check.
const YEAR_SAMPLE: usize = 10;
/// Distinct values inspected by the gazetteer check, and kept per dimension
/// in [`DataCharacteristics`].
const VALUE_SAMPLE: usize = 100;

const YEAR_RANGE: std::ops::RangeInclusive<i64> = 1900..=2100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    Temporal,
    Geographic,
    Categorical,
    Numerical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DimensionKind,
    /// Distinct non-null values.
    pub cardinality: usize,
    pub is_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    pub row_count: usize,
    pub column_count: usize,
    pub dimensions: Vec<Dimension>,
}

/// Output contract towards the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDataset {
    /// Column names of the first row, in order.
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
    pub metadata: DatasetMetadata,
}

/// A declared dimension type that overrides inference for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionHint {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DimensionKind,
}

/// Per-dimension summary for chart selection, with at most 100 sample values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DimensionKind,
    pub cardinality: usize,
    pub unique_values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataCharacteristics {
    pub row_count: usize,
    pub column_count: usize,
    pub temporal_dimensions: usize,
    pub geographic_dimensions: usize,
    pub categorical_dimensions: usize,
    pub numerical_dimensions: usize,
    pub dimensions: Vec<DimensionSummary>,
}

impl DataCharacteristics {
    pub fn count(&self, kind: DimensionKind) -> usize {
        match kind {
            DimensionKind::Temporal => self.temporal_dimensions,
            DimensionKind::Geographic => self.geographic_dimensions,
            DimensionKind::Categorical => self.categorical_dimensions,
            DimensionKind::Numerical => self.numerical_dimensions,
        }
    }

    /// First dimension of `kind`, in column order.
    pub fn first_of(&self, kind: DimensionKind) -> Option<&DimensionSummary> {
        self.dimensions.iter().find(|d| d.kind == kind)
    }
}

/// One column's values, gathered in a single pass.
struct ColumnProfile<'a> {
    non_null: Vec<&'a Value>,
    /// Distinct non-null values in first-seen order.
    distinct: Vec<&'a Value>,
}

impl<'a> ColumnProfile<'a> {
    fn gather(rows: &'a [RawRecord], column: &str) -> Self {
        let mut seen = HashSet::new();
        let mut non_null = Vec::with_capacity(rows.len());
        let mut distinct = Vec::new();
        for v in rows.iter().filter_map(|r| r.get(column)) {
            let Some(key) = v.distinct_key() else {
                continue;
            };
            non_null.push(v);
            if seen.insert(key) {
                distinct.push(v);
            }
        }
        Self { non_null, distinct }
    }

    fn cardinality(&self) -> usize {
        self.distinct.len()
    }
}

/// Infers the semantic type of every column.
#[derive(Clone)]
pub struct DimensionAnalyzer {
    keywords: KeywordTable,
    gazetteer: Arc<dyn Gazetteer>,
}

impl Default for DimensionAnalyzer {
    fn default() -> Self {
        Self::new(KeywordTable::default(), Arc::new(PlaceList::default()))
    }
}

impl std::fmt::Debug for DimensionAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DimensionAnalyzer")
            .field("keywords", &self.keywords.rules().len())
            .finish_non_exhaustive()
    }
}

impl DimensionAnalyzer {
    pub fn new(keywords: KeywordTable, gazetteer: Arc<dyn Gazetteer>) -> Self {
        Self {
            keywords,
            gazetteer,
        }
    }

    /// Build the normalized dataset: headers from the first row, one
    /// [`Dimension`] per header.
    pub fn normalize(&self, rows: Vec<RawRecord>) -> NormalizedDataset {
        self.normalize_with_hints(rows, &[])
    }

    pub fn normalize_with_hints(
        &self,
        rows: Vec<RawRecord>,
        hints: &[DimensionHint],
    ) -> NormalizedDataset {
        let headers = headers_of(&rows);
        let row_count = rows.len();

        let dimensions: Vec<Dimension> = headers
            .par_iter()
            .map(|name| {
                let profile = ColumnProfile::gather(&rows, name);
                let kind = hinted(hints, name).unwrap_or_else(|| self.classify(name, &profile));
                let cardinality = profile.cardinality();
                Dimension {
                    name: name.clone(),
                    kind,
                    cardinality,
                    is_key: is_key(kind, cardinality, row_count),
                }
            })
            .collect();

        debug!(rows = row_count, columns = headers.len(), "normalized dataset");
        NormalizedDataset {
            metadata: DatasetMetadata {
                row_count,
                column_count: headers.len(),
                dimensions,
            },
            headers,
            rows,
        }
    }

    /// Lighter variant for chart selection: same classification, plus up to
    /// 100 distinct sample values per dimension, without taking the rows.
    pub fn characteristics(&self, rows: &[RawRecord], hints: &[DimensionHint]) -> DataCharacteristics {
        let headers = headers_of(rows);

        let dimensions: Vec<DimensionSummary> = headers
            .par_iter()
            .map(|name| {
                let profile = ColumnProfile::gather(rows, name);
                let kind = hinted(hints, name).unwrap_or_else(|| self.classify(name, &profile));
                DimensionSummary {
                    name: name.clone(),
                    kind,
                    cardinality: profile.cardinality(),
                    unique_values: profile
                        .distinct
                        .iter()
                        .take(VALUE_SAMPLE)
                        .map(|v| (*v).clone())
                        .collect(),
                }
            })
            .collect();

        let count = |k: DimensionKind| dimensions.iter().filter(|d| d.kind == k).count();
        DataCharacteristics {
            row_count: rows.len(),
            column_count: headers.len(),
            temporal_dimensions: count(DimensionKind::Temporal),
            geographic_dimensions: count(DimensionKind::Geographic),
            categorical_dimensions: count(DimensionKind::Categorical),
            numerical_dimensions: count(DimensionKind::Numerical),
            dimensions,
        }
    }

    /// Summarize an already-normalized dataset.
    pub fn characteristics_of(&self, data: &NormalizedDataset) -> DataCharacteristics {
        let hints: Vec<DimensionHint> = data
            .metadata
            .dimensions
            .iter()
            .map(|d| DimensionHint {
                name: d.name.clone(),
                kind: d.kind,
            })
            .collect();
        self.characteristics(&data.rows, &hints)
    }

    /// Rules in priority order; first match wins.
    fn classify(&self, name: &str, profile: &ColumnProfile<'_>) -> DimensionKind {
        if self.keywords.name_matches(name, DimensionKind::Temporal) {
            return DimensionKind::Temporal;
        }

        let years = &profile.distinct[..profile.distinct.len().min(YEAR_SAMPLE)];
        if !years.is_empty() {
            let hits = years.iter().filter(|v| looks_like_year(v)).count();
            if hits * 2 > years.len() {
                return DimensionKind::Temporal;
            }
        }

        if self.keywords.name_matches(name, DimensionKind::Geographic) {
            return DimensionKind::Geographic;
        }

        let places = &profile.distinct[..profile.distinct.len().min(VALUE_SAMPLE)];
        if !places.is_empty() {
            let hits = places
                .iter()
                .filter(|v| self.gazetteer.matches(&v.to_text()))
                .count();
            if hits as f64 / places.len() as f64 > 0.2 {
                return DimensionKind::Geographic;
            }
        }

        if !profile.non_null.is_empty() {
            let numeric = profile
                .non_null
                .iter()
                .filter(|v| v.is_finite_number())
                .count();
            if numeric as f64 / profile.non_null.len() as f64 > 0.8 {
                return DimensionKind::Numerical;
            }
        }

        DimensionKind::Categorical
    }
}

fn headers_of(rows: &[RawRecord]) -> Vec<String> {
    rows.first()
        .map(|r| r.keys().map(str::to_string).collect())
        .unwrap_or_default()
}

fn hinted(hints: &[DimensionHint], name: &str) -> Option<DimensionKind> {
    hints.iter().find(|h| h.name == name).map(|h| h.kind)
}

/// High relative cardinality, or a temporal/geographic axis.
pub fn is_key(kind: DimensionKind, cardinality: usize, row_count: usize) -> bool {
    if row_count > 0 && cardinality as f64 / row_count as f64 > 0.9 {
        return true;
    }
    matches!(kind, DimensionKind::Temporal | DimensionKind::Geographic)
}

/// Integer (leading-integer for strings) within 1900..=2100.
fn looks_like_year(v: &Value) -> bool {
    let n = match v {
        Value::Num(n) if n.is_finite() => n.trunc() as i64,
        Value::Str(s) => match leading_int(s) {
            Some(n) => n,
            None => return false,
        },
        _ => return false,
    };
    YEAR_RANGE.contains(&n)
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    fn analyzer() -> DimensionAnalyzer {
        DimensionAnalyzer::default()
    }

    fn kinds(ds: &NormalizedDataset) -> Vec<(String, DimensionKind)> {
        ds.metadata
            .dimensions
            .iter()
            .map(|d| (d.name.clone(), d.kind))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let ds = analyzer().normalize(vec![]);
        assert!(ds.headers.is_empty());
        assert_eq!(ds.metadata.row_count, 0);
        assert_eq!(ds.metadata.column_count, 0);
        assert!(ds.metadata.dimensions.is_empty());
    }

    #[test]
    fn test_classification_rules() {
        let rows = vec![
            record! { "year" => 2020, "Област" => "x", "yr" => "2019", "place" => "Sofia City", "value" => 5.5, "Sex" => "Male" },
            record! { "year" => 2021, "Област" => "y", "yr" => "2020", "place" => "Varna", "value" => 7.0, "Sex" => "Female" },
            record! { "year" => 2022, "Област" => "z", "yr" => "2021", "place" => "Total", "value" => 9.0, "Sex" => "Total" },
        ];
        let ds = analyzer().normalize(rows);
        assert_eq!(ds.headers, vec!["year", "Област", "yr", "place", "value", "Sex"]);
        assert_eq!(
            kinds(&ds),
            vec![
                ("year".to_string(), DimensionKind::Temporal),
                ("Област".to_string(), DimensionKind::Geographic),
                ("yr".to_string(), DimensionKind::Temporal),
                ("place".to_string(), DimensionKind::Geographic),
                ("value".to_string(), DimensionKind::Numerical),
                ("Sex".to_string(), DimensionKind::Categorical),
            ]
        );
    }

    #[test]
    fn test_temporal_keyword_beats_values() {
        let rows = vec![record! { "period" => "Q1", "x" => 1.0 }];
        let ds = analyzer().normalize(rows);
        assert_eq!(ds.metadata.dimensions[0].kind, DimensionKind::Temporal);
    }

    #[test]
    fn test_numeric_threshold_is_strictly_above_80_percent() {
        // 4 of 5 numeric = 80% → categorical
        let rows: Vec<RawRecord> = [Value::Num(1.0), Value::Num(2.0), Value::Num(3.0), Value::Num(4.0), Value::from("n/a")]
            .into_iter()
            .map(|v| record! { "amount" => v })
            .collect();
        let ds = analyzer().normalize(rows);
        assert_eq!(ds.metadata.dimensions[0].kind, DimensionKind::Categorical);

        // nulls don't count against the ratio
        let rows = vec![
            record! { "amount" => 1.0 },
            record! { "amount" => Value::Null },
            record! { "amount" => 3.0 },
        ];
        let ds = analyzer().normalize(rows);
        assert_eq!(ds.metadata.dimensions[0].kind, DimensionKind::Numerical);
        assert_eq!(ds.metadata.dimensions[0].cardinality, 2);
    }

    #[test]
    fn test_is_key_rules() {
        assert!(is_key(DimensionKind::Numerical, 10, 10));
        assert!(!is_key(DimensionKind::Numerical, 9, 10));
        assert!(is_key(DimensionKind::Temporal, 1, 10));
        assert!(is_key(DimensionKind::Geographic, 1, 10));
        assert!(!is_key(DimensionKind::Categorical, 3, 10));
        assert!(!is_key(DimensionKind::Categorical, 0, 0));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let rows = vec![
            record! { "Year" => "2020", "NUTS" => "Sofia City", "Gender" => "Male", "Population" => 10.0 },
            record! { "Year" => "2021", "NUTS" => "Varna", "Gender" => "Female", "Population" => 12.0 },
            record! { "Year" => "2021", "NUTS" => "Burgas", "Gender" => "Total", "Population" => 22.0 },
        ];
        let first = analyzer().normalize(rows);
        let second = analyzer().normalize(first.rows.clone());
        assert_eq!(first.metadata, second.metadata);
        assert_eq!(first.headers, second.headers);
    }

    #[test]
    fn test_hints_override_inference() {
        let rows = vec![
            record! { "NUTS" => "BG41", "v" => 1.0 },
            record! { "NUTS" => "BG42", "v" => 2.0 },
        ];
        let hints = vec![DimensionHint {
            name: "NUTS".into(),
            kind: DimensionKind::Geographic,
        }];
        let plain = analyzer().normalize(rows.clone());
        assert_eq!(plain.metadata.dimensions[0].kind, DimensionKind::Categorical);
        let hinted = analyzer().normalize_with_hints(rows, &hints);
        assert_eq!(hinted.metadata.dimensions[0].kind, DimensionKind::Geographic);
        assert!(hinted.metadata.dimensions[0].is_key);
    }

    #[test]
    fn test_characteristics_caps_unique_values() {
        let rows: Vec<RawRecord> = (0..250)
            .map(|i| record! { "id" => format!("item-{}", i), "v" => i as f64 })
            .collect();
        let c = analyzer().characteristics(&rows, &[]);
        assert_eq!(c.row_count, 250);
        assert_eq!(c.column_count, 2);
        assert_eq!(c.categorical_dimensions, 1);
        assert_eq!(c.numerical_dimensions, 1);
        let id = c.first_of(DimensionKind::Categorical).unwrap();
        assert_eq!(id.cardinality, 250);
        assert_eq!(id.unique_values.len(), 100);
        assert_eq!(id.unique_values[0], Value::from("item-0"));
    }

    #[test]
    fn test_custom_gazetteer() {
        let analyzer = DimensionAnalyzer::new(
            KeywordTable::default(),
            Arc::new(PlaceList::new(["Bayern", "Hessen"])),
        );
        let rows = vec![
            record! { "Land" => "Bayern" },
            record! { "Land" => "Hessen" },
            record! { "Land" => "Sofia" },
        ];
        let ds = analyzer.normalize(rows);
        assert_eq!(ds.metadata.dimensions[0].kind, DimensionKind::Geographic);
    }

    #[test]
    fn test_gazetteer_ratio_must_exceed_a_fifth() {
        let analyzer = DimensionAnalyzer::new(
            KeywordTable::default(),
            Arc::new(PlaceList::new(["Bayern", "Hessen"])),
        );
        let mut rows: Vec<RawRecord> = ["Bayern", "x1", "x2", "x3", "x4"]
            .iter()
            .map(|v| record! { "Land" => *v })
            .collect();
        let ds = analyzer.normalize(rows.clone());
        assert_eq!(ds.metadata.dimensions[0].kind, DimensionKind::Categorical);

        rows.push(record! { "Land" => "Hessen" });
        let ds = analyzer.normalize(rows);
        assert_eq!(ds.metadata.dimensions[0].kind, DimensionKind::Geographic);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("2020-01"), Some(2020));
        assert_eq!(leading_int(" -5x"), Some(-5));
        assert_eq!(leading_int("Q1"), None);
    }

    #[test]
    fn test_dataset_json_shape() {
        let ds = analyzer().normalize(vec![record! { "year" => 2020, "value" => 1.0 }]);
        let json = serde_json::to_value(&ds).unwrap();
        assert_eq!(json["metadata"]["rowCount"], 1);
        assert_eq!(json["metadata"]["dimensions"][0]["type"], "temporal");
        assert_eq!(json["metadata"]["dimensions"][0]["isKey"], true);
        assert_eq!(json["headers"][1], "value");
    }
}
