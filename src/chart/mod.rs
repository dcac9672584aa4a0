// src/chart/mod.rs

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::analyze::{
    DataCharacteristics, DimensionAnalyzer, DimensionHint, DimensionKind, NormalizedDataset,
};
use crate::error::SourceError;
use crate::record::RawRecord;

/// Cardinality at or below which a single categorical axis is drawn as a pie.
const PIE_MAX_CATEGORIES: usize = 7;
/// Looser cut-off used when suggesting alternatives.
const PIE_SUGGEST_MAX_CATEGORIES: usize = 10;
/// Hard limit for an explicitly requested pie.
const PIE_VALID_MAX_CATEGORIES: usize = 15;
const LINE_MIN_ROWS: usize = 50;
const TABLE_MIN_ROWS: usize = 500;
const TABLE_MIN_COLUMNS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Pie,
    Map,
    Table,
    Scatter,
}

impl ChartType {
    pub const ALL: [ChartType; 6] = [
        ChartType::Line,
        ChartType::Bar,
        ChartType::Pie,
        ChartType::Map,
        ChartType::Table,
        ChartType::Scatter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::Pie => "pie",
            ChartType::Map => "map",
            ChartType::Table => "table",
            ChartType::Scatter => "scatter",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ChartType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| SourceError::Config(format!("unknown chart type `{}`", s)))
    }
}

/// Outcome of checking a requested chart type against the data. Never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ChartValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn invalid(reason: &str) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
        }
    }
}

fn first_categorical_cardinality(c: &DataCharacteristics) -> Option<usize> {
    c.first_of(DimensionKind::Categorical).map(|d| d.cardinality)
}

/// Pick one chart type; rules are checked in order and the first match wins.
pub fn select_chart_type(c: &DataCharacteristics) -> ChartType {
    let temporal = c.count(DimensionKind::Temporal);
    let geographic = c.count(DimensionKind::Geographic);
    let categorical = c.count(DimensionKind::Categorical);
    let numerical = c.count(DimensionKind::Numerical);

    if geographic >= 1 && numerical >= 1 {
        return ChartType::Map;
    }
    if temporal >= 1 && numerical >= 1 {
        return if c.row_count > LINE_MIN_ROWS {
            ChartType::Line
        } else {
            ChartType::Bar
        };
    }
    if categorical == 1 && numerical == 1 {
        return match first_categorical_cardinality(c) {
            Some(n) if n <= PIE_MAX_CATEGORIES => ChartType::Pie,
            _ => ChartType::Bar,
        };
    }
    if categorical == 2 && numerical == 1 {
        return ChartType::Bar;
    }
    if numerical == 2 && categorical == 0 {
        return ChartType::Scatter;
    }
    if c.row_count > TABLE_MIN_ROWS || c.column_count > TABLE_MIN_COLUMNS {
        return ChartType::Table;
    }
    ChartType::Bar
}

/// Every chart type that could reasonably render the data, `table` first,
/// without duplicates.
pub fn suggest_alternative_charts(c: &DataCharacteristics) -> Vec<ChartType> {
    let temporal = c.count(DimensionKind::Temporal);
    let geographic = c.count(DimensionKind::Geographic);
    let categorical = c.count(DimensionKind::Categorical);
    let numerical = c.count(DimensionKind::Numerical);

    let mut out = vec![ChartType::Table];
    let mut add = |t: ChartType| {
        if !out.contains(&t) {
            out.push(t);
        }
    };

    if temporal >= 1 && numerical >= 1 {
        add(ChartType::Line);
        add(ChartType::Bar);
    }
    if geographic >= 1 && numerical >= 1 {
        add(ChartType::Map);
        add(ChartType::Bar);
    }
    if categorical >= 1 && numerical >= 1 {
        add(ChartType::Bar);
        if first_categorical_cardinality(c).map_or(false, |n| n <= PIE_SUGGEST_MAX_CATEGORIES) {
            add(ChartType::Pie);
        }
    }
    if numerical >= 2 {
        add(ChartType::Scatter);
    }
    out
}

/// Minimum structural requirements for a requested chart type.
pub fn validate_chart_type(chart: ChartType, c: &DataCharacteristics) -> ChartValidation {
    let numerical = c.count(DimensionKind::Numerical);
    match chart {
        ChartType::Map => {
            if c.count(DimensionKind::Geographic) == 0 {
                return ChartValidation::invalid("no geographic dimensions found");
            }
            if numerical == 0 {
                return ChartValidation::invalid("no numerical dimensions found");
            }
        }
        ChartType::Line => {
            if c.count(DimensionKind::Temporal) == 0 {
                return ChartValidation::invalid("no temporal dimensions found for line chart");
            }
            if numerical == 0 {
                return ChartValidation::invalid("no numerical dimensions found");
            }
        }
        ChartType::Pie => {
            if c.count(DimensionKind::Categorical) == 0 {
                return ChartValidation::invalid("no categorical dimensions found");
            }
            if numerical == 0 {
                return ChartValidation::invalid("no numerical dimensions found");
            }
            if first_categorical_cardinality(c).map_or(false, |n| n > PIE_VALID_MAX_CATEGORIES) {
                return ChartValidation::invalid("too many categories for pie chart (>15)");
            }
        }
        ChartType::Scatter => {
            if numerical < 2 {
                return ChartValidation::invalid(
                    "scatter plot requires at least 2 numerical dimensions",
                );
            }
        }
        ChartType::Bar | ChartType::Table => {}
    }
    ChartValidation::ok()
}

/// Chart decisions straight from rows, classifying columns with the given
/// analyzer and optional declared dimension types.
#[derive(Debug, Clone, Default)]
pub struct ChartSelector {
    analyzer: DimensionAnalyzer,
}

impl ChartSelector {
    pub fn new(analyzer: DimensionAnalyzer) -> Self {
        Self { analyzer }
    }

    pub fn select(&self, rows: &[RawRecord], hints: &[DimensionHint]) -> ChartType {
        select_chart_type(&self.analyzer.characteristics(rows, hints))
    }

    pub fn suggest(&self, rows: &[RawRecord], hints: &[DimensionHint]) -> Vec<ChartType> {
        suggest_alternative_charts(&self.analyzer.characteristics(rows, hints))
    }

    pub fn validate(
        &self,
        chart: ChartType,
        rows: &[RawRecord],
        hints: &[DimensionHint],
    ) -> ChartValidation {
        validate_chart_type(chart, &self.analyzer.characteristics(rows, hints))
    }

    /// Selection over an already-normalized dataset, reusing its classification.
    pub fn select_for(&self, data: &NormalizedDataset) -> ChartType {
        select_chart_type(&self.analyzer.characteristics_of(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::record::Value;

    fn categories(n: usize) -> Vec<RawRecord> {
        (0..n)
            .map(|i| {
                let label = ((b'A' + i as u8) as char).to_string();
                record! { "category" => label, "amount" => (i as f64 + 1.0) * 10.0 }
            })
            .collect()
    }

    #[test]
    fn test_geography_wins() {
        let rows = vec![
            record! { "year" => 2020, "region" => "X", "value" => 5 },
            record! { "year" => 2021, "region" => "Y", "value" => 7 },
        ];
        assert_eq!(ChartSelector::default().select(&rows, &[]), ChartType::Map);
    }

    #[test]
    fn test_pie_bar_boundary() {
        let sel = ChartSelector::default();
        assert_eq!(sel.select(&categories(6), &[]), ChartType::Pie);
        assert_eq!(sel.select(&categories(7), &[]), ChartType::Pie);
        assert_eq!(sel.select(&categories(8), &[]), ChartType::Bar);
    }

    #[test]
    fn test_time_series_line_or_bar() {
        let sel = ChartSelector::default();
        let short: Vec<RawRecord> = (0..10)
            .map(|i| record! { "Year" => 2000 + i, "v" => i as f64 })
            .collect();
        assert_eq!(sel.select(&short, &[]), ChartType::Bar);
        let long: Vec<RawRecord> = (0..60)
            .map(|i| record! { "Year" => 1950 + i, "v" => i as f64 })
            .collect();
        assert_eq!(sel.select(&long, &[]), ChartType::Line);
    }

    #[test]
    fn test_line_needs_more_than_fifty_rows() {
        let sel = ChartSelector::default();
        let series = |n: i32| -> Vec<RawRecord> {
            (0..n)
                .map(|i| record! { "Year" => 1950 + i, "v" => i as f64 })
                .collect()
        };
        assert_eq!(sel.select(&series(50), &[]), ChartType::Bar);
        assert_eq!(sel.select(&series(51), &[]), ChartType::Line);
    }

    #[test]
    fn test_table_needs_more_than_five_hundred_rows() {
        let sel = ChartSelector::default();
        let labels = |n: usize| -> Vec<RawRecord> {
            (0..n)
                .map(|i| record! { "label" => format!("item {}", i) })
                .collect()
        };
        assert_eq!(sel.select(&labels(500), &[]), ChartType::Bar);
        assert_eq!(sel.select(&labels(501), &[]), ChartType::Table);
    }

    #[test]
    fn test_suggested_pie_cutoff() {
        let sel = ChartSelector::default();
        assert!(sel.suggest(&categories(10), &[]).contains(&ChartType::Pie));
        assert!(!sel.suggest(&categories(11), &[]).contains(&ChartType::Pie));
    }

    #[test]
    fn test_requested_pie_limit() {
        let sel = ChartSelector::default();
        assert!(sel.validate(ChartType::Pie, &categories(15), &[]).valid);
        assert!(!sel.validate(ChartType::Pie, &categories(16), &[]).valid);
    }

    #[test]
    fn test_scatter_and_table_and_default() {
        let sel = ChartSelector::default();
        let scatter = vec![
            record! { "x" => 1.5, "y" => 2.5 },
            record! { "x" => 3.5, "y" => 4.5 },
        ];
        assert_eq!(sel.select(&scatter, &[]), ChartType::Scatter);

        let wide: Vec<RawRecord> = (0..3)
            .map(|r| {
                (0..11)
                    .map(|c| (format!("c{}", c), Value::from(format!("r{}c{}", r, c))))
                    .collect()
            })
            .collect();
        assert_eq!(sel.select(&wide, &[]), ChartType::Table);

        assert_eq!(sel.select(&[], &[]), ChartType::Bar);
    }

    #[test]
    fn test_two_categories_grouped_bar() {
        let rows = vec![
            record! { "Sex" => "Male", "Group" => "a", "n" => 1.0 },
            record! { "Sex" => "Female", "Group" => "b", "n" => 2.0 },
        ];
        assert_eq!(ChartSelector::default().select(&rows, &[]), ChartType::Bar);
    }

    #[test]
    fn test_suggestions_deduplicated_in_order() {
        let rows = vec![
            record! { "year" => 2020, "region" => "X", "kind" => "a", "value" => 5.0, "other" => 1.0 },
            record! { "year" => 2021, "region" => "Y", "kind" => "b", "value" => 7.0, "other" => 2.0 },
        ];
        assert_eq!(
            ChartSelector::default().suggest(&rows, &[]),
            vec![
                ChartType::Table,
                ChartType::Line,
                ChartType::Bar,
                ChartType::Map,
                ChartType::Pie,
                ChartType::Scatter
            ]
        );
        assert_eq!(ChartSelector::default().suggest(&[], &[]), vec![ChartType::Table]);
    }

    #[test]
    fn test_validation_reasons() {
        let sel = ChartSelector::default();
        let one_num = categories(3);
        let v = sel.validate(ChartType::Scatter, &one_num, &[]);
        assert!(!v.valid);
        assert_eq!(
            v.reason.as_deref(),
            Some("scatter plot requires at least 2 numerical dimensions")
        );

        let many: Vec<RawRecord> = (0..16)
            .map(|i| record! { "label" => format!("item {}", i), "amount" => i as f64 })
            .collect();
        let v = sel.validate(ChartType::Pie, &many, &[]);
        assert_eq!(v.reason.as_deref(), Some("too many categories for pie chart (>15)"));
        assert!(sel.validate(ChartType::Pie, &one_num, &[]).valid);

        let v = sel.validate(ChartType::Map, &one_num, &[]);
        assert_eq!(v.reason.as_deref(), Some("no geographic dimensions found"));
        assert!(sel.validate(ChartType::Table, &[], &[]).valid);
    }

    #[test]
    fn test_hints_feed_selection() {
        let rows = vec![
            record! { "NUTS" => "BG41", "v" => 1.0 },
            record! { "NUTS" => "BG42", "v" => 2.0 },
        ];
        let hints = vec![DimensionHint {
            name: "NUTS".into(),
            kind: DimensionKind::Geographic,
        }];
        let sel = ChartSelector::default();
        assert_eq!(sel.select(&rows, &[]), ChartType::Pie);
        assert_eq!(sel.select(&rows, &hints), ChartType::Map);
    }

    #[test]
    fn test_chart_type_parse_and_display() {
        assert_eq!("Scatter".parse::<ChartType>().unwrap(), ChartType::Scatter);
        assert_eq!(ChartType::Map.to_string(), "map");
        assert!("radar".parse::<ChartType>().is_err());
        assert_eq!(serde_json::to_string(&ChartType::Pie).unwrap(), "\"pie\"");
    }
}
