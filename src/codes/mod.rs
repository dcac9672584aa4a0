// src/codes/mod.rs

//! Code-list lookups and the per-row rewrite applied to multi-file datasets:
//! coded role columns become a label plus a `<Name>_Code` sibling, period
//! columns become `Year`, and the generic value column is renamed and parsed.

use std::collections::HashMap;
use tracing::debug;

use crate::record::{RawRecord, Value};

/// Column holding the code-list name in a code-list CSV.
const CODE_LIST_COLUMN: &str = "Code list";
const CODE_COLUMN: &str = "Code";
/// Label columns, most specific first.
const LABEL_ALIASES: &[&str] = &["Name of Code list or Code in English", "Name_en", "Name"];

/// Field that carries the numeric revision marker between row processing
/// and reconciliation.
pub const REVISION_FIELD: &str = "_revision";

/// `code list name → (code → label)`.
#[derive(Debug, Clone, Default)]
pub struct CodeLists {
    lists: HashMap<String, HashMap<String, String>>,
}

impl CodeLists {
    /// Build lookups from code-list rows. Rows without a code-list name are
    /// skipped; a row without any label maps the code to itself.
    pub fn from_rows(rows: &[RawRecord]) -> Self {
        let mut lists: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut skipped = 0usize;

        for row in rows {
            let list = row
                .get(CODE_LIST_COLUMN)
                .map(|v| v.to_text().into_owned())
                .unwrap_or_default();
            if list.is_empty() {
                skipped += 1;
                continue;
            }
            let code = row
                .get(CODE_COLUMN)
                .map(|v| v.to_text().into_owned())
                .unwrap_or_default();
            let label = LABEL_ALIASES
                .iter()
                .filter_map(|alias| row.get(alias))
                .map(|v| v.to_text())
                .find(|s| !s.is_empty())
                .map(|s| s.into_owned())
                .unwrap_or_else(|| code.clone());

            lists.entry(list).or_default().insert(code, label);
        }

        if skipped > 0 {
            debug!(skipped, "code-list rows without a list name");
        }
        Self { lists }
    }

    pub fn label(&self, list: &str, code: &str) -> Option<&str> {
        self.lists.get(list)?.get(code).map(String::as_str)
    }

    pub fn has_list(&self, list: &str) -> bool {
        self.lists.contains_key(list)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

/// Recognized column roles in multi-file datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// NUTS / EKATTE style unit codes.
    GeoUnit,
    Residence,
    Gender,
    Age,
    Period,
    Value,
    Revision,
    Dropped,
}

/// Source column name → role.
const ROLE_TABLE: &[(&str, ColumnRole)] = &[
    ("NUTS", ColumnRole::GeoUnit),
    ("EKATTE", ColumnRole::GeoUnit),
    ("Residence", ColumnRole::Residence),
    ("GenderID", ColumnRole::Gender),
    ("Gender", ColumnRole::Gender),
    ("Gender_Child", ColumnRole::Gender),
    ("Age", ColumnRole::Age),
    ("periods", ColumnRole::Period),
    ("Period", ColumnRole::Period),
    ("Edu_schYear", ColumnRole::Period),
    ("ValueColumn", ColumnRole::Value),
    ("Value", ColumnRole::Value),
    ("RevisionColumn", ColumnRole::Revision),
    ("Units", ColumnRole::Dropped),
];

pub fn role_of(column: &str) -> Option<ColumnRole> {
    ROLE_TABLE
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, role)| *role)
}

/// Rewrites raw multi-file rows using the code lists.
#[derive(Debug, Clone)]
pub struct RowProcessor<'a> {
    codes: &'a CodeLists,
    value_column: String,
}

impl<'a> RowProcessor<'a> {
    pub fn new(codes: &'a CodeLists, value_column: impl Into<String>) -> Self {
        Self {
            codes,
            value_column: value_column.into(),
        }
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    pub fn process_all(&self, rows: &[RawRecord]) -> Vec<RawRecord> {
        rows.iter().map(|r| self.process(r)).collect()
    }

    /// Never fails: unresolved codes pass through as both label and code,
    /// unparseable values become `0`.
    pub fn process(&self, row: &RawRecord) -> RawRecord {
        let mut out = RawRecord::with_capacity(row.len() + 4);

        for (key, value) in row.iter() {
            let raw = value.to_text();

            match role_of(key) {
                Some(ColumnRole::Dropped) => {}
                Some(ColumnRole::Revision) => {
                    out.insert(REVISION_FIELD, Value::Num(revision_number(&raw)));
                }
                Some(ColumnRole::GeoUnit) | Some(ColumnRole::Age) => {
                    self.coded(&mut out, key, key, &raw, false);
                }
                Some(ColumnRole::Residence) => {
                    self.coded(&mut out, key, "Residence", &raw, true);
                }
                Some(ColumnRole::Gender) => {
                    let list = if self.codes.has_list(key) { key } else { "GenderID" };
                    self.coded(&mut out, list, "Gender", &raw, true);
                }
                Some(ColumnRole::Period) => {
                    out.insert("Year", Value::Str(raw.into_owned()));
                }
                Some(ColumnRole::Value) => {
                    out.insert(self.value_column.as_str(), Value::Num(parse_float_or_zero(&raw)));
                }
                None if self.codes.has_list(key) => {
                    self.coded(&mut out, key, key, &raw, false);
                }
                None => out.insert(key, value.clone()),
            }
        }

        out
    }

    /// Insert `<field>` = label and `<field>_Code` = raw code.
    fn coded(&self, out: &mut RawRecord, list: &str, field: &str, code: &str, zero_is_total: bool) {
        let label = match self.codes.label(list, code) {
            Some(l) => l.to_string(),
            None if zero_is_total && code == "0" => "Total".to_string(),
            None => code.to_string(),
        };
        out.insert(field, Value::Str(label));
        out.insert(format!("{}_Code", field), Value::Str(code.to_string()));
    }
}

/// Digits of the revision column read as one number; `0` when there are none.
/// Read as a float so markers longer than `u64` still order by magnitude.
pub fn revision_number(raw: &str) -> f64 {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0.0)
}

/// Leading float of `raw`, like a lenient `parseFloat`; `0` on failure.
fn parse_float_or_zero(raw: &str) -> f64 {
    let s = raw.trim();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = s.as_bytes();
    let mut best = None;

    while end < bytes.len() {
        let c = bytes[end] as char;
        let ok = match c {
            '0'..='9' => true,
            '+' | '-' => end == 0 || matches!(bytes[end - 1], b'e' | b'E'),
            '.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                true
            }
            'e' | 'E' if !seen_exp && end > 0 => {
                seen_exp = true;
                true
            }
            _ => false,
        };
        if !ok {
            break;
        }
        end += 1;
        if let Ok(n) = s[..end].parse::<f64>() {
            best = Some(n);
        }
    }

    best.filter(|n| n.is_finite()).unwrap_or(0.0)
}
