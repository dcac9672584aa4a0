// src/revision.rs

use std::collections::HashMap;
use tracing::{debug, info};

use crate::codes::REVISION_FIELD;
use crate::record::RawRecord;

/// Separator between field values in a revision key. Not expected in data.
const KEY_SEPARATOR: char = '\u{1f}';

/// Identity of an observation across revisions: every field's string form
/// except the revision marker and the value column.
pub fn revision_key(row: &RawRecord, value_column: &str) -> String {
    let mut key = String::new();
    for (name, value) in row.iter() {
        if name == REVISION_FIELD || name == value_column {
            continue;
        }
        key.push_str(&value.to_text());
        key.push(KEY_SEPARATOR);
    }
    key
}

fn revision_of(row: &RawRecord) -> f64 {
    row.get(REVISION_FIELD)
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
}

/// Keep one row per revision key: the one with the strictly greatest revision.
/// On equal revisions the first row seen wins. Output order follows the first
/// appearance of each key, and the revision marker is stripped.
///
/// Rows without a revision marker (judged by the first row) pass through untouched.
pub fn reconcile(rows: Vec<RawRecord>, value_column: &str) -> Vec<RawRecord> {
    let has_marker = rows
        .first()
        .map_or(false, |r| r.contains_key(REVISION_FIELD));
    if !has_marker {
        debug!("no revision marker, skipping reconciliation");
        return rows;
    }

    let before = rows.len();
    let mut slot_of: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut best: Vec<(RawRecord, f64)> = Vec::new();

    for row in rows {
        let key = revision_key(&row, value_column);
        let rev = revision_of(&row);
        match slot_of.get(&key) {
            Some(&i) => {
                if rev > best[i].1 {
                    best[i] = (row, rev);
                }
            }
            None => {
                slot_of.insert(key, best.len());
                best.push((row, rev));
            }
        }
    }

    let out: Vec<RawRecord> = best
        .into_iter()
        .map(|(mut row, _)| {
            row.remove(REVISION_FIELD);
            row
        })
        .collect();

    info!(before, after = out.len(), "reconciled revisions");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::record::Value;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_latest_revision_wins() {
        let rows = vec![
            record! { "Year" => "2020", "NUTS" => "BG411", "_revision" => 1.0, "Population" => 100.0 },
            record! { "Year" => "2020", "NUTS" => "BG412", "_revision" => 1.0, "Population" => 50.0 },
            record! { "Year" => "2020", "NUTS" => "BG411", "_revision" => 2.0, "Population" => 110.0 },
        ];
        let out = reconcile(rows, "Population");

        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0],
            record! { "Year" => "2020", "NUTS" => "BG411", "Population" => 110.0 }
        );
        assert_eq!(out[1].get("Population"), Some(&Value::Num(50.0)));
    }

    #[test]
    fn test_equal_revision_keeps_first() {
        let rows = vec![
            record! { "k" => "a", "_revision" => 3.0, "v" => 1.0 },
            record! { "k" => "a", "_revision" => 3.0, "v" => 2.0 },
            record! { "k" => "a", "_revision" => 1.0, "v" => 3.0 },
        ];
        let out = reconcile(rows, "v");
        assert_eq!(out, vec![record! { "k" => "a", "v" => 1.0 }]);
    }

    #[test]
    fn test_no_marker_is_passthrough() {
        let rows = vec![
            record! { "k" => "a", "v" => 1.0 },
            record! { "k" => "a", "v" => 2.0 },
        ];
        assert_eq!(reconcile(rows.clone(), "v"), rows);
    }

    #[test]
    fn test_key_ignores_value_and_marker() {
        let a = record! { "k" => "x", "_revision" => 1.0, "v" => 1.0 };
        let b = record! { "k" => "x", "_revision" => 9.0, "v" => 7.0 };
        assert_eq!(revision_key(&a, "v"), revision_key(&b, "v"));
        let c = record! { "k" => "x|y" };
        let d = record! { "k" => "x" , "j" => "y" };
        assert_ne!(revision_key(&c, "v"), revision_key(&d, "v"));
    }

    proptest! {
        #[test]
        fn prop_one_row_per_key_with_max_revision(
            obs in prop::collection::vec((0u8..4, 0u8..3, 0u32..6, 0u32..1000), 1..60)
        ) {
            let rows: Vec<RawRecord> = obs
                .iter()
                .map(|(a, b, rev, v)| record! {
                    "A" => a.to_string(),
                    "B" => b.to_string(),
                    "_revision" => *rev as f64,
                    "value" => *v as f64,
                })
                .collect();

            let mut max_rev: HashMap<(u8, u8), u32> = HashMap::new();
            for (a, b, rev, _) in &obs {
                let e = max_rev.entry((*a, *b)).or_insert(*rev);
                *e = (*e).max(*rev);
            }

            let out = reconcile(rows, "value");
            prop_assert_eq!(out.len(), max_rev.len());

            let mut seen = HashSet::new();
            for row in &out {
                prop_assert!(!row.contains_key("_revision"));
                let a: u8 = row.get("A").unwrap().to_text().parse().unwrap();
                let b: u8 = row.get("B").unwrap().to_text().parse().unwrap();
                prop_assert!(seen.insert((a, b)));
                // the surviving value must come from a max-revision observation
                let v = row.get("value").unwrap().as_f64().unwrap() as u32;
                let best = max_rev[&(a, b)];
                prop_assert!(obs.iter().any(|o| o.0 == a && o.1 == b && o.2 == best && o.3 == v));
            }
        }
    }
}
