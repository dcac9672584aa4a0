// src/transform.rs

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap};

use crate::analyze::NormalizedDataset;
use crate::record::{RawRecord, Value};

/// Row predicate on one column: exact match, or match against any listed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    AnyOf(Vec<Value>),
    Equals(Value),
}

impl Filter {
    fn accepts(&self, v: &Value) -> bool {
        match self {
            Filter::Equals(want) => want == v,
            Filter::AnyOf(list) => list.contains(v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Page metadata reported alongside a paginated dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: usize,
    pub page_size: usize,
    pub total_rows: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

fn cell<'a>(row: &'a RawRecord, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

/// Keep rows satisfying every filter. A missing column reads as null.
pub fn filter_rows(mut data: NormalizedDataset, filters: &BTreeMap<String, Filter>) -> NormalizedDataset {
    if filters.is_empty() {
        return data;
    }
    data.rows
        .retain(|row| filters.iter().all(|(col, f)| f.accepts(cell(row, col))));
    data.metadata.row_count = data.rows.len();
    data
}

/// Numbers order before strings; null is "greatest" but handled by the caller.
fn compare_present(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Num(x), Value::Num(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Num(_), Value::Str(_)) => Ordering::Less,
        (Value::Str(_), Value::Num(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Stable sort by one column. Nulls go last in either direction.
pub fn sort_rows(mut data: NormalizedDataset, column: &str, direction: SortDirection) -> NormalizedDataset {
    data.rows.sort_by(|a, b| {
        let (a, b) = (cell(a, column), cell(b, column));
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = compare_present(a, b);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
        }
    });
    data
}

/// Slice out one 1-based page. `page == 0` or `page_size == 0` leaves the data
/// whole and returns no page info.
pub fn paginate(
    mut data: NormalizedDataset,
    page: usize,
    page_size: usize,
) -> (NormalizedDataset, Option<PageInfo>) {
    if page == 0 || page_size == 0 {
        return (data, None);
    }
    let total_rows = data.rows.len();
    let start = (page - 1).saturating_mul(page_size).min(total_rows);
    let end = start.saturating_add(page_size).min(total_rows);

    data.rows.truncate(end);
    data.rows.drain(..start);
    data.metadata.row_count = data.rows.len();

    let info = PageInfo {
        page,
        page_size,
        total_rows,
        total_pages: total_rows.div_ceil(page_size),
        has_next: end < total_rows,
        has_prev: page > 1,
    };
    (data, Some(info))
}
