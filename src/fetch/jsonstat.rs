// src/fetch/jsonstat.rs

use serde_json::{Map, Value as Json};
use tracing::{info, instrument, warn};

use super::HttpFetcher;
use crate::error::{Result, SourceError};
use crate::record::{RawRecord, Value};

/// Decode a flat cube index into one index per dimension, row-major
/// (the last dimension varies fastest). `None` if `flat` lies outside the cube.
pub fn decode_index(flat: usize, sizes: &[usize]) -> Option<Vec<usize>> {
    let total = sizes.iter().try_fold(1usize, |acc, &s| acc.checked_mul(s))?;
    if flat >= total {
        return None;
    }

    let mut indices = vec![0; sizes.len()];
    let mut remainder = flat;
    for d in (0..sizes.len()).rev() {
        indices[d] = remainder % sizes[d];
        remainder /= sizes[d];
    }
    Some(indices)
}

/// Cheap structural check: a `value` array plus `dimension` or `id` metadata.
pub fn is_json_stat(doc: &Json) -> bool {
    doc.get("value").map_or(false, Json::is_array)
        && (doc.get("dimension").is_some() || doc.get("id").is_some())
}

/// Flatten a JSON-stat cube into one record per cell: one field per dimension
/// holding the category key, plus `value`.
pub fn convert_json_stat(doc: &Json) -> Result<Vec<RawRecord>> {
    let values = doc
        .get("value")
        .and_then(Json::as_array)
        .ok_or_else(|| SourceError::Format("missing value array".into()))?;

    let dimensions = doc
        .get("dimension")
        .and_then(Json::as_object)
        .ok_or_else(|| SourceError::Format("missing dimensions".into()))?;

    let names: Vec<String> = match doc.get("id").and_then(Json::as_array) {
        Some(ids) => ids
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SourceError::Format("non-string entry in id".into()))
            })
            .collect::<Result<_>>()?,
        None => dimensions.keys().cloned().collect(),
    };

    let mut categories: Vec<Vec<String>> = Vec::with_capacity(names.len());
    for name in &names {
        let dim = dimensions
            .get(name)
            .ok_or_else(|| SourceError::Format(format!("dimension `{}` has no metadata", name)))?;
        let keys = category_keys(dim);
        if keys.is_empty() && !values.is_empty() {
            return Err(SourceError::Format(format!(
                "dimension `{}` has no categories",
                name
            )));
        }
        categories.push(keys);
    }
    let sizes: Vec<usize> = categories.iter().map(Vec::len).collect();

    let mut rows = Vec::with_capacity(values.len());
    for (i, raw) in values.iter().enumerate() {
        let Some(indices) = decode_index(i, &sizes) else {
            warn!(
                cells = values.len(),
                shape = ?sizes,
                "value array longer than the cube; ignoring the surplus"
            );
            break;
        };

        let mut row = RawRecord::with_capacity(names.len() + 1);
        for (d, name) in names.iter().enumerate() {
            row.insert(name.as_str(), Value::Str(categories[d][indices[d]].clone()));
        }
        row.insert("value", coerce_value(raw));
        rows.push(row);
    }

    Ok(rows)
}

/// Category keys in cube order: `category.index` as an array, or as an object
/// ordered by its positions; failing that, the keys of `category.label`.
fn category_keys(dim: &Json) -> Vec<String> {
    let category = dim.get("category");
    match category.and_then(|c| c.get("index")) {
        Some(Json::Array(keys)) => keys.iter().map(json_key).collect(),
        Some(Json::Object(map)) => ordered_by_position(map),
        _ => category
            .and_then(|c| c.get("label"))
            .and_then(Json::as_object)
            .map(|labels| labels.keys().cloned().collect())
            .unwrap_or_default(),
    }
}

fn ordered_by_position(map: &Map<String, Json>) -> Vec<String> {
    let mut keyed: Vec<(u64, &String)> = map
        .iter()
        .enumerate()
        .map(|(i, (k, v))| (v.as_u64().unwrap_or(i as u64), k))
        .collect();
    keyed.sort_by_key(|(pos, _)| *pos);
    keyed.into_iter().map(|(_, k)| k.clone()).collect()
}

fn json_key(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_value(v: &Json) -> Value {
    match v {
        Json::Number(n) => n.as_f64().map_or(Value::Null, Value::Num),
        Json::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Num(n),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

/// GET a JSON-stat document and flatten it.
#[instrument(level = "info", skip(http))]
pub async fn fetch_json_stat(http: &HttpFetcher, url: &str) -> Result<Vec<RawRecord>> {
    let text = http.get_text(url, "application/json").await?;
    let doc: Json = serde_json::from_str(&text)
        .map_err(|e| SourceError::Format(format!("invalid JSON from {}: {}", url, e)))?;
    if !is_json_stat(&doc) {
        warn!(%url, "document does not look like JSON-stat");
    }
    let rows = convert_json_stat(&doc)?;
    info!(rows = rows.len(), "decoded JSON-stat cube");
    Ok(rows)
}
