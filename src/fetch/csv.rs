// src/fetch/csv.rs

use csv::{ReaderBuilder, Trim};
use std::collections::HashSet;
use tracing::{info, instrument, warn};

use super::{run_blocking, HttpFetcher};
use crate::error::{ParseWarning, Result};
use crate::record::{RawRecord, Value};

/// How cells are typed while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvTyping {
    /// Numeric-looking cells become numbers, empty cells become null.
    Dynamic,
    /// Every cell is kept as its literal string.
    Text,
}

/// Parsed rows plus every row-level problem met on the way.
#[derive(Debug, Default)]
pub struct CsvParse {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
    pub warnings: Vec<ParseWarning>,
}

pub const DEFAULT_DELIMITER: u8 = b',';

/// Comma-separated [`parse_csv_with`].
pub fn parse_csv(text: &str, typing: CsvTyping) -> CsvParse {
    parse_csv_with(text, typing, DEFAULT_DELIMITER)
}

/// Rename repeated header names to `name_1`, `name_2`, ... skipping names
/// already taken, so every column keeps its own key.
fn dedupe_headers(raw: Vec<String>, warnings: &mut Vec<ParseWarning>) -> Vec<String> {
    let mut taken: HashSet<String> = raw.iter().cloned().collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for name in &raw {
        if seen.insert(name.as_str()) {
            out.push(name.clone());
            continue;
        }
        let mut n = 1;
        let mut renamed = format!("{}_{}", name, n);
        while taken.contains(&renamed) {
            n += 1;
            renamed = format!("{}_{}", name, n);
        }
        warnings.push(ParseWarning {
            row: 0,
            message: format!("duplicate header `{}` renamed to `{}`", name, renamed),
        });
        taken.insert(renamed.clone());
        out.push(renamed);
    }
    out
}

/// Parse header-row CSV text. Never fails: short rows are padded with null,
/// surplus cells are dropped, unreadable rows are skipped, and each case is
/// recorded as a warning. Header names are trimmed and made unique.
pub fn parse_csv_with(text: &str, typing: CsvTyping, delimiter: u8) -> CsvParse {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .trim(Trim::Headers)
        .from_reader(text.as_bytes());

    let mut out = CsvParse::default();

    out.headers = match rdr.headers() {
        Ok(h) => {
            let raw = h.iter().map(|s| s.trim().to_string()).collect();
            dedupe_headers(raw, &mut out.warnings)
        }
        Err(e) => {
            out.warnings.push(ParseWarning {
                row: 0,
                message: format!("unreadable header row: {}", e),
            });
            return out;
        }
    };
    if out.headers.is_empty() {
        return out;
    }

    for (idx, result) in rdr.records().enumerate() {
        let row_no = idx + 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                out.warnings.push(ParseWarning {
                    row: row_no,
                    message: e.to_string(),
                });
                continue;
            }
        };

        // a line holding only separators/whitespace counts as empty
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        if record.len() != out.headers.len() {
            out.warnings.push(ParseWarning {
                row: row_no,
                message: format!(
                    "expected {} fields but found {}",
                    out.headers.len(),
                    record.len()
                ),
            });
        }

        let mut row = RawRecord::with_capacity(out.headers.len());
        for (i, name) in out.headers.iter().enumerate() {
            let value = match (record.get(i), typing) {
                (None, _) => Value::Null,
                (Some(cell), CsvTyping::Dynamic) => Value::from_cell(cell),
                (Some(cell), CsvTyping::Text) => Value::Str(cell.to_string()),
            };
            row.insert(name.as_str(), value);
        }
        out.rows.push(row);
    }

    for w in &out.warnings {
        warn!(row = w.row, "CSV parse warning: {}", w.message);
    }

    out
}

/// GET a CSV document and parse it with dynamic typing.
#[instrument(level = "info", skip(http))]
pub async fn fetch_csv(http: &HttpFetcher, url: &str, delimiter: u8) -> Result<Vec<RawRecord>> {
    let text = http.get_text(url, "text/csv").await?;
    let parsed = run_blocking(move || parse_csv_with(&text, CsvTyping::Dynamic, delimiter)).await?;
    info!(
        rows = parsed.rows.len(),
        warnings = parsed.warnings.len(),
        "parsed CSV"
    );
    Ok(parsed.rows)
}

/// Non-empty, and the first row carries at least one field.
pub fn validate_records(rows: &[RawRecord]) -> bool {
    rows.first().map_or(false, |r| !r.is_empty())
}
