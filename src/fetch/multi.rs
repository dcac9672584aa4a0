// src/fetch/multi.rs

use tracing::{info, instrument, warn};

use super::{parse_csv, run_blocking, CsvTyping, HttpFetcher};
use crate::error::Result;
use crate::record::RawRecord;

/// The three resources of a multi-file dataset: observations, field
/// descriptions and code lists. Optional resources that were absent or failed
/// to load are empty.
#[derive(Debug, Default)]
pub struct MultiCsvData {
    pub data: Vec<RawRecord>,
    pub fields: Vec<RawRecord>,
    pub code_lists: Vec<RawRecord>,
}

/// Fetch the data, fields and code-list CSVs concurrently. Only the data
/// resource is mandatory; the others degrade to empty lists.
#[instrument(level = "info", skip(http))]
pub async fn fetch_multi_csv(
    http: &HttpFetcher,
    data_url: &str,
    fields_url: Option<&str>,
    codelists_url: Option<&str>,
) -> Result<MultiCsvData> {
    let (data, fields, code_lists) = tokio::join!(
        http.get_text(data_url, "text/csv"),
        fetch_optional(http, fields_url),
        fetch_optional(http, codelists_url),
    );

    let data = data?;
    let (data, fields, code_lists) = run_blocking(move || {
        (
            parse_csv(&data, CsvTyping::Text).rows,
            parse_csv(&fields, CsvTyping::Text).rows,
            parse_csv(&code_lists, CsvTyping::Text).rows,
        )
    })
    .await?;

    info!(
        data = data.len(),
        fields = fields.len(),
        code_lists = code_lists.len(),
        "fetched multi-file dataset"
    );
    Ok(MultiCsvData {
        data,
        fields,
        code_lists,
    })
}

async fn fetch_optional(http: &HttpFetcher, url: Option<&str>) -> String {
    let Some(url) = url else {
        return String::new();
    };
    match http.get_text(url, "text/csv").await {
        Ok(text) => text,
        Err(e) => {
            warn!(%url, error = %e, "optional resource unavailable, continuing without it");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::fetch::test_server;
    use crate::record::Value;
    use std::time::Duration;

    fn http() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5), 0, 1).unwrap()
    }

    #[tokio::test]
    async fn test_all_three_resources() {
        let data = test_server::serve(200, "NUTS,Value\nBG411,10\n").await;
        let fields = test_server::serve(200, "Field,Description\nNUTS,Region\n").await;
        let codes = test_server::serve(200, "Code list,Code,Name\nNUTS,BG411,Sofia City\n").await;

        let out = fetch_multi_csv(&http(), &data, Some(fields.as_str()), Some(codes.as_str()))
            .await
            .unwrap();
        assert_eq!(out.data.len(), 1);
        assert_eq!(out.fields.len(), 1);
        assert_eq!(out.code_lists.len(), 1);
        assert_eq!(out.data[0].get("Value"), Some(&Value::from("10")));
    }

    #[tokio::test]
    async fn test_optional_failures_degrade_to_empty() {
        let data = test_server::serve(200, "NUTS,Value\nBG411,10\n").await;
        let broken = test_server::serve(500, "boom").await;

        let out = fetch_multi_csv(&http(), &data, Some(broken.as_str()), None)
            .await
            .unwrap();
        assert_eq!(out.data.len(), 1);
        assert!(out.fields.is_empty());
        assert!(out.code_lists.is_empty());
    }

    #[tokio::test]
    async fn test_data_failure_aborts() {
        let broken = test_server::serve(500, "boom").await;
        let codes = test_server::serve(200, "Code list,Code,Name\n").await;

        let err = fetch_multi_csv(&http(), &broken, None, Some(codes.as_str()))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::SourceUnavailable { .. }));
    }
}
