// src/pipeline.rs

use serde::Serialize;
use std::{collections::BTreeMap, path::Path, sync::Arc};
use tracing::{debug, info, instrument, warn};

use crate::analyze::{DimensionAnalyzer, KeywordTable, NormalizedDataset, PlaceList};
use crate::cache::{MemoryCache, RowCache};
use crate::chart::{
    select_chart_type, suggest_alternative_charts, validate_chart_type, ChartType,
    ChartValidation,
};
use crate::codes::{CodeLists, RowProcessor};
use crate::config::PipelineConfig;
use crate::error::{Result, SourceError};
use crate::fetch::{self, run_blocking, HttpFetcher, MultiCsvData};
use crate::record::RawRecord;
use crate::registry::{DatasetEntry, DatasetFormat, Registry};
use crate::revision::reconcile;
use crate::transform::{self, Filter, PageInfo, SortDirection};

/// Resolve codes, then keep the latest revision of each observation.
pub fn process_multi(data: MultiCsvData, value_column: &str) -> Vec<RawRecord> {
    let codes = CodeLists::from_rows(&data.code_lists);
    debug!(lists = codes.len(), fields = data.fields.len(), "resolving codes");
    let rows = RowProcessor::new(&codes, value_column).process_all(&data.data);
    reconcile(rows, value_column)
}

/// Load `<root>/<local_id>/` and run it through code resolution and
/// revision reconciliation.
pub async fn process_local_dataset(
    root: &Path,
    local_id: &str,
    value_column: &str,
) -> Result<Vec<RawRecord>> {
    let data = fetch::load_local(root, local_id).await?;
    let value_column = value_column.to_string();
    run_blocking(move || process_multi(data, &value_column)).await
}

/// What a caller asks of [`Pipeline::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    pub dataset_id: String,
    /// Falls back to the configured default locale.
    pub locale: Option<String>,
    pub chart: Option<ChartType>,
    pub filters: BTreeMap<String, Filter>,
    pub sort: Option<(String, SortDirection)>,
    pub page: usize,
    pub page_size: usize,
}

impl LoadRequest {
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            ..Self::default()
        }
    }
}

/// Normalized data plus the chart decision, ready for presentation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetView {
    pub dataset_id: String,
    pub locale: String,
    pub data: NormalizedDataset,
    pub chart: ChartType,
    pub alternatives: Vec<ChartType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ChartValidation>,
    pub cached: bool,
    pub prebuilt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageInfo>,
}

/// Registry lookup → cache → fetch → normalize → chart selection.
pub struct Pipeline {
    config: PipelineConfig,
    registry: Registry,
    http: HttpFetcher,
    cache: Arc<dyn RowCache>,
    analyzer: DimensionAnalyzer,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, registry: Registry) -> Result<Self> {
        let http = HttpFetcher::from_config(&config)?;
        let cache: Arc<dyn RowCache> = Arc::new(MemoryCache::new(config.cache_ttl()));

        let keywords = match &config.keywords {
            Some(path) => KeywordTable::load(path)?,
            None => KeywordTable::default(),
        };
        let gazetteer = match &config.gazetteer {
            Some(path) => PlaceList::load(path)?,
            None => PlaceList::default(),
        };
        let analyzer = DimensionAnalyzer::new(keywords, Arc::new(gazetteer));

        Ok(Self {
            config,
            registry,
            http,
            cache,
            analyzer,
        })
    }

    /// Swap in another cache implementation (shared, or with a test clock).
    pub fn with_cache(mut self, cache: Arc<dyn RowCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_analyzer(mut self, analyzer: DimensionAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &DimensionAnalyzer {
        &self.analyzer
    }

    /// Fetch raw rows for one entry, bypassing the cache.
    /// Priority: local files, then multi-file CSV, then plain CSV or JSON-stat.
    pub async fn fetch_rows(&self, entry: &DatasetEntry, locale: &str) -> Result<Vec<RawRecord>> {
        if let Some(local_id) = &entry.local_id {
            return process_local_dataset(&self.config.data_root, local_id, &entry.value_column)
                .await;
        }

        let url = entry
            .url_for(locale)
            .ok_or_else(|| SourceError::Config(format!("dataset `{}` has no url", entry.id)))?;

        if entry.is_multi_csv() {
            let data = fetch::fetch_multi_csv(
                &self.http,
                url,
                entry.fields_url_for(locale),
                entry.codelists_url_for(locale),
            )
            .await?;
            let value_column = entry.value_column.clone();
            return run_blocking(move || process_multi(data, &value_column)).await;
        }

        match entry.format {
            DatasetFormat::JsonStat => fetch::fetch_json_stat(&self.http, url).await,
            _ => fetch::fetch_csv(&self.http, url, entry.delimiter_byte()).await,
        }
    }

    /// Raw rows from the cache, or fetched and then cached. The flag reports a hit.
    pub async fn load_rows(&self, entry: &DatasetEntry, locale: &str) -> Result<(Vec<RawRecord>, bool)> {
        if let Some(rows) = self.cache.get(&entry.id, locale) {
            return Ok((rows, true));
        }
        let rows = self.fetch_rows(entry, locale).await?;
        if !fetch::validate_records(&rows) {
            warn!(dataset = %entry.id, %locale, "source returned no usable rows");
        }
        self.cache.set(&entry.id, locale, rows.clone());
        Ok((rows, false))
    }

    /// Classify and normalize on the blocking pool.
    async fn normalize(&self, rows: Vec<RawRecord>, entry: &DatasetEntry) -> Result<NormalizedDataset> {
        let analyzer = self.analyzer.clone();
        let hints = entry.dimensions.clone();
        run_blocking(move || analyzer.normalize_with_hints(rows, &hints)).await
    }

    /// Normalize a local dataset for the pre-build step.
    pub async fn prebuild(&self, entry: &DatasetEntry) -> Result<NormalizedDataset> {
        let local_id = entry.local_id.as_deref().ok_or_else(|| {
            SourceError::Config(format!("dataset `{}` has no local_id", entry.id))
        })?;
        let rows =
            process_local_dataset(&self.config.data_root, local_id, &entry.value_column).await?;
        self.normalize(rows, entry).await
    }

    async fn read_prebuilt(&self, entry: &DatasetEntry) -> Option<NormalizedDataset> {
        let dir = self.config.prebuilt_dir.as_ref()?;
        let local_id = entry.local_id.as_ref()?;
        let path = dir.join(format!("{}.json", local_id));
        let text = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&text) {
            Ok(ds) => Some(ds),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable pre-built dataset");
                None
            }
        }
    }

    #[instrument(level = "info", skip(self, req), fields(dataset = %req.dataset_id))]
    pub async fn load(&self, req: &LoadRequest) -> Result<DatasetView> {
        let entry = self.registry.require(&req.dataset_id)?;
        let locale = req
            .locale
            .clone()
            .unwrap_or_else(|| self.config.default_locale.clone());

        // 1) pre-built JSON, else cached or fetched raw rows
        let (data, cached, prebuilt) = match self.read_prebuilt(entry).await {
            Some(ds) => (ds, false, true),
            None => {
                let (rows, cached) = self.load_rows(entry, &locale).await?;
                let ds = self.normalize(rows, entry).await?;
                (ds, cached, false)
            }
        };

        // 2) filter and sort
        let mut data = transform::filter_rows(data, &req.filters);
        if let Some((column, direction)) = &req.sort {
            data = transform::sort_rows(data, column, *direction);
        }

        // 3) chart decision over the whole result
        let characteristics = self.analyzer.characteristics_of(&data);
        let auto = select_chart_type(&characteristics);
        let alternatives = suggest_alternative_charts(&characteristics);
        let (chart, validation) = match req.chart {
            Some(requested) => {
                let v = validate_chart_type(requested, &characteristics);
                if !v.valid {
                    debug!(%requested, reason = ?v.reason, "requested chart rejected");
                }
                (if v.valid { requested } else { auto }, Some(v))
            }
            None => (auto, None),
        };

        // 4) paginate last
        let (data, pagination) = transform::paginate(data, req.page, req.page_size);

        info!(
            rows = data.metadata.row_count,
            %chart,
            cached,
            prebuilt,
            "dataset ready"
        );
        Ok(DatasetView {
            dataset_id: entry.id.clone(),
            locale,
            data,
            chart,
            alternatives,
            validation,
            cached,
            prebuilt,
            pagination,
        })
    }
}
