// src/fetch/local.rs

use glob::{glob, Pattern};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use super::{parse_csv, run_blocking, CsvTyping, MultiCsvData};
use crate::error::{Result, SourceError};

pub const DATA_SUFFIX: &str = "-data.csv";
pub const FIELDS_SUFFIX: &str = "-fields.csv";
pub const CODELISTS_SUFFIX: &str = "-codelists.csv";

/// Load the three CSVs of a local dataset from `<root>/<dataset_id>/`.
/// A missing directory or data file is a `NotFound`; missing or unreadable
/// fields/code-list files load as empty lists.
#[instrument(level = "info", skip(root), fields(root = %root.as_ref().display()))]
pub async fn load_local<P: AsRef<Path>>(root: P, dataset_id: &str) -> Result<MultiCsvData> {
    let dir = root.as_ref().join(dataset_id);
    if !fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Err(SourceError::not_found(
            dataset_id,
            format!("dataset directory {}", dir.display()),
        ));
    }

    // glob walks the directory synchronously
    let (data_file, fields_file, codelists_file) = run_blocking(move || {
        (
            find_by_suffix(&dir, DATA_SUFFIX),
            find_by_suffix(&dir, FIELDS_SUFFIX),
            find_by_suffix(&dir, CODELISTS_SUFFIX),
        )
    })
    .await?;
    let data_file = data_file
        .ok_or_else(|| SourceError::not_found(dataset_id, format!("*{} file", DATA_SUFFIX)))?;

    let (data, fields, code_lists) = tokio::join!(
        fs::read_to_string(&data_file),
        read_optional(fields_file.as_deref()),
        read_optional(codelists_file.as_deref()),
    );
    let data = data.map_err(|e| SourceError::unavailable(data_file.display().to_string(), e))?;

    let out = run_blocking(move || MultiCsvData {
        data: parse_csv(&data, CsvTyping::Text).rows,
        fields: parse_csv(&fields, CsvTyping::Text).rows,
        code_lists: parse_csv(&code_lists, CsvTyping::Text).rows,
    })
    .await?;
    info!(
        dataset = dataset_id,
        data = out.data.len(),
        fields = out.fields.len(),
        code_lists = out.code_lists.len(),
        "loaded local dataset"
    );
    Ok(out)
}

/// First file in `dir` (alphabetically) whose name ends with `suffix`.
fn find_by_suffix(dir: &Path, suffix: &str) -> Option<PathBuf> {
    let pattern = format!("{}/*{}", Pattern::escape(&dir.to_string_lossy()), suffix);
    let found = glob(&pattern)
        .ok()?
        .filter_map(|entry| entry.ok())
        .find(|p| p.is_file());
    debug!(?found, suffix, "suffix lookup");
    found
}

async fn read_optional(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return String::new();
    };
    match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "optional file unreadable, continuing without it");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_loads_all_three_files() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("1942");
        stdfs::create_dir_all(&dir).unwrap();
        stdfs::write(dir.join("POP_1942-data.csv"), "NUTS,Value\nBG411,10\nBG412,20\n").unwrap();
        stdfs::write(dir.join("POP_1942-fields.csv"), "Field,Description\nNUTS,Region\n").unwrap();
        stdfs::write(
            dir.join("POP_1942-codelists.csv"),
            "Code list,Code,Name\nNUTS,BG411,Sofia City\n",
        )
        .unwrap();

        let out = load_local(tmp.path(), "1942").await.unwrap();
        assert_eq!(out.data.len(), 2);
        assert_eq!(out.fields.len(), 1);
        assert_eq!(out.code_lists.len(), 1);
    }

    #[tokio::test]
    async fn test_optional_files_may_be_absent() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("7");
        stdfs::create_dir_all(&dir).unwrap();
        stdfs::write(dir.join("x-data.csv"), "a\n1\n").unwrap();

        let out = load_local(tmp.path(), "7").await.unwrap();
        assert_eq!(out.data.len(), 1);
        assert!(out.fields.is_empty());
        assert!(out.code_lists.is_empty());
    }

    #[tokio::test]
    async fn test_missing_directory_names_dataset() {
        let tmp = tempdir().unwrap();
        let err = load_local(tmp.path(), "nope").await.unwrap_err();
        match err {
            SourceError::NotFound { dataset_id, .. } => assert_eq!(dataset_id, "nope"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_data_file_names_dataset() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("1169");
        stdfs::create_dir_all(&dir).unwrap();
        stdfs::write(dir.join("x-codelists.csv"), "Code list,Code,Name\n").unwrap();

        let err = load_local(tmp.path(), "1169").await.unwrap_err();
        assert!(err.to_string().contains("1169"));
        assert!(matches!(err, SourceError::NotFound { .. }));
    }
}
