use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::DataStore;
use crate::composer::types::{FilterBounds, SummaryTable};
use crate::parser::read_summary_table;

/// One entry of `filters.json`.
#[derive(Debug, Deserialize)]
struct FilterRecord {
    #[serde(rename = "ref")]
    id: u32,
    low: f64,
    high: f64,
}

/// A [`DataStore`] reading summary tables from a directory tree:
///
/// ```text
/// <root>/filters.json
/// <root>/DVV/01/005_DAYS/ZZ.csv      (or ZZ.csv.gz)
/// ```
#[derive(Debug, Clone)]
pub struct CsvStore {
    root: PathBuf,
}

impl CsvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the tables of one filter and moving window.
    pub fn table_dir(&self, filter_id: u32, mov_stack: u32) -> PathBuf {
        self.root
            .join("DVV")
            .join(format!("{:02}", filter_id))
            .join(format!("{:03}_DAYS", mov_stack))
    }

    pub fn filters_path(&self) -> PathBuf {
        self.root.join("filters.json")
    }
}

/// Reads `path`, returning `Ok(None)` if it does not exist.
async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

#[async_trait]
impl DataStore for CsvStore {
    async fn fetch_summary_table(
        &self,
        components: &str,
        filter_id: u32,
        mov_stack: u32,
    ) -> Result<Option<SummaryTable>> {
        let dir = self.table_dir(filter_id, mov_stack);

        let plain = dir.join(format!("{}.csv", components));
        if let Some(bytes) = read_if_exists(&plain).await? {
            debug!(path = %plain.display(), "Reading summary table");
            let table = read_summary_table(bytes.as_slice())
                .with_context(|| format!("parsing {}", plain.display()))?;
            return Ok(Some(table));
        }

        let gzipped = dir.join(format!("{}.csv.gz", components));
        if let Some(bytes) = read_if_exists(&gzipped).await? {
            debug!(path = %gzipped.display(), "Reading compressed summary table");
            let table = read_summary_table(GzDecoder::new(bytes.as_slice()))
                .with_context(|| format!("parsing {}", gzipped.display()))?;
            return Ok(Some(table));
        }

        Ok(None)
    }

    async fn fetch_filter_bounds(&self, filter_id: u32) -> Result<Option<FilterBounds>> {
        let path = self.filters_path();
        let Some(bytes) = read_if_exists(&path).await? else {
            return Ok(None);
        };

        let filters: Vec<FilterRecord> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", path.display()))?;

        Ok(filters
            .into_iter()
            .find(|f| f.id == filter_id)
            .map(|f| FilterBounds {
                low: f.low,
                high: f.high,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::env;
    use std::fs;
    use std::io::Write;

    fn temp_root(name: &str) -> PathBuf {
        let root = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        root
    }

    #[test]
    fn test_table_dir_layout() {
        let store = CsvStore::new("/data");
        assert_eq!(
            store.table_dir(1, 5),
            PathBuf::from("/data/DVV/01/005_DAYS")
        );
    }

    #[tokio::test]
    async fn test_fetch_plain_table() {
        let root = temp_root("dvv_curve_store_plain");
        let store = CsvStore::new(&root);
        let dir = store.table_dir(1, 1);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("ZZ.csv"), "date,mean\n2024-01-01,0.1\n").unwrap();

        let table = store.fetch_summary_table("ZZ", 1, 1).await.unwrap().unwrap();
        assert_eq!(table.column("mean"), Some(&[0.1][..]));

        fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_gzipped_table() {
        let root = temp_root("dvv_curve_store_gz");
        let store = CsvStore::new(&root);
        let dir = store.table_dir(2, 10);
        fs::create_dir_all(&dir).unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(b"date,weighted_mean\n2024-01-01,0.25\n2024-01-02,0.5\n")
            .unwrap();
        fs::write(dir.join("ZN.csv.gz"), encoder.finish().unwrap()).unwrap();

        let table = store.fetch_summary_table("ZN", 2, 10).await.unwrap().unwrap();
        assert_eq!(table.column("weighted_mean"), Some(&[0.25, 0.5][..]));

        fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_missing_table_is_none() {
        let root = temp_root("dvv_curve_store_missing");
        let store = CsvStore::new(&root);

        assert!(store.fetch_summary_table("ZZ", 1, 1).await.unwrap().is_none());

        fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_filter_bounds() {
        let root = temp_root("dvv_curve_store_filters");
        let store = CsvStore::new(&root);
        fs::write(
            store.filters_path(),
            r#"[{"ref": 1, "low": 0.1, "high": 1.0}, {"ref": 2, "low": 1.0, "high": 2.0}]"#,
        )
        .unwrap();

        let bounds = store.fetch_filter_bounds(2).await.unwrap();
        assert_eq!(bounds, Some(FilterBounds { low: 1.0, high: 2.0 }));
        assert_eq!(store.fetch_filter_bounds(9).await.unwrap(), None);

        fs::remove_dir_all(&root).unwrap();
    }
}
