//! A directory of CSV tables, one file per table.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use panel_transform::{DatasetSink, DatasetSource, PanelError, TabularDataset};

use crate::csv_table::{read_csv_table, write_csv_table};
use crate::error::{IngestError, Result};

/// Reads `<root>/<table>.csv` and writes `<root>/<dataset name>.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    root: PathBuf,
}

impl CsvDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.csv"))
    }

    /// Table names (file stems) of every CSV file, sorted.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        Ok(list_csv_files(&self.root)?
            .iter()
            .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()))
            .map(str::to_string)
            .collect())
    }
}

impl DatasetSource for CsvDirectory {
    fn read(&self, table: &str) -> panel_transform::Result<TabularDataset> {
        let path = self.path_for(table);
        if !path.is_file() {
            return Err(PanelError::SourceNotFound {
                source_name: path.display().to_string(),
            });
        }
        let read_error = |message: String| PanelError::Read {
            source_name: path.display().to_string(),
            message,
        };
        let csv = read_csv_table(&path).map_err(|e| read_error(e.to_string()))?;
        let dataset = csv
            .into_dataset(table)
            .map_err(|e| read_error(e.to_string()))?;
        info!(
            table,
            path = %path.display(),
            rows = dataset.height(),
            columns = dataset.width(),
            "table loaded"
        );
        Ok(dataset)
    }
}

impl DatasetSink for CsvDirectory {
    fn write(&self, dataset: &TabularDataset) -> panel_transform::Result<()> {
        let path = self.path_for(dataset.name());
        let write_error = |message: String| PanelError::Write {
            target: path.display().to_string(),
            message,
        };
        std::fs::create_dir_all(&self.root)
            .map_err(|e| write_error(IngestError::io(&self.root, e).to_string()))?;
        write_csv_table(&path, dataset).map_err(|e| write_error(e.to_string()))?;
        debug!(
            table = %dataset.name(),
            path = %path.display(),
            rows = dataset.height(),
            "table written"
        );
        Ok(())
    }
}

/// Lists all CSV files in a directory, sorted by file name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
