//! Boundary with the storage layer.
//!
//! The transform stages never touch files. A [`DatasetSource`] materializes
//! tables in memory before the stages run and a [`DatasetSink`] persists the
//! results; their errors ([`PanelError::SourceNotFound`],
//! [`PanelError::Write`]) pass through the stages unchanged.
//!
//! [`PanelError::SourceNotFound`]: crate::error::PanelError::SourceNotFound
//! [`PanelError::Write`]: crate::error::PanelError::Write

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{PanelError, Result};
use crate::frame::TabularDataset;

/// Produces datasets by table name.
pub trait DatasetSource {
    fn read(&self, table: &str) -> Result<TabularDataset>;
}

/// Persists datasets under their own name.
pub trait DatasetSink {
    fn write(&self, dataset: &TabularDataset) -> Result<()>;
}

/// In-memory source and sink keyed by dataset name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, TabularDataset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `dataset` under its name, replacing any previous table.
    pub fn insert(&self, dataset: TabularDataset) {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.insert(dataset.name().to_string(), dataset);
    }

    pub fn get(&self, table: &str) -> Option<TabularDataset> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.get(table).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.keys().cloned().collect()
    }
}

impl DatasetSource for MemoryStore {
    fn read(&self, table: &str) -> Result<TabularDataset> {
        self.get(table).ok_or_else(|| PanelError::SourceNotFound {
            source_name: table.to_string(),
        })
    }
}

impl DatasetSink for MemoryStore {
    fn write(&self, dataset: &TabularDataset) -> Result<()> {
        self.insert(dataset.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_model::CellValue;

    #[test]
    fn memory_store_round_trips_and_reports_missing_tables() {
        let store = MemoryStore::new();
        let ds = TabularDataset::from_rows("gdp", &["city"], vec![vec![CellValue::from("Hangzhou")]])
            .unwrap();
        store.write(&ds).unwrap();
        assert_eq!(store.read("gdp").unwrap().height(), 1);
        let err = store.read("population").unwrap_err();
        assert!(err.is_boundary());
        assert_eq!(store.table_names(), vec!["gdp"]);
    }
}
