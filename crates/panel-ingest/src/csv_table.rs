use std::collections::HashSet;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use panel_common::format_numeric;
use panel_model::{CellValue, parse_text_column};
use panel_transform::TabularDataset;

use crate::error::{IngestError, Result};

/// Raw CSV contents: normalized headers and text cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Types every column (see [`parse_text_column`]) and builds a dataset.
    pub fn into_dataset(self, name: &str) -> panel_transform::Result<TabularDataset> {
        let mut columns: Vec<Vec<String>> =
            vec![Vec::with_capacity(self.rows.len()); self.headers.len()];
        for row in self.rows {
            for (column, cell) in columns.iter_mut().zip(row) {
                column.push(cell);
            }
        }
        let typed = self
            .headers
            .into_iter()
            .zip(columns)
            .map(|(header, cells)| (header, parse_text_column(&cells)))
            .collect();
        TabularDataset::from_columns(name, typed)
    }
}

fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

/// Reads a CSV file whose first non-blank row is the header.
///
/// Blank rows are skipped and short rows are padded with empty cells.
pub fn read_csv_table(path: &Path) -> Result<CsvTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| IngestError::csv(path, e))?;
    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::csv(path, e))?;
        let row: Vec<String> = record.iter().map(normalize_cell).collect();
        if row.iter().all(|value| value.is_empty()) {
            continue;
        }
        raw_rows.push(row);
    }
    let mut raw_rows = raw_rows.into_iter();
    let Some(header_row) = raw_rows.next() else {
        return Ok(CsvTable {
            headers: Vec::new(),
            rows: Vec::new(),
        });
    };

    let headers: Vec<String> = header_row.iter().map(|h| normalize_header(h)).collect();
    let mut seen = HashSet::new();
    if let Some(duplicate) = headers.iter().find(|header| !seen.insert(header.as_str())) {
        return Err(IngestError::DuplicateHeader {
            path: path.to_path_buf(),
            header: duplicate.clone(),
        });
    }

    let rows = raw_rows
        .map(|record| {
            (0..headers.len())
                .map(|idx| record.get(idx).cloned().unwrap_or_default())
                .collect()
        })
        .collect();
    Ok(CsvTable { headers, rows })
}

/// Text written for a cell. Missing cells are empty.
pub fn cell_text(value: &CellValue) -> String {
    match value {
        CellValue::Float(v) => format_numeric(*v),
        other => other.to_string(),
    }
}

/// Writes `dataset` as CSV with a header row.
pub fn write_csv_table(path: &Path, dataset: &TabularDataset) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .map_err(|e| IngestError::csv(path, e))?;
    writer
        .write_record(dataset.columns())
        .map_err(|e| IngestError::csv(path, e))?;
    for row in dataset.rows() {
        writer
            .write_record(row.values().iter().map(cell_text))
            .map_err(|e| IngestError::csv(path, e))?;
    }
    writer.flush().map_err(|e| IngestError::io(path, e))?;
    Ok(())
}
