//! Tabular dataset representation.
//!
//! [`TabularDataset`] wraps a Polars `DataFrame` with a dataset name and a
//! cell-level view ([`CellValue`]) used by the panel stages. Every operation
//! returns a new dataset; the wrapped frame is never mutated through a shared
//! reference. Polars columns are reference counted, so cloning a dataset to
//! replace one column does not copy the others.
//!
//! Column types collapse onto three logical types: integer dtypes (and
//! booleans) are [`ColumnType::Int`], float dtypes are [`ColumnType::Float`],
//! everything else is read as [`ColumnType::Str`]. NaN floats and blank
//! strings read as missing.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use polars::prelude::{
    AnyValue, BooleanChunked, Column, DataFrame, DataType, IntoColumn, NamedFrom,
    NewChunkedArray, Series,
};

use panel_common::{any_is_missing, any_to_f64, any_to_i64, any_to_string};
use panel_model::{CellKey, CellValue, ColumnType};

use crate::error::{PanelError, Result};

/// One row of a dataset: column names shared across rows, values owned.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    names: Arc<[String]>,
    values: Vec<CellValue>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.names
            .iter()
            .position(|name| name == column)
            .map(|idx| &self.values[idx])
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }
}

/// Sort key for [`TabularDataset::sort_by`].
///
/// With an explicit order, values sort by their position in the list and
/// values absent from the list sort after all listed ones. Without one,
/// values sort by [`CellValue::natural_cmp`].
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub column: String,
    pub order: Option<Vec<CellValue>>,
}

impl SortKey {
    pub fn natural(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: None,
        }
    }

    pub fn explicit(column: impl Into<String>, order: Vec<CellValue>) -> Self {
        Self {
            column: column.into(),
            order: Some(order),
        }
    }
}

/// A named, column-typed table.
#[derive(Debug, Clone)]
pub struct TabularDataset {
    name: String,
    data: DataFrame,
}

impl TabularDataset {
    pub fn new(name: impl Into<String>, data: DataFrame) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Builds a dataset from named cell columns, inferring each column type.
    pub fn from_columns(
        name: impl Into<String>,
        columns: Vec<(String, Vec<CellValue>)>,
    ) -> Result<Self> {
        let expected = columns.first().map_or(0, |(_, values)| values.len());
        let mut built = Vec::with_capacity(columns.len());
        for (column, values) in columns {
            if values.len() != expected {
                return Err(PanelError::LengthMismatch {
                    column,
                    expected,
                    actual: values.len(),
                });
            }
            let column_type = ColumnType::infer(&values);
            built.push(build_column(&column, column_type, &values));
        }
        Ok(Self::new(name, DataFrame::new(built)?))
    }

    /// Builds a dataset from a header and row-major values.
    pub fn from_rows(
        name: impl Into<String>,
        header: &[&str],
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self> {
        let mut columns: Vec<(String, Vec<CellValue>)> = header
            .iter()
            .map(|name| (name.to_string(), Vec::with_capacity(rows.len())))
            .collect();
        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != header.len() {
                return Err(PanelError::LengthMismatch {
                    column: format!("row {row_idx}"),
                    expected: header.len(),
                    actual: row.len(),
                });
            }
            for (slot, value) in columns.iter_mut().zip(row) {
                slot.1.push(value);
            }
        }
        Self::from_columns(name, columns)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn into_data(self) -> DataFrame {
        self.data
    }

    pub fn height(&self) -> usize {
        self.data.height()
    }

    pub fn width(&self) -> usize {
        self.data.width()
    }

    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    /// Column names in order.
    pub fn columns(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.data.column(column).is_ok()
    }

    fn column(&self, column: &str) -> Result<&Column> {
        self.data
            .column(column)
            .map_err(|_| PanelError::schema(column))
    }

    pub fn column_type(&self, column: &str) -> Result<ColumnType> {
        Ok(logical_type(self.column(column)?.dtype()))
    }

    /// All values of a column.
    pub fn cells(&self, column: &str) -> Result<Vec<CellValue>> {
        let series = self.column(column)?;
        let column_type = logical_type(series.dtype());
        Ok(column_cells(series, column_type))
    }

    pub fn cell(&self, column: &str, row: usize) -> Result<CellValue> {
        let series = self.column(column)?;
        let value = series.get(row)?;
        Ok(any_to_cell(value, logical_type(series.dtype())))
    }

    /// Numeric values of a column; string columns are parsed.
    ///
    /// Fails with [`PanelError::NonNumeric`] on the first present value that
    /// does not parse.
    pub fn numeric_values(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let cells = self.cells(column)?;
        let mut values = Vec::with_capacity(cells.len());
        for (row, cell) in cells.iter().enumerate() {
            match cell {
                CellValue::Missing => values.push(None),
                other => match other.to_f64_lenient() {
                    Some(v) => values.push(Some(v)),
                    None => {
                        return Err(PanelError::NonNumeric {
                            column: column.to_string(),
                            row,
                            value: other.to_string(),
                        });
                    }
                },
            }
        }
        Ok(values)
    }

    /// Row records in order.
    pub fn rows(&self) -> Vec<Row> {
        let names: Arc<[String]> = self.columns().into();
        let columns: Vec<Vec<CellValue>> = self
            .data
            .get_columns()
            .iter()
            .map(|series| column_cells(series, logical_type(series.dtype())))
            .collect();
        (0..self.height())
            .map(|idx| Row {
                names: Arc::clone(&names),
                values: columns.iter().map(|values| values[idx].clone()).collect(),
            })
            .collect()
    }

    /// Returns a dataset with `column` added or replaced, type inferred.
    pub fn with_column(&self, column: &str, values: Vec<CellValue>) -> Result<Self> {
        let column_type = ColumnType::infer(&values);
        self.with_column_typed(column, column_type, &values)
    }

    /// Returns a dataset with `column` added or replaced as `column_type`.
    pub fn with_column_typed(
        &self,
        column: &str,
        column_type: ColumnType,
        values: &[CellValue],
    ) -> Result<Self> {
        if values.len() != self.height() && self.width() > 0 {
            return Err(PanelError::LengthMismatch {
                column: column.to_string(),
                expected: self.height(),
                actual: values.len(),
            });
        }
        let mut data = self.data.clone();
        data.with_column(build_column(column, column_type, values))?;
        Ok(Self::new(self.name.clone(), data))
    }

    /// Returns a dataset with `column` replaced by float values.
    pub fn with_float_column(&self, column: &str, values: Vec<Option<f64>>) -> Result<Self> {
        if values.len() != self.height() {
            return Err(PanelError::LengthMismatch {
                column: column.to_string(),
                expected: self.height(),
                actual: values.len(),
            });
        }
        let mut data = self.data.clone();
        data.with_column(Series::new(column.into(), values))?;
        Ok(Self::new(self.name.clone(), data))
    }

    /// Returns a dataset with `column` replaced by integer values.
    pub fn with_int_column(&self, column: &str, values: Vec<Option<i64>>) -> Result<Self> {
        if values.len() != self.height() {
            return Err(PanelError::LengthMismatch {
                column: column.to_string(),
                expected: self.height(),
                actual: values.len(),
            });
        }
        let mut data = self.data.clone();
        data.with_column(Series::new(column.into(), values))?;
        Ok(Self::new(self.name.clone(), data))
    }

    /// Keeps rows for which `predicate` returns true, preserving order.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Result<Self>
    where
        F: FnMut(&Row) -> bool,
    {
        let keep: Vec<bool> = self.rows().iter().map(|row| predicate(row)).collect();
        self.filter_mask(&keep)
    }

    /// Keeps rows whose mask entry is true, preserving order.
    pub fn filter_mask(&self, keep: &[bool]) -> Result<Self> {
        if keep.len() != self.height() {
            return Err(PanelError::LengthMismatch {
                column: "filter mask".to_string(),
                expected: self.height(),
                actual: keep.len(),
            });
        }
        let mask = BooleanChunked::from_slice("keep".into(), keep);
        Ok(Self::new(self.name.clone(), self.data.filter(&mask)?))
    }

    /// Stable sort by the given keys in priority order.
    pub fn sort_by(&self, keys: &[SortKey]) -> Result<Self> {
        let mut resolved = Vec::with_capacity(keys.len());
        for key in keys {
            let cells = self.cells(&key.column)?;
            let ranks = key.order.as_ref().map(|order| {
                let positions: HashMap<CellKey, usize> = order
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(pos, value)| (value.key(), pos))
                    .collect();
                cells
                    .iter()
                    .map(|cell| positions.get(&cell.key()).copied().unwrap_or(usize::MAX))
                    .collect::<Vec<usize>>()
            });
            resolved.push((cells, ranks));
        }

        let mut order: Vec<usize> = (0..self.height()).collect();
        order.sort_by(|&a, &b| {
            for (cells, ranks) in &resolved {
                let ordering = match ranks {
                    Some(ranks) => ranks[a].cmp(&ranks[b]),
                    None => cells[a].natural_cmp(&cells[b]),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let indices: Vec<Option<usize>> = order.into_iter().map(Some).collect();
        self.gather(&indices)
    }

    /// Renames a column.
    pub fn rename_column(&self, from: &str, to: &str) -> Result<Self> {
        if from == to {
            self.column(from)?;
            return Ok(self.clone());
        }
        if self.has_column(to) {
            return Err(PanelError::invalid_config(format!(
                "cannot rename `{from}` to `{to}`: column already exists"
            )));
        }
        self.column(from)?;
        let mut data = self.data.clone();
        data.rename(from, to.into())?;
        Ok(Self::new(self.name.clone(), data))
    }

    /// Builds a new dataset whose row `i` is source row `indices[i]`, or a
    /// row of missing values for `None`. Column types are preserved.
    pub(crate) fn gather(&self, indices: &[Option<usize>]) -> Result<Self> {
        let mut columns = Vec::with_capacity(self.width());
        for series in self.data.get_columns() {
            let column_type = logical_type(series.dtype());
            let cells = column_cells(series, column_type);
            let picked: Vec<CellValue> = indices
                .iter()
                .map(|idx| idx.map_or(CellValue::Missing, |i| cells[i].clone()))
                .collect();
            columns.push(build_column(series.name(), column_type, &picked));
        }
        Ok(Self::new(self.name.clone(), DataFrame::new(columns)?))
    }
}

impl fmt::Display for TabularDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} rows x {} columns)",
            self.name,
            self.height(),
            self.width()
        )
    }
}

pub(crate) fn logical_type(dtype: &DataType) -> ColumnType {
    if dtype.is_integer() || dtype.is_bool() {
        ColumnType::Int
    } else if dtype.is_float() {
        ColumnType::Float
    } else {
        ColumnType::Str
    }
}

fn any_to_cell(value: AnyValue<'_>, column_type: ColumnType) -> CellValue {
    if any_is_missing(&value) {
        return CellValue::Missing;
    }
    match column_type {
        ColumnType::Int => any_to_i64(value).map_or(CellValue::Missing, CellValue::Int),
        ColumnType::Float => any_to_f64(value).map_or(CellValue::Missing, CellValue::Float),
        ColumnType::Str => CellValue::Str(any_to_string(value)),
    }
}

fn column_cells(series: &Column, column_type: ColumnType) -> Vec<CellValue> {
    (0..series.len())
        .map(|idx| any_to_cell(series.get(idx).unwrap_or(AnyValue::Null), column_type))
        .collect()
}

/// Builds a typed Polars column from cells.
pub(crate) fn build_column(name: &str, column_type: ColumnType, values: &[CellValue]) -> Column {
    match column_type {
        ColumnType::Int => {
            let typed: Vec<Option<i64>> = values
                .iter()
                .map(|value| match value {
                    CellValue::Int(v) => Some(*v),
                    CellValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
                    CellValue::Str(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), typed).into_column()
        }
        ColumnType::Float => {
            let typed: Vec<Option<f64>> = values.iter().map(CellValue::to_f64_lenient).collect();
            Series::new(name.into(), typed).into_column()
        }
        ColumnType::Str => {
            let typed: Vec<Option<String>> = values
                .iter()
                .map(|value| (!value.is_missing()).then(|| value.to_string()))
                .collect();
            Series::new(name.into(), typed).into_column()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TabularDataset {
        TabularDataset::from_rows(
            "sample",
            &["city", "year", "gdp"],
            vec![
                vec!["Ningbo".into(), 2019.into(), 5.5.into()],
                vec!["Hangzhou".into(), 2018.into(), CellValue::Missing],
                vec!["Hangzhou".into(), 2019.into(), 7.0.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn infers_column_types() {
        let ds = sample();
        assert_eq!(ds.columns(), vec!["city", "year", "gdp"]);
        assert_eq!(ds.column_type("city").unwrap(), ColumnType::Str);
        assert_eq!(ds.column_type("year").unwrap(), ColumnType::Int);
        assert_eq!(ds.column_type("gdp").unwrap(), ColumnType::Float);
    }

    #[test]
    fn unknown_column_is_a_schema_error() {
        let err = sample().cells("province").unwrap_err();
        assert!(matches!(err, PanelError::Schema { column } if column == "province"));
    }

    #[test]
    fn rows_expose_values_by_name() {
        let rows = sample().rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get("city"), Some(&CellValue::from("Hangzhou")));
        assert_eq!(rows[1].get("gdp"), Some(&CellValue::Missing));
        assert_eq!(rows[0].get("missing"), None);
    }

    #[test]
    fn with_column_is_pure() {
        let ds = sample();
        let updated = ds
            .with_column("flag", vec![1.into(), 0.into(), 1.into()])
            .unwrap();
        assert!(!ds.has_column("flag"));
        assert_eq!(updated.column_type("flag").unwrap(), ColumnType::Int);
        assert!(ds.with_column("flag", vec![1.into()]).is_err());
    }

    #[test]
    fn filter_rows_preserves_order() {
        let ds = sample()
            .filter_rows(|row| row.get("city") == Some(&CellValue::from("Hangzhou")))
            .unwrap();
        assert_eq!(ds.cells("year").unwrap(), vec![2018.into(), 2019.into()]);
    }

    #[test]
    fn sort_by_explicit_then_natural() {
        let ds = sample()
            .sort_by(&[
                SortKey::explicit("city", vec!["Hangzhou".into(), "Ningbo".into()]),
                SortKey::natural("year"),
            ])
            .unwrap();
        assert_eq!(
            ds.cells("city").unwrap(),
            vec!["Hangzhou".into(), "Hangzhou".into(), "Ningbo".into()]
        );
        assert_eq!(
            ds.cells("year").unwrap(),
            vec![2018.into(), 2019.into(), 2019.into()]
        );
        assert_eq!(ds.column_type("gdp").unwrap(), ColumnType::Float);
    }

    #[test]
    fn unlisted_values_sort_last() {
        let ds = sample()
            .sort_by(&[SortKey::explicit("city", vec!["Ningbo".into()])])
            .unwrap();
        assert_eq!(ds.cell("city", 0).unwrap(), CellValue::from("Ningbo"));
    }

    #[test]
    fn numeric_values_parse_strings_and_reject_text() {
        let ds = TabularDataset::from_rows(
            "t",
            &["raw"],
            vec![vec!["1.5".into()], vec![CellValue::Missing], vec!["n/a".into()]],
        )
        .unwrap();
        let err = ds.numeric_values("raw").unwrap_err();
        assert!(matches!(err, PanelError::NonNumeric { row: 2, .. }));
    }

    #[test]
    fn rename_refuses_to_overwrite() {
        let ds = sample();
        assert!(ds.rename_column("gdp", "year").is_err());
        let renamed = ds.rename_column("gdp", "output").unwrap();
        assert!(renamed.has_column("output"));
        assert!(!renamed.has_column("gdp"));
    }
}
