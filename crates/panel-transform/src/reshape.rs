//! Wide to long reshaping.
//!
//! Statistical yearbooks publish one column per year. The panel stages expect
//! one row per (unit, period), so such sheets are melted first.

use polars::prelude::DataFrame;
use tracing::debug;

use panel_model::{CellValue, ColumnType, LongFormat, parse_text_column};

use crate::error::{PanelError, Result};
use crate::frame::{TabularDataset, build_column};
use crate::governor::require_columns;

/// Melts `format.value_vars` into (`var_name`, `value_name`) pairs.
///
/// Output rows are grouped by value var: every input row for the first
/// value var, then every input row for the second, and so on. Headers that
/// all parse as integers produce an integer `var_name` column.
pub fn wide_to_long(dataset: &TabularDataset, format: &LongFormat) -> Result<TabularDataset> {
    let mut referenced: Vec<&str> = format.id_vars.iter().map(String::as_str).collect();
    referenced.extend(format.value_vars.iter().map(String::as_str));
    require_columns(dataset, &referenced)?;

    if format.var_name == format.value_name {
        return Err(PanelError::invalid_config(format!(
            "reshape var_name and value_name are both `{}`",
            format.var_name
        )));
    }
    if let Some(clash) = format
        .id_vars
        .iter()
        .find(|id| **id == format.var_name || **id == format.value_name)
    {
        return Err(PanelError::invalid_config(format!(
            "reshape output column `{clash}` collides with an id column"
        )));
    }

    let height = dataset.height();
    let total = height * format.value_vars.len();
    let mut columns = Vec::with_capacity(format.id_vars.len() + 2);

    for id in &format.id_vars {
        let column_type = dataset.column_type(id)?;
        let cells = dataset.cells(id)?;
        let repeated: Vec<CellValue> = cells
            .iter()
            .cycle()
            .take(total)
            .cloned()
            .collect();
        columns.push(build_column(id, column_type, &repeated));
    }

    let headers: Vec<CellValue> = parse_text_column(&format.value_vars);
    let mut periods = Vec::with_capacity(total);
    let mut values = Vec::with_capacity(total);
    for (header, var) in headers.iter().zip(&format.value_vars) {
        periods.extend(std::iter::repeat_n(header.clone(), height));
        values.extend(dataset.cells(var)?);
    }
    columns.push(build_column(
        &format.var_name,
        ColumnType::infer(&periods),
        &periods,
    ));
    columns.push(build_column(
        &format.value_name,
        ColumnType::infer(&values),
        &values,
    ));

    let reshaped = TabularDataset::new(dataset.name(), DataFrame::new(columns)?);
    debug!(
        dataset = %dataset.name(),
        value_vars = format.value_vars.len(),
        rows_before = height,
        rows_after = reshaped.height(),
        "reshaped wide to long"
    );
    Ok(reshaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yearbook() -> TabularDataset {
        TabularDataset::from_rows(
            "yearbook",
            &["city", "2018", "2019"],
            vec![
                vec!["Hangzhou".into(), 10.0.into(), 12.0.into()],
                vec!["Ningbo".into(), 8.0.into(), CellValue::Missing],
            ],
        )
        .unwrap()
    }

    fn format(value_vars: &[&str]) -> LongFormat {
        LongFormat {
            id_vars: vec!["city".to_string()],
            value_vars: value_vars.iter().map(|v| v.to_string()).collect(),
            var_name: "year".to_string(),
            value_name: "target".to_string(),
        }
    }

    #[test]
    fn melts_year_columns() {
        let long = wide_to_long(&yearbook(), &format(&["2018", "2019"])).unwrap();
        assert_eq!(long.columns(), vec!["city", "year", "target"]);
        assert_eq!(long.column_type("year").unwrap(), ColumnType::Int);
        assert_eq!(
            long.cells("city").unwrap(),
            vec![
                "Hangzhou".into(),
                "Ningbo".into(),
                "Hangzhou".into(),
                "Ningbo".into()
            ]
        );
        assert_eq!(
            long.cells("year").unwrap(),
            vec![2018.into(), 2018.into(), 2019.into(), 2019.into()]
        );
        assert_eq!(long.cell("target", 3).unwrap(), CellValue::Missing);
    }

    #[test]
    fn absent_value_vars_are_listed() {
        let err = wide_to_long(&yearbook(), &format(&["2017", "2018", "2020"])).unwrap_err();
        assert_eq!(err.to_string(), "missing columns: 2017, 2020");
    }
}
