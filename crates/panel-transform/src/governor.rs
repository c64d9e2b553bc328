//! Column governance: schema checks, value filtering, and row ordering.
//!
//! The value universes (unit names, periods, category lists) are plain data
//! passed in by the caller.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use panel_model::{CellKey, CellValue, parse_text_column};

use crate::error::{PanelError, Result};
use crate::frame::{SortKey, TabularDataset};

/// Fails with [`PanelError::MissingColumns`] listing every absent column.
pub fn require_columns<S: AsRef<str>>(dataset: &TabularDataset, names: &[S]) -> Result<()> {
    let missing: Vec<String> = names
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| !dataset.has_column(name))
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PanelError::MissingColumns { columns: missing })
    }
}

/// Drops rows whose `column` value is not in `allowed`. Survivors keep
/// their order.
///
/// Membership compares [`CellKey`]s, so `2018` matches `2018.0`. A missing
/// cell survives only if `allowed` contains [`CellValue::Missing`].
pub fn keep_values(
    dataset: &TabularDataset,
    column: &str,
    allowed: &[CellValue],
) -> Result<TabularDataset> {
    require_columns(dataset, &[column])?;
    let allowed: HashSet<CellKey> = allowed.iter().map(CellValue::key).collect();
    let keep: Vec<bool> = dataset
        .cells(column)?
        .iter()
        .map(|cell| allowed.contains(&cell.key()))
        .collect();
    let filtered = dataset.filter_mask(&keep)?;
    debug!(
        dataset = %dataset.name(),
        column,
        rows_before = dataset.height(),
        rows_after = filtered.height(),
        "kept allowed values"
    );
    Ok(filtered)
}

/// Stable sort by `priority` columns.
///
/// A column listed in `orderings` sorts by its position in that list, values
/// not in the list after all listed ones. Other columns sort naturally.
pub fn order(
    dataset: &TabularDataset,
    priority: &[String],
    orderings: &BTreeMap<String, Vec<CellValue>>,
) -> Result<TabularDataset> {
    require_columns(dataset, priority)?;
    let keys: Vec<SortKey> = priority
        .iter()
        .map(|column| match orderings.get(column) {
            Some(order) => SortKey::explicit(column.clone(), order.clone()),
            None => SortKey::natural(column.clone()),
        })
        .collect();
    dataset.sort_by(&keys)
}

/// Removes every occurrence of `pattern` from `column`.
///
/// Values are compared as text; the stripped column is retyped, so a year
/// column read as `2018年` becomes an integer column. Cells left blank
/// become missing.
pub fn strip_pattern(
    dataset: &TabularDataset,
    column: &str,
    pattern: &str,
) -> Result<TabularDataset> {
    if pattern.is_empty() {
        return Err(PanelError::invalid_config(format!(
            "empty strip pattern for column `{column}`"
        )));
    }
    let cells = dataset.cells(column)?;
    let mut changed = 0usize;
    let stripped: Vec<String> = cells
        .iter()
        .map(|cell| {
            let text = cell.to_string();
            if text.contains(pattern) {
                changed += 1;
                text.replace(pattern, "")
            } else {
                text
            }
        })
        .collect();
    debug!(dataset = %dataset.name(), column, pattern, changed, "stripped pattern");
    dataset.with_column(column, parse_text_column(&stripped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_model::ColumnType;

    fn cities() -> TabularDataset {
        TabularDataset::from_rows(
            "cities",
            &["city", "year", "gdp"],
            vec![
                vec!["Wenzhou".into(), 2019.into(), 1.0.into()],
                vec!["Hangzhou".into(), 2019.into(), 2.0.into()],
                vec!["Ningbo".into(), 2018.into(), 3.0.into()],
                vec!["Hangzhou".into(), 2018.into(), 4.0.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn require_columns_lists_every_absent_column() {
        let err = require_columns(&cities(), &["city", "province", "industry"]).unwrap_err();
        match err {
            PanelError::MissingColumns { columns } => {
                assert_eq!(columns, vec!["province", "industry"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(require_columns(&cities(), &["city", "year"]).is_ok());
    }

    #[test]
    fn keep_values_preserves_survivor_order() {
        let kept = keep_values(
            &cities(),
            "city",
            &["Ningbo".into(), "Hangzhou".into()],
        )
        .unwrap();
        assert_eq!(kept.cells("gdp").unwrap(), vec![2.0.into(), 3.0.into(), 4.0.into()]);
    }

    #[test]
    fn keep_values_matches_integral_floats() {
        let kept = keep_values(&cities(), "year", &[2018.0.into()]).unwrap();
        assert_eq!(kept.height(), 2);
    }

    #[test]
    fn keep_values_on_absent_column_fails() {
        let err = keep_values(&cities(), "province", &[]).unwrap_err();
        assert!(matches!(err, PanelError::MissingColumns { .. }));
    }

    #[test]
    fn order_uses_declared_then_natural_order() {
        let mut orderings = BTreeMap::new();
        orderings.insert(
            "city".to_string(),
            vec!["Ningbo".into(), "Hangzhou".into(), "Wenzhou".into()],
        );
        let sorted = order(
            &cities(),
            &["city".to_string(), "year".to_string()],
            &orderings,
        )
        .unwrap();
        assert_eq!(
            sorted.cells("gdp").unwrap(),
            vec![3.0.into(), 4.0.into(), 2.0.into(), 1.0.into()]
        );
    }

    #[test]
    fn order_reports_all_missing_priority_columns() {
        let err = order(
            &cities(),
            &["province".to_string(), "city".to_string(), "industry".to_string()],
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "missing columns: province, industry");
    }

    #[test]
    fn strip_pattern_retypes_numeric_text() {
        let ds = TabularDataset::from_rows(
            "raw",
            &["city", "year"],
            vec![
                vec!["Hangzhou City".into(), "2018年".into()],
                vec!["Ningbo".into(), "2019年".into()],
                vec![CellValue::Missing, CellValue::Missing],
            ],
        )
        .unwrap();
        let ds = strip_pattern(&ds, "city", " City").unwrap();
        let ds = strip_pattern(&ds, "year", "年").unwrap();
        assert_eq!(
            ds.cells("city").unwrap(),
            vec!["Hangzhou".into(), "Ningbo".into(), CellValue::Missing]
        );
        assert_eq!(ds.column_type("year").unwrap(), ColumnType::Int);
        assert_eq!(ds.cell("year", 1).unwrap(), CellValue::Int(2019));
    }
}
