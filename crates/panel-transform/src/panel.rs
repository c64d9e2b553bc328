//! Balanced panel construction.
//!
//! [`build_panel`] expands a source table onto the full unit x period
//! universe. Every (unit, period) pair appears exactly once in the output,
//! whether or not the source had a row for it.

use std::collections::{HashMap, HashSet};

use polars::prelude::DataFrame;
use tracing::{info, warn};

use panel_model::{
    CellKey, CellValue, ColumnType, DataQualityWarning, DuplicateKeyPolicy, FillPolicy,
    PanelConfig, PanelReport, WarningKind,
};

use crate::error::{PanelError, Result};
use crate::frame::{TabularDataset, build_column};
use crate::governor::require_columns;

/// Unit and period column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelKeys {
    pub unit: String,
    pub period: String,
}

impl PanelKeys {
    pub fn new(unit: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            period: period.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelOptions {
    pub fill: FillPolicy,
    pub duplicates: DuplicateKeyPolicy,
}

impl From<&PanelConfig> for PanelOptions {
    fn from(config: &PanelConfig) -> Self {
        Self {
            fill: config.fill,
            duplicates: config.duplicates,
        }
    }
}

/// Builds the unit x period panel and left-joins `source` onto it.
///
/// Output columns are the unit column, the period column, then every other
/// source column in source order. Rows are ordered unit-major in universe
/// order. Skeleton rows without a source row get zero in numeric columns
/// under [`FillPolicy::Zero`] and missing everywhere else. Repeated values
/// in either universe are collapsed to their first occurrence.
///
/// Source rows whose key is outside the universe are dropped and reported.
/// Several source rows for one key are resolved by `options.duplicates`;
/// [`DuplicateKeyPolicy::Fail`] aborts with [`PanelError::DuplicateKey`].
pub fn build_panel(
    units: &[CellValue],
    periods: &[CellValue],
    source: &TabularDataset,
    keys: &PanelKeys,
    options: &PanelOptions,
) -> Result<(TabularDataset, PanelReport)> {
    require_columns(source, &[keys.unit.as_str(), keys.period.as_str()])?;

    let units = distinct(units);
    let periods = distinct(periods);
    let unit_keys: HashSet<CellKey> = units.iter().map(CellValue::key).collect();
    let period_keys: HashSet<CellKey> = periods.iter().map(CellValue::key).collect();

    let source_units = source.cells(&keys.unit)?;
    let source_periods = source.cells(&keys.period)?;
    let mut by_key: HashMap<(CellKey, CellKey), Vec<usize>> = HashMap::new();
    let mut unmatched = 0usize;
    for (idx, (unit, period)) in source_units.iter().zip(&source_periods).enumerate() {
        let key = (unit.key(), period.key());
        if unit_keys.contains(&key.0) && period_keys.contains(&key.1) {
            by_key.entry(key).or_default().push(idx);
        } else {
            unmatched += 1;
        }
    }

    let mut report = PanelReport {
        units: units.len(),
        periods: periods.len(),
        rows: units.len() * periods.len(),
        ..PanelReport::default()
    };

    let mut skeleton_units = Vec::with_capacity(report.rows);
    let mut skeleton_periods = Vec::with_capacity(report.rows);
    let mut matches: Vec<Vec<usize>> = Vec::with_capacity(report.rows);
    let mut duplicate_rows = 0usize;
    for unit in &units {
        for period in &periods {
            skeleton_units.push(unit.clone());
            skeleton_periods.push(period.clone());
            let rows = by_key
                .remove(&(unit.key(), period.key()))
                .unwrap_or_default();
            if rows.len() > 1 {
                duplicate_rows += rows.len() - 1;
            }
            let rows = match (options.duplicates, rows.len()) {
                (_, 0 | 1) | (DuplicateKeyPolicy::Sum, _) => rows,
                (DuplicateKeyPolicy::Fail, count) => {
                    return Err(PanelError::DuplicateKey {
                        unit: unit.to_string(),
                        period: period.to_string(),
                        count,
                    });
                }
                (DuplicateKeyPolicy::KeepFirst, _) => rows[..1].to_vec(),
                (DuplicateKeyPolicy::KeepLast, _) => rows[rows.len() - 1..].to_vec(),
            };
            if !rows.is_empty() {
                report.matched_rows += 1;
            }
            matches.push(rows);
        }
    }

    let mut columns = vec![
        build_column(&keys.unit, ColumnType::infer(&units), &skeleton_units),
        build_column(&keys.period, ColumnType::infer(&periods), &skeleton_periods),
    ];
    for name in source.columns() {
        if name == keys.unit || name == keys.period {
            continue;
        }
        let column_type = source.column_type(&name)?;
        let cells = source.cells(&name)?;
        let zero_fill = column_type.is_numeric() && options.fill == FillPolicy::Zero;
        let values: Vec<CellValue> = matches
            .iter()
            .map(|rows| match rows.as_slice() {
                [] if zero_fill => {
                    report.zero_filled_cells += 1;
                    zero_of(column_type)
                }
                [] => CellValue::Missing,
                [single] => cells[*single].clone(),
                many => combine(column_type, many.iter().map(|idx| &cells[*idx])),
            })
            .collect();
        columns.push(build_column(&name, column_type, &values));
    }

    if unmatched > 0 {
        let warning = DataQualityWarning::new(
            WarningKind::UnmatchedSourceRows,
            unmatched,
            format!("{unmatched} source rows fall outside the panel universe"),
        );
        warn!(dataset = %source.name(), count = unmatched, "{}", warning.message);
        report.warnings.push(warning);
    }
    if duplicate_rows > 0 {
        let warning = DataQualityWarning::new(
            WarningKind::DuplicateKeysResolved,
            duplicate_rows,
            format!(
                "{duplicate_rows} duplicate source rows resolved by {:?} policy",
                options.duplicates
            ),
        );
        warn!(dataset = %source.name(), count = duplicate_rows, "{}", warning.message);
        report.warnings.push(warning);
    }

    let panel = TabularDataset::new(source.name(), DataFrame::new(columns)?);
    info!(
        dataset = %source.name(),
        units = report.units,
        periods = report.periods,
        rows = report.rows,
        matched_rows = report.matched_rows,
        zero_filled_cells = report.zero_filled_cells,
        "panel built"
    );
    Ok((panel, report))
}

fn distinct(values: &[CellValue]) -> Vec<CellValue> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|value| seen.insert(value.key()))
        .cloned()
        .collect()
}

fn zero_of(column_type: ColumnType) -> CellValue {
    match column_type {
        ColumnType::Int => CellValue::Int(0),
        _ => CellValue::Float(0.0),
    }
}

/// Sums numeric values; string columns keep the first present value.
fn combine<'a>(
    column_type: ColumnType,
    mut values: impl Iterator<Item = &'a CellValue>,
) -> CellValue {
    match column_type {
        ColumnType::Int => values
            .filter_map(|value| match value {
                CellValue::Int(v) => Some(*v),
                _ => None,
            })
            .reduce(i64::saturating_add)
            .map_or(CellValue::Missing, CellValue::Int),
        ColumnType::Float => values
            .filter_map(CellValue::as_f64)
            .reduce(|a, b| a + b)
            .map_or(CellValue::Missing, CellValue::float),
        ColumnType::Str => values
            .find(|value| !value.is_missing())
            .cloned()
            .unwrap_or_default(),
    }
}
