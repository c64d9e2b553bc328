//! Difference-in-differences indicator columns.
//!
//! For each unit the event period is the earliest period in which the event
//! column satisfies the caller's [`EventPredicate`]. From it:
//!
//! - `treated` is 1 on every row of a unit with an event period,
//! - `post` is 1 on rows at or after the unit's event period,
//! - `did` is `treated * post`.
//!
//! Units without an event get a missing event period and zeros. The
//! indicators depend only on the event column, so rerunning on annotated
//! data reproduces them exactly.

use std::collections::{HashMap, HashSet};

use tracing::info;

use panel_model::{CellKey, CellValue, ColumnType, DidColumnNames, DidReport, EventPredicate};

use crate::error::{PanelError, Result};
use crate::frame::TabularDataset;
use crate::governor::require_columns;

/// Adds (or replaces) the event period and indicator columns.
pub fn build_did_variables(
    dataset: &TabularDataset,
    unit_column: &str,
    period_column: &str,
    event_column: &str,
    predicate: &EventPredicate,
    names: &DidColumnNames,
) -> Result<(TabularDataset, DidReport)> {
    require_columns(dataset, &[unit_column, period_column, event_column])?;
    let outputs = names.names();
    if let Some(clash) = [unit_column, period_column, event_column]
        .into_iter()
        .find(|input| outputs.contains(input))
    {
        return Err(PanelError::invalid_config(format!(
            "indicator column `{clash}` would overwrite an input column"
        )));
    }

    let units: Vec<CellKey> = dataset
        .cells(unit_column)?
        .iter()
        .map(CellValue::key)
        .collect();
    let periods = dataset.numeric_values(period_column)?;
    let events = dataset.cells(event_column)?;

    let mut event_periods: HashMap<&CellKey, f64> = HashMap::new();
    for ((unit, period), event) in units.iter().zip(&periods).zip(&events) {
        let Some(period) = *period else { continue };
        if !predicate.matches(event) {
            continue;
        }
        event_periods
            .entry(unit)
            .and_modify(|first| *first = first.min(period))
            .or_insert(period);
    }

    let integral = event_periods.values().all(|p| p.fract() == 0.0);
    let mut event_column_values = Vec::with_capacity(units.len());
    let mut treated = Vec::with_capacity(units.len());
    let mut post = Vec::with_capacity(units.len());
    let mut did = Vec::with_capacity(units.len());
    let mut report = DidReport::default();
    for (unit, period) in units.iter().zip(&periods) {
        let event_period = event_periods.get(unit).copied();
        let is_treated = event_period.is_some();
        let is_post = matches!((event_period, period), (Some(ep), Some(p)) if *p >= ep);
        event_column_values.push(match event_period {
            Some(ep) if integral => CellValue::Int(ep as i64),
            Some(ep) => CellValue::Float(ep),
            None => CellValue::Missing,
        });
        treated.push(Some(i64::from(is_treated)));
        post.push(Some(i64::from(is_post)));
        did.push(Some(i64::from(is_treated && is_post)));
        report.treated_rows += usize::from(is_treated);
        report.post_rows += usize::from(is_post);
    }
    let all_units: HashSet<&CellKey> = units.iter().collect();
    report.treated_units = event_periods.len();
    report.control_units = all_units.len() - event_periods.len();

    let event_type = if integral {
        ColumnType::Int
    } else {
        ColumnType::Float
    };
    let annotated = dataset
        .with_column_typed(&names.event_period, event_type, &event_column_values)?
        .with_int_column(&names.treated, treated)?
        .with_int_column(&names.post, post)?
        .with_int_column(&names.did, did)?;

    info!(
        dataset = %dataset.name(),
        event_column,
        treated_units = report.treated_units,
        control_units = report.control_units,
        post_rows = report.post_rows,
        "did indicators built"
    );
    Ok((annotated, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_panel() -> TabularDataset {
        let mut rows = Vec::new();
        for year in 2013..=2018 {
            let pilot: CellValue = if year == 2015 || year == 2016 {
                "approved".into()
            } else {
                CellValue::Missing
            };
            rows.push(vec!["Hangzhou".into(), year.into(), pilot]);
        }
        for year in 2013..=2018 {
            rows.push(vec!["Ningbo".into(), year.into(), CellValue::Missing]);
        }
        TabularDataset::from_rows("policy", &["city", "year", "pilot"], rows).unwrap()
    }

    fn ints(values: &[i64]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::Int(*v)).collect()
    }

    fn build(ds: &TabularDataset) -> (TabularDataset, DidReport) {
        build_did_variables(
            ds,
            "city",
            "year",
            "pilot",
            &EventPredicate::NonMissing,
            &DidColumnNames::default(),
        )
        .unwrap()
    }

    #[test]
    fn treated_unit_switches_on_at_event_period() {
        let (ds, report) = build(&policy_panel());
        assert_eq!(ds.cell("event_period", 0).unwrap(), CellValue::Int(2015));
        assert_eq!(ds.cell("event_period", 6).unwrap(), CellValue::Missing);
        assert_eq!(
            ds.cells("treated").unwrap(),
            ints(&[1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0])
        );
        assert_eq!(
            ds.cells("post").unwrap(),
            ints(&[0, 0, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0])
        );
        assert_eq!(ds.cells("did").unwrap(), ds.cells("post").unwrap());
        assert_eq!(
            report,
            DidReport {
                treated_units: 1,
                control_units: 1,
                treated_rows: 6,
                post_rows: 4,
            }
        );
    }

    #[test]
    fn rerunning_is_idempotent() {
        let (once, _) = build(&policy_panel());
        let (twice, _) = build(&once);
        assert_eq!(once.rows(), twice.rows());
    }

    #[test]
    fn event_at_first_period_is_post_throughout() {
        let ds = TabularDataset::from_rows(
            "policy",
            &["city", "year", "pilot"],
            vec![
                vec!["Hangzhou".into(), 2013.into(), 1.into()],
                vec!["Hangzhou".into(), 2014.into(), 0.into()],
            ],
        )
        .unwrap();
        let (ds, _) = build_did_variables(
            &ds,
            "city",
            "year",
            "pilot",
            &EventPredicate::Positive,
            &DidColumnNames::default(),
        )
        .unwrap();
        assert_eq!(ds.cells("post").unwrap(), ints(&[1, 1]));
    }

    #[test]
    fn output_may_not_overwrite_inputs() {
        let names = DidColumnNames {
            treated: "pilot".to_string(),
            ..DidColumnNames::default()
        };
        let err = build_did_variables(
            &policy_panel(),
            "city",
            "year",
            "pilot",
            &EventPredicate::NonMissing,
            &names,
        )
        .unwrap_err();
        assert!(matches!(err, PanelError::InvalidConfig { .. }));
    }
}
