//! Per-unit gap filling.
//!
//! Each unit's rows form an interpolation group. Within a group, a value is
//! known unless it is missing (or zero, when zeros are treated as missing).
//! Missing values are estimated from the known points:
//!
//! - [`EstimationPolicy::Hybrid`]: piecewise-linear interpolation between the
//!   nearest known neighbours inside the known period range, the OLS line
//!   outside it.
//! - [`EstimationPolicy::RegressionOnly`]: the OLS line everywhere.
//!
//! With negative repair enabled, a missing value whose OLS prediction is
//! negative takes the nearest known positive value instead, whichever
//! policy is in force.
//!
//! Known values are never modified. Groups that cannot be fit are left as
//! they are and reported, never rejected.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use panel_model::{
    CellKey, DataQualityWarning, EstimationPolicy, InterpolateConfig, InterpolationReport,
    WarningKind,
};

use crate::error::Result;
use crate::frame::TabularDataset;
use crate::governor::require_columns;
use crate::regression::fit_line;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpolationOptions {
    /// Treat exact zeros as missing and overwrite them when they can be
    /// estimated.
    pub treat_zeros_as_missing: bool,
    /// When the OLS prediction at a missing period is negative, use the known
    /// positive value nearest in period (earlier period on ties), or zero if
    /// the group has none.
    pub repair_negatives_with_nearest_positive: bool,
    pub policy: EstimationPolicy,
    /// Decimal places applied to every estimate.
    pub round_digits: Option<u32>,
    /// Fill independent groups on the rayon pool.
    pub parallel: bool,
}

impl InterpolationOptions {
    pub fn from_config(config: &InterpolateConfig, round_digits: Option<u32>) -> Self {
        Self {
            treat_zeros_as_missing: config.treat_zeros_as_missing,
            repair_negatives_with_nearest_positive: config.repair_negatives,
            policy: config.policy,
            round_digits,
            parallel: false,
        }
    }
}

/// One value column to fill and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInterpolation {
    pub column: String,
    pub options: InterpolationOptions,
}

/// Fills missing values of `value_column` per unit.
///
/// The returned dataset has `value_column` as a float column; all other
/// columns and the row order are unchanged. Rows whose period is missing
/// belong to no group and are left untouched.
pub fn interpolate(
    dataset: &TabularDataset,
    value_column: &str,
    unit_column: &str,
    period_column: &str,
    options: &InterpolationOptions,
) -> Result<(TabularDataset, InterpolationReport)> {
    let (values, report) =
        interpolate_values(dataset, value_column, unit_column, period_column, options)?;
    let filled = dataset.with_float_column(value_column, values)?;
    Ok((filled, report))
}

/// Fills several value columns. Columns are independent, so each is
/// estimated from the input dataset; results are applied in the given order.
pub fn interpolate_columns(
    dataset: &TabularDataset,
    unit_column: &str,
    period_column: &str,
    columns: &[ColumnInterpolation],
) -> Result<(TabularDataset, Vec<InterpolationReport>)> {
    let run = |target: &ColumnInterpolation| {
        interpolate_values(dataset, &target.column, unit_column, period_column, &target.options)
    };
    let results: Vec<Result<(Vec<Option<f64>>, InterpolationReport)>> =
        if columns.iter().any(|target| target.options.parallel) {
            columns.par_iter().map(run).collect()
        } else {
            columns.iter().map(run).collect()
        };

    let mut filled = dataset.clone();
    let mut reports = Vec::with_capacity(columns.len());
    for (target, result) in columns.iter().zip(results) {
        let (values, report) = result?;
        filled = filled.with_float_column(&target.column, values)?;
        reports.push(report);
    }
    Ok((filled, reports))
}

struct Group {
    label: String,
    /// (row index, period) for every row of the unit with a period.
    rows: Vec<(usize, f64)>,
}

#[derive(Default)]
struct GroupOutcome {
    fills: Vec<(usize, f64)>,
    interpolated: usize,
    regression_filled: usize,
    repaired: usize,
    warning: Option<DataQualityWarning>,
}

fn interpolate_values(
    dataset: &TabularDataset,
    value_column: &str,
    unit_column: &str,
    period_column: &str,
    options: &InterpolationOptions,
) -> Result<(Vec<Option<f64>>, InterpolationReport)> {
    require_columns(dataset, &[value_column, unit_column, period_column])?;
    let mut values = dataset.numeric_values(value_column)?;
    let periods = dataset.numeric_values(period_column)?;
    let units = dataset.cells(unit_column)?;

    let mut index: HashMap<CellKey, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    let mut without_period = 0usize;
    for (row, (unit, period)) in units.iter().zip(&periods).enumerate() {
        let Some(period) = period else {
            without_period += 1;
            continue;
        };
        let key = unit.key();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(Group {
                label: key.to_string(),
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].rows.push((row, *period));
    }

    let outcomes: Vec<GroupOutcome> = if options.parallel {
        groups
            .par_iter()
            .map(|group| fill_group(group, &values, value_column, options))
            .collect()
    } else {
        groups
            .iter()
            .map(|group| fill_group(group, &values, value_column, options))
            .collect()
    };

    let mut report = InterpolationReport::new(value_column);
    report.groups = groups.len();
    for outcome in outcomes {
        if !outcome.fills.is_empty() {
            report.groups_filled += 1;
        }
        for (row, value) in outcome.fills {
            values[row] = Some(value);
        }
        report.interpolated += outcome.interpolated;
        report.regression_filled += outcome.regression_filled;
        report.negatives_repaired += outcome.repaired;
        if let Some(warning) = outcome.warning {
            warn!(
                dataset = %dataset.name(),
                column = value_column,
                unit = warning.unit.as_deref().unwrap_or_default(),
                count = warning.count,
                "{}",
                warning.message
            );
            report.warnings.push(warning);
        }
    }

    if without_period > 0 {
        let warning = DataQualityWarning::new(
            WarningKind::MissingPeriod,
            without_period,
            format!("{without_period} rows have no period and were not interpolated"),
        )
        .with_column(value_column);
        warn!(
            dataset = %dataset.name(),
            column = value_column,
            count = without_period,
            "{}",
            warning.message
        );
        report.warnings.push(warning);
    }

    report.remaining_missing = values
        .iter()
        .filter(|value| known_value(**value, options.treat_zeros_as_missing).is_none())
        .count();
    if report.has_remaining() {
        let warning = DataQualityWarning::new(
            WarningKind::RemainingMissing,
            report.remaining_missing,
            format!(
                "{} values of `{value_column}` remain missing",
                report.remaining_missing
            ),
        )
        .with_column(value_column);
        warn!(
            dataset = %dataset.name(),
            column = value_column,
            count = report.remaining_missing,
            "{}",
            warning.message
        );
        report.warnings.push(warning);
    }

    info!(
        dataset = %dataset.name(),
        column = value_column,
        groups = report.groups,
        groups_filled = report.groups_filled,
        interpolated = report.interpolated,
        regression_filled = report.regression_filled,
        negatives_repaired = report.negatives_repaired,
        remaining_missing = report.remaining_missing,
        "interpolation complete"
    );
    Ok((values, report))
}

fn known_value(value: Option<f64>, zeros_missing: bool) -> Option<f64> {
    value.filter(|v| !(zeros_missing && *v == 0.0))
}

fn fill_group(
    group: &Group,
    values: &[Option<f64>],
    column: &str,
    options: &InterpolationOptions,
) -> GroupOutcome {
    let mut outcome = GroupOutcome::default();
    let mut known_raw = Vec::new();
    let mut targets = Vec::new();
    for &(row, period) in &group.rows {
        match known_value(values[row], options.treat_zeros_as_missing) {
            Some(value) => known_raw.push((period, value)),
            None => targets.push((row, period)),
        }
    }
    if targets.is_empty() {
        return outcome;
    }

    let known = collapse_periods(&known_raw);
    let fit = if known.len() < 2 {
        None
    } else {
        fit_line(&known_raw)
    };
    let Some(fit) = fit else {
        let (kind, message) = if known_raw.len() < 2 {
            (
                WarningKind::InsufficientPoints,
                format!(
                    "unit {} has {} known points; {} values left as-is",
                    group.label,
                    known_raw.len(),
                    targets.len()
                ),
            )
        } else {
            (
                WarningKind::DegeneratePeriods,
                format!(
                    "unit {} has all known points in one period; {} values left as-is",
                    group.label,
                    targets.len()
                ),
            )
        };
        outcome.warning = Some(
            DataQualityWarning::new(kind, targets.len(), message)
                .with_column(column)
                .with_unit(group.label.clone()),
        );
        return outcome;
    };

    let first = known[0].0;
    let last = known[known.len() - 1].0;
    for (row, period) in targets {
        let prediction = fit.predict(period);
        let inside = period >= first && period <= last;
        let mut estimate = if options.repair_negatives_with_nearest_positive && prediction < 0.0 {
            outcome.repaired += 1;
            nearest_positive(&known, period).unwrap_or(0.0)
        } else if options.policy == EstimationPolicy::Hybrid && inside {
            outcome.interpolated += 1;
            interpolate_between(&known, period)
        } else {
            outcome.regression_filled += 1;
            prediction
        };
        if let Some(digits) = options.round_digits {
            estimate = round_to(estimate, digits);
        }
        outcome.fills.push((row, estimate));
    }
    debug!(
        unit = %group.label,
        column,
        known = known_raw.len(),
        filled = outcome.fills.len(),
        slope = fit.slope,
        intercept = fit.intercept,
        "group filled"
    );
    outcome
}

/// Known points sorted by period, values sharing a period averaged.
fn collapse_periods(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut collapsed: Vec<(f64, f64, usize)> = Vec::with_capacity(sorted.len());
    for (period, value) in sorted {
        match collapsed.last_mut() {
            Some((last, sum, count)) if *last == period => {
                *sum += value;
                *count += 1;
            }
            _ => collapsed.push((period, value, 1)),
        }
    }
    collapsed
        .into_iter()
        .map(|(period, sum, count)| (period, sum / count as f64))
        .collect()
}

/// Linear interpolation over `known` (sorted, distinct periods) at a period
/// inside its range.
fn interpolate_between(known: &[(f64, f64)], period: f64) -> f64 {
    let idx = known.partition_point(|(p, _)| *p < period);
    match known.get(idx) {
        Some(&(p, v)) if p == period => v,
        Some(&(hi_p, hi_v)) if idx > 0 => {
            let (lo_p, lo_v) = known[idx - 1];
            lo_v + (hi_v - lo_v) * (period - lo_p) / (hi_p - lo_p)
        }
        Some(&(_, v)) => v,
        None => known.last().map_or(0.0, |&(_, v)| v),
    }
}

fn nearest_positive(known: &[(f64, f64)], period: f64) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;
    for &(p, v) in known.iter().filter(|(_, v)| *v > 0.0) {
        let distance = (p - period).abs();
        if best.is_none_or(|(best_distance, _)| distance < best_distance) {
            best = Some((distance, v));
        }
    }
    best.map(|(_, v)| v)
}

fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_model::{CellValue, ColumnType};

    fn group(points: &[(i64, Option<f64>)]) -> TabularDataset {
        let rows = points
            .iter()
            .map(|(period, value)| vec!["Hangzhou".into(), (*period).into(), (*value).into()])
            .collect();
        TabularDataset::from_rows("g", &["city", "year", "gdp"], rows).unwrap()
    }

    fn run(
        ds: &TabularDataset,
        options: &InterpolationOptions,
    ) -> (Vec<Option<f64>>, InterpolationReport) {
        let (filled, report) = interpolate(ds, "gdp", "city", "year", options).unwrap();
        (filled.numeric_values("gdp").unwrap(), report)
    }

    #[test]
    fn interior_gap_is_linear() {
        let (values, report) = run(
            &group(&[(1, Some(10.0)), (2, None), (3, Some(30.0))]),
            &InterpolationOptions::default(),
        );
        assert_eq!(values, vec![Some(10.0), Some(20.0), Some(30.0)]);
        assert_eq!(report.interpolated, 1);
        assert_eq!(report.remaining_missing, 0);
    }

    #[test]
    fn edges_use_the_regression_line() {
        let (values, report) = run(
            &group(&[(2009, None), (2010, Some(100.0)), (2011, Some(110.0))]),
            &InterpolationOptions::default(),
        );
        assert!((values[0].unwrap() - 90.0).abs() < 1e-9);
        assert_eq!(report.regression_filled, 1);
    }

    #[test]
    fn interior_uses_neighbours_not_the_fit() {
        // the OLS line through the known points gives 12.5 at period 3
        let ds = group(&[
            (1, Some(0.0)),
            (2, Some(10.0)),
            (3, None),
            (4, Some(10.0)),
            (5, Some(30.0)),
        ]);
        let (values, _) = run(&ds, &InterpolationOptions::default());
        assert_eq!(values[2], Some(10.0));

        let regression = InterpolationOptions {
            policy: EstimationPolicy::RegressionOnly,
            ..InterpolationOptions::default()
        };
        let (values, report) = run(&ds, &regression);
        assert!((values[2].unwrap() - 12.5).abs() < 1e-9);
        assert_eq!(report.regression_filled, 1);
    }

    #[test]
    fn zeros_are_kept_unless_treated_as_missing() {
        let ds = group(&[(1, Some(5.0)), (2, Some(0.0)), (3, Some(15.0))]);
        let (values, report) = run(&ds, &InterpolationOptions::default());
        assert_eq!(values[1], Some(0.0));
        assert_eq!(report.values_filled(), 0);

        let zeros = InterpolationOptions {
            treat_zeros_as_missing: true,
            ..InterpolationOptions::default()
        };
        let (values, _) = run(&ds, &zeros);
        assert_eq!(values[1], Some(10.0));
    }

    #[test]
    fn negative_estimates_take_nearest_positive() {
        let repair = InterpolationOptions {
            repair_negatives_with_nearest_positive: true,
            ..InterpolationOptions::default()
        };
        // fit is 20 - 5t, so -5 at period 5
        let ds = group(&[(1, Some(15.0)), (2, Some(10.0)), (3, Some(5.0)), (5, None)]);
        let (values, report) = run(&ds, &repair);
        assert_eq!(values[3], Some(5.0));
        assert_eq!(report.negatives_repaired, 1);

        let (values, _) = run(&ds, &InterpolationOptions::default());
        assert!(values[3].unwrap() < 0.0);
    }

    #[test]
    fn negative_repair_without_positive_values_is_zero() {
        let repair = InterpolationOptions {
            repair_negatives_with_nearest_positive: true,
            ..InterpolationOptions::default()
        };
        let ds = group(&[(1, Some(-1.0)), (2, Some(-2.0)), (3, None)]);
        let (values, _) = run(&ds, &repair);
        assert_eq!(values[2], Some(0.0));
    }

    #[test]
    fn negative_fit_overrides_interior_neighbours() {
        let repair = InterpolationOptions {
            repair_negatives_with_nearest_positive: true,
            ..InterpolationOptions::default()
        };
        // fit is 155.8 - 59.6t, so -23 at period 3; neighbours 2 and 6 are
        // equally near and the earlier one wins
        let ds = group(&[
            (1, Some(100.0)),
            (2, Some(2.0)),
            (3, None),
            (4, Some(6.0)),
            (5, Some(-200.0)),
        ]);
        let (values, report) = run(&ds, &repair);
        assert_eq!(values[2], Some(2.0));
        assert_eq!(report.negatives_repaired, 1);
        assert_eq!(report.interpolated, 0);
        assert_eq!(report.values_filled(), 1);

        let (values, report) = run(&ds, &InterpolationOptions::default());
        assert_eq!(values[2], Some(4.0));
        assert_eq!(report.interpolated, 1);
    }

    #[test]
    fn unfilled_zeros_count_as_remaining() {
        let zeros = InterpolationOptions {
            treat_zeros_as_missing: true,
            ..InterpolationOptions::default()
        };
        let ds = group(&[(1, Some(5.0)), (2, Some(0.0)), (3, Some(0.0))]);
        let (values, report) = run(&ds, &zeros);
        assert_eq!(values, vec![Some(5.0), Some(0.0), Some(0.0)]);
        assert_eq!(report.remaining_missing, 2);
        let kinds: Vec<WarningKind> = report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![WarningKind::InsufficientPoints, WarningKind::RemainingMissing]
        );

        let (_, report) = run(&ds, &InterpolationOptions::default());
        assert_eq!(report.remaining_missing, 0);
    }

    #[test]
    fn nearest_positive_prefers_earlier_period_on_ties() {
        let known = [(1.0, 4.0), (3.0, 8.0)];
        assert_eq!(nearest_positive(&known, 2.0), Some(4.0));
        assert_eq!(nearest_positive(&[(1.0, -1.0)], 2.0), None);
    }

    #[test]
    fn sparse_groups_are_reported_not_filled() {
        let ds = group(&[(1, Some(5.0)), (2, None), (3, None)]);
        let (values, report) = run(&ds, &InterpolationOptions::default());
        assert_eq!(values, vec![Some(5.0), None, None]);
        assert_eq!(report.remaining_missing, 2);
        let kinds: Vec<WarningKind> = report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![WarningKind::InsufficientPoints, WarningKind::RemainingMissing]
        );
        assert_eq!(report.warnings[0].unit.as_deref(), Some("Hangzhou"));
    }

    #[test]
    fn one_period_groups_are_degenerate() {
        let ds = group(&[(1, Some(5.0)), (1, Some(7.0)), (2, None)]);
        let (_, report) = run(&ds, &InterpolationOptions::default());
        assert_eq!(report.warnings[0].kind, WarningKind::DegeneratePeriods);
    }

    #[test]
    fn complete_groups_are_unchanged() {
        let ds = group(&[(1, Some(1.0)), (2, Some(4.0)), (3, Some(2.0))]);
        let (values, report) = run(&ds, &InterpolationOptions::default());
        assert_eq!(values, vec![Some(1.0), Some(4.0), Some(2.0)]);
        assert_eq!(report.groups_filled, 0);
    }

    #[test]
    fn estimates_are_rounded() {
        let options = InterpolationOptions {
            round_digits: Some(1),
            ..InterpolationOptions::default()
        };
        let ds = group(&[(0, Some(0.0)), (1, None), (3, Some(1.0))]);
        let (values, _) = run(&ds, &options);
        assert_eq!(values[1], Some(0.3));
    }

    #[test]
    fn rows_without_period_are_untouched() {
        let ds = TabularDataset::from_rows(
            "g",
            &["city", "year", "gdp"],
            vec![
                vec!["Hangzhou".into(), 1.into(), 1.0.into()],
                vec!["Hangzhou".into(), CellValue::Missing, CellValue::Missing],
                vec!["Hangzhou".into(), 3.into(), 3.0.into()],
            ],
        )
        .unwrap();
        let (filled, report) =
            interpolate(&ds, "gdp", "city", "year", &InterpolationOptions::default()).unwrap();
        assert_eq!(filled.cell("gdp", 1).unwrap(), CellValue::Missing);
        assert_eq!(report.warnings[0].kind, WarningKind::MissingPeriod);
    }

    #[test]
    fn parallel_matches_sequential() {
        let mut rows = Vec::new();
        for unit in 0..20 {
            for year in 2010..2020 {
                let value = if (unit + year) % 3 == 0 {
                    CellValue::Missing
                } else {
                    CellValue::Float(f64::from(unit * 10 + (year - 2010)))
                };
                rows.push(vec![format!("unit{unit}").into(), year.into(), value]);
            }
        }
        let ds = TabularDataset::from_rows("g", &["city", "year", "gdp"], rows).unwrap();
        let sequential = run(&ds, &InterpolationOptions::default());
        let parallel = run(
            &ds,
            &InterpolationOptions {
                parallel: true,
                ..InterpolationOptions::default()
            },
        );
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn multiple_columns_keep_other_columns() {
        let ds = TabularDataset::from_rows(
            "g",
            &["city", "year", "gdp", "pop"],
            vec![
                vec!["Hangzhou".into(), 1.into(), 1.0.into(), 10.into()],
                vec!["Hangzhou".into(), 2.into(), CellValue::Missing, CellValue::Missing],
                vec!["Hangzhou".into(), 3.into(), 3.0.into(), 30.into()],
            ],
        )
        .unwrap();
        let specs = [
            ColumnInterpolation {
                column: "gdp".to_string(),
                options: InterpolationOptions::default(),
            },
            ColumnInterpolation {
                column: "pop".to_string(),
                options: InterpolationOptions {
                    parallel: true,
                    ..InterpolationOptions::default()
                },
            },
        ];
        let (filled, reports) = interpolate_columns(&ds, "city", "year", &specs).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(filled.cell("pop", 1).unwrap(), CellValue::Float(20.0));
        assert_eq!(filled.column_type("pop").unwrap(), ColumnType::Float);
        assert_eq!(filled.columns(), vec!["city", "year", "gdp", "pop"]);
    }
}
