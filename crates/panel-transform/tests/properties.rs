//! Property tests for panel construction, value filtering, and interpolation.

use std::collections::HashSet;

use proptest::prelude::*;

use panel_model::{CellKey, CellValue, DuplicateKeyPolicy, FillPolicy};
use panel_transform::{
    InterpolationOptions, PanelKeys, PanelOptions, TabularDataset, build_panel, interpolate,
    keep_values,
};

const CITIES: [&str; 6] = ["Hangzhou", "Ningbo", "Wenzhou", "Jiaxing", "Huzhou", "Shaoxing"];

fn source_rows() -> impl Strategy<Value = Vec<(usize, i64, Option<f64>)>> {
    prop::collection::vec(
        (0..CITIES.len(), 2005i64..2025, prop::option::of(-100.0f64..100.0)),
        0..40,
    )
}

fn dataset(rows: &[(usize, i64, Option<f64>)]) -> TabularDataset {
    let rows = rows
        .iter()
        .map(|(city, year, value)| {
            vec![
                CellValue::from(CITIES[*city]),
                CellValue::Int(*year),
                CellValue::from(*value),
            ]
        })
        .collect();
    TabularDataset::from_rows("source", &["city", "year", "value"], rows).unwrap()
}

proptest! {
    #[test]
    fn panel_has_one_row_per_unit_period(
        rows in source_rows(),
        unit_count in 1usize..=CITIES.len(),
        first_year in 2005i64..2020,
        span in 1i64..8,
        fill_zero in any::<bool>(),
    ) {
        let units: Vec<CellValue> = CITIES[..unit_count].iter().map(|c| CellValue::from(*c)).collect();
        let periods: Vec<CellValue> = (first_year..first_year + span).map(CellValue::Int).collect();
        let options = PanelOptions {
            fill: if fill_zero { FillPolicy::Zero } else { FillPolicy::Missing },
            duplicates: DuplicateKeyPolicy::KeepLast,
        };
        let (panel, report) = build_panel(
            &units,
            &periods,
            &dataset(&rows),
            &PanelKeys::new("city", "year"),
            &options,
        )
        .unwrap();

        prop_assert_eq!(panel.height(), units.len() * periods.len());
        prop_assert_eq!(report.rows, panel.height());
        let keys: HashSet<(CellKey, CellKey)> = panel
            .cells("city")
            .unwrap()
            .iter()
            .zip(panel.cells("year").unwrap().iter())
            .map(|(unit, period)| (unit.key(), period.key()))
            .collect();
        prop_assert_eq!(keys.len(), panel.height());
        prop_assert_eq!(panel.columns(), vec!["city", "year", "value"]);
    }

    #[test]
    fn keep_values_is_idempotent(
        rows in source_rows(),
        allowed in prop::collection::vec(0..CITIES.len(), 0..4),
    ) {
        let allowed: Vec<CellValue> = allowed.iter().map(|idx| CellValue::from(CITIES[*idx])).collect();
        let ds = dataset(&rows);
        let once = keep_values(&ds, "city", &allowed).unwrap();
        let twice = keep_values(&once, "city", &allowed).unwrap();
        prop_assert_eq!(once.rows(), twice.rows());
        prop_assert!(once.height() <= ds.height());
    }

    #[test]
    fn complete_groups_are_left_unchanged(
        values in prop::collection::vec(-1000.0f64..1000.0, 2..12),
        treat_zeros in any::<bool>(),
    ) {
        let rows: Vec<(usize, i64, Option<f64>)> = values
            .iter()
            .enumerate()
            .map(|(idx, v)| (0, 2000 + idx as i64, Some(if *v == 0.0 { 1.0 } else { *v })))
            .collect();
        let ds = dataset(&rows);
        let options = InterpolationOptions {
            treat_zeros_as_missing: treat_zeros,
            ..InterpolationOptions::default()
        };
        let (filled, report) = interpolate(&ds, "value", "city", "year", &options).unwrap();
        prop_assert_eq!(filled.numeric_values("value").unwrap(), ds.numeric_values("value").unwrap());
        prop_assert_eq!(report.values_filled(), 0);
    }

    #[test]
    fn known_values_are_never_modified(rows in source_rows(), repair in any::<bool>()) {
        let ds = dataset(&rows);
        let options = InterpolationOptions {
            repair_negatives_with_nearest_positive: repair,
            ..InterpolationOptions::default()
        };
        let (filled, report) = interpolate(&ds, "value", "city", "year", &options).unwrap();
        let before = ds.numeric_values("value").unwrap();
        let after = filled.numeric_values("value").unwrap();
        for (old, new) in before.iter().zip(&after) {
            if old.is_some() {
                prop_assert_eq!(old, new);
            }
        }
        prop_assert_eq!(report.remaining_missing, after.iter().filter(|v| v.is_none()).count());
    }
}
