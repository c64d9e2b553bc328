use std::path::PathBuf;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use panel_cli::types::{DatasetPlan, RunResult};
use panel_model::{DataQualityWarning, WarningKind};

pub fn print_run_summary(result: &RunResult) {
    if result.dry_run {
        println!("Output: {} (dry run, nothing written)", result.output_dir.display());
    } else {
        println!("Output: {}", result.output_dir.display());
    }
    if let Some(path) = &result.report_json {
        println!("Report: {}", path.display());
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Dataset"),
        header_cell("Output"),
        header_cell("Rows"),
        header_cell("Interpolated"),
        header_cell("Regression"),
        header_cell("Remaining"),
        header_cell("Warnings"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 2..7 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    let mut total_rows = 0usize;
    let mut total_remaining = 0usize;
    let mut total_warnings = 0usize;
    for summary in &result.datasets {
        let report = &summary.report;
        let interpolated: usize = report.interpolation.iter().map(|i| i.interpolated).sum();
        let regression: usize = report.interpolation.iter().map(|i| i.regression_filled).sum();
        let remaining = report.remaining_missing();
        let warnings = report.warning_count();
        total_rows += summary.rows;
        total_remaining += remaining;
        total_warnings += warnings;
        table.add_row(vec![
            Cell::new(&summary.dataset)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            output_cell(&summary.output_table, summary.output_path.as_ref()),
            Cell::new(summary.rows),
            count_cell(interpolated, Color::Green),
            count_cell(regression, Color::Green),
            count_cell(remaining, Color::Yellow),
            count_cell(warnings, Color::Yellow),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(total_rows).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        count_cell(total_remaining, Color::Yellow).add_attribute(Attribute::Bold),
        count_cell(total_warnings, Color::Yellow).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
    print_warning_table(result);
    if !result.errors.is_empty() {
        eprintln!("Errors:");
        for error in &result.errors {
            eprintln!("- {error}");
        }
    }
}

pub fn print_check_summary(plans: &[DatasetPlan]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Dataset"),
        header_cell("Source"),
        header_cell("Output"),
        header_cell("Stages"),
    ]);
    apply_table_style(&mut table);
    for plan in plans {
        table.add_row(vec![
            Cell::new(&plan.dataset)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&plan.source_table),
            Cell::new(&plan.output_table),
            Cell::new(plan.stages.join(" > ")),
        ]);
    }
    println!("{table}");
}

fn print_warning_table(result: &RunResult) {
    let mut warnings: Vec<(&str, &DataQualityWarning)> = result
        .datasets
        .iter()
        .flat_map(|summary| {
            summary
                .report
                .warnings()
                .map(move |warning| (summary.dataset.as_str(), warning))
        })
        .collect();
    if warnings.is_empty() {
        return;
    }
    warnings.sort_by(|a, b| {
        kind_rank(b.1.kind)
            .cmp(&kind_rank(a.1.kind))
            .then_with(|| a.0.cmp(b.0))
    });
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Dataset"),
        header_cell("Kind"),
        header_cell("Column"),
        header_cell("Unit"),
        header_cell("Count"),
        header_cell("Message"),
    ]);
    apply_issue_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);
    for (dataset, warning) in warnings {
        table.add_row(vec![
            Cell::new(dataset).fg(Color::Blue),
            kind_cell(warning.kind),
            optional_cell(warning.column.as_deref()),
            optional_cell(warning.unit.as_deref()),
            Cell::new(warning.count),
            Cell::new(&warning.message),
        ]);
    }
    println!();
    println!("Warnings:");
    println!("{table}");
}

/// Conditions that leave gaps in the output sort first.
fn kind_rank(kind: WarningKind) -> u8 {
    match kind {
        WarningKind::RemainingMissing => 4,
        WarningKind::InsufficientPoints | WarningKind::DegeneratePeriods => 3,
        WarningKind::UnmatchedSourceRows | WarningKind::MissingPeriod => 2,
        WarningKind::DuplicateKeysResolved => 1,
    }
}

fn kind_cell(kind: WarningKind) -> Cell {
    let color = if kind_rank(kind) >= 3 {
        Color::Yellow
    } else {
        Color::DarkYellow
    };
    Cell::new(kind.label()).fg(color)
}

fn output_cell(table: &str, path: Option<&PathBuf>) -> Cell {
    match path {
        Some(_) => Cell::new(format!("✓ {table}")).fg(Color::Green),
        None => dim_cell(table),
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn optional_cell(value: Option<&str>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => dim_cell("-"),
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(140);
}

fn apply_issue_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(160);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
