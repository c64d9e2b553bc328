use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{error, info, info_span};

use panel_ingest::{CsvDirectory, load_pipeline_config};
use panel_model::{DatasetConfig, PipelineConfig, PipelineReport};
use panel_transform::{DatasetPipeline, DatasetSink, DatasetSource, MemoryStore};

use crate::types::{DatasetPlan, DatasetSummary, RunOptions, RunResult};

/// Runs the selected datasets of a configuration.
///
/// A dataset that fails is recorded in [`RunResult::errors`] and the remaining
/// datasets still run. Configuration problems and an unknown `--dataset` name
/// abort before anything is read.
pub fn run_pipelines(options: &RunOptions) -> Result<RunResult> {
    let config = load_pipeline_config(&options.config)
        .with_context(|| format!("load config {}", options.config.display()))?;
    let selected = select_datasets(&config, &options.datasets)?;

    let source = CsvDirectory::new(&options.input);
    let csv_sink = CsvDirectory::new(&options.output);
    let dry_run_sink = MemoryStore::new();
    let sink: &dyn DatasetSink = if options.dry_run {
        &dry_run_sink
    } else {
        &csv_sink
    };

    let mut datasets = Vec::new();
    let mut errors = Vec::new();
    for dataset_config in selected {
        let span = info_span!("run", dataset = %dataset_config.name);
        let _guard = span.enter();
        let start = Instant::now();
        match run_dataset(dataset_config, &source, sink, options.parallel) {
            Ok(mut summary) => {
                if !options.dry_run {
                    summary.output_path = Some(csv_sink.path_for(&summary.output_table));
                }
                info!(
                    dataset = %summary.dataset,
                    rows = summary.rows,
                    warnings = summary.report.warning_count(),
                    duration_ms = start.elapsed().as_millis(),
                    "dataset complete"
                );
                datasets.push(summary);
            }
            Err(err) => {
                error!(
                    dataset = %dataset_config.name,
                    error = %format!("{err:#}"),
                    "dataset failed"
                );
                errors.push(format!("{}: {err:#}", dataset_config.name));
            }
        }
    }

    if let Some(path) = &options.report_json {
        let reports: Vec<&PipelineReport> = datasets.iter().map(|d| &d.report).collect();
        write_report_json(path, &reports)?;
    }

    let has_errors = !errors.is_empty();
    Ok(RunResult {
        output_dir: options.output.clone(),
        dry_run: options.dry_run,
        datasets,
        errors,
        report_json: options.report_json.clone(),
        has_errors,
    })
}

/// Loads a configuration and compiles every dataset without reading data.
pub fn check_config(path: &Path) -> Result<Vec<DatasetPlan>> {
    let config =
        load_pipeline_config(path).with_context(|| format!("load config {}", path.display()))?;
    config
        .datasets
        .iter()
        .map(|dataset| {
            let pipeline = DatasetPipeline::from_config(dataset)
                .with_context(|| format!("compile dataset `{}`", dataset.name))?;
            Ok(DatasetPlan {
                dataset: pipeline.dataset.clone(),
                source_table: pipeline.source_table().to_string(),
                output_table: pipeline.output_table().to_string(),
                stages: pipeline
                    .stages
                    .iter()
                    .map(|stage| stage.display_name().to_string())
                    .collect(),
            })
        })
        .collect()
}

fn select_datasets<'a>(
    config: &'a PipelineConfig,
    names: &[String],
) -> Result<Vec<&'a DatasetConfig>> {
    if names.is_empty() {
        return Ok(config.datasets.iter().collect());
    }
    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        let Some(dataset) = config.dataset(name) else {
            let known: Vec<&str> = config.datasets.iter().map(|d| d.name.as_str()).collect();
            bail!("unknown dataset `{name}` (configured: {})", known.join(", "));
        };
        selected.push(dataset);
    }
    Ok(selected)
}

fn run_dataset(
    config: &DatasetConfig,
    source: &dyn DatasetSource,
    sink: &dyn DatasetSink,
    parallel: bool,
) -> Result<DatasetSummary> {
    let mut pipeline = DatasetPipeline::from_config(config).context("compile pipeline")?;
    pipeline.set_parallel(parallel);
    let input = source
        .read(pipeline.source_table())
        .with_context(|| format!("read table `{}`", pipeline.source_table()))?;
    let output = pipeline.run(input).context("run pipeline")?;
    sink.write(&output.dataset)
        .with_context(|| format!("write table `{}`", output.dataset.name()))?;
    Ok(DatasetSummary {
        dataset: config.name.clone(),
        output_table: output.dataset.name().to_string(),
        rows: output.dataset.height(),
        output_path: None,
        report: output.report,
    })
}

fn write_report_json(path: &Path, reports: &[&PipelineReport]) -> Result<()> {
    let json = serde_json::to_string_pretty(reports).context("serialize reports")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
