use std::path::PathBuf;

use panel_model::PipelineReport;

/// Inputs of one `run` invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Dataset names to run; empty runs all.
    pub datasets: Vec<String>,
    pub dry_run: bool,
    pub report_json: Option<PathBuf>,
    pub parallel: bool,
}

#[derive(Debug)]
pub struct RunResult {
    pub output_dir: PathBuf,
    pub dry_run: bool,
    pub datasets: Vec<DatasetSummary>,
    pub errors: Vec<String>,
    pub report_json: Option<PathBuf>,
    pub has_errors: bool,
}

#[derive(Debug)]
pub struct DatasetSummary {
    pub dataset: String,
    pub output_table: String,
    pub rows: usize,
    /// Written file; `None` on dry runs.
    pub output_path: Option<PathBuf>,
    pub report: PipelineReport,
}

/// A compiled dataset pipeline, as shown by `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPlan {
    pub dataset: String,
    pub source_table: String,
    pub output_table: String,
    pub stages: Vec<String>,
}
