use std::path::Path;

use tracing::debug;

use panel_model::PipelineConfig;

use crate::error::{IngestError, Result};

/// Loads and validates a pipeline configuration file.
pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    let config = parse_pipeline_config(&contents, path)?;
    debug!(
        path = %path.display(),
        datasets = config.datasets.len(),
        "pipeline config loaded"
    );
    Ok(config)
}

/// Parses and validates configuration text; `path` is used for error context.
pub fn parse_pipeline_config(contents: &str, path: &Path) -> Result<PipelineConfig> {
    let config: PipelineConfig = toml::from_str(contents).map_err(|source| IngestError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate().map_err(|source| IngestError::Config {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(config)
}
