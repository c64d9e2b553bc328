//! Panel dataset reconciliation.
//!
//! This crate provides the stages that turn heterogeneous regional tables
//! into a balanced, gap-filled panel:
//!
//! - **frame**: `TabularDataset`, a named Polars frame with a cell-level view
//! - **governor**: required columns, allowed values, row ordering, stripping
//! - **alias**: canonical column names from alternative spellings
//! - **reshape**: wide (one column per period) to long format
//! - **panel**: unit x period expansion with an explicit fill policy
//! - **interpolate**: per-unit gap filling (linear inside, OLS outside)
//! - **did**: event period and treated/post/did indicators
//! - **pipeline**: the stages above driven by a `DatasetConfig`
//! - **io**: source and sink traits for the storage layer

pub mod alias;
pub mod did;
pub mod error;
pub mod frame;
pub mod governor;
pub mod interpolate;
pub mod io;
pub mod panel;
pub mod pipeline;
pub mod regression;
pub mod reshape;

pub use alias::{AliasResolution, resolve_aliases};
pub use did::build_did_variables;
pub use error::{PanelError, Result};
pub use frame::{Row, SortKey, TabularDataset};
pub use governor::{keep_values, order, require_columns, strip_pattern};
pub use interpolate::{
    ColumnInterpolation, InterpolationOptions, interpolate, interpolate_columns,
};
pub use io::{DatasetSink, DatasetSource, MemoryStore};
pub use panel::{PanelKeys, PanelOptions, build_panel};
pub use pipeline::{DatasetPipeline, PipelineOutput, PipelineStage};
pub use regression::{LineFit, fit_line};
pub use reshape::wide_to_long;
