//! Panel data model.
//!
//! Plain types shared by every panel crate: the cell value model, per-dataset
//! configuration records, and the structured data-quality reports that stages
//! return alongside their results.

pub mod config;
pub mod error;
pub mod lookup;
pub mod report;
pub mod value;

pub use config::{
    DatasetConfig, DidColumnNames, DidConfig, DuplicateKeyPolicy, EstimationPolicy,
    EventPredicate, FillPolicy, InterpolateConfig, LongFormat, OrderConfig, PanelConfig,
    PipelineConfig, StripRule,
};
pub use error::{ModelError, Result};
pub use lookup::CaseInsensitiveSet;
pub use report::{
    DataQualityWarning, DidReport, InterpolationReport, PanelReport, PipelineReport,
    StageSummary, WarningKind,
};
pub use value::{CellKey, CellValue, ColumnType, parse_text_column};
