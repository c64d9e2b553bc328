//! Data-quality reports returned alongside stage results.
//!
//! Structural problems abort a stage with an error. Everything else (groups
//! too sparse to fit, values that stay missing, source rows outside the panel
//! universe) is recorded here so the caller decides whether to proceed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Fewer than two known points in an interpolation group.
    InsufficientPoints,
    /// Every known point of a group shares one period; no line can be fit.
    DegeneratePeriods,
    /// Missing values left after interpolation.
    RemainingMissing,
    /// Rows whose period is missing and so belong to no group.
    MissingPeriod,
    /// Source rows whose key lies outside the panel universe.
    UnmatchedSourceRows,
    /// Duplicate source keys resolved by the configured policy.
    DuplicateKeysResolved,
}

impl WarningKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::InsufficientPoints => "insufficient points",
            Self::DegeneratePeriods => "degenerate periods",
            Self::RemainingMissing => "remaining missing",
            Self::MissingPeriod => "missing period",
            Self::UnmatchedSourceRows => "unmatched source rows",
            Self::DuplicateKeysResolved => "duplicate keys resolved",
        }
    }
}

/// A non-fatal data-quality condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityWarning {
    pub kind: WarningKind,
    /// Column the condition applies to.
    pub column: Option<String>,
    /// Unit (interpolation group) the condition applies to.
    pub unit: Option<String>,
    /// Number of affected values or rows.
    pub count: usize,
    pub message: String,
}

impl DataQualityWarning {
    pub fn new(kind: WarningKind, count: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            column: None,
            unit: None,
            count,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Outcome of interpolating one value column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterpolationReport {
    pub column: String,
    /// Distinct units seen.
    pub groups: usize,
    /// Groups in which at least one value was filled.
    pub groups_filled: usize,
    /// Values filled by linear interpolation between known neighbours.
    pub interpolated: usize,
    /// Values filled by the regression line: outside the known period range
    /// under the hybrid policy, everywhere under regression-only.
    pub regression_filled: usize,
    /// Values whose regression prediction was negative and that took the
    /// nearest known positive value (or zero) instead.
    pub negatives_repaired: usize,
    /// Values still missing after processing.
    pub remaining_missing: usize,
    pub warnings: Vec<DataQualityWarning>,
}

impl InterpolationReport {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Self::default()
        }
    }

    pub fn values_filled(&self) -> usize {
        self.interpolated + self.regression_filled + self.negatives_repaired
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining_missing > 0
    }
}

/// Outcome of a panel expansion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelReport {
    pub units: usize,
    pub periods: usize,
    pub rows: usize,
    /// Skeleton rows that found a source row.
    pub matched_rows: usize,
    /// Numeric cells set to zero for unmatched skeleton rows.
    pub zero_filled_cells: usize,
    pub warnings: Vec<DataQualityWarning>,
}

/// Outcome of deriving DID indicators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidReport {
    pub treated_units: usize,
    pub control_units: usize,
    pub treated_rows: usize,
    pub post_rows: usize,
}

/// Row counts around one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: String,
    pub rows_before: usize,
    pub rows_after: usize,
}

/// Everything a dataset pipeline run reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub dataset: String,
    pub stages: Vec<StageSummary>,
    pub panel: Option<PanelReport>,
    pub interpolation: Vec<InterpolationReport>,
    pub did: Option<DidReport>,
}

impl PipelineReport {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            ..Self::default()
        }
    }

    /// All warnings across stages, panel first.
    pub fn warnings(&self) -> impl Iterator<Item = &DataQualityWarning> {
        self.panel
            .iter()
            .flat_map(|panel| panel.warnings.iter())
            .chain(self.interpolation.iter().flat_map(|i| i.warnings.iter()))
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn remaining_missing(&self) -> usize {
        self.interpolation.iter().map(|i| i.remaining_missing).sum()
    }

    pub fn final_rows(&self) -> Option<usize> {
        self.stages.last().map(|stage| stage.rows_after)
    }
}
