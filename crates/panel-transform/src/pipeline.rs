//! Configuration-driven dataset pipeline.
//!
//! A [`DatasetConfig`] compiles into an ordered list of [`PipelineStage`]s,
//! so every dataset is cleaned by the same code and differs only in data:
//!
//! ```text
//! reshape -> aliases -> strip -> require -> keep values
//!         -> panel -> interpolate -> did -> order
//! ```
//!
//! Stages absent from the configuration are skipped. Structural errors abort
//! the run; data-quality warnings are collected in the [`PipelineReport`].
//!
//! # Example
//!
//! ```ignore
//! use panel_transform::pipeline::DatasetPipeline;
//!
//! let pipeline = DatasetPipeline::from_config(&config)?;
//! let output = pipeline.run(source.read(pipeline.source_table())?)?;
//! sink.write(&output.dataset)?;
//! ```

use std::collections::BTreeMap;

use tracing::{info, info_span};

use panel_model::{
    CellValue, DatasetConfig, DidConfig, LongFormat, PipelineReport, StageSummary, StripRule,
};

use crate::alias::resolve_aliases;
use crate::did::build_did_variables;
use crate::error::{PanelError, Result};
use crate::frame::TabularDataset;
use crate::governor::{keep_values, order, require_columns, strip_pattern};
use crate::interpolate::{ColumnInterpolation, InterpolationOptions, interpolate_columns};
use crate::panel::{PanelKeys, PanelOptions, build_panel};
use crate::reshape::wide_to_long;

/// One step of a dataset pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    /// Melt a wide sheet into long format.
    Reshape(LongFormat),

    /// Rename alternative spellings to canonical column names.
    ResolveAliases(BTreeMap<String, Vec<String>>),

    /// Remove a substring from a column.
    Strip(StripRule),

    /// Fail unless every listed column is present.
    RequireColumns(Vec<String>),

    /// Drop rows whose value is outside the allowed set.
    KeepValues {
        column: String,
        allowed: Vec<CellValue>,
    },

    /// Expand to the unit x period universe.
    BuildPanel {
        units: Vec<CellValue>,
        periods: Vec<CellValue>,
        options: PanelOptions,
    },

    /// Fill missing values per unit.
    Interpolate(Vec<ColumnInterpolation>),

    /// Derive event period and treated/post/did indicators.
    BuildDid(DidConfig),

    /// Stable sort by priority columns.
    Order {
        priority: Vec<String>,
        orderings: BTreeMap<String, Vec<CellValue>>,
    },
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Reshape(_) => "Reshape",
            Self::ResolveAliases(_) => "Aliases",
            Self::Strip(_) => "Strip",
            Self::RequireColumns(_) => "Require",
            Self::KeepValues { .. } => "Keep Values",
            Self::BuildPanel { .. } => "Panel",
            Self::Interpolate(_) => "Interpolate",
            Self::BuildDid(_) => "DID",
            Self::Order { .. } => "Order",
        }
    }
}

/// Result of running a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub dataset: TabularDataset,
    pub report: PipelineReport,
}

/// Ordered stages for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetPipeline {
    /// Dataset name used in logs and reports.
    pub dataset: String,
    pub source_table: String,
    pub output_table: String,
    pub unit_column: String,
    pub period_column: String,
    pub stages: Vec<PipelineStage>,
}

impl DatasetPipeline {
    /// Create an empty pipeline.
    pub fn new(
        dataset: impl Into<String>,
        unit_column: impl Into<String>,
        period_column: impl Into<String>,
    ) -> Self {
        let dataset = dataset.into();
        Self {
            source_table: dataset.clone(),
            output_table: dataset.clone(),
            dataset,
            unit_column: unit_column.into(),
            period_column: period_column.into(),
            stages: Vec::new(),
        }
    }

    /// Add a stage at the end of the pipeline.
    pub fn add_stage(&mut self, stage: PipelineStage) {
        self.stages.push(stage);
    }

    #[must_use]
    pub fn with_stage(mut self, stage: PipelineStage) -> Self {
        self.add_stage(stage);
        self
    }

    pub fn source_table(&self) -> &str {
        &self.source_table
    }

    pub fn output_table(&self) -> &str {
        &self.output_table
    }

    /// Compiles a validated configuration into stages.
    pub fn from_config(config: &DatasetConfig) -> Result<Self> {
        config.validate()?;
        let mut pipeline = Self::new(&config.name, &config.unit_column, &config.period_column);
        pipeline.source_table = config.source_table().to_string();
        pipeline.output_table = config.output_table().to_string();

        if let Some(reshape) = &config.reshape {
            pipeline.add_stage(PipelineStage::Reshape(reshape.clone()));
        }
        if !config.aliases.is_empty() {
            pipeline.add_stage(PipelineStage::ResolveAliases(config.aliases.clone()));
        }
        for rule in &config.strip {
            pipeline.add_stage(PipelineStage::Strip(rule.clone()));
        }

        let mut required: Vec<String> = Vec::new();
        let referenced = config
            .required_columns
            .iter()
            .chain([&config.unit_column, &config.period_column])
            .chain(config.interpolate.iter().map(|rule| &rule.column))
            .chain(config.did.iter().map(|did| &did.event_column));
        for column in referenced {
            if !required.contains(column) {
                required.push(column.clone());
            }
        }
        pipeline.add_stage(PipelineStage::RequireColumns(required));

        for (column, allowed) in &config.allowed {
            pipeline.add_stage(PipelineStage::KeepValues {
                column: column.clone(),
                allowed: allowed.clone(),
            });
        }

        if let Some(panel) = &config.panel {
            let (Some(units), Some(periods)) = (config.unit_universe(), config.period_universe())
            else {
                return Err(PanelError::invalid_config(format!(
                    "dataset `{}`: panel universe is undefined",
                    config.name
                )));
            };
            pipeline.add_stage(PipelineStage::BuildPanel {
                units: units.to_vec(),
                periods: periods.to_vec(),
                options: PanelOptions::from(panel),
            });
        }

        if !config.interpolate.is_empty() {
            let columns = config
                .interpolate
                .iter()
                .map(|rule| ColumnInterpolation {
                    column: rule.column.clone(),
                    options: InterpolationOptions::from_config(rule, config.round_digits),
                })
                .collect();
            pipeline.add_stage(PipelineStage::Interpolate(columns));
        }

        if let Some(did) = &config.did {
            pipeline.add_stage(PipelineStage::BuildDid(did.clone()));
        }

        if let Some(order_config) = &config.order {
            let mut orderings = order_config.orders.clone();
            if order_config.orders_from_allowed {
                for column in &order_config.priority {
                    if orderings.contains_key(column) {
                        continue;
                    }
                    let universe = if *column == config.unit_column {
                        config.unit_universe()
                    } else if *column == config.period_column {
                        config.period_universe()
                    } else {
                        config.allowed.get(column).map(Vec::as_slice)
                    };
                    if let Some(values) = universe {
                        orderings.insert(column.clone(), values.to_vec());
                    }
                }
            }
            pipeline.add_stage(PipelineStage::Order {
                priority: order_config.priority.clone(),
                orderings,
            });
        }

        Ok(pipeline)
    }

    /// Enables or disables parallel group interpolation.
    pub fn set_parallel(&mut self, parallel: bool) {
        for stage in &mut self.stages {
            if let PipelineStage::Interpolate(columns) = stage {
                for column in columns {
                    column.options.parallel = parallel;
                }
            }
        }
    }

    /// Runs every stage in order.
    pub fn run(&self, dataset: TabularDataset) -> Result<PipelineOutput> {
        let span = info_span!("dataset", dataset = %self.dataset);
        let _guard = span.enter();

        let mut report = PipelineReport::new(&self.dataset);
        let mut current = dataset;
        for stage in &self.stages {
            let rows_before = current.height();
            current = self.apply(stage, &current, &mut report)?;
            info!(
                stage = stage.display_name(),
                rows_before,
                rows_after = current.height(),
                "stage complete"
            );
            report.stages.push(StageSummary {
                stage: stage.display_name().to_string(),
                rows_before,
                rows_after: current.height(),
            });
        }

        info!(
            rows = current.height(),
            columns = current.width(),
            warnings = report.warning_count(),
            remaining_missing = report.remaining_missing(),
            "pipeline complete"
        );
        Ok(PipelineOutput {
            dataset: current.with_name(&self.output_table),
            report,
        })
    }

    fn apply(
        &self,
        stage: &PipelineStage,
        dataset: &TabularDataset,
        report: &mut PipelineReport,
    ) -> Result<TabularDataset> {
        match stage {
            PipelineStage::Reshape(format) => wide_to_long(dataset, format),
            PipelineStage::ResolveAliases(aliases) => {
                resolve_aliases(dataset, aliases).map(|(resolved, _)| resolved)
            }
            PipelineStage::Strip(rule) => strip_pattern(dataset, &rule.column, &rule.pattern),
            PipelineStage::RequireColumns(columns) => {
                require_columns(dataset, columns)?;
                Ok(dataset.clone())
            }
            PipelineStage::KeepValues { column, allowed } => keep_values(dataset, column, allowed),
            PipelineStage::BuildPanel {
                units,
                periods,
                options,
            } => {
                let keys = PanelKeys::new(&self.unit_column, &self.period_column);
                let (panel, panel_report) = build_panel(units, periods, dataset, &keys, options)?;
                report.panel = Some(panel_report);
                Ok(panel)
            }
            PipelineStage::Interpolate(columns) => {
                let (filled, reports) =
                    interpolate_columns(dataset, &self.unit_column, &self.period_column, columns)?;
                report.interpolation.extend(reports);
                Ok(filled)
            }
            PipelineStage::BuildDid(did) => {
                let (annotated, did_report) = build_did_variables(
                    dataset,
                    &self.unit_column,
                    &self.period_column,
                    &did.event_column,
                    &did.predicate,
                    &did.columns,
                )?;
                report.did = Some(did_report);
                Ok(annotated)
            }
            PipelineStage::Order {
                priority,
                orderings,
            } => order(dataset, priority, orderings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_model::{InterpolateConfig, OrderConfig, PanelConfig};

    #[test]
    fn stages_follow_fixed_order() {
        let mut config = DatasetConfig::new("gdp", "city", "year");
        config.aliases.insert("city".to_string(), vec!["City".to_string()]);
        config
            .allowed
            .insert("city".to_string(), vec!["Hangzhou".into()]);
        config.allowed.insert("year".to_string(), vec![2018.into()]);
        config.panel = Some(PanelConfig::default());
        config.interpolate.push(InterpolateConfig::new("gdp"));
        config.order = Some(OrderConfig {
            priority: vec!["city".to_string()],
            orders: BTreeMap::new(),
            orders_from_allowed: true,
        });
        let pipeline = DatasetPipeline::from_config(&config).unwrap();
        let names: Vec<&str> = pipeline.stages.iter().map(PipelineStage::display_name).collect();
        assert_eq!(
            names,
            vec![
                "Aliases",
                "Require",
                "Keep Values",
                "Keep Values",
                "Panel",
                "Interpolate",
                "Order"
            ]
        );
        match &pipeline.stages[1] {
            PipelineStage::RequireColumns(columns) => {
                assert_eq!(columns, &vec!["city", "year", "gdp"]);
            }
            other => panic!("unexpected stage {other:?}"),
        }
        match pipeline.stages.last() {
            Some(PipelineStage::Order { orderings, .. }) => {
                assert_eq!(orderings["city"], vec![CellValue::from("Hangzhou")]);
            }
            other => panic!("unexpected stage {other:?}"),
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = DatasetConfig::new("gdp", "city", "year");
        config.panel = Some(PanelConfig::default());
        let err = DatasetPipeline::from_config(&config).unwrap_err();
        assert!(matches!(err, PanelError::Model(_)));
    }

    #[test]
    fn set_parallel_reaches_interpolation_options() {
        let mut config = DatasetConfig::new("gdp", "city", "year");
        config.interpolate.push(InterpolateConfig::new("gdp"));
        let mut pipeline = DatasetPipeline::from_config(&config).unwrap();
        pipeline.set_parallel(true);
        match pipeline.stages.last() {
            Some(PipelineStage::Interpolate(columns)) => assert!(columns[0].options.parallel),
            other => panic!("unexpected stage {other:?}"),
        }
    }
}
