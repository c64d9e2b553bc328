//! Declarative per-dataset pipeline configuration.
//!
//! One [`DatasetConfig`] replaces a hand-written cleaning routine: it names
//! the source table, the unit and period columns, the value universes, and
//! which stages run. Configuration is plain data, loaded from TOML by the
//! ingest crate and compiled into a pipeline by the transform crate.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::value::CellValue;

/// A file of dataset configurations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default, rename = "dataset")]
    pub datasets: Vec<DatasetConfig>,
}

impl PipelineConfig {
    pub fn dataset(&self, name: &str) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|d| d.name == name)
    }

    /// Validates every dataset and rejects duplicate dataset names.
    pub fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for dataset in &self.datasets {
            dataset.validate()?;
            if !names.insert(dataset.name.as_str()) {
                return Err(ModelError::invalid(&dataset.name, "dataset name is not unique"));
            }
        }
        Ok(())
    }
}

/// Configuration for one dataset's cleaning pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Dataset name, used for logging and as the default table name.
    pub name: String,

    /// Source table to read (defaults to `name`).
    #[serde(default)]
    pub source: Option<String>,

    /// Output table to write (defaults to `name`).
    #[serde(default)]
    pub output: Option<String>,

    /// Cross-sectional identifier column (e.g. "city").
    pub unit_column: String,

    /// Time column (e.g. "year").
    pub period_column: String,

    /// Reshape a wide sheet (one column per period) into long format first.
    #[serde(default)]
    pub reshape: Option<LongFormat>,

    /// Canonical column name -> alternative spellings found in source sheets.
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,

    /// Substrings removed from string columns before filtering.
    #[serde(default)]
    pub strip: Vec<StripRule>,

    /// Columns that must be present after alias resolution.
    #[serde(default)]
    pub required_columns: Vec<String>,

    /// Column -> allowed values. Rows with other values are dropped.
    #[serde(default)]
    pub allowed: BTreeMap<String, Vec<CellValue>>,

    /// Final row ordering.
    #[serde(default)]
    pub order: Option<OrderConfig>,

    /// Expand to a complete unit x period panel.
    #[serde(default)]
    pub panel: Option<PanelConfig>,

    /// Value columns to gap-fill, in order.
    #[serde(default)]
    pub interpolate: Vec<InterpolateConfig>,

    /// Decimal places applied to every estimated value.
    #[serde(default)]
    pub round_digits: Option<u32>,

    /// Derive treated/post/did indicators.
    #[serde(default)]
    pub did: Option<DidConfig>,
}

impl DatasetConfig {
    /// Minimal configuration with only the key columns set.
    pub fn new(
        name: impl Into<String>,
        unit_column: impl Into<String>,
        period_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: None,
            output: None,
            unit_column: unit_column.into(),
            period_column: period_column.into(),
            reshape: None,
            aliases: BTreeMap::new(),
            strip: Vec::new(),
            required_columns: Vec::new(),
            allowed: BTreeMap::new(),
            order: None,
            panel: None,
            interpolate: Vec::new(),
            round_digits: None,
            did: None,
        }
    }

    pub fn source_table(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }

    pub fn output_table(&self) -> &str {
        self.output.as_deref().unwrap_or(&self.name)
    }

    /// Unit universe for panel expansion: explicit list, else the allowed set.
    pub fn unit_universe(&self) -> Option<&[CellValue]> {
        self.panel
            .as_ref()
            .and_then(|p| p.units.as_deref())
            .or_else(|| self.allowed.get(&self.unit_column).map(Vec::as_slice))
    }

    /// Period universe for panel expansion: explicit list, else the allowed set.
    pub fn period_universe(&self) -> Option<&[CellValue]> {
        self.panel
            .as_ref()
            .and_then(|p| p.periods.as_deref())
            .or_else(|| self.allowed.get(&self.period_column).map(Vec::as_slice))
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.name.as_str();
        if name.trim().is_empty() {
            return Err(ModelError::invalid(name, "dataset name is empty"));
        }
        if self.unit_column.trim().is_empty() || self.period_column.trim().is_empty() {
            return Err(ModelError::invalid(name, "unit and period columns must be named"));
        }
        if self.unit_column == self.period_column {
            return Err(ModelError::invalid(
                name,
                "unit and period columns must differ",
            ));
        }
        for rule in &self.interpolate {
            if rule.column == self.unit_column || rule.column == self.period_column {
                return Err(ModelError::invalid(
                    name,
                    format!("cannot interpolate key column `{}`", rule.column),
                ));
            }
        }
        if let Some(digits) = self.round_digits {
            if digits > 15 {
                return Err(ModelError::invalid(name, "round_digits must be at most 15"));
            }
        }
        if let Some(strip) = self.strip.iter().find(|rule| rule.pattern.is_empty()) {
            return Err(ModelError::invalid(
                name,
                format!("empty strip pattern for column `{}`", strip.column),
            ));
        }
        if let Some(reshape) = &self.reshape {
            if reshape.value_vars.is_empty() {
                return Err(ModelError::invalid(name, "reshape needs at least one value column"));
            }
        }
        if self.panel.is_some() {
            if self.unit_universe().is_none_or(<[CellValue]>::is_empty) {
                return Err(ModelError::invalid(
                    name,
                    "panel needs units, either explicitly or via allowed values",
                ));
            }
            if self.period_universe().is_none_or(<[CellValue]>::is_empty) {
                return Err(ModelError::invalid(
                    name,
                    "panel needs periods, either explicitly or via allowed values",
                ));
            }
        }
        if let Some(did) = &self.did {
            if did.event_column.trim().is_empty() {
                return Err(ModelError::invalid(name, "did event column is empty"));
            }
            let names = did.columns.names();
            let unique: BTreeSet<&str> = names.iter().copied().collect();
            if unique.len() != names.len() {
                return Err(ModelError::invalid(name, "did output column names must differ"));
            }
        }
        Ok(())
    }
}

/// Parameters for reshaping a wide sheet into long format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongFormat {
    /// Identifier columns carried onto every output row.
    pub id_vars: Vec<String>,
    /// Columns melted into (var_name, value_name) pairs.
    pub value_vars: Vec<String>,
    /// Name of the column receiving the melted header (e.g. "year").
    pub var_name: String,
    /// Name of the column receiving the melted value (e.g. "target").
    pub value_name: String,
}

/// Remove every occurrence of `pattern` from `column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripRule {
    pub column: String,
    pub pattern: String,
}

/// Row ordering: priority columns, each optionally with an explicit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfig {
    pub priority: Vec<String>,

    #[serde(default)]
    pub orders: BTreeMap<String, Vec<CellValue>>,

    /// Priority columns without an explicit order use their allowed values.
    #[serde(default = "default_true")]
    pub orders_from_allowed: bool,
}

fn default_true() -> bool {
    true
}

/// What unmatched panel cells in numeric columns receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Absence of a record means the quantity did not occur.
    #[default]
    Zero,
    /// Leave the cell missing for later interpolation.
    Missing,
}

/// How the panel join treats several source rows with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Abort with a duplicate-key error.
    #[default]
    Fail,
    /// Keep the first source row in input order.
    KeepFirst,
    /// Keep the last source row in input order.
    KeepLast,
    /// Sum numeric columns; string columns keep the first present value.
    Sum,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Unit universe. Defaults to the allowed values of the unit column.
    #[serde(default)]
    pub units: Option<Vec<CellValue>>,

    /// Period universe. Defaults to the allowed values of the period column.
    #[serde(default)]
    pub periods: Option<Vec<CellValue>>,

    #[serde(default)]
    pub fill: FillPolicy,

    #[serde(default)]
    pub duplicates: DuplicateKeyPolicy,
}

/// Which estimator fills a missing point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationPolicy {
    /// Linear interpolation strictly between known points, regression outside.
    #[default]
    Hybrid,
    /// Regression prediction for every missing point.
    RegressionOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterpolateConfig {
    pub column: String,

    #[serde(default)]
    pub treat_zeros_as_missing: bool,

    #[serde(default)]
    pub repair_negatives: bool,

    #[serde(default)]
    pub policy: EstimationPolicy,
}

impl InterpolateConfig {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            treat_zeros_as_missing: false,
            repair_negatives: false,
            policy: EstimationPolicy::default(),
        }
    }
}

/// Row-level predicate deciding whether the event occurred.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPredicate {
    /// Any present value counts.
    #[default]
    NonMissing,
    /// Numeric value greater than zero.
    Positive,
    /// Present and not numerically zero.
    NonZero,
    /// Value equal to the given one.
    Equals(CellValue),
}

impl EventPredicate {
    pub fn matches(&self, value: &CellValue) -> bool {
        match self {
            Self::NonMissing => !value.is_missing(),
            Self::Positive => value.to_f64_lenient().is_some_and(|v| v > 0.0),
            Self::NonZero => match value {
                CellValue::Missing => false,
                other => other.to_f64_lenient().is_none_or(|v| v != 0.0),
            },
            Self::Equals(expected) => !value.is_missing() && value.key() == expected.key(),
        }
    }
}

/// Output column names for the derived indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DidColumnNames {
    pub event_period: String,
    pub treated: String,
    pub post: String,
    pub did: String,
}

impl Default for DidColumnNames {
    fn default() -> Self {
        Self {
            event_period: "event_period".to_string(),
            treated: "treated".to_string(),
            post: "post".to_string(),
            did: "did".to_string(),
        }
    }
}

impl DidColumnNames {
    pub fn names(&self) -> [&str; 4] {
        [&self.event_period, &self.treated, &self.post, &self.did]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidConfig {
    pub event_column: String,

    #[serde(default)]
    pub predicate: EventPredicate,

    #[serde(default)]
    pub columns: DidColumnNames,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[dataset]]
name = "city_target"
unit_column = "city"
period_column = "year"
round_digits = 2

[dataset.aliases]
city = ["City", "prefecture"]

[[dataset.strip]]
column = "city"
pattern = " City"

[dataset.allowed]
city = ["Hangzhou", "Ningbo"]
year = [2018, 2019, 2020]

[dataset.order]
priority = ["city", "year"]

[dataset.panel]
fill = "missing"
duplicates = "keep_last"

[[dataset.interpolate]]
column = "target"
treat_zeros_as_missing = true
repair_negatives = true

[dataset.did]
event_column = "pilot"
predicate = "positive"
"#;

    #[test]
    fn parses_full_dataset_config() {
        let config: PipelineConfig = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();
        let dataset = config.dataset("city_target").unwrap();
        assert_eq!(dataset.source_table(), "city_target");
        assert_eq!(dataset.aliases["city"], vec!["City", "prefecture"]);
        assert_eq!(dataset.strip[0].pattern, " City");
        assert_eq!(
            dataset.allowed["year"],
            vec![CellValue::Int(2018), CellValue::Int(2019), CellValue::Int(2020)]
        );
        let panel = dataset.panel.as_ref().unwrap();
        assert_eq!(panel.fill, FillPolicy::Missing);
        assert_eq!(panel.duplicates, DuplicateKeyPolicy::KeepLast);
        assert_eq!(dataset.unit_universe().unwrap().len(), 2);
        assert_eq!(dataset.period_universe().unwrap().len(), 3);
        assert!(dataset.order.as_ref().unwrap().orders_from_allowed);
        assert!(dataset.interpolate[0].treat_zeros_as_missing);
        assert_eq!(dataset.interpolate[0].policy, EstimationPolicy::Hybrid);
        let did = dataset.did.as_ref().unwrap();
        assert_eq!(did.predicate, EventPredicate::Positive);
        assert_eq!(did.columns, DidColumnNames::default());
    }

    #[test]
    fn panel_without_universe_is_rejected() {
        let mut dataset = DatasetConfig::new("gdp", "city", "year");
        dataset.panel = Some(PanelConfig::default());
        let err = dataset.validate().unwrap_err();
        assert!(err.to_string().contains("panel needs units"));
    }

    #[test]
    fn interpolating_a_key_column_is_rejected() {
        let mut dataset = DatasetConfig::new("gdp", "city", "year");
        dataset.interpolate.push(InterpolateConfig::new("year"));
        assert!(dataset.validate().is_err());
    }

    #[test]
    fn duplicate_dataset_names_are_rejected() {
        let config = PipelineConfig {
            datasets: vec![
                DatasetConfig::new("gdp", "city", "year"),
                DatasetConfig::new("gdp", "city", "year"),
            ],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn event_predicates() {
        assert!(EventPredicate::NonMissing.matches(&CellValue::from("approved")));
        assert!(!EventPredicate::NonMissing.matches(&CellValue::Missing));
        assert!(EventPredicate::Positive.matches(&CellValue::Float(0.5)));
        assert!(!EventPredicate::Positive.matches(&CellValue::Int(0)));
        assert!(EventPredicate::NonZero.matches(&CellValue::Int(-1)));
        assert!(!EventPredicate::NonZero.matches(&CellValue::Float(0.0)));
        assert!(EventPredicate::Equals(CellValue::Int(1)).matches(&CellValue::Float(1.0)));
    }
}
