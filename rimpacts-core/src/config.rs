//! Configuration of impact passes
//!
//! All settings are plain serde structs with defaults, so a TOML file only
//! needs to list what differs from them:
//!
//! ```toml
//! [bundle]
//! name = "yields"
//! target_dir = "results"
//! labels = ["rebased", "raw"]
//!
//! [aggregation]
//! report_all = true
//! grouping = { kind = "prefix", length = 2 }
//!
//! [[aggregation.weights]]
//! path = "weights/area.csv"
//! factor = 0.5
//! ```

use crate::aggregate::Aggregator;
use crate::driver::DriverConfig;
use crate::errors::ImpactResult;
use crate::grouping::Grouping;
use crate::result::{ColumnLabels, FloatValue};
use crate::weights::WeightMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings shared by the impact computations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    /// Extrapolate response curves linearly beyond their outermost knots
    /// instead of holding the end values.
    /// Default: false
    pub linear_extrapolation: bool,
}

/// Where and how the results of a pass are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Name of the bundle directory.
    /// Default: "results"
    pub name: String,
    /// Directory the bundle is created in.
    /// Default: "."
    pub target_dir: PathBuf,
    /// Titles of the value column(s).
    /// Default: "fraction"
    pub labels: ColumnLabels,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            name: "results".to_string(),
            target_dir: PathBuf::from("."),
            labels: ColumnLabels::default(),
        }
    }
}

impl BundleConfig {
    pub fn path(&self) -> PathBuf {
        self.target_dir.join(&self.name)
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            labels: self.labels.clone(),
        }
    }
}

/// How fine regions are grouped when aggregating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupingConfig {
    #[default]
    State,
    National,
    Prefix { length: usize },
    /// A region definition table
    Definitions {
        path: PathBuf,
        title: String,
        #[serde(default)]
        region_column: usize,
        #[serde(default = "default_code_column")]
        code_column: usize,
    },
}

fn default_code_column() -> usize {
    1
}

impl GroupingConfig {
    pub fn build(&self) -> ImpactResult<Grouping> {
        Ok(match self {
            GroupingConfig::State => Grouping::State,
            GroupingConfig::National => Grouping::National,
            GroupingConfig::Prefix { length } => Grouping::Prefix(*length),
            GroupingConfig::Definitions {
                path,
                title,
                region_column,
                code_column,
            } => Grouping::from_definitions_csv(path, *region_column, *code_column, title)?,
        })
    }
}

/// A weight table and the factor applied to every weight in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsConfig {
    pub path: PathBuf,
    /// Default: 1.0
    #[serde(default = "default_factor")]
    pub factor: FloatValue,
}

fn default_factor() -> FloatValue {
    1.0
}

impl WeightsConfig {
    pub fn load(&self) -> ImpactResult<WeightMap> {
        WeightMap::from_csv(&self.path, self.factor)
    }
}

/// Settings for aggregating a bundle into coarser regions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub grouping: GroupingConfig,
    /// Weight tables summed region by region. Without any, every region has weight one.
    pub weights: Vec<WeightsConfig>,
    /// Aggregate every value of a row rather than only the first.
    /// Default: false
    pub report_all: bool,
}

impl AggregationConfig {
    /// The combined weights, if any tables are configured
    pub fn weights(&self) -> ImpactResult<Option<WeightMap>> {
        if self.weights.is_empty() {
            return Ok(None);
        }
        let maps = self
            .weights
            .iter()
            .map(WeightsConfig::load)
            .collect::<ImpactResult<Vec<_>>>()?;
        Ok(Some(WeightMap::merged_sum(&maps)))
    }

    pub fn aggregator(&self) -> ImpactResult<Aggregator> {
        let aggregator = Aggregator::new(self.grouping.build()?).report_all(self.report_all);
        Ok(match self.weights()? {
            Some(weights) => aggregator.with_weights(weights),
            None => aggregator,
        })
    }
}

/// Complete configuration of one pass and its aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    pub impact: ImpactConfig,
    pub bundle: BundleConfig,
    /// Aggregation run after the pass, if any
    pub aggregation: Option<AggregationConfig>,
}

impl PassConfig {
    pub fn from_toml_str(text: &str) -> ImpactResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ImpactResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }
}
