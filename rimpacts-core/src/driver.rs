//! Running a computation over every region of a weather source.

use crate::bundle::ResultSink;
use crate::computation::{ensure_ordered, RegionComputation};
use crate::errors::ImpactResult;
use crate::region::RegionId;
use crate::result::ColumnLabels;
use crate::weather::WeatherSource;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Settings for a [`Driver`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Titles of the value column(s) written for every region.
    pub labels: ColumnLabels,
}

impl DriverConfig {
    pub fn with_labels(labels: impl Into<ColumnLabels>) -> Self {
        Self {
            labels: labels.into(),
        }
    }
}

/// Counts collected over one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Regions for which results were written
    pub written: Vec<RegionId>,
    /// Regions the computation did not support
    pub unsupported: Vec<RegionId>,
    /// Total number of yearly rows written
    pub rows: usize,
}

/// Drives a [`RegionComputation`] over all regions of a [`WeatherSource`].
///
/// Regions are processed one at a time in the order given by the source. Each
/// region's stream is pulled to exhaustion and written to the sink before the
/// next region's weather is loaded. After the last region the computation is
/// finalized exactly once.
///
/// Any error aborts the pass. In that case the computation is not finalized and
/// regions written before the failure stay in the sink.
#[derive(Debug, Clone, Default)]
pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn run<S, C, K>(&self, source: &mut S, computation: &C, sink: &mut K) -> ImpactResult<PassSummary>
    where
        S: WeatherSource + ?Sized,
        C: RegionComputation + ?Sized,
        K: ResultSink + ?Sized,
    {
        let regions = source.regions()?;
        info!("Starting pass over {} regions with {:?}", regions.len(), computation);

        let mut summary = PassSummary::default();
        for region in regions {
            let weather = source.load(&region)?;
            match computation.compute(&weather)? {
                Some(stream) => {
                    let mut rows = ensure_ordered(&region, stream);
                    let count = sink.write_region(&region, &self.config.labels, &mut rows)?;
                    debug!("Wrote {} years for {}", count, region);
                    summary.rows += count;
                    summary.written.push(region);
                }
                None => {
                    warn!("Region {} is not supported", region);
                    summary.unsupported.push(region);
                }
            }
        }

        computation.finalize()?;
        info!(
            "Finished pass: {} regions written, {} unsupported, {} rows",
            summary.written.len(),
            summary.unsupported.len(),
            summary.rows
        );
        Ok(summary)
    }
}
