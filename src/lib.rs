//! Streaming per-region climate impact computations
//!
//! This crate ties together the protocol, combinators and I/O of
//! [`rimpacts_core`] with the reference computations of
//! [`rimpacts_components`], and runs a configured pass end to end with
//! [`run_pass`].

pub use rimpacts_components;
pub use rimpacts_core;

use log::info;
use rimpacts_core::aggregate::AggregateSummary;
use rimpacts_core::bundle::DirectoryBundle;
use rimpacts_core::computation::RegionComputation;
use rimpacts_core::config::PassConfig;
use rimpacts_core::driver::{Driver, PassSummary};
use rimpacts_core::errors::ImpactResult;
use rimpacts_core::result::ColumnLabels;
use rimpacts_core::weather::WeatherSource;

/// Commonly used items
pub mod prelude {
    pub use rimpacts_components::components::*;
    pub use rimpacts_core::bundle::{DirectoryBundle, MemoryBundle, ResultSink, ResultSource};
    pub use rimpacts_core::combinators::{ComputationExt, StreamHandler};
    pub use rimpacts_core::computation::{RegionComputation, YearlyStream};
    pub use rimpacts_core::config::PassConfig;
    pub use rimpacts_core::driver::Driver;
    pub use rimpacts_core::errors::{ImpactError, ImpactResult};
    pub use rimpacts_core::region::RegionId;
    pub use rimpacts_core::result::{ResultValue, YearlyResult};
    pub use rimpacts_core::weather::{DailySeries, RegionWeather, WeatherSource};
}

/// What a call to [`run_pass`] produced
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub pass: PassSummary,
    /// Present when the configuration asks for aggregation
    pub aggregation: Option<AggregateSummary>,
}

/// Run `computation` over every region of `source` as configured
///
/// Results are written to the bundle directory named by `config.bundle`. If an
/// aggregation is configured, the bundle is then aggregated into its sibling
/// directory named after the grouping, for example `results-state`.
pub fn run_pass<S, C>(config: &PassConfig, source: &mut S, computation: &C) -> ImpactResult<PassReport>
where
    S: WeatherSource + ?Sized,
    C: RegionComputation + ?Sized,
{
    let mut bundle = DirectoryBundle::create(config.bundle.path())?;
    let pass = Driver::new(config.bundle.driver_config()).run(source, computation, &mut bundle)?;

    let aggregation = match &config.aggregation {
        Some(settings) => {
            let aggregator = settings.aggregator()?;
            let mut target = bundle.aggregated(aggregator.grouping().title())?;
            info!("Aggregating {} into {}", bundle.dir().display(), target.dir().display());

            let labels = if settings.report_all {
                config.bundle.labels.clone()
            } else {
                primary_label(&config.bundle.labels)
            };
            Some(aggregator.aggregate(&bundle, &labels, &mut target)?)
        }
        None => None,
    };

    Ok(PassReport { pass, aggregation })
}

fn primary_label(labels: &ColumnLabels) -> ColumnLabels {
    match labels {
        ColumnLabels::Multi(labels) if !labels.is_empty() => ColumnLabels::Single(labels[0].clone()),
        other => other.clone(),
    }
}
