//! Weighted aggregation of region results into coarser regions
//!
//! Every fine region's yearly rows are multiplied by its weight and summed per
//! coarse region and year, together with the weights themselves. The coarse
//! value is the ratio of the two sums. Years are the union of the years reported
//! by the contributing regions, so a year reported by only some of them is
//! averaged over those alone.

use crate::bundle::{ResultSink, ResultSource};
use crate::calendar::Year;
use crate::errors::{ImpactError, ImpactResult};
use crate::grouping::Grouping;
use crate::region::RegionId;
use crate::result::{ColumnLabels, FloatValue, ResultValue, YearlyResult};
use crate::weights::WeightMap;
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Weighted sums of one coarse region and year
///
/// Every value position keeps its own denominator, so a NaN value in one
/// position contributes nothing there without affecting the others.
#[derive(Debug, Clone, Default)]
struct Accumulator {
    numerator: Vec<FloatValue>,
    denominator: Vec<FloatValue>,
}

impl Accumulator {
    /// Add a weighted row, returning the number of skipped NaN values
    ///
    /// A row whose length differs from earlier rows is rejected with `None`.
    fn add(&mut self, values: &[FloatValue], weight: FloatValue) -> Option<usize> {
        if self.numerator.is_empty() {
            self.numerator = vec![0.0; values.len()];
            self.denominator = vec![0.0; values.len()];
        } else if self.numerator.len() != values.len() {
            return None;
        }

        let mut skipped = 0;
        for (ii, value) in values.iter().enumerate() {
            if value.is_nan() {
                skipped += 1;
                continue;
            }
            self.numerator[ii] += value * weight;
            self.denominator[ii] += weight;
        }
        Some(skipped)
    }

    fn value(&self) -> ResultValue {
        if self.denominator.iter().all(|d| *d == 0.0) {
            return ResultValue::Missing;
        }
        let mut values: Vec<FloatValue> = self
            .numerator
            .iter()
            .zip(&self.denominator)
            .map(|(total, weight)| {
                if *weight == 0.0 {
                    FloatValue::NAN
                } else {
                    total / weight
                }
            })
            .collect();
        if values.len() == 1 {
            ResultValue::Scalar(values.remove(0))
        } else {
            ResultValue::Series(values)
        }
    }
}

/// Counts collected while aggregating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    /// Fine regions whose results contributed
    pub contributing: usize,
    /// Fine regions skipped by the grouping or the weights, or with unreadable results
    pub skipped: usize,
    /// Coarse regions written
    pub regions: usize,
    /// Rows written over all coarse regions
    pub rows: usize,
}

/// Folds a bundle of fine-region results into coarse regions.
#[derive(Debug, Clone)]
pub struct Aggregator {
    grouping: Grouping,
    weights: Option<WeightMap>,
    report_all: bool,
}

impl Aggregator {
    /// Every region the grouping accepts has weight one until weights are set
    pub fn new(grouping: Grouping) -> Self {
        Self {
            grouping,
            weights: None,
            report_all: false,
        }
    }

    /// Weight each region by its listed weight
    ///
    /// Regions the map does not list explicitly are left out.
    pub fn with_weights(mut self, weights: WeightMap) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Aggregate every value of a row rather than only the first
    pub fn report_all(mut self, report_all: bool) -> Self {
        self.report_all = report_all;
        self
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    fn weight(&self, region: &RegionId) -> Option<FloatValue> {
        match &self.weights {
            Some(weights) => weights.explicit(region),
            None => Some(1.0),
        }
    }

    fn accumulate<S: ResultSource + ?Sized>(
        &self,
        source: &S,
        summary: &mut AggregateSummary,
    ) -> ImpactResult<BTreeMap<RegionId, BTreeMap<Year, Accumulator>>> {
        let mut totals: BTreeMap<RegionId, BTreeMap<Year, Accumulator>> = BTreeMap::new();

        for region in source.regions()? {
            let Some(group) = self.grouping.group(&region) else {
                summary.skipped += 1;
                continue;
            };
            let Some(weight) = self.weight(&region) else {
                debug!("No weight for {}", region);
                summary.skipped += 1;
                continue;
            };
            let rows = match source.read_region(&region) {
                Ok(Some(rows)) => rows,
                Ok(None) => {
                    warn!("No results for {}", region);
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Could not read results for {}: {}", region, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            let years = totals.entry(group).or_default();
            for row in rows {
                // The year is reported even if no region has a value for it
                let total = years.entry(row.year).or_default();
                let values = match (&row.value, self.report_all) {
                    (ResultValue::Missing, _) => continue,
                    (value, true) => value.to_vec(),
                    (value, false) => value.primary().into_iter().collect(),
                };
                match total.add(&values, weight) {
                    Some(0) => {}
                    Some(skipped) => warn!(
                        "Skipping {} NaN values for {} in {}",
                        skipped, region, row.year
                    ),
                    None => warn!(
                        "Dropping {} values for {} in {}: expected {}",
                        values.len(),
                        region,
                        row.year,
                        total.numerator.len()
                    ),
                }
            }
            summary.contributing += 1;
        }

        Ok(totals)
    }

    /// Weighted results per coarse region
    ///
    /// A year whose weights sum to zero, or for which every contributing region
    /// is missing, is reported as [`ResultValue::Missing`]. NaN values do not
    /// contribute to the position they appear in.
    pub fn fold<S: ResultSource + ?Sized>(
        &self,
        source: &S,
    ) -> ImpactResult<BTreeMap<RegionId, Vec<YearlyResult>>> {
        let mut summary = AggregateSummary::default();
        Ok(finish(self.accumulate(source, &mut summary)?))
    }

    /// Fold `source` and write every coarse region to `sink`
    pub fn aggregate<S, K>(
        &self,
        source: &S,
        labels: &ColumnLabels,
        sink: &mut K,
    ) -> ImpactResult<AggregateSummary>
    where
        S: ResultSource + ?Sized,
        K: ResultSink + ?Sized,
    {
        info!("Aggregating by {}", self.grouping.title());
        let mut summary = AggregateSummary::default();
        let folded = finish(self.accumulate(source, &mut summary)?);

        for (region, rows) in folded {
            let mut rows = rows.into_iter().map(Ok::<_, ImpactError>);
            summary.rows += sink.write_region(&region, labels, &mut rows)?;
            summary.regions += 1;
        }

        info!(
            "Aggregated {} regions into {} ({} skipped)",
            summary.contributing, summary.regions, summary.skipped
        );
        Ok(summary)
    }
}

fn finish(
    totals: BTreeMap<RegionId, BTreeMap<Year, Accumulator>>,
) -> BTreeMap<RegionId, Vec<YearlyResult>> {
    totals
        .into_iter()
        .map(|(region, years)| {
            let rows = years
                .into_iter()
                .map(|(year, total)| YearlyResult::new(year, total.value()))
                .collect();
            (region, rows)
        })
        .collect()
}
