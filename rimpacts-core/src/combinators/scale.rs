use crate::computation::{RegionComputation, YearlyStream};
use crate::errors::ImpactResult;
use crate::result::{BinaryOp, ResultValue, YearlyResult};
use crate::weather::RegionWeather;
use crate::weights::WeightMap;

/// Combine every value of a computation with a per-region factor
///
/// The factor comes from [`WeightMap::require`], so a region with neither an
/// explicit factor nor a `mean` fallback is an error. Regions the inner
/// computation does not support are never looked up.
#[derive(Debug, Clone)]
pub struct Scale<C> {
    inner: C,
    factors: WeightMap,
    op: BinaryOp,
}

impl<C: RegionComputation> Scale<C> {
    pub fn new(inner: C, factors: WeightMap) -> Self {
        Self {
            inner,
            factors,
            op: BinaryOp::Product,
        }
    }

    pub fn with_op(mut self, op: BinaryOp) -> Self {
        self.op = op;
        self
    }
}

impl<C: RegionComputation> RegionComputation for Scale<C> {
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        let Some(stream) = self.inner.compute(weather)? else {
            return Ok(None);
        };

        let factor = ResultValue::Scalar(self.factors.require(&weather.region)?);
        let op = self.op;
        Ok(Some(Box::new(stream.map(move |row| {
            let row = row?;
            Ok(YearlyResult::new(row.year, op.combine(&row.value, &factor)?))
        }))))
    }

    fn finalize(&self) -> ImpactResult<()> {
        self.inner.finalize()
    }
}
