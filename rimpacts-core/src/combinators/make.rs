//! Lifting stream transforms into the computation protocol

use crate::calendar::Year;
use crate::computation::{RegionComputation, YearlyStream};
use crate::errors::ImpactResult;
use crate::region::RegionId;
use crate::result::{BinaryOp, ResultValue, YearlyResult};
use crate::weather::RegionWeather;
use log::debug;
use std::fmt;
use std::sync::Arc;

/// A transform from one yearly stream to another
pub trait StreamHandler: fmt::Debug {
    fn handle<'a>(&'a self, region: &RegionId, stream: YearlyStream<'a>) -> YearlyStream<'a>;
}

/// A computation whose results are passed through a [`StreamHandler`]
///
/// Unsupported regions stay unsupported and `finalize` is forwarded to the
/// wrapped computation.
#[derive(Debug, Clone)]
pub struct Make<C, H> {
    inner: C,
    handler: H,
}

impl<C, H> Make<C, H>
where
    C: RegionComputation,
    H: StreamHandler,
{
    pub fn new(inner: C, handler: H) -> Self {
        Self { inner, handler }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<C, H> RegionComputation for Make<C, H>
where
    C: RegionComputation,
    H: StreamHandler,
{
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        Ok(self
            .inner
            .compute(weather)?
            .map(|stream| self.handler.handle(&weather.region, stream)))
    }

    fn finalize(&self) -> ImpactResult<()> {
        debug!("Completing {:?}", self.handler);
        self.inner.finalize()
    }
}

type ApplyFn = dyn Fn(Year, &ResultValue) -> ResultValue;

/// Replace every value with `func(year, value)`
///
/// With `unshift`, the new value is put in front of the original values instead
/// of replacing them.
#[derive(Clone)]
pub struct Apply {
    func: Arc<ApplyFn>,
    unshift: bool,
}

impl Apply {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Year, &ResultValue) -> ResultValue + 'static,
    {
        Self {
            func: Arc::new(func),
            unshift: false,
        }
    }

    pub fn unshift(mut self, unshift: bool) -> Self {
        self.unshift = unshift;
        self
    }
}

impl fmt::Debug for Apply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Apply")
            .field("unshift", &self.unshift)
            .finish_non_exhaustive()
    }
}

impl StreamHandler for Apply {
    fn handle<'a>(&'a self, _region: &RegionId, stream: YearlyStream<'a>) -> YearlyStream<'a> {
        Box::new(stream.map(move |row| {
            let row = row?;
            let value = (self.func)(row.year, &row.value);
            let value = if self.unshift {
                match value.primary() {
                    Some(primary) => row.value.unshift(primary),
                    None => ResultValue::Missing,
                }
            } else {
                value
            };
            Ok(YearlyResult::new(row.year, value))
        }))
    }
}

/// Running accumulation of values (a cumulative sum by default)
#[derive(Debug, Clone, Copy)]
pub struct Accumulate {
    op: BinaryOp,
}

impl Default for Accumulate {
    fn default() -> Self {
        Self { op: BinaryOp::Sum }
    }
}

impl Accumulate {
    pub fn with_op(op: BinaryOp) -> Self {
        Self { op }
    }
}

impl StreamHandler for Accumulate {
    fn handle<'a>(&'a self, _region: &RegionId, stream: YearlyStream<'a>) -> YearlyStream<'a> {
        let op = self.op;
        let mut total: Option<ResultValue> = None;
        Box::new(stream.map(move |row| {
            let row = row?;
            let next = match &total {
                Some(total) => op.combine(total, &row.value)?,
                None => row.value.clone(),
            };
            total = Some(next.clone());
            Ok(YearlyResult::new(row.year, next))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computation::FnComputation;
    use crate::errors::ImpactResult;

    fn linear() -> impl RegionComputation {
        FnComputation::new("linear", |_: &RegionWeather| {
            Ok(Some(vec![
                YearlyResult::new(2000, 1.0),
                YearlyResult::new(2001, 2.0),
                YearlyResult::new(2002, 3.0),
            ]))
        })
    }

    fn collect(computation: &impl RegionComputation) -> Vec<YearlyResult> {
        let weather = RegionWeather::empty(RegionId::new("A"));
        computation
            .compute(&weather)
            .unwrap()
            .unwrap()
            .collect::<ImpactResult<_>>()
            .unwrap()
    }

    #[test]
    fn apply_maps_values() {
        let doubled = Make::new(linear(), Apply::new(|_, value| value.map(|v| v * 2.0)));
        let values: Vec<_> = collect(&doubled).into_iter().map(|r| r.value).collect();
        assert_eq!(
            values,
            vec![
                ResultValue::Scalar(2.0),
                ResultValue::Scalar(4.0),
                ResultValue::Scalar(6.0)
            ]
        );
    }

    #[test]
    fn apply_with_year() {
        let shifted = Make::new(
            linear(),
            Apply::new(|year, value| value.map(|v| v + (year - 2000) as f64 * 10.0)),
        );
        let values: Vec<_> = collect(&shifted)
            .into_iter()
            .map(|r| r.value.primary().unwrap())
            .collect();
        assert_eq!(values, vec![1.0, 12.0, 23.0]);
    }

    #[test]
    fn apply_unshift_keeps_original() {
        let unshifted = Make::new(
            linear(),
            Apply::new(|_, value| value.map(|v| -v)).unshift(true),
        );
        let rows = collect(&unshifted);
        assert_eq!(rows[1].value, ResultValue::Series(vec![-2.0, 2.0]));
    }

    #[test]
    fn accumulate_sums() {
        let cumulative = Make::new(linear(), Accumulate::default());
        let values: Vec<_> = collect(&cumulative)
            .into_iter()
            .map(|r| r.value.primary().unwrap())
            .collect();
        assert_eq!(values, vec![1.0, 3.0, 6.0]);
    }

    #[test]
    fn unsupported_stays_unsupported() {
        let none = FnComputation::new("none", |_: &RegionWeather| Ok(None));
        let wrapped = Make::new(none, Accumulate::default());
        let weather = RegionWeather::empty(RegionId::new("A"));
        assert!(wrapped.compute(&weather).unwrap().is_none());
    }
}
