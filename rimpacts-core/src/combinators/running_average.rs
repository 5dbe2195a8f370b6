//! Weighted running averages over consecutive years

use super::make::StreamHandler;
use crate::computation::YearlyStream;
use crate::errors::{ImpactError, ImpactResult};
use crate::region::RegionId;
use crate::result::{FloatValue, ResultValue, YearlyResult};
use std::collections::VecDeque;

/// Smooth each year's value over a fixed window of recent years
///
/// The window is seeded with `priors` and shifts by one value for every incoming
/// year. The emitted value is `Σ wᵢ·vᵢ / Σ wᵢ` with weights ordered from the
/// earliest to the latest year of the window.
#[derive(Debug, Clone)]
pub struct RunningAverage {
    priors: Vec<FloatValue>,
    weights: Vec<FloatValue>,
    total_weight: FloatValue,
    unshift: bool,
}

impl RunningAverage {
    pub fn new(priors: Vec<FloatValue>, weights: Vec<FloatValue>) -> ImpactResult<Self> {
        if priors.len() != weights.len() {
            return Err(ImpactError::InvalidParameter(format!(
                "running average has {} priors but {} weights",
                priors.len(),
                weights.len()
            )));
        }
        if priors.is_empty() {
            return Err(ImpactError::InvalidParameter(
                "running average window must not be empty".to_string(),
            ));
        }
        let total_weight: FloatValue = weights.iter().sum();
        if total_weight == 0.0 {
            return Err(ImpactError::InvalidParameter(
                "running average weights sum to zero".to_string(),
            ));
        }

        Ok(Self {
            priors,
            weights,
            total_weight,
            unshift: false,
        })
    }

    /// A uniformly weighted window of `n` years, seeded with `prior`
    pub fn uniform(n: usize, prior: FloatValue) -> ImpactResult<Self> {
        Self::new(vec![prior; n], vec![1.0; n])
    }

    pub fn unshift(mut self, unshift: bool) -> Self {
        self.unshift = unshift;
        self
    }

    pub fn window(&self) -> usize {
        self.priors.len()
    }

    /// A fresh window seeded with the priors
    pub fn start(&self) -> RunningWindow<'_> {
        RunningWindow {
            config: self,
            values: self.priors.iter().copied().collect(),
        }
    }

    /// Smooth a plain sequence of values
    pub fn smooth<'a, I>(&'a self, values: I) -> impl Iterator<Item = FloatValue> + 'a
    where
        I: IntoIterator<Item = FloatValue>,
        I::IntoIter: 'a,
    {
        let mut window = self.start();
        values.into_iter().map(move |value| window.push(value))
    }
}

/// The sliding window state of a [`RunningAverage`]
#[derive(Debug, Clone)]
pub struct RunningWindow<'a> {
    config: &'a RunningAverage,
    values: VecDeque<FloatValue>,
}

impl RunningWindow<'_> {
    /// Shift in a new value and return the weighted average of the window
    pub fn push(&mut self, value: FloatValue) -> FloatValue {
        self.values.pop_front();
        self.values.push_back(value);

        self.values
            .iter()
            .zip(self.config.weights.iter())
            .map(|(v, w)| v * w)
            .sum::<FloatValue>()
            / self.config.total_weight
    }
}

impl StreamHandler for RunningAverage {
    fn handle<'a>(&'a self, _region: &RegionId, stream: YearlyStream<'a>) -> YearlyStream<'a> {
        let mut window = self.start();
        Box::new(stream.map(move |row| {
            let row = row?;
            let value = match row.value.primary() {
                Some(value) => {
                    let smoothed = window.push(value);
                    if self.unshift {
                        row.value.unshift(smoothed)
                    } else {
                        ResultValue::Scalar(smoothed)
                    }
                }
                None => ResultValue::Missing,
            };
            Ok(YearlyResult::new(row.year, value))
        }))
    }
}
