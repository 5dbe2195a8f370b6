//! Combining several computations year by year
//!
//! Components of a [`WeightedAverage`] or a [`Product`] are driven in lockstep:
//! every component must report the same years in the same order.

use crate::calendar::Year;
use crate::computation::{finalize_all, RegionComputation, YearlyStream};
use crate::errors::{ImpactError, ImpactResult};
use crate::region::RegionId;
use crate::result::{BinaryOp, FloatValue, ResultValue, YearlyResult};
use crate::weather::RegionWeather;
use crate::weights::WeightMap;
use log::debug;

/// Pulls one row from every stream per step
pub struct Lockstep<'a> {
    region: RegionId,
    streams: Vec<YearlyStream<'a>>,
    done: bool,
}

impl<'a> Lockstep<'a> {
    pub fn new(region: RegionId, streams: Vec<YearlyStream<'a>>) -> Self {
        Self {
            region,
            streams,
            done: false,
        }
    }

    fn fail(&mut self, error: ImpactError) -> Option<ImpactResult<(Year, Vec<ResultValue>)>> {
        self.done = true;
        Some(Err(error))
    }
}

impl Iterator for Lockstep<'_> {
    type Item = ImpactResult<(Year, Vec<ResultValue>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.streams.is_empty() {
            return None;
        }

        let mut rows = Vec::with_capacity(self.streams.len());
        let mut ended = 0;
        for stream in self.streams.iter_mut() {
            match stream.next() {
                Some(Ok(row)) => rows.push(row),
                Some(Err(e)) => return self.fail(e),
                None => ended += 1,
            }
        }

        if ended == self.streams.len() {
            self.done = true;
            return None;
        }
        if ended > 0 {
            let error = ImpactError::protocol(
                &self.region,
                format!(
                    "{} of {} components ended before the others",
                    ended,
                    self.streams.len()
                ),
            );
            return self.fail(error);
        }

        let year = rows[0].year;
        if let Some(other) = rows.iter().find(|row| row.year != year) {
            let error = ImpactError::protocol(
                &self.region,
                format!(
                    "components disagree on the year: {} and {}",
                    year, other.year
                ),
            );
            return self.fail(error);
        }

        Some(Ok((year, rows.into_iter().map(|row| row.value).collect())))
    }
}

/// Start every component, or `None` if any of them does not support the region
fn start_all<'a, C>(
    components: &'a [C],
    inputs: &[RegionWeather],
) -> ImpactResult<Option<Vec<YearlyStream<'a>>>>
where
    C: RegionComputation,
{
    let mut streams = Vec::with_capacity(components.len());
    for (component, weather) in components.iter().zip(inputs.iter()) {
        match component.compute(weather)? {
            Some(stream) => streams.push(stream),
            None => {
                debug!("{:?} does not support {}", component, weather.region);
                return Ok(None);
            }
        }
    }
    Ok(Some(streams))
}

/// Weight-normalised mean of several computations
///
/// Each component is weighted per region by its own [`WeightMap`]; a region
/// missing from a map has weight zero for that component. Regions with a total
/// weight of zero are not supported.
#[derive(Debug)]
pub struct WeightedAverage<C> {
    components: Vec<C>,
    weights: Vec<WeightMap>,
}

impl<C: RegionComputation> WeightedAverage<C> {
    pub fn new(components: Vec<C>, weights: Vec<WeightMap>) -> ImpactResult<Self> {
        if components.len() != weights.len() {
            return Err(ImpactError::InvalidParameter(format!(
                "{} components but {} weight maps",
                components.len(),
                weights.len()
            )));
        }
        Ok(Self {
            components,
            weights,
        })
    }

    pub fn components(&self) -> &[C] {
        &self.components
    }
}

impl<C: RegionComputation> RegionComputation for WeightedAverage<C> {
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        let weights: Vec<FloatValue> = self
            .weights
            .iter()
            .map(|map| map.get_or_zero(&weather.region))
            .collect();
        let total: FloatValue = weights.iter().sum();
        if total == 0.0 {
            debug!("No weight for {}", weather.region);
            return Ok(None);
        }

        let inputs = vec![weather.clone(); self.components.len()];
        let Some(streams) = start_all(&self.components, &inputs)? else {
            return Ok(None);
        };

        let lockstep = Lockstep::new(weather.region.clone(), streams);
        Ok(Some(Box::new(lockstep.map(move |step| {
            let (year, values) = step?;
            let mut numerator = ResultValue::Scalar(0.0);
            for (value, weight) in values.iter().zip(weights.iter()) {
                let weighted = value.map(|v| v * weight);
                numerator = BinaryOp::Sum.combine(&numerator, &weighted)?;
            }
            Ok(YearlyResult::new(year, numerator.map(|v| v / total)))
        }))))
    }

    fn finalize(&self) -> ImpactResult<()> {
        finalize_all(&self.components)
    }
}

/// Product of several computations, each given one variable of the weather
#[derive(Debug)]
pub struct Product<C> {
    variables: Vec<String>,
    components: Vec<C>,
}

impl<C: RegionComputation> Product<C> {
    pub fn new(variables: Vec<String>, components: Vec<C>) -> ImpactResult<Self> {
        if variables.len() != components.len() {
            return Err(ImpactError::InvalidParameter(format!(
                "{} variables but {} components",
                variables.len(),
                components.len()
            )));
        }
        Ok(Self {
            variables,
            components,
        })
    }
}

impl<C: RegionComputation> RegionComputation for Product<C> {
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        let inputs = self
            .variables
            .iter()
            .map(|name| weather.with_series(weather.series.variable(name)?))
            .collect::<ImpactResult<Vec<_>>>()?;

        let Some(streams) = start_all(&self.components, &inputs)? else {
            return Ok(None);
        };

        let lockstep = Lockstep::new(weather.region.clone(), streams);
        Ok(Some(Box::new(lockstep.map(|step| {
            let (year, values) = step?;
            let mut product = ResultValue::Scalar(1.0);
            for value in values.iter() {
                product = BinaryOp::Product.combine(&product, value)?;
            }
            Ok(YearlyResult::new(year, product))
        }))))
    }

    fn finalize(&self) -> ImpactResult<()> {
        finalize_all(&self.components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::DayIndex;
    use crate::computation::FnComputation;
    use crate::weather::DailySeries;
    use is_close::is_close;
    use std::sync::Arc;

    type Rows = Vec<(Year, FloatValue)>;

    fn fixed(rows: Rows) -> Box<dyn RegionComputation> {
        Box::new(FnComputation::new("fixed", move |_: &RegionWeather| {
            Ok(Some(
                rows.iter()
                    .map(|(year, value)| YearlyResult::new(*year, *value))
                    .collect(),
            ))
        }))
    }

    fn weights(region: &str, weight: FloatValue) -> WeightMap {
        [(RegionId::new(region), weight)].into_iter().collect()
    }

    fn run(computation: &impl RegionComputation, weather: &RegionWeather) -> ImpactResult<Vec<YearlyResult>> {
        computation.compute(weather)?.unwrap().collect()
    }

    #[test]
    fn weighted_mean() {
        let average = WeightedAverage::new(
            vec![fixed(vec![(2000, 10.0)]), fixed(vec![(2000, 20.0)])],
            vec![weights("A", 0.25), weights("A", 0.75)],
        )
        .unwrap();

        let rows = run(&average, &RegionWeather::empty(RegionId::new("A"))).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(is_close!(rows[0].value.primary().unwrap(), 17.5));
    }

    #[test]
    fn weights_are_normalised() {
        let average = WeightedAverage::new(
            vec![fixed(vec![(2000, 10.0)]), fixed(vec![(2000, 20.0)])],
            vec![weights("A", 1.0), weights("A", 3.0)],
        )
        .unwrap();

        let rows = run(&average, &RegionWeather::empty(RegionId::new("A"))).unwrap();
        assert!(is_close!(rows[0].value.primary().unwrap(), 17.5));
    }

    #[test]
    fn zero_weight_is_unsupported() {
        let average = WeightedAverage::new(
            vec![fixed(vec![(2000, 10.0)]), fixed(vec![(2000, 20.0)])],
            vec![weights("A", 0.25), weights("A", 0.75)],
        )
        .unwrap();

        let weather = RegionWeather::empty(RegionId::new("B"));
        assert!(average.compute(&weather).unwrap().is_none());
    }

    #[test]
    fn unsupported_component() {
        let unsupported: Box<dyn RegionComputation> =
            Box::new(FnComputation::new("none", |_: &RegionWeather| Ok(None)));
        let average = WeightedAverage::new(
            vec![fixed(vec![(2000, 10.0)]), unsupported],
            vec![weights("A", 1.0), weights("A", 1.0)],
        )
        .unwrap();

        let weather = RegionWeather::empty(RegionId::new("A"));
        assert!(average.compute(&weather).unwrap().is_none());
    }

    #[test]
    fn year_mismatch() {
        let average = WeightedAverage::new(
            vec![fixed(vec![(2000, 10.0)]), fixed(vec![(2001, 20.0)])],
            vec![weights("A", 1.0), weights("A", 1.0)],
        )
        .unwrap();

        let result = run(&average, &RegionWeather::empty(RegionId::new("A")));
        assert!(matches!(result, Err(ImpactError::ProtocolViolation { .. })));
    }

    #[test]
    fn unequal_lengths() {
        let average = WeightedAverage::new(
            vec![
                fixed(vec![(2000, 10.0), (2001, 11.0)]),
                fixed(vec![(2000, 20.0)]),
            ],
            vec![weights("A", 1.0), weights("A", 1.0)],
        )
        .unwrap();

        let result = run(&average, &RegionWeather::empty(RegionId::new("A")));
        assert!(matches!(result, Err(ImpactError::ProtocolViolation { .. })));
    }

    #[test]
    fn mismatched_weights() {
        let result = WeightedAverage::new(vec![fixed(vec![])], vec![]);
        assert!(matches!(result, Err(ImpactError::InvalidParameter(_))));
    }

    #[test]
    fn product_of_variables() {
        let days = Arc::new(DayIndex::from_years(2000, 2000));
        let series = DailySeries::multi([
            ("tas", vec![2.0; 365]),
            ("pr", vec![3.0; 365]),
        ]);
        let weather = RegionWeather::new(RegionId::new("A"), days, series).unwrap();

        let first_day = |weather: &RegionWeather| -> ImpactResult<Option<Vec<YearlyResult>>> {
            let values = weather.series.values()?;
            Ok(Some(vec![YearlyResult::new(2000, values[0])]))
        };
        let product = Product::new(
            vec!["tas".to_string(), "pr".to_string()],
            vec![
                FnComputation::new("first", first_day),
                FnComputation::new("first", first_day),
            ],
        )
        .unwrap();

        let rows = run(&product, &weather).unwrap();
        assert_eq!(rows, vec![YearlyResult::new(2000, 6.0)]);
    }

    #[test]
    fn product_unknown_variable() {
        let days = Arc::new(DayIndex::from_years(2000, 2000));
        let series = DailySeries::multi([("tas", vec![2.0; 365])]);
        let weather = RegionWeather::new(RegionId::new("A"), days, series).unwrap();

        let product = Product::new(vec!["pr".to_string()], vec![fixed(vec![(2000, 1.0)])]).unwrap();
        assert!(matches!(
            product.compute(&weather),
            Err(ImpactError::UnknownVariable(_))
        ));
    }

    #[derive(Debug)]
    struct Release<'a> {
        fail: bool,
        released: &'a std::cell::Cell<usize>,
    }

    impl RegionComputation for Release<'_> {
        fn compute<'b>(&'b self, _weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'b>>> {
            Ok(None)
        }

        fn finalize(&self) -> ImpactResult<()> {
            self.released.set(self.released.get() + 1);
            if self.fail {
                return Err(ImpactError::Error("busy".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn every_component_is_finalized() {
        let released = std::cell::Cell::new(0);
        let component = |fail| Release {
            fail,
            released: &released,
        };
        let average = WeightedAverage::new(
            vec![component(true), component(false)],
            vec![weights("A", 1.0), weights("A", 1.0)],
        )
        .unwrap();

        assert!(average.finalize().is_err());
        assert_eq!(released.get(), 2);
    }
}
