//! Merging computations that need not cover the same years

use crate::calendar::Year;
use crate::computation::{finalize_all, RegionComputation, YearlyStream};
use crate::errors::{ImpactError, ImpactResult};
use crate::result::{BinaryOp, FloatValue, ResultValue, YearlyResult};
use crate::weather::RegionWeather;
use crate::weights::WeightMap;
use log::debug;
use std::iter::Peekable;

/// Weighted merge over the union of the components' years
///
/// Every year reported by at least one component is emitted. Only the components
/// that reported that year contribute to it. A component whose weight map does
/// not list the region does not take part at all. With `divide` the weighted sum
/// is normalised by the sum of contributing weights.
#[derive(Debug)]
pub struct WeightedUnion<C> {
    components: Vec<C>,
    weights: Vec<WeightMap>,
    divide: bool,
}

impl<C: RegionComputation> WeightedUnion<C> {
    pub fn new(components: Vec<C>, weights: Vec<WeightMap>, divide: bool) -> ImpactResult<Self> {
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
            divide,
        })
    }
}

impl<C: RegionComputation> RegionComputation for WeightedUnion<C> {
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        let mut members = Vec::new();
        for (component, weights) in self.components.iter().zip(self.weights.iter()) {
            let Some(weight) = weights.explicit(&weather.region) else {
                continue;
            };
            if let Some(stream) = component.compute(weather)? {
                members.push((weight, stream.peekable()));
            }
        }

        if members.is_empty() {
            debug!("No component of the union supports {}", weather.region);
            return Ok(None);
        }

        Ok(Some(Box::new(UnionStream {
            members,
            divide: self.divide,
            done: false,
        })))
    }

    fn finalize(&self) -> ImpactResult<()> {
        finalize_all(&self.components)
    }
}

struct UnionStream<'a> {
    members: Vec<(FloatValue, Peekable<YearlyStream<'a>>)>,
    divide: bool,
    done: bool,
}

impl UnionStream<'_> {
    /// Lowest year at the head of any member, surfacing the first error found
    fn next_year(&mut self) -> ImpactResult<Option<Year>> {
        let mut lowest: Option<Year> = None;
        for (_, stream) in self.members.iter_mut() {
            match stream.peek() {
                Some(Ok(row)) => {
                    lowest = Some(lowest.map_or(row.year, |year| year.min(row.year)));
                }
                Some(Err(_)) => {
                    if let Some(Err(e)) = stream.next() {
                        return Err(e);
                    }
                }
                None => {}
            }
        }
        Ok(lowest)
    }

    fn merge(&mut self, year: Year) -> ImpactResult<Option<YearlyResult>> {
        let mut numerator: Option<ResultValue> = None;
        let mut denominator = 0.0;

        for (weight, stream) in self.members.iter_mut() {
            let is_current = matches!(stream.peek(), Some(Ok(row)) if row.year == year);
            if !is_current {
                continue;
            }
            let Some(Ok(row)) = stream.next() else {
                continue;
            };

            let weighted = row.value.map(|v| v * *weight);
            numerator = Some(match numerator {
                Some(total) => BinaryOp::Sum.combine(&total, &weighted)?,
                None => weighted,
            });
            denominator += *weight;
        }

        if denominator == 0.0 {
            return Ok(None);
        }
        Ok(numerator.map(|total| {
            let value = if self.divide {
                total.map(|v| v / denominator)
            } else {
                total
            };
            YearlyResult::new(year, value)
        }))
    }
}

impl Iterator for UnionStream<'_> {
    type Item = ImpactResult<YearlyResult>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let year = match self.next_year() {
                Ok(Some(year)) => year,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            match self.merge(year) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computation::FnComputation;
    use crate::region::RegionId;

    fn fixed(rows: Vec<(Year, FloatValue)>) -> Box<dyn RegionComputation> {
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

    fn run(union: &WeightedUnion<Box<dyn RegionComputation>>, region: &str) -> Option<Vec<(Year, FloatValue)>> {
        let weather = RegionWeather::empty(RegionId::new(region));
        union.compute(&weather).unwrap().map(|stream| {
            stream
                .map(|row| {
                    let row = row.unwrap();
                    (row.year, row.value.primary().unwrap())
                })
                .collect()
        })
    }

    #[test]
    fn union_of_years() {
        let union = WeightedUnion::new(
            vec![
                fixed(vec![(2000, 1.0), (2001, 1.0)]),
                fixed(vec![(2001, 4.0), (2002, 4.0)]),
            ],
            vec![weights("A", 1.0), weights("A", 3.0)],
            true,
        )
        .unwrap();

        assert_eq!(
            run(&union, "A").unwrap(),
            vec![(2000, 1.0), (2001, 3.25), (2002, 4.0)]
        );
    }

    #[test]
    fn without_dividing() {
        let union = WeightedUnion::new(
            vec![fixed(vec![(2000, 1.0)]), fixed(vec![(2000, 4.0)])],
            vec![weights("A", 1.0), weights("A", 3.0)],
            false,
        )
        .unwrap();

        assert_eq!(run(&union, "A").unwrap(), vec![(2000, 13.0)]);
    }

    #[test]
    fn unlisted_components_do_not_count() {
        let union = WeightedUnion::new(
            vec![fixed(vec![(2000, 1.0)]), fixed(vec![(2000, 4.0)])],
            vec![weights("A", 1.0), weights("B", 3.0)],
            true,
        )
        .unwrap();

        assert_eq!(run(&union, "A").unwrap(), vec![(2000, 1.0)]);
        assert!(run(&union, "C").is_none());
    }

    #[test]
    fn zero_weight_years_are_skipped() {
        let union = WeightedUnion::new(
            vec![fixed(vec![(2000, 1.0)]), fixed(vec![(2001, 4.0)])],
            vec![weights("A", 0.0), weights("A", 2.0)],
            true,
        )
        .unwrap();

        assert_eq!(run(&union, "A").unwrap(), vec![(2001, 4.0)]);
    }
}
