//! Combinators for composing region computations
//!
//! Every combinator is itself a [`RegionComputation`] and forwards
//! [`RegionComputation::finalize`] to the computations it wraps, so arbitrarily
//! nested pipelines release their resources when the driver completes a pass.
//!
//! ```ignore
//! let pipeline = yields
//!     .rebase(Rebase::to_year(2012))
//!     .running_average(RunningAverage::uniform(5, 1.0)?)
//!     .scale(area_weights);
//! ```

pub mod make;
pub mod rebase;
pub mod running_average;
pub mod scale;
pub mod union;
pub mod weighted;

pub use make::{Accumulate, Apply, Make, StreamHandler};
pub use rebase::Rebase;
pub use running_average::RunningAverage;
pub use scale::Scale;
pub use union::WeightedUnion;
pub use weighted::{Lockstep, Product, WeightedAverage};

use crate::calendar::Year;
use crate::computation::RegionComputation;
use crate::result::ResultValue;
use crate::weights::WeightMap;

/// Fluent construction of combinator pipelines
pub trait ComputationExt: RegionComputation + Sized {
    /// Pass the results through any stream handler
    fn then<H: StreamHandler>(self, handler: H) -> Make<Self, H> {
        Make::new(self, handler)
    }

    fn rebase(self, rebase: Rebase) -> Make<Self, Rebase> {
        Make::new(self, rebase)
    }

    fn running_average(self, average: RunningAverage) -> Make<Self, RunningAverage> {
        Make::new(self, average)
    }

    fn apply<F>(self, func: F) -> Make<Self, Apply>
    where
        F: Fn(Year, &ResultValue) -> ResultValue + 'static,
    {
        Make::new(self, Apply::new(func))
    }

    fn accumulate(self) -> Make<Self, Accumulate> {
        Make::new(self, Accumulate::default())
    }

    fn scale(self, factors: WeightMap) -> Scale<Self> {
        Scale::new(self, factors)
    }

    fn boxed<'a>(self) -> Box<dyn RegionComputation + 'a>
    where
        Self: 'a,
    {
        Box::new(self)
    }
}

impl<C: RegionComputation> ComputationExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computation::{stream_rows, FnComputation, YearlyStream};
    use crate::errors::ImpactResult;
    use crate::region::RegionId;
    use crate::result::YearlyResult;
    use crate::weather::RegionWeather;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct CountFinalize {
        finalized: Rc<Cell<usize>>,
    }

    impl RegionComputation for CountFinalize {
        fn compute<'a>(&'a self, _weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
            Ok(Some(stream_rows(vec![
                YearlyResult::new(2000, 2.0),
                YearlyResult::new(2001, 4.0),
                YearlyResult::new(2002, 6.0),
            ])))
        }

        fn finalize(&self) -> ImpactResult<()> {
            self.finalized.set(self.finalized.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn fluent_pipeline() {
        let weights: WeightMap = [(RegionId::new("A"), 3.0)].into_iter().collect();
        let pipeline = FnComputation::new("series", |_: &RegionWeather| {
            Ok(Some(vec![
                YearlyResult::new(2000, 2.0),
                YearlyResult::new(2001, 4.0),
            ]))
        })
        .rebase(Rebase::to_first_year())
        .apply(|_, value| value.map(|v| v + 1.0))
        .scale(weights);

        let weather = RegionWeather::empty(RegionId::new("A"));
        let rows: Vec<_> = pipeline
            .compute(&weather)
            .unwrap()
            .unwrap()
            .collect::<ImpactResult<_>>()
            .unwrap();
        assert_eq!(
            rows,
            vec![YearlyResult::new(2000, 6.0), YearlyResult::new(2001, 9.0)]
        );
    }

    #[test]
    fn finalize_reaches_every_leaf() {
        let counter = Rc::new(Cell::new(0));
        let leaf = || CountFinalize {
            finalized: counter.clone(),
        };

        let weights: WeightMap = [(RegionId::new("A"), 1.0)].into_iter().collect();
        let pipeline = WeightedAverage::new(
            vec![
                leaf().rebase(Rebase::to_first_year()).boxed(),
                leaf().accumulate().boxed(),
                leaf().scale(weights.clone()).boxed(),
            ],
            vec![weights.clone(), weights.clone(), weights],
        )
        .unwrap()
        .running_average(RunningAverage::uniform(2, 0.0).unwrap());

        pipeline.finalize().unwrap();
        assert_eq!(counter.get(), 3);
    }
}
