//! The per-region computation protocol
//!
//! A [`RegionComputation`] turns one region's daily weather into a lazy stream of
//! [`YearlyResult`]s. Computations are composed with the combinators in
//! [`crate::combinators`] and driven over every region by [`crate::driver::Driver`].
//!
//! # Lifecycle
//!
//! For each region the driver calls [`RegionComputation::compute`] and pulls the
//! returned stream to exhaustion before moving on. After the last region it calls
//! [`RegionComputation::finalize`] exactly once so that any resource held across
//! regions can be released.

use crate::calendar::Year;
use crate::errors::{ImpactError, ImpactResult};
use crate::region::RegionId;
use crate::result::YearlyResult;
use crate::weather::RegionWeather;
use log::warn;
use std::fmt;

/// Lazy sequence of yearly results for one region
pub type YearlyStream<'a> = Box<dyn Iterator<Item = ImpactResult<YearlyResult>> + 'a>;

/// A calculation producing yearly results from a region's daily weather
pub trait RegionComputation: fmt::Debug {
    /// Start computing the yearly results for a region
    ///
    /// Returns `Ok(None)` if the region is not supported by this computation,
    /// in which case no output is written for it. This is different from a
    /// stream that yields no years.
    ///
    /// Years must be strictly increasing within the stream.
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>>;

    /// Release any state held across regions
    ///
    /// Called once after the last region of a pass.
    fn finalize(&self) -> ImpactResult<()> {
        Ok(())
    }
}

impl<T: RegionComputation + ?Sized> RegionComputation for Box<T> {
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        (**self).compute(weather)
    }

    fn finalize(&self) -> ImpactResult<()> {
        (**self).finalize()
    }
}

impl<T: RegionComputation + ?Sized> RegionComputation for &T {
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        (**self).compute(weather)
    }

    fn finalize(&self) -> ImpactResult<()> {
        (**self).finalize()
    }
}

/// Stream a precomputed set of rows
pub fn stream_rows<'a>(rows: Vec<YearlyResult>) -> YearlyStream<'a> {
    Box::new(rows.into_iter().map(Ok))
}

/// A computation defined by a closure returning all rows at once
///
/// Useful for simple computations and for tests.
pub struct FnComputation<F> {
    name: String,
    func: F,
}

impl<F> FnComputation<F>
where
    F: Fn(&RegionWeather) -> ImpactResult<Option<Vec<YearlyResult>>>,
{
    pub fn new(name: &str, func: F) -> Self {
        Self {
            name: name.to_string(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnComputation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComputation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F> RegionComputation for FnComputation<F>
where
    F: Fn(&RegionWeather) -> ImpactResult<Option<Vec<YearlyResult>>>,
{
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        Ok((self.func)(weather)?.map(stream_rows))
    }
}

/// Finalize every component, even after one of them fails
///
/// Returns the first failure.
pub(crate) fn finalize_all<C: RegionComputation>(components: &[C]) -> ImpactResult<()> {
    let mut first = None;
    for component in components {
        if let Err(e) = component.finalize() {
            warn!("Could not finalize {:?}: {}", component, e);
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

/// Wrap a stream so that a repeated or decreasing year is reported as a protocol violation
///
/// The stream ends after the first error.
pub fn ensure_ordered<'a>(region: &RegionId, stream: YearlyStream<'a>) -> YearlyStream<'a> {
    Box::new(Ordered {
        region: region.clone(),
        inner: stream,
        last: None,
        done: false,
    })
}

struct Ordered<'a> {
    region: RegionId,
    inner: YearlyStream<'a>,
    last: Option<Year>,
    done: bool,
}

impl Iterator for Ordered<'_> {
    type Item = ImpactResult<YearlyResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok(row)) => {
                if let Some(last) = self.last {
                    if row.year <= last {
                        self.done = true;
                        return Some(Err(ImpactError::protocol(
                            &self.region,
                            format!("year {} emitted after year {}", row.year, last),
                        )));
                    }
                }
                self.last = Some(row.year);
                Some(Ok(row))
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
