//! No-leap daily calendar
//!
//! Days are encoded as `year * 1000 + day_of_year` with `day_of_year` in `[0, 364]`.
//! Every year has exactly [`DAYS_PER_YEAR`] entries.

use crate::errors::{ImpactError, ImpactResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;

pub type Year = i32;

/// A `YYYYDDD` day code
pub type DayCode = i32;

pub const DAYS_PER_YEAR: usize = 365;

/// Number of days in each month of a no-leap year
pub const DAYS_BY_MONTH: [usize; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

pub fn year_of(code: DayCode) -> Year {
    code.div_euclid(1000)
}

pub fn day_of_year(code: DayCode) -> i32 {
    code.rem_euclid(1000)
}

/// Ordered sequence of day codes shared by all weather variables of a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DayCode>", into = "Vec<DayCode>")]
pub struct DayIndex {
    codes: Vec<DayCode>,
}

impl DayIndex {
    /// Build a validated day index
    ///
    /// Codes must strictly increase and cover each year with all 365 days in order.
    pub fn new(codes: Vec<DayCode>) -> ImpactResult<Self> {
        if codes.len() % DAYS_PER_YEAR != 0 {
            return Err(ImpactError::InvalidDayIndex(format!(
                "{} days is not a whole number of {}-day years",
                codes.len(),
                DAYS_PER_YEAR
            )));
        }

        for (ii, chunk) in codes.chunks(DAYS_PER_YEAR).enumerate() {
            let year = year_of(chunk[0]);
            for (day, code) in chunk.iter().enumerate() {
                if year_of(*code) != year || day_of_year(*code) != day as i32 {
                    return Err(ImpactError::InvalidDayIndex(format!(
                        "expected {} at position {}, found {}",
                        year * 1000 + day as i32,
                        ii * DAYS_PER_YEAR + day,
                        code
                    )));
                }
            }
            if ii > 0 && year <= year_of(codes[ii * DAYS_PER_YEAR - 1]) {
                return Err(ImpactError::InvalidDayIndex(format!(
                    "year {} does not follow year {}",
                    year,
                    year_of(codes[ii * DAYS_PER_YEAR - 1])
                )));
            }
        }

        Ok(Self { codes })
    }

    /// A complete index from `first` to `last` inclusive
    pub fn from_years(first: Year, last: Year) -> Self {
        let codes = (first..=last)
            .flat_map(|year| (0..DAYS_PER_YEAR as i32).map(move |day| year * 1000 + day))
            .collect();
        Self { codes }
    }

    pub fn empty() -> Self {
        Self { codes: vec![] }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &[DayCode] {
        &self.codes
    }

    pub fn first_year(&self) -> Option<Year> {
        self.codes.first().map(|code| year_of(*code))
    }

    pub fn last_year(&self) -> Option<Year> {
        self.codes.last().map(|code| year_of(*code))
    }

    pub fn n_years(&self) -> usize {
        self.codes.len() / DAYS_PER_YEAR
    }

    /// Years covered by the index, in order
    pub fn years(&self) -> impl Iterator<Item = Year> + '_ {
        self.codes.iter().step_by(DAYS_PER_YEAR).map(|code| year_of(*code))
    }

    /// Positions of each year's days within the daily series
    pub fn year_ranges(&self) -> impl Iterator<Item = (Year, Range<usize>)> + '_ {
        self.years().enumerate().map(|(ii, year)| {
            let start = ii * DAYS_PER_YEAR;
            (year, start..start + DAYS_PER_YEAR)
        })
    }
}

impl TryFrom<Vec<DayCode>> for DayIndex {
    type Error = ImpactError;

    fn try_from(value: Vec<DayCode>) -> Result<Self, Self::Error> {
        DayIndex::new(value)
    }
}

impl From<DayIndex> for Vec<DayCode> {
    fn from(value: DayIndex) -> Self {
        value.codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_years() {
        let index = DayIndex::from_years(2000, 2002);
        assert_eq!(index.len(), 3 * DAYS_PER_YEAR);
        assert_eq!(index.codes()[0], 2000000);
        assert_eq!(index.codes()[364], 2000364);
        assert_eq!(index.codes()[365], 2001000);
        assert_eq!(index.years().collect::<Vec<_>>(), vec![2000, 2001, 2002]);
        assert_eq!(index.first_year(), Some(2000));
        assert_eq!(index.last_year(), Some(2002));
    }

    #[test]
    fn year_ranges() {
        let index = DayIndex::from_years(1990, 1991);
        let ranges: Vec<_> = index.year_ranges().collect();
        assert_eq!(ranges, vec![(1990, 0..365), (1991, 365..730)]);
    }

    #[test]
    fn validates_whole_years() {
        let mut codes: Vec<_> = DayIndex::from_years(2000, 2000).into();
        codes.pop();
        assert!(matches!(
            DayIndex::new(codes),
            Err(ImpactError::InvalidDayIndex(_))
        ));
    }

    #[test]
    fn validates_ordering() {
        let mut codes: Vec<_> = DayIndex::from_years(2001, 2001).into();
        codes.extend(Vec::from(DayIndex::from_years(2000, 2000)));
        assert!(DayIndex::new(codes).is_err());

        let mut codes: Vec<_> = DayIndex::from_years(2000, 2000).into();
        codes.swap(3, 4);
        assert!(DayIndex::new(codes).is_err());
    }

    #[test]
    fn empty_is_valid() {
        let index = DayIndex::new(vec![]).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.first_year(), None);
    }
}
