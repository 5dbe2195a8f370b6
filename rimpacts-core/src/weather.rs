//! Daily weather payloads handed to region computations
//!
//! Discovering and decoding weather archives is left to implementations of
//! [`WeatherSource`]. The core only sees one region at a time as a [`RegionWeather`]:
//! a shared [`DayIndex`] plus one or more parallel daily series.

use crate::calendar::{DayIndex, Year};
use crate::errors::{ImpactError, ImpactResult};
use crate::region::RegionId;
use crate::result::FloatValue;
use ndarray::{s, ArcArray1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Daily values for one region
///
/// Arrays are reference counted so that handing the same payload to several
/// component computations does not copy the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DailySeries {
    /// A single weather variable
    Single(ArcArray1<FloatValue>),
    /// Several named weather variables sharing the same day index
    Multi(BTreeMap<String, ArcArray1<FloatValue>>),
}

impl DailySeries {
    pub fn single(values: Vec<FloatValue>) -> Self {
        DailySeries::Single(ArcArray1::from_vec(values))
    }

    pub fn multi<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<FloatValue>)>,
        S: Into<String>,
    {
        DailySeries::Multi(
            variables
                .into_iter()
                .map(|(name, values)| (name.into(), ArcArray1::from_vec(values)))
                .collect(),
        )
    }

    pub fn empty() -> Self {
        DailySeries::Single(ArcArray1::from_vec(vec![]))
    }

    /// Check that every variable has one value per day
    pub fn validate(&self, days: &DayIndex) -> ImpactResult<()> {
        let check = |values: &ArcArray1<FloatValue>| {
            if values.len() != days.len() {
                Err(ImpactError::ShapeMismatch {
                    expected: days.len(),
                    found: values.len(),
                })
            } else {
                Ok(())
            }
        };

        match self {
            DailySeries::Single(values) => check(values),
            DailySeries::Multi(variables) => variables.values().try_for_each(check),
        }
    }

    /// The values of a single-variable payload
    pub fn values(&self) -> ImpactResult<&ArcArray1<FloatValue>> {
        match self {
            DailySeries::Single(values) => Ok(values),
            DailySeries::Multi(_) => Err(ImpactError::InvalidParameter(
                "expected a single daily series but got several variables".to_string(),
            )),
        }
    }

    /// Select one variable of a multi-variable payload
    pub fn variable(&self, name: &str) -> ImpactResult<DailySeries> {
        match self {
            DailySeries::Multi(variables) => variables
                .get(name)
                .map(|values| DailySeries::Single(values.clone()))
                .ok_or_else(|| ImpactError::UnknownVariable(name.to_string())),
            DailySeries::Single(_) => Err(ImpactError::UnknownVariable(name.to_string())),
        }
    }

    /// Names of the variables in a multi-variable payload
    pub fn names(&self) -> Vec<&str> {
        match self {
            DailySeries::Single(_) => vec![],
            DailySeries::Multi(variables) => variables.keys().map(|k| k.as_str()).collect(),
        }
    }
}

/// Location metadata for a region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: FloatValue,
    pub longitude: FloatValue,
}

/// Everything a computation receives for one region
#[derive(Debug, Clone)]
pub struct RegionWeather {
    pub region: RegionId,
    pub days: Arc<DayIndex>,
    pub series: DailySeries,
    pub location: Option<Location>,
}

impl RegionWeather {
    pub fn new(region: RegionId, days: Arc<DayIndex>, series: DailySeries) -> ImpactResult<Self> {
        series.validate(&days)?;
        Ok(Self {
            region,
            days,
            series,
            location: None,
        })
    }

    /// A region with no weather attached
    ///
    /// Used for passes that only replay or derive from existing results.
    pub fn empty(region: RegionId) -> Self {
        Self {
            region,
            days: Arc::new(DayIndex::empty()),
            series: DailySeries::empty(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// The same region and days with a different payload
    pub fn with_series(&self, series: DailySeries) -> ImpactResult<Self> {
        series.validate(&self.days)?;
        Ok(Self {
            region: self.region.clone(),
            days: self.days.clone(),
            series,
            location: self.location,
        })
    }

    /// Split a single-variable payload into consecutive 365-day years
    pub fn yearly(&self) -> ImpactResult<impl Iterator<Item = (Year, ArrayView1<'_, FloatValue>)>> {
        let values = self.series.values()?;
        Ok(self
            .days
            .year_ranges()
            .map(move |(year, range)| (year, values.slice(s![range]))))
    }
}

/// Supplier of per-region weather
pub trait WeatherSource {
    /// Regions in the order they should be processed
    fn regions(&self) -> ImpactResult<Vec<RegionId>>;

    /// Load the weather for a single region
    fn load(&mut self, region: &RegionId) -> ImpactResult<RegionWeather>;
}

/// Weather held in memory, sharing one day index
#[derive(Debug, Clone)]
pub struct InMemoryWeather {
    days: Arc<DayIndex>,
    order: Vec<RegionId>,
    regions: BTreeMap<RegionId, (DailySeries, Option<Location>)>,
}

impl InMemoryWeather {
    pub fn new(days: DayIndex) -> Self {
        Self {
            days: Arc::new(days),
            order: vec![],
            regions: BTreeMap::new(),
        }
    }

    /// Add a region
    ///
    /// Regions are processed in insertion order. Re-inserting a region replaces its data.
    pub fn insert(&mut self, region: RegionId, series: DailySeries) -> ImpactResult<()> {
        series.validate(&self.days)?;
        if !self.regions.contains_key(&region) {
            self.order.push(region.clone());
        }
        self.regions.insert(region, (series, None));
        Ok(())
    }

    pub fn with_region(mut self, region: impl Into<RegionId>, series: DailySeries) -> ImpactResult<Self> {
        self.insert(region.into(), series)?;
        Ok(self)
    }

    pub fn set_location(&mut self, region: &RegionId, location: Location) {
        if let Some(entry) = self.regions.get_mut(region) {
            entry.1 = Some(location);
        }
    }

    pub fn days(&self) -> &Arc<DayIndex> {
        &self.days
    }
}

impl WeatherSource for InMemoryWeather {
    fn regions(&self) -> ImpactResult<Vec<RegionId>> {
        Ok(self.order.clone())
    }

    fn load(&mut self, region: &RegionId) -> ImpactResult<RegionWeather> {
        let (series, location) = self
            .regions
            .get(region)
            .ok_or_else(|| ImpactError::Error(format!("No weather loaded for region {}", region)))?;

        Ok(RegionWeather {
            region: region.clone(),
            days: self.days.clone(),
            series: series.clone(),
            location: *location,
        })
    }
}

/// A list of regions without any weather
///
/// Drives computations that derive entirely from other data, such as
/// previously written bundles.
#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    regions: Vec<RegionId>,
}

impl RegionCatalog {
    pub fn new(regions: Vec<RegionId>) -> Self {
        Self { regions }
    }
}

impl WeatherSource for RegionCatalog {
    fn regions(&self) -> ImpactResult<Vec<RegionId>> {
        Ok(self.regions.clone())
    }

    fn load(&mut self, region: &RegionId) -> ImpactResult<RegionWeather> {
        Ok(RegionWeather::empty(region.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_years() -> DayIndex {
        DayIndex::from_years(2000, 2001)
    }

    #[test]
    fn yearly_splits_whole_years() {
        let values: Vec<FloatValue> = (0..730).map(|x| x as FloatValue).collect();
        let weather = RegionWeather::new(
            RegionId::new("01001"),
            Arc::new(two_years()),
            DailySeries::single(values),
        )
        .unwrap();

        let years: Vec<_> = weather.yearly().unwrap().collect();
        assert_eq!(years.len(), 2);
        assert_eq!(years[0].0, 2000);
        assert_eq!(years[0].1[0], 0.0);
        assert_eq!(years[1].0, 2001);
        assert_eq!(years[1].1[0], 365.0);
        assert_eq!(years[1].1.len(), 365);
    }

    #[test]
    fn rejects_misaligned_series() {
        let result = RegionWeather::new(
            RegionId::new("01001"),
            Arc::new(two_years()),
            DailySeries::single(vec![0.0; 10]),
        );
        assert!(matches!(
            result,
            Err(ImpactError::ShapeMismatch {
                expected: 730,
                found: 10
            })
        ));
    }

    #[test]
    fn select_variable() {
        let series = DailySeries::multi([("tasmin", vec![1.0; 730]), ("tasmax", vec![2.0; 730])]);
        assert_eq!(series.names(), vec!["tasmax", "tasmin"]);

        let tasmax = series.variable("tasmax").unwrap();
        assert_eq!(tasmax.values().unwrap()[0], 2.0);
        assert!(matches!(
            series.variable("pr"),
            Err(ImpactError::UnknownVariable(_))
        ));
        assert!(series.values().is_err());
    }

    #[test]
    fn in_memory_source_keeps_insertion_order() {
        let mut source = InMemoryWeather::new(two_years())
            .with_region("B", DailySeries::single(vec![1.0; 730]))
            .unwrap()
            .with_region("A", DailySeries::single(vec![2.0; 730]))
            .unwrap();

        assert_eq!(
            source.regions().unwrap(),
            vec![RegionId::new("B"), RegionId::new("A")]
        );
        let weather = source.load(&RegionId::new("A")).unwrap();
        assert_eq!(weather.series.values().unwrap()[0], 2.0);
        assert!(source.load(&RegionId::new("C")).is_err());
    }

    #[test]
    fn catalog_has_no_weather() {
        let mut catalog = RegionCatalog::new(vec![RegionId::new("A")]);
        let weather = catalog.load(&RegionId::new("A")).unwrap();
        assert!(weather.days.is_empty());
        assert_eq!(weather.yearly().unwrap().count(), 0);
    }
}
