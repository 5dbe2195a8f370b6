//! Growing-season averages driven by a crop calendar

use log::{debug, warn};
use ndarray::s;
use rimpacts_core::computation::{stream_rows, RegionComputation, YearlyStream};
use rimpacts_core::errors::{ImpactError, ImpactResult};
use rimpacts_core::region::RegionId;
use rimpacts_core::result::YearlyResult;
use rimpacts_core::weather::RegionWeather;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Planting and harvest day of a region
///
/// Days are 1-based days of the year. A negative planting day counts back into
/// the previous year, so `-30` plants 31 days before the first of January.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Season {
    pub plant: i32,
    pub harvest: i32,
}

/// Growing seasons by region
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CropCalendar {
    seasons: HashMap<RegionId, Season>,
}

impl CropCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, region: RegionId, season: Season) {
        self.seasons.insert(region, season);
    }

    pub fn get(&self, region: &RegionId) -> Option<Season> {
        self.seasons.get(region).copied()
    }

    pub fn len(&self) -> usize {
        self.seasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty()
    }

    /// Read a `region,plant,harvest` table
    ///
    /// Rows whose planting day is `None` have no season and are skipped, as is a
    /// leading header row.
    pub fn from_reader<R: Read>(reader: R) -> ImpactResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut calendar = CropCalendar::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let (Some(code), Some(plant), Some(harvest)) =
                (record.get(0), record.get(1), record.get(2))
            else {
                warn!("Skipping short crop calendar row {}", line + 1);
                continue;
            };
            if plant.trim() == "None" {
                continue;
            }

            let days = (plant.trim().parse::<i32>(), harvest.trim().parse::<i32>());
            let (plant, harvest) = match days {
                (Ok(plant), Ok(harvest)) => (plant, harvest),
                _ if line == 0 => {
                    debug!("Skipping crop calendar header {:?}", record);
                    continue;
                }
                _ => {
                    return Err(ImpactError::Parse {
                        context: format!("crop calendar row {}", line + 1),
                        message: format!("invalid season {:?}", record),
                    })
                }
            };
            calendar.insert(RegionId::county(code), Season { plant, harvest });
        }
        Ok(calendar)
    }

    pub fn from_csv(path: impl AsRef<Path>) -> ImpactResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }
}

/// Mean daily value over each year's growing season
///
/// Regions without a season in the calendar are unsupported. Seasons reaching
/// outside the available days are skipped.
#[derive(Debug, Clone)]
pub struct GrowingSeasonMean {
    calendar: CropCalendar,
}

impl GrowingSeasonMean {
    pub fn new(calendar: CropCalendar) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &CropCalendar {
        &self.calendar
    }
}

impl RegionComputation for GrowingSeasonMean {
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        let Some(season) = self.calendar.get(&weather.region) else {
            return Ok(None);
        };
        let values = weather.series.values()?.clone();
        let n_days = values.len() as i64;

        let rows: Vec<_> = weather
            .days
            .year_ranges()
            .filter_map(|(year, range)| {
                let start = range.start as i64 + season.plant as i64 - 1;
                let end = range.start as i64 + season.harvest as i64;
                if start < 0 || end > n_days || start >= end {
                    return None;
                }
                let mean = values.slice(s![start as usize..end as usize]).mean()?;
                Some(YearlyResult::new(year, mean))
            })
            .collect();

        Ok(Some(stream_rows(rows)))
    }
}
