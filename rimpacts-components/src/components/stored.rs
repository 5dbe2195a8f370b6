//! Replaying results that were written by an earlier pass

use log::debug;
use rimpacts_core::bundle::{DirectoryBundle, ResultSource};
use rimpacts_core::computation::{stream_rows, RegionComputation, YearlyStream};
use rimpacts_core::errors::ImpactResult;
use rimpacts_core::result::{ResultValue, YearlyResult};
use rimpacts_core::weather::RegionWeather;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Streams the rows of an existing directory bundle
///
/// The bundle is indexed when the first region is computed and released again
/// by `finalize`. A region the bundle does not hold yields a single zero row at
/// the first year of the weather.
#[derive(Debug)]
pub struct StoredResults {
    dir: PathBuf,
    column: Option<usize>,
    bundle: RefCell<Option<DirectoryBundle>>,
}

impl StoredResults {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            column: None,
            bundle: RefCell::new(None),
        }
    }

    /// Replay only one value column, counted from zero
    pub fn column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    pub fn is_open(&self) -> bool {
        self.bundle.borrow().is_some()
    }

    fn select(&self, value: ResultValue) -> ResultValue {
        match (self.column, value) {
            (None, value) => value,
            (Some(_), ResultValue::Missing) => ResultValue::Missing,
            (Some(column), value) => value
                .to_vec()
                .get(column)
                .map_or(ResultValue::Missing, |v| ResultValue::Scalar(*v)),
        }
    }
}

impl RegionComputation for StoredResults {
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        let mut bundle = self.bundle.borrow_mut();
        if bundle.is_none() {
            *bundle = Some(DirectoryBundle::open(&self.dir)?);
        }
        let stored = match bundle.as_ref() {
            Some(bundle) => bundle.read_region(&weather.region)?,
            None => None,
        };

        let rows = match stored {
            Some(rows) => rows
                .into_iter()
                .map(|row| YearlyResult::new(row.year, self.select(row.value)))
                .collect(),
            None => {
                debug!("No stored results for {}", weather.region);
                weather
                    .days
                    .first_year()
                    .map(|year| YearlyResult::new(year, 0.0))
                    .into_iter()
                    .collect()
            }
        };
        Ok(Some(stream_rows(rows)))
    }

    fn finalize(&self) -> ImpactResult<()> {
        if self.bundle.borrow_mut().take().is_some() {
            debug!("Released stored results in {}", self.dir.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rimpacts_core::bundle::ResultSink;
    use rimpacts_core::calendar::DayIndex;
    use rimpacts_core::errors::ImpactError;
    use rimpacts_core::region::RegionId;
    use rimpacts_core::result::ColumnLabels;
    use std::sync::Arc;

    fn weather(region: &str) -> RegionWeather {
        RegionWeather::new(
            RegionId::new(region),
            Arc::new(DayIndex::from_years(1990, 1991)),
            rimpacts_core::weather::DailySeries::single(vec![0.0; 730]),
        )
        .unwrap()
    }

    fn stored_bundle() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut bundle = DirectoryBundle::create(dir.path()).unwrap();
        let rows = vec![
            YearlyResult::new(2000, vec![1.0, 10.0]),
            YearlyResult::missing(2001),
        ];
        bundle
            .write_region(
                &RegionId::new("01001"),
                &ColumnLabels::Multi(vec!["a".to_string(), "b".to_string()]),
                &mut rows.into_iter().map(Ok::<_, ImpactError>),
            )
            .unwrap();
        dir
    }

    fn rows(stored: &StoredResults, region: &str) -> Vec<YearlyResult> {
        stored
            .compute(&weather(region))
            .unwrap()
            .unwrap()
            .collect::<ImpactResult<_>>()
            .unwrap()
    }

    #[test]
    fn replays_whole_rows() {
        let dir = stored_bundle();
        let stored = StoredResults::new(dir.path());
        assert!(!stored.is_open());

        assert_eq!(
            rows(&stored, "01001"),
            vec![
                YearlyResult::new(2000, vec![1.0, 10.0]),
                YearlyResult::missing(2001),
            ]
        );
        assert!(stored.is_open());

        stored.finalize().unwrap();
        assert!(!stored.is_open());
    }

    #[test]
    fn replays_one_column() {
        let dir = stored_bundle();
        let stored = StoredResults::new(dir.path()).column(1);
        assert_eq!(
            rows(&stored, "01001"),
            vec![YearlyResult::new(2000, 10.0), YearlyResult::missing(2001)]
        );
    }

    #[test]
    fn absent_region_is_zero() {
        let dir = stored_bundle();
        let stored = StoredResults::new(dir.path());
        assert_eq!(rows(&stored, "02001"), vec![YearlyResult::new(1990, 0.0)]);
    }

    #[test]
    fn missing_bundle_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let stored = StoredResults::new(dir.path().join("absent"));
        assert!(matches!(
            stored.compute(&weather("01001")),
            Err(ImpactError::Io(_))
        ));
    }
}
