//! Impacts computed from daily weather values
//!
//! Daily values arrive in Kelvin and response curves are defined in °C, so
//! every computation here shifts the weather by [`KELVIN_TO_CELSIUS`] unless
//! told otherwise.

use super::adapting::KELVIN_TO_CELSIUS;
use super::curve::ResponseCurve;
use ndarray::{s, ArrayView1};
use rimpacts_core::calendar::DAYS_BY_MONTH;
use rimpacts_core::computation::{RegionComputation, YearlyStream};
use rimpacts_core::errors::{ImpactError, ImpactResult};
use rimpacts_core::result::{FloatValue, ResultValue, YearlyResult};
use rimpacts_core::weather::RegionWeather;
use serde::{Deserialize, Serialize};

/// How one year of daily responses is reduced to a single value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reduction {
    /// Sum of the daily responses
    #[default]
    YearlySum,
    /// Sum of the daily responses over an average month
    AverageMonth,
    /// Mean of the responses to each month's mean weather
    MonthlyMeans,
}

impl Reduction {
    fn reduce<C: ResponseCurve>(
        &self,
        curve: &C,
        values: ArrayView1<'_, FloatValue>,
        offset: FloatValue,
    ) -> FloatValue {
        match self {
            Reduction::YearlySum => values.iter().map(|v| curve.evaluate(v + offset)).sum(),
            Reduction::AverageMonth => {
                values
                    .iter()
                    .map(|v| curve.evaluate(v + offset))
                    .sum::<FloatValue>()
                    / 12.0
            }
            Reduction::MonthlyMeans => {
                let mut start = 0;
                let mut total = 0.0;
                for days in DAYS_BY_MONTH {
                    let month = values.slice(s![start..start + days]);
                    let mean = month.mean().unwrap_or(FloatValue::NAN);
                    total += curve.evaluate(mean + offset);
                    start += days;
                }
                total / DAYS_BY_MONTH.len() as FloatValue
            }
        }
    }
}

/// Applies a response curve to every day of every year
///
/// The curve is cloned for each region, set up with the region's weather and
/// advanced after every year. Years whose result is NaN are not reported but
/// still advance the curve.
#[derive(Debug, Clone)]
pub struct DailyResponse<C> {
    curve: C,
    reduction: Reduction,
    offset: FloatValue,
}

impl<C: ResponseCurve> DailyResponse<C> {
    pub fn new(curve: C, reduction: Reduction) -> Self {
        Self {
            curve,
            reduction,
            offset: KELVIN_TO_CELSIUS,
        }
    }

    /// Offset added to every weather value before the curve is applied
    pub fn with_offset(mut self, offset: FloatValue) -> Self {
        self.offset = offset;
        self
    }

    pub fn curve(&self) -> &C {
        &self.curve
    }
}

impl<C: ResponseCurve> RegionComputation for DailyResponse<C> {
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        let values = weather.series.values()?.clone();
        let years: Vec<_> = weather.days.year_ranges().collect();

        let mut curve = self.curve.clone();
        curve.setup(weather)?;

        Ok(Some(Box::new(years.into_iter().filter_map(
            move |(year, range)| {
                let result = self
                    .reduction
                    .reduce(&curve, values.slice(s![range]), self.offset);
                if let Err(e) = curve.advance() {
                    return Some(Err(e));
                }
                if result.is_nan() {
                    None
                } else {
                    Some(Ok(YearlyResult::new(year, result)))
                }
            },
        ))))
    }
}

/// Fraction of each year's days falling between consecutive endpoints
///
/// With endpoints `[e0, e1, e2]` the yearly row is the share of days in
/// `(e0, e1]` followed by the share in `(e1, e2]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentWithin {
    endpoints: Vec<FloatValue>,
    offset: FloatValue,
}

impl PercentWithin {
    pub fn new(endpoints: Vec<FloatValue>) -> ImpactResult<Self> {
        if endpoints.len() < 2 {
            return Err(ImpactError::InvalidParameter(
                "need at least two endpoints".to_string(),
            ));
        }
        Ok(Self {
            endpoints,
            offset: KELVIN_TO_CELSIUS,
        })
    }

    pub fn with_offset(mut self, offset: FloatValue) -> Self {
        self.offset = offset;
        self
    }

    fn fractions(&self, values: ArrayView1<'_, FloatValue>) -> Vec<FloatValue> {
        let above = |threshold: FloatValue| {
            values.iter().filter(|v| *v + self.offset > threshold).count() as FloatValue
        };
        let n = values.len() as FloatValue;
        self.endpoints
            .windows(2)
            .map(|pair| (above(pair[0]) - above(pair[1])) / n)
            .collect()
    }
}

impl RegionComputation for PercentWithin {
    fn compute<'a>(&'a self, weather: &RegionWeather) -> ImpactResult<Option<YearlyStream<'a>>> {
        let values = weather.series.values()?.clone();
        let years: Vec<_> = weather.days.year_ranges().collect();

        Ok(Some(Box::new(years.into_iter().map(move |(year, range)| {
            let fractions = self.fractions(values.slice(s![range]));
            Ok(YearlyResult::new(year, ResultValue::Series(fractions)))
        }))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::adapting::SimpleAdaptingCurve;
    use crate::components::curve::{Curve, LinearSpline, StepCurve};
    use is_close::is_close;
    use rimpacts_core::calendar::DayIndex;
    use rimpacts_core::region::RegionId;
    use rimpacts_core::weather::DailySeries;
    use std::sync::Arc;

    fn weather(kelvin: Vec<FloatValue>, years: i32) -> RegionWeather {
        RegionWeather::new(
            RegionId::new("A"),
            Arc::new(DayIndex::from_years(2000, 2000 + years - 1)),
            DailySeries::single(kelvin),
        )
        .unwrap()
    }

    /// One unit of impact per 10 °C
    fn tenths() -> LinearSpline {
        LinearSpline::new(vec![0.0, 20.0], vec![0.0, 2.0], (-40.0, 80.0))
            .unwrap()
            .linear_extrapolation(true)
    }

    fn rows(computation: &impl RegionComputation, weather: &RegionWeather) -> Vec<YearlyResult> {
        computation
            .compute(weather)
            .unwrap()
            .unwrap()
            .collect::<ImpactResult<_>>()
            .unwrap()
    }

    fn primary(rows: &[YearlyResult]) -> Vec<FloatValue> {
        rows.iter().map(|row| row.value.primary().unwrap()).collect()
    }

    #[test]
    fn reductions() {
        let weather = weather(vec![283.15; 730], 2);

        let sum = rows(&DailyResponse::new(tenths(), Reduction::YearlySum), &weather);
        assert_eq!(sum.len(), 2);
        assert_eq!(sum[1].year, 2001);
        assert!(is_close!(primary(&sum)[0], 365.0));

        let month = rows(&DailyResponse::new(tenths(), Reduction::AverageMonth), &weather);
        assert!(is_close!(primary(&month)[0], 365.0 / 12.0));

        let means = rows(&DailyResponse::new(tenths(), Reduction::MonthlyMeans), &weather);
        assert!(is_close!(primary(&means)[0], 1.0));
    }

    #[test]
    fn monthly_means_use_month_lengths() {
        // 10 °C in January only
        let mut kelvin = vec![273.15; 365];
        kelvin[..31].iter_mut().for_each(|v| *v = 283.15);
        let weather = weather(kelvin, 1);

        let means = rows(&DailyResponse::new(tenths(), Reduction::MonthlyMeans), &weather);
        assert!(is_close!(primary(&means)[0], 1.0 / 12.0));
    }

    #[test]
    fn nan_years_are_skipped() {
        let mut kelvin = vec![283.15; 730];
        kelvin[10] = FloatValue::NAN;
        let weather = weather(kelvin, 2);

        let sum = rows(&DailyResponse::new(tenths(), Reduction::YearlySum), &weather);
        assert_eq!(sum.len(), 1);
        assert_eq!(sum[0].year, 2001);
    }

    #[test]
    fn adapting_curve_advances_each_year() {
        let xx = vec![0.0, 20.0];
        let baseline: Curve = tenths().into();
        let future: Curve = LinearSpline::new(xx.clone(), vec![0.0, 0.0], (-40.0, 80.0))
            .unwrap()
            .into();
        let curve = SimpleAdaptingCurve::new(xx, baseline, future, StepCurve::constant(0.5).into());
        let response = DailyResponse::new(curve, Reduction::YearlySum);

        let weather = weather(vec![283.15; 3 * 365], 3);
        let values = primary(&rows(&response, &weather));
        assert!(is_close!(values[0], 365.0));
        assert!(is_close!(values[1], 182.5));
        assert!(is_close!(values[2], 91.25));

        // The prototype curve is untouched, so a second region starts over
        let again = primary(&rows(&response, &weather));
        assert!(is_close!(again[0], 365.0));
    }

    #[test]
    fn percent_within() {
        let mut kelvin = vec![273.15 + 5.0; 365];
        kelvin[..73].iter_mut().for_each(|v| *v = 273.15 + 25.0);
        let weather = weather(kelvin, 1);

        let within = PercentWithin::new(vec![0.0, 10.0, 30.0]).unwrap();
        let rows = rows(&within, &weather);
        assert_eq!(rows.len(), 1);
        let ResultValue::Series(fractions) = &rows[0].value else {
            panic!("expected a series");
        };
        assert!(is_close!(fractions[0], 0.8));
        assert!(is_close!(fractions[1], 0.2));
    }

    #[test]
    fn percent_within_needs_endpoints() {
        assert!(PercentWithin::new(vec![0.0]).is_err());
    }

    #[test]
    fn multi_variable_weather_is_rejected() {
        let weather = RegionWeather::new(
            RegionId::new("A"),
            Arc::new(DayIndex::from_years(2000, 2000)),
            DailySeries::multi([("tas", vec![283.15; 365])]),
        )
        .unwrap();
        let response = DailyResponse::new(tenths(), Reduction::YearlySum);
        assert!(response.compute(&weather).is_err());
    }
}
