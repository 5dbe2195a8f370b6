//! Adapting response curves
//!
//! Both curves start every region at a baseline curve and move a step toward a
//! target curve after each year. At every knot `x` the new value is
//!
//! $$ \beta' = \beta_{last} \gamma(x) + \beta_{target} (1 - \gamma(x)) $$
//!
//! [`SimpleAdaptingCurve`] moves toward a fixed future curve. [`AdaptingCurve`]
//! moves toward the curve expected for the region's recent climate, estimated
//! by a linear fit through curves observed under different climates.

use super::curve::{Curve, ResponseCurve};
use log::debug;
use rimpacts_core::combinators::RunningAverage;
use rimpacts_core::errors::{ImpactError, ImpactResult};
use rimpacts_core::result::FloatValue;
use rimpacts_core::weather::RegionWeather;
use std::collections::VecDeque;

/// Offset from the weather units (K) to the units of the curve climates (°C)
pub const KELVIN_TO_CELSIUS: FloatValue = -273.15;

fn apply_stepwise(
    xx: &[FloatValue],
    last: &Curve,
    target: &Curve,
    gamma: &Curve,
) -> ImpactResult<Curve> {
    let betas = xx
        .iter()
        .map(|x| {
            let g = gamma.evaluate(*x);
            last.evaluate(*x) * g + target.evaluate(*x) * (1.0 - g)
        })
        .collect();
    last.with_levels(xx, betas)
}

/// A curve moving from a baseline toward a fixed future curve
#[derive(Debug, Clone)]
pub struct SimpleAdaptingCurve {
    xx: Vec<FloatValue>,
    baseline: Curve,
    future: Curve,
    gamma: Curve,
    current: Curve,
}

impl SimpleAdaptingCurve {
    pub fn new(xx: Vec<FloatValue>, baseline: Curve, future: Curve, gamma: Curve) -> Self {
        Self {
            xx,
            current: baseline.clone(),
            baseline,
            future,
            gamma,
        }
    }

    pub fn current(&self) -> &Curve {
        &self.current
    }
}

impl ResponseCurve for SimpleAdaptingCurve {
    fn evaluate(&self, x: FloatValue) -> FloatValue {
        self.current.evaluate(x)
    }

    fn setup(&mut self, _weather: &RegionWeather) -> ImpactResult<()> {
        self.current = self.baseline.clone();
        Ok(())
    }

    fn advance(&mut self) -> ImpactResult<()> {
        self.current = apply_stepwise(&self.xx, &self.current, &self.future, &self.gamma)?;
        Ok(())
    }
}

/// A curve adapting toward the response expected under the region's climate
///
/// The climate is the yearly mean of the weather, smoothed over the previous
/// [`AdaptingCurve::NUM_YEARS`] years starting from the baseline climate.
#[derive(Debug, Clone)]
pub struct AdaptingCurve {
    xx: Vec<FloatValue>,
    baseline: Curve,
    others: Vec<Curve>,
    wbar_baseline: FloatValue,
    wbar_others: Vec<FloatValue>,
    gamma: Curve,
    clip_zero: bool,
    weather_offset: FloatValue,
    current: Curve,
    climate: VecDeque<FloatValue>,
}

impl AdaptingCurve {
    /// Years averaged to describe the recent climate
    pub const NUM_YEARS: usize = 15;

    /// `others[i]` is the curve observed under the climate `wbar_others[i]`
    pub fn new(
        xx: Vec<FloatValue>,
        baseline: Curve,
        others: Vec<Curve>,
        wbar_baseline: FloatValue,
        wbar_others: Vec<FloatValue>,
        gamma: Curve,
    ) -> ImpactResult<Self> {
        if others.is_empty() || others.len() != wbar_others.len() {
            return Err(ImpactError::InvalidParameter(format!(
                "{} adapted curves but {} climates",
                others.len(),
                wbar_others.len()
            )));
        }
        if wbar_others.iter().all(|wbar| *wbar == wbar_baseline) {
            return Err(ImpactError::InvalidParameter(
                "adapted curves need a climate different from the baseline".to_string(),
            ));
        }

        Ok(Self {
            xx,
            current: baseline.clone(),
            baseline,
            others,
            wbar_baseline,
            wbar_others,
            gamma,
            clip_zero: false,
            weather_offset: KELVIN_TO_CELSIUS,
            climate: VecDeque::new(),
        })
    }

    /// Never let the fully adapted response drop below zero
    pub fn clip_zero(mut self, clip_zero: bool) -> Self {
        self.clip_zero = clip_zero;
        self
    }

    /// Offset taking the weather to the units of the climates
    pub fn with_weather_offset(mut self, offset: FloatValue) -> Self {
        self.weather_offset = offset;
        self
    }

    pub fn current(&self) -> &Curve {
        &self.current
    }

    /// The fully adapted value at one knot under the climate `wbar_now`
    ///
    /// Fits a line through the baseline and the other curves' values against
    /// their climates. If every other curve is zero, so is the result.
    pub fn extrapolate_beta(
        beta_baseline: FloatValue,
        beta_others: &[FloatValue],
        wbar_baseline: FloatValue,
        wbar_others: &[FloatValue],
        wbar_now: FloatValue,
        clip_zero: bool,
    ) -> FloatValue {
        if beta_others.iter().all(|beta| *beta == 0.0) {
            return 0.0;
        }

        let xs: Vec<FloatValue> = std::iter::once(wbar_baseline)
            .chain(wbar_others.iter().copied())
            .collect();
        let ys: Vec<FloatValue> = std::iter::once(beta_baseline)
            .chain(beta_others.iter().copied())
            .collect();
        let n = xs.len() as FloatValue;
        let x_mean = xs.iter().sum::<FloatValue>() / n;
        let y_mean = ys.iter().sum::<FloatValue>() / n;

        let (covariance, variance) = xs
            .iter()
            .zip(ys.iter())
            .fold((0.0, 0.0), |(cov, var), (x, y)| {
                (cov + (x - x_mean) * (y - y_mean), var + (x - x_mean).powi(2))
            });
        let slope = covariance / variance;
        let intercept = y_mean - slope * x_mean;

        let beta = intercept + slope * wbar_now;
        if clip_zero && beta < 0.0 {
            0.0
        } else {
            beta
        }
    }

    /// Rate coefficient of an exponential approach to `infinity`
    ///
    /// Solves `β(t) = β∞ + (β_before − β∞)·exp(−(t − t_before)/τ)` for τ using the
    /// observed `after` value and returns `γ = exp(−1/τ)`.
    pub fn calculate_gamma(
        before: FloatValue,
        time_before: FloatValue,
        after: FloatValue,
        time_after: FloatValue,
        infinity: FloatValue,
    ) -> ImpactResult<FloatValue> {
        let ratio = (after - infinity) / (before - infinity);
        if !(ratio > 0.0) || time_after == time_before {
            return Err(ImpactError::InvalidParameter(format!(
                "cannot fit an approach from {} to {} toward {}",
                before, after, infinity
            )));
        }
        let tau = -(time_after - time_before) / ratio.ln();
        Ok((-1.0 / tau).exp())
    }

    /// The fully adapted curve under the climate `wbar_now`
    fn target(&self, wbar_now: FloatValue) -> ImpactResult<Curve> {
        let betas = self
            .xx
            .iter()
            .map(|x| {
                let others: Vec<FloatValue> =
                    self.others.iter().map(|curve| curve.evaluate(*x)).collect();
                Self::extrapolate_beta(
                    self.baseline.evaluate(*x),
                    &others,
                    self.wbar_baseline,
                    &self.wbar_others,
                    wbar_now,
                    self.clip_zero,
                )
            })
            .collect();
        self.baseline.with_levels(&self.xx, betas)
    }
}

impl ResponseCurve for AdaptingCurve {
    fn evaluate(&self, x: FloatValue) -> FloatValue {
        self.current.evaluate(x)
    }

    fn setup(&mut self, weather: &RegionWeather) -> ImpactResult<()> {
        self.current = self.baseline.clone();

        let prior = self.wbar_baseline - self.weather_offset;
        let average = RunningAverage::uniform(Self::NUM_YEARS, prior)?;
        let yearly_means: Vec<FloatValue> = weather
            .yearly()?
            .map(|(_, values)| values.mean().unwrap_or(FloatValue::NAN))
            .collect();
        let offset = self.weather_offset;
        self.climate = average
            .smooth(yearly_means)
            .map(|smoothed| smoothed + offset)
            .collect();

        debug!(
            "Adapting curve for {} over {} years",
            weather.region,
            self.climate.len()
        );
        Ok(())
    }

    fn advance(&mut self) -> ImpactResult<()> {
        if let Some(wbar_now) = self.climate.pop_front() {
            let target = self.target(wbar_now)?;
            self.current = apply_stepwise(&self.xx, &self.current, &target, &self.gamma)?;
        }
        Ok(())
    }
}
