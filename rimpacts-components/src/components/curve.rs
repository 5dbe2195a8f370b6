//! Response curves mapping a weather value to an impact

use rimpacts_core::config::ImpactConfig;
use rimpacts_core::errors::{ImpactError, ImpactResult};
use rimpacts_core::result::FloatValue;
use rimpacts_core::weather::RegionWeather;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default clamping range of response curves (°C)
pub const DEFAULT_BOUNDS: (FloatValue, FloatValue) = (-40.0, 100.0);

/// A function of one weather value that may change from year to year
///
/// Computations clone their curve for every region, call [`ResponseCurve::setup`]
/// before the first year and [`ResponseCurve::advance`] after every year, so any
/// state stays local to one region.
pub trait ResponseCurve: fmt::Debug + Clone {
    fn evaluate(&self, x: FloatValue) -> FloatValue;

    /// Reset to the starting state for a region
    fn setup(&mut self, _weather: &RegionWeather) -> ImpactResult<()> {
        Ok(())
    }

    /// Move the state forward by one year
    fn advance(&mut self) -> ImpactResult<()> {
        Ok(())
    }
}

fn check_increasing(values: &[FloatValue], what: &str) -> ImpactResult<()> {
    if values.windows(2).any(|pair| !(pair[0] < pair[1])) {
        return Err(ImpactError::InvalidParameter(format!(
            "{} must be strictly increasing",
            what
        )));
    }
    Ok(())
}

/// Piecewise-linear curve through a set of knots
///
/// The input is first clamped to `bounds`. Beyond the outermost knots the end
/// values are held, unless linear extrapolation is enabled, in which case the
/// outermost segments are extended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSpline {
    xx: Vec<FloatValue>,
    yy: Vec<FloatValue>,
    bounds: (FloatValue, FloatValue),
    linear_extrapolation: bool,
}

impl LinearSpline {
    pub fn new(
        xx: Vec<FloatValue>,
        yy: Vec<FloatValue>,
        bounds: (FloatValue, FloatValue),
    ) -> ImpactResult<Self> {
        if xx.is_empty() || xx.len() != yy.len() {
            return Err(ImpactError::InvalidParameter(format!(
                "spline needs matching knots and values, got {} and {}",
                xx.len(),
                yy.len()
            )));
        }
        check_increasing(&xx, "spline knots")?;
        if !(bounds.0 <= bounds.1) {
            return Err(ImpactError::InvalidParameter(format!(
                "invalid spline bounds {:?}",
                bounds
            )));
        }

        Ok(Self {
            xx,
            yy,
            bounds,
            linear_extrapolation: false,
        })
    }

    pub fn linear_extrapolation(mut self, linear_extrapolation: bool) -> Self {
        self.linear_extrapolation = linear_extrapolation;
        self
    }

    /// Apply the shared impact settings
    pub fn with_config(self, config: &ImpactConfig) -> Self {
        self.linear_extrapolation(config.linear_extrapolation)
    }

    pub fn knots(&self) -> &[FloatValue] {
        &self.xx
    }

    pub fn values(&self) -> &[FloatValue] {
        &self.yy
    }

    pub fn bounds(&self) -> (FloatValue, FloatValue) {
        self.bounds
    }

    fn segment(&self, i: usize, x: FloatValue) -> FloatValue {
        let (x0, x1) = (self.xx[i], self.xx[i + 1]);
        let (y0, y1) = (self.yy[i], self.yy[i + 1]);
        y0 + (x - x0) * (y1 - y0) / (x1 - x0)
    }
}

impl ResponseCurve for LinearSpline {
    fn evaluate(&self, x: FloatValue) -> FloatValue {
        if x.is_nan() {
            return x;
        }
        let x = x.clamp(self.bounds.0, self.bounds.1);
        let n = self.xx.len();
        if n == 1 {
            return self.yy[0];
        }

        if x <= self.xx[0] {
            return if self.linear_extrapolation {
                self.segment(0, x)
            } else {
                self.yy[0]
            };
        }
        if x >= self.xx[n - 1] {
            return if self.linear_extrapolation {
                self.segment(n - 2, x)
            } else {
                self.yy[n - 1]
            };
        }

        let upper = self.xx.partition_point(|knot| *knot <= x);
        self.segment(upper - 1, x)
    }
}

/// Piecewise-constant curve
///
/// `levels[i]` applies on `[edges[i], edges[i + 1])`. Values below the first
/// edge take the first level and values at or above the last edge the last level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCurve {
    edges: Vec<FloatValue>,
    levels: Vec<FloatValue>,
}

impl StepCurve {
    pub fn new(edges: Vec<FloatValue>, levels: Vec<FloatValue>) -> ImpactResult<Self> {
        if levels.is_empty() || edges.len() != levels.len() + 1 {
            return Err(ImpactError::InvalidParameter(format!(
                "step curve needs one more edge than levels, got {} and {}",
                edges.len(),
                levels.len()
            )));
        }
        check_increasing(&edges, "step edges")?;
        Ok(Self { edges, levels })
    }

    /// The same level everywhere
    pub fn constant(level: FloatValue) -> Self {
        Self {
            edges: vec![FloatValue::NEG_INFINITY, FloatValue::INFINITY],
            levels: vec![level],
        }
    }

    pub fn edges(&self) -> &[FloatValue] {
        &self.edges
    }

    pub fn levels(&self) -> &[FloatValue] {
        &self.levels
    }
}

impl ResponseCurve for StepCurve {
    fn evaluate(&self, x: FloatValue) -> FloatValue {
        if x.is_nan() {
            return x;
        }
        let above = self.edges.partition_point(|edge| *edge <= x);
        let index = above.saturating_sub(1).min(self.levels.len() - 1);
        self.levels[index]
    }
}

/// Either kind of fixed curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Curve {
    Spline(LinearSpline),
    Step(StepCurve),
}

impl Curve {
    /// A curve of the same kind and shape with new values at `xx`
    ///
    /// A spline gets knots at `xx`. A step curve keeps its edges, so `betas` must
    /// hold one value per level.
    pub fn with_levels(&self, xx: &[FloatValue], betas: Vec<FloatValue>) -> ImpactResult<Curve> {
        match self {
            Curve::Spline(spline) => Ok(Curve::Spline(
                LinearSpline::new(xx.to_vec(), betas, spline.bounds)?
                    .linear_extrapolation(spline.linear_extrapolation),
            )),
            Curve::Step(step) => Ok(Curve::Step(StepCurve::new(step.edges.clone(), betas)?)),
        }
    }
}

impl From<LinearSpline> for Curve {
    fn from(spline: LinearSpline) -> Self {
        Curve::Spline(spline)
    }
}

impl From<StepCurve> for Curve {
    fn from(step: StepCurve) -> Self {
        Curve::Step(step)
    }
}

impl ResponseCurve for Curve {
    fn evaluate(&self, x: FloatValue) -> FloatValue {
        match self {
            Curve::Spline(spline) => spline.evaluate(x),
            Curve::Step(step) => step.evaluate(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    fn spline() -> LinearSpline {
        LinearSpline::new(vec![-20.0, 0.0, 60.0], vec![0.0, 0.0, 60.0], (-40.0, 80.0)).unwrap()
    }

    #[test]
    fn spline_interpolates() {
        let curve = spline();
        assert_eq!(curve.evaluate(0.0), 0.0);
        assert!(is_close!(curve.evaluate(30.0), 30.0));
        assert!(is_close!(curve.evaluate(-10.0), 0.0));
        assert_eq!(curve.evaluate(60.0), 60.0);
    }

    #[test]
    fn spline_holds_end_values() {
        let curve = spline();
        assert_eq!(curve.evaluate(70.0), 60.0);
        assert_eq!(curve.evaluate(-30.0), 0.0);
        assert!(curve.evaluate(FloatValue::NAN).is_nan());
    }

    #[test]
    fn spline_extrapolates_within_bounds() {
        let config = ImpactConfig {
            linear_extrapolation: true,
        };
        let curve = spline().with_config(&config);
        assert!(is_close!(curve.evaluate(70.0), 70.0));
        // Clamped to the upper bound first
        assert!(is_close!(curve.evaluate(1000.0), 80.0));
    }

    #[test]
    fn invalid_splines() {
        assert!(LinearSpline::new(vec![0.0, 1.0], vec![0.0], DEFAULT_BOUNDS).is_err());
        assert!(LinearSpline::new(vec![1.0, 0.0], vec![0.0, 1.0], DEFAULT_BOUNDS).is_err());
        assert!(LinearSpline::new(vec![0.0], vec![0.0], (1.0, 0.0)).is_err());
    }

    #[test]
    fn step_levels() {
        let curve = StepCurve::new(vec![-40.0, 29.0, 100.0], vec![1.0, -2.0]).unwrap();
        assert_eq!(curve.evaluate(-50.0), 1.0);
        assert_eq!(curve.evaluate(0.0), 1.0);
        assert_eq!(curve.evaluate(29.0), -2.0);
        assert_eq!(curve.evaluate(200.0), -2.0);
        assert_eq!(StepCurve::constant(0.5).evaluate(12.0), 0.5);
    }

    #[test]
    fn with_levels_keeps_kind() {
        let step: Curve = StepCurve::new(vec![-40.0, 29.0, 100.0], vec![1.0, 2.0])
            .unwrap()
            .into();
        let rebuilt = step.with_levels(&[0.0, 50.0], vec![3.0, 4.0]).unwrap();
        assert_eq!(rebuilt.evaluate(50.0), 4.0);
        assert!(matches!(rebuilt, Curve::Step(_)));

        let spline: Curve = spline().into();
        let rebuilt = spline.with_levels(&[0.0, 10.0], vec![0.0, 1.0]).unwrap();
        assert!(is_close!(rebuilt.evaluate(5.0), 0.5));
    }
}
