mod adapting;
mod curve;
mod daily;
mod season;
mod stored;

pub use adapting::{AdaptingCurve, SimpleAdaptingCurve, KELVIN_TO_CELSIUS};
pub use curve::{Curve, LinearSpline, ResponseCurve, StepCurve, DEFAULT_BOUNDS};
pub use daily::{DailyResponse, PercentWithin, Reduction};
pub use season::{CropCalendar, GrowingSeasonMean, Season};
pub use stored::StoredResults;
