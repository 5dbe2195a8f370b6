//! Yearly results produced by region computations

use crate::calendar::Year;
use crate::errors::{ImpactError, ImpactResult};
use serde::{Deserialize, Serialize};

pub type FloatValue = f64;

/// Marker written in place of a value when no data contributed to it
pub const MISSING_MARKER: &str = "NA";

/// The value computed for one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultValue {
    /// A single number
    Scalar(FloatValue),
    /// An ordered row of numbers
    Series(Vec<FloatValue>),
    /// No data contributed to this value
    ///
    /// Arithmetic involving a missing value yields a missing value.
    Missing,
}

impl ResultValue {
    /// The first (or only) number
    pub fn primary(&self) -> Option<FloatValue> {
        match self {
            ResultValue::Scalar(v) => Some(*v),
            ResultValue::Series(values) => values.first().copied(),
            ResultValue::Missing => None,
        }
    }

    /// All numbers as a row
    pub fn to_vec(&self) -> Vec<FloatValue> {
        match self {
            ResultValue::Scalar(v) => vec![*v],
            ResultValue::Series(values) => values.clone(),
            ResultValue::Missing => vec![],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResultValue::Scalar(_) => 1,
            ResultValue::Series(values) => values.len(),
            ResultValue::Missing => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ResultValue::Missing)
    }

    /// Apply `f` to every number
    pub fn map(&self, f: impl Fn(FloatValue) -> FloatValue) -> ResultValue {
        match self {
            ResultValue::Scalar(v) => ResultValue::Scalar(f(*v)),
            ResultValue::Series(values) => ResultValue::Series(values.iter().map(|v| f(*v)).collect()),
            ResultValue::Missing => ResultValue::Missing,
        }
    }

    /// Combine two values element-wise
    ///
    /// A scalar is broadcast against a series. Two series must have the same length.
    pub fn zip_with(
        &self,
        other: &ResultValue,
        f: impl Fn(FloatValue, FloatValue) -> FloatValue,
    ) -> ImpactResult<ResultValue> {
        match (self, other) {
            (ResultValue::Missing, _) | (_, ResultValue::Missing) => Ok(ResultValue::Missing),
            (ResultValue::Scalar(a), ResultValue::Scalar(b)) => Ok(ResultValue::Scalar(f(*a, *b))),
            (ResultValue::Series(a), ResultValue::Scalar(b)) => {
                Ok(ResultValue::Series(a.iter().map(|x| f(*x, *b)).collect()))
            }
            (ResultValue::Scalar(a), ResultValue::Series(b)) => {
                Ok(ResultValue::Series(b.iter().map(|y| f(*a, *y)).collect()))
            }
            (ResultValue::Series(a), ResultValue::Series(b)) => {
                if a.len() != b.len() {
                    return Err(ImpactError::ShapeMismatch {
                        expected: a.len(),
                        found: b.len(),
                    });
                }
                Ok(ResultValue::Series(
                    a.iter().zip(b.iter()).map(|(x, y)| f(*x, *y)).collect(),
                ))
            }
        }
    }

    /// Prepend `value` to the existing numbers
    pub fn unshift(&self, value: FloatValue) -> ResultValue {
        let mut values = vec![value];
        values.extend(self.to_vec());
        ResultValue::Series(values)
    }
}

impl From<FloatValue> for ResultValue {
    fn from(value: FloatValue) -> Self {
        ResultValue::Scalar(value)
    }
}

impl From<Vec<FloatValue>> for ResultValue {
    fn from(values: Vec<FloatValue>) -> Self {
        ResultValue::Series(values)
    }
}

/// One `(year, value)` row for a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyResult {
    pub year: Year,
    pub value: ResultValue,
}

impl YearlyResult {
    pub fn new(year: Year, value: impl Into<ResultValue>) -> Self {
        Self {
            year,
            value: value.into(),
        }
    }

    pub fn missing(year: Year) -> Self {
        Self {
            year,
            value: ResultValue::Missing,
        }
    }
}

/// Binary operation used to combine a value with a reference value
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `x / y`
    #[default]
    Ratio,
    /// `x - y`
    Difference,
    /// `x * y`
    Product,
    /// `x + y`
    Sum,
    #[serde(skip)]
    Custom(fn(FloatValue, FloatValue) -> FloatValue),
}

impl BinaryOp {
    pub fn apply(&self, x: FloatValue, y: FloatValue) -> FloatValue {
        match self {
            BinaryOp::Ratio => x / y,
            BinaryOp::Difference => x - y,
            BinaryOp::Product => x * y,
            BinaryOp::Sum => x + y,
            BinaryOp::Custom(f) => f(x, y),
        }
    }

    /// Combine two result values element-wise
    pub fn combine(&self, x: &ResultValue, y: &ResultValue) -> ImpactResult<ResultValue> {
        x.zip_with(y, |a, b| self.apply(a, b))
    }
}

/// Titles for the value column(s) of a result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnLabels {
    Single(String),
    Multi(Vec<String>),
}

impl Default for ColumnLabels {
    fn default() -> Self {
        ColumnLabels::Single("fraction".to_string())
    }
}

impl ColumnLabels {
    /// The header row, starting with the year column
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["year".to_string()];
        match self {
            ColumnLabels::Single(label) => header.push(label.clone()),
            ColumnLabels::Multi(labels) => header.extend(labels.iter().cloned()),
        }
        header
    }
}

impl From<&str> for ColumnLabels {
    fn from(value: &str) -> Self {
        ColumnLabels::Single(value.to_string())
    }
}
