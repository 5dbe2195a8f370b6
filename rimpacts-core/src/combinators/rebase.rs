//! Re-expressing results relative to a base year

use super::make::StreamHandler;
use crate::calendar::Year;
use crate::computation::YearlyStream;
use crate::errors::ImpactResult;
use crate::region::RegionId;
use crate::result::{BinaryOp, ResultValue, YearlyResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Re-express every year's value relative to the value of a base year
///
/// Years before the base year are held back until the base year is seen, then
/// emitted in order. The default operation is a ratio (`x / base`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rebase {
    /// Year supplying the reference value; `None` uses the first year
    pub base_year: Option<Year>,
    pub op: BinaryOp,
    /// If the base year never appears, emit the held-back values unchanged
    /// (`true`) or emit nothing (`false`)
    pub skip_on_missing: bool,
    /// Put the rebased value in front of the original values instead of replacing them
    pub unshift: bool,
}

impl Default for Rebase {
    fn default() -> Self {
        Self {
            base_year: None,
            op: BinaryOp::Ratio,
            skip_on_missing: true,
            unshift: false,
        }
    }
}

impl Rebase {
    pub fn to_year(base_year: Year) -> Self {
        Self {
            base_year: Some(base_year),
            ..Default::default()
        }
    }

    pub fn to_first_year() -> Self {
        Self::default()
    }

    pub fn with_op(mut self, op: BinaryOp) -> Self {
        self.op = op;
        self
    }

    pub fn skip_on_missing(mut self, skip_on_missing: bool) -> Self {
        self.skip_on_missing = skip_on_missing;
        self
    }

    pub fn unshift(mut self, unshift: bool) -> Self {
        self.unshift = unshift;
        self
    }

    fn rebased(&self, row: &YearlyResult, base: &ResultValue) -> ImpactResult<YearlyResult> {
        let value = if self.unshift {
            match (row.value.primary(), base.primary()) {
                (Some(x), Some(y)) => row.value.unshift(self.op.apply(x, y)),
                _ => ResultValue::Missing,
            }
        } else {
            self.op.combine(&row.value, base)?
        };
        Ok(YearlyResult::new(row.year, value))
    }
}

impl StreamHandler for Rebase {
    fn handle<'a>(&'a self, _region: &RegionId, stream: YearlyStream<'a>) -> YearlyStream<'a> {
        Box::new(RebaseStream {
            config: self,
            inner: stream,
            base: None,
            held: Vec::new(),
            ready: VecDeque::new(),
            finished: false,
        })
    }
}

struct RebaseStream<'a> {
    config: &'a Rebase,
    inner: YearlyStream<'a>,
    base: Option<ResultValue>,
    held: Vec<YearlyResult>,
    ready: VecDeque<ImpactResult<YearlyResult>>,
    finished: bool,
}

impl RebaseStream<'_> {
    fn accept(&mut self, row: YearlyResult) {
        if self.base.is_none() {
            let is_base = match self.config.base_year {
                Some(year) => row.year == year,
                None => true,
            };
            if !is_base {
                self.held.push(row);
                return;
            }

            let base = row.value.clone();
            for past in std::mem::take(&mut self.held) {
                self.ready.push_back(self.config.rebased(&past, &base));
            }
            self.base = Some(base);
        }

        if let Some(base) = &self.base {
            let rebased = self.config.rebased(&row, base);
            self.ready.push_back(rebased);
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        if self.base.is_none() && self.config.skip_on_missing {
            for past in std::mem::take(&mut self.held) {
                self.ready.push_back(Ok(past));
            }
        }
        self.held.clear();
    }
}

impl Iterator for RebaseStream<'_> {
    type Item = ImpactResult<YearlyResult>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            match self.inner.next() {
                Some(Ok(row)) => self.accept(row),
                Some(Err(e)) => {
                    self.finished = true;
                    self.held.clear();
                    return Some(Err(e));
                }
                None => self.finish(),
            }
        }
    }
}
