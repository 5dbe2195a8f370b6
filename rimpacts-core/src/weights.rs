//! Per-region weights
//!
//! Weight tables are two-column `region,weight` CSV files. A row keyed `mean`
//! supplies the fallback used for regions that are not listed.

use crate::errors::{ImpactError, ImpactResult};
use crate::region::RegionId;
use crate::result::FloatValue;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Key of the fallback row in weight tables
pub const FALLBACK_KEY: &str = "mean";

/// Mapping from region to a non-negative weight
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightMap {
    weights: HashMap<RegionId, FloatValue>,
    fallback: Option<FloatValue>,
}

impl WeightMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, fallback: FloatValue) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn insert(&mut self, region: RegionId, weight: FloatValue) {
        self.weights.insert(region, weight);
    }

    pub fn fallback(&self) -> Option<FloatValue> {
        self.fallback
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// The weight listed for this region, ignoring the fallback
    pub fn explicit(&self, region: &RegionId) -> Option<FloatValue> {
        self.weights.get(region).copied()
    }

    /// The listed weight, or the fallback when the region is not listed
    pub fn get(&self, region: &RegionId) -> Option<FloatValue> {
        self.explicit(region).or(self.fallback)
    }

    /// Like [`WeightMap::get`] but a region without any weight is an error
    pub fn require(&self, region: &RegionId) -> ImpactResult<FloatValue> {
        self.get(region)
            .ok_or_else(|| ImpactError::MissingWeight(region.to_string()))
    }

    /// Like [`WeightMap::get`] but a region without any weight counts as zero
    pub fn get_or_zero(&self, region: &RegionId) -> FloatValue {
        self.get(region).unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionId, &FloatValue)> {
        self.weights.iter()
    }

    /// Read a `region,weight` table, multiplying every weight by `factor`
    ///
    /// Rows with an `NA` weight are skipped. Numeric codes are padded to county width.
    pub fn from_reader<R: Read>(reader: R, factor: FloatValue) -> ImpactResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut map = WeightMap::new();
        for record in reader.records() {
            let record = record?;
            let (Some(code), Some(value)) = (record.get(0), record.get(1)) else {
                continue;
            };
            let value = value.trim();
            if value == "NA" {
                continue;
            }
            let weight: FloatValue = match value.parse() {
                Ok(weight) => weight,
                // A header row is the only non-numeric row tolerated
                Err(_) if map.is_empty() && map.fallback.is_none() => {
                    debug!("Skipping weight table header {:?}", record);
                    continue;
                }
                Err(e) => {
                    return Err(ImpactError::Parse {
                        context: format!("weight for {}", code),
                        message: e.to_string(),
                    })
                }
            };

            if code.trim() == FALLBACK_KEY {
                map.fallback = Some(weight * factor);
            } else {
                map.insert(RegionId::county(code), weight * factor);
            }
        }
        Ok(map)
    }

    pub fn from_csv(path: impl AsRef<Path>, factor: FloatValue) -> ImpactResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file, factor)
    }

    /// Sum several weight maps region by region
    ///
    /// Fallbacks are summed over the maps that define one.
    pub fn merged_sum<'a>(maps: impl IntoIterator<Item = &'a WeightMap>) -> WeightMap {
        let mut merged = WeightMap::new();
        for map in maps {
            for (region, weight) in map.iter() {
                *merged.weights.entry(region.clone()).or_insert(0.0) += weight;
            }
            if let Some(fallback) = map.fallback {
                merged.fallback = Some(merged.fallback.unwrap_or(0.0) + fallback);
            }
        }
        merged
    }
}

impl FromIterator<(RegionId, FloatValue)> for WeightMap {
    fn from_iter<T: IntoIterator<Item = (RegionId, FloatValue)>>(iter: T) -> Self {
        Self {
            weights: iter.into_iter().collect(),
            fallback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_with_fallback() {
        let map: WeightMap = [(RegionId::new("01001"), 2.0)].into_iter().collect();
        let map = map.with_fallback(0.5);

        assert_eq!(map.explicit(&RegionId::new("01001")), Some(2.0));
        assert_eq!(map.explicit(&RegionId::new("01003")), None);
        assert_eq!(map.get(&RegionId::new("01003")), Some(0.5));
        assert_eq!(map.require(&RegionId::new("01003")).unwrap(), 0.5);
    }

    #[test]
    fn require_without_fallback() {
        let map: WeightMap = [(RegionId::new("01001"), 2.0)].into_iter().collect();
        assert!(matches!(
            map.require(&RegionId::new("99999")),
            Err(ImpactError::MissingWeight(region)) if region == "99999"
        ));
        assert_eq!(map.get_or_zero(&RegionId::new("99999")), 0.0);
    }

    #[test]
    fn parse_table() {
        let table = "fips,weight\n1001,2\n01003,NA\n36061,4.5\nmean,1.5\n";
        let map = WeightMap::from_reader(table.as_bytes(), 2.0).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.explicit(&RegionId::new("01001")), Some(4.0));
        assert_eq!(map.explicit(&RegionId::new("01003")), None);
        assert_eq!(map.explicit(&RegionId::new("36061")), Some(9.0));
        assert_eq!(map.fallback(), Some(3.0));
    }

    #[test]
    fn parse_error_after_header() {
        let table = "01001,1\n01003,abc\n";
        assert!(matches!(
            WeightMap::from_reader(table.as_bytes(), 1.0),
            Err(ImpactError::Parse { .. })
        ));
    }

    #[test]
    fn merge_sums_weights() {
        let a: WeightMap = [(RegionId::new("A"), 1.0), (RegionId::new("B"), 2.0)]
            .into_iter()
            .collect();
        let b: WeightMap = [(RegionId::new("B"), 3.0)].into_iter().collect();
        let b = b.with_fallback(1.0);

        let merged = WeightMap::merged_sum([&a, &b]);
        assert_eq!(merged.explicit(&RegionId::new("A")), Some(1.0));
        assert_eq!(merged.explicit(&RegionId::new("B")), Some(5.0));
        assert_eq!(merged.fallback(), Some(1.0));
    }
}
