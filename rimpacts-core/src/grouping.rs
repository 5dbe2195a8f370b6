//! Grouping of fine regions into coarser regions

use crate::errors::{ImpactError, ImpactResult};
use crate::region::RegionId;
use log::warn;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Code of the single region produced by [`Grouping::National`]
pub const NATIONAL: &str = "national";

type GroupFn = dyn Fn(&RegionId) -> Option<RegionId> + Send + Sync;

/// Maps a fine region to the coarse region it contributes to
///
/// Returning `None` excludes the region from the aggregation.
#[derive(Clone)]
pub enum Grouping {
    /// The first two characters of the code (counties to states)
    State,
    /// Every region contributes to one national total
    National,
    /// The first `n` characters of the code
    Prefix(usize),
    /// Explicit definitions, usually loaded from a CSV file
    Lookup {
        title: String,
        regions: HashMap<RegionId, RegionId>,
    },
    /// An arbitrary function
    Custom { title: String, func: Arc<GroupFn> },
}

impl Grouping {
    pub fn custom<F>(title: &str, func: F) -> Self
    where
        F: Fn(&RegionId) -> Option<RegionId> + Send + Sync + 'static,
    {
        Grouping::Custom {
            title: title.to_string(),
            func: Arc::new(func),
        }
    }

    /// The coarse region for `region`, if any
    pub fn group(&self, region: &RegionId) -> Option<RegionId> {
        match self {
            Grouping::State => region.prefix(2),
            Grouping::National => Some(RegionId::new(NATIONAL)),
            Grouping::Prefix(n) => region.prefix(*n),
            Grouping::Lookup { regions, .. } => regions.get(region).cloned(),
            Grouping::Custom { func, .. } => func(region),
        }
    }

    /// Name used to label the aggregated bundle
    pub fn title(&self) -> &str {
        match self {
            Grouping::State => "state",
            Grouping::National => NATIONAL,
            Grouping::Prefix(_) => "region",
            Grouping::Lookup { title, .. } => title,
            Grouping::Custom { title, .. } => title,
        }
    }

    /// Read region definitions from a CSV table with a header row
    ///
    /// `region_column` holds the coarse region name and `code_column` the fine
    /// region code. Codes are padded to county width.
    pub fn from_definitions<R: Read>(
        reader: R,
        region_column: usize,
        code_column: usize,
        title: &str,
    ) -> ImpactResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut regions = HashMap::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let (Some(region), Some(code)) = (record.get(region_column), record.get(code_column))
            else {
                return Err(ImpactError::Parse {
                    context: format!("region definition on row {}", line + 2),
                    message: format!(
                        "expected columns {} and {}, found {} fields",
                        region_column,
                        code_column,
                        record.len()
                    ),
                });
            };

            let code = RegionId::county(code);
            if regions.contains_key(&code) {
                warn!("Duplicate region for code {}", code);
            }
            regions.insert(code, RegionId::new(region));
        }

        Ok(Grouping::Lookup {
            title: title.to_string(),
            regions,
        })
    }

    pub fn from_definitions_csv(
        path: impl AsRef<Path>,
        region_column: usize,
        code_column: usize,
        title: &str,
    ) -> ImpactResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_definitions(file, region_column, code_column, title)
    }
}

impl fmt::Debug for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::State => write!(f, "Grouping::State"),
            Grouping::National => write!(f, "Grouping::National"),
            Grouping::Prefix(n) => write!(f, "Grouping::Prefix({})", n),
            Grouping::Lookup { title, regions } => f
                .debug_struct("Grouping::Lookup")
                .field("title", title)
                .field("regions", &regions.len())
                .finish(),
            Grouping::Custom { title, .. } => f
                .debug_struct("Grouping::Custom")
                .field("title", title)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_groupings() {
        let county = RegionId::new("36061");
        assert_eq!(Grouping::State.group(&county), Some(RegionId::new("36")));
        assert_eq!(
            Grouping::National.group(&county),
            Some(RegionId::new(NATIONAL))
        );
        assert_eq!(Grouping::Prefix(3).group(&county), Some(RegionId::new("360")));
        assert_eq!(Grouping::State.title(), "state");
    }

    #[test]
    fn custom_grouping_can_exclude() {
        let grouping = Grouping::custom("coastal", |region| {
            if region.as_str().starts_with('0') {
                Some(RegionId::new("coast"))
            } else {
                None
            }
        });
        assert_eq!(
            grouping.group(&RegionId::new("06037")),
            Some(RegionId::new("coast"))
        );
        assert_eq!(grouping.group(&RegionId::new("36061")), None);
        assert_eq!(grouping.title(), "coastal");
    }

    #[test]
    fn definitions_table() {
        let table = "name,fips\nNortheast,36061\nWest,6037\nWest,06073\n";
        let grouping = Grouping::from_definitions(table.as_bytes(), 0, 1, "census").unwrap();

        assert_eq!(
            grouping.group(&RegionId::new("06037")),
            Some(RegionId::new("West"))
        );
        assert_eq!(
            grouping.group(&RegionId::new("36061")),
            Some(RegionId::new("Northeast"))
        );
        assert_eq!(grouping.group(&RegionId::new("01001")), None);
        assert_eq!(grouping.title(), "census");
    }

    #[test]
    fn definitions_table_missing_column() {
        let table = "name,fips\nNortheast\n";
        assert!(Grouping::from_definitions(table.as_bytes(), 0, 1, "census").is_err());
    }
}
