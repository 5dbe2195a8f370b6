//! Storage of per-region yearly results
//!
//! A bundle holds one table of yearly results per region. [`DirectoryBundle`]
//! keeps each region in its own `<region>.csv` file:
//!
//! ```text
//! year,fraction
//! 2000,0.98
//! 2001,NA
//! ```
//!
//! [`MemoryBundle`] keeps the same tables in memory.

use crate::calendar::Year;
use crate::errors::{ImpactError, ImpactResult};
use crate::region::RegionId;
use crate::result::{ColumnLabels, FloatValue, ResultValue, YearlyResult, MISSING_MARKER};
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const EXTENSION: &str = "csv";

/// Row iterator handed to a sink
pub type RowIter<'r> = dyn Iterator<Item = ImpactResult<YearlyResult>> + 'r;

/// Destination for the results of one pass
pub trait ResultSink {
    /// Write all rows for a region, returning the number of rows written
    ///
    /// If pulling a row fails, nothing is stored for the region and the error is returned.
    fn write_region(
        &mut self,
        region: &RegionId,
        labels: &ColumnLabels,
        rows: &mut RowIter<'_>,
    ) -> ImpactResult<usize>;
}

/// Previously written results
pub trait ResultSource {
    fn regions(&self) -> ImpactResult<Vec<RegionId>>;

    /// The rows stored for a region, or `None` if the region has no results
    fn read_region(&self, region: &RegionId) -> ImpactResult<Option<Vec<YearlyResult>>>;
}

fn write_rows<W: Write>(
    writer: W,
    labels: &ColumnLabels,
    rows: &mut RowIter<'_>,
) -> ImpactResult<usize> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    let header = labels.header();
    let n_labels = header.len() - 1;
    writer.write_record(&header)?;

    let mut count = 0;
    for row in rows {
        let row = row?;
        let mut record = vec![row.year.to_string()];
        match &row.value {
            ResultValue::Missing => {
                record.extend(std::iter::repeat(MISSING_MARKER.to_string()).take(n_labels))
            }
            value => record.extend(value.to_vec().iter().map(format_value)),
        }
        writer.write_record(&record)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

fn format_value(value: &FloatValue) -> String {
    if value.is_nan() {
        MISSING_MARKER.to_string()
    } else {
        value.to_string()
    }
}

fn parse_field(field: &str, context: &dyn Fn() -> String) -> ImpactResult<FloatValue> {
    if field == MISSING_MARKER {
        return Ok(FloatValue::NAN);
    }
    field.trim().parse().map_err(|_| ImpactError::Parse {
        context: context(),
        message: format!("invalid number {:?}", field),
    })
}

/// Parse a result table written by [`DirectoryBundle`]
pub fn read_rows<R: Read>(reader: R, name: &str) -> ImpactResult<Vec<YearlyResult>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let context = || format!("{} row {}", name, line + 2);

        let year: Year = record
            .get(0)
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| ImpactError::Parse {
                context: context(),
                message: "invalid year".to_string(),
            })?;

        let fields: Vec<&str> = record.iter().skip(1).collect();
        let value = if fields.is_empty() || fields.iter().all(|f| *f == MISSING_MARKER) {
            ResultValue::Missing
        } else if fields.len() == 1 {
            ResultValue::Scalar(parse_field(fields[0], &context)?)
        } else {
            ResultValue::Series(
                fields
                    .iter()
                    .map(|f| parse_field(f, &context))
                    .collect::<ImpactResult<_>>()?,
            )
        };
        rows.push(YearlyResult { year, value });
    }
    Ok(rows)
}

/// A bundle stored as one CSV file per region in a directory
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    dir: PathBuf,
    index: BTreeSet<RegionId>,
}

impl DirectoryBundle {
    /// Create the directory if needed and index any results already present
    pub fn create(dir: impl AsRef<Path>) -> ImpactResult<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Self::open(dir)
    }

    /// Index an existing bundle directory
    pub fn open(dir: impl AsRef<Path>) -> ImpactResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut index = BTreeSet::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                index.insert(RegionId::new(stem));
            }
        }
        debug!("Opened bundle {} with {} regions", dir.display(), index.len());
        Ok(Self { dir, index })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, region: &RegionId) -> bool {
        self.index.contains(region)
    }

    pub fn path_for(&self, region: &RegionId) -> PathBuf {
        self.dir.join(format!("{}.{}", region, EXTENSION))
    }

    /// The sibling bundle holding results aggregated with the named grouping
    ///
    /// For a bundle at `results/yields` and a `state` grouping this is
    /// `results/yields-state`.
    pub fn aggregated(&self, title: &str) -> ImpactResult<DirectoryBundle> {
        let name = self
            .dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ImpactError::InvalidParameter(format!(
                    "bundle directory {} has no name",
                    self.dir.display()
                ))
            })?;
        let sibling = self.dir.with_file_name(format!("{}-{}", name, title));
        DirectoryBundle::create(sibling)
    }
}

impl ResultSink for DirectoryBundle {
    fn write_region(
        &mut self,
        region: &RegionId,
        labels: &ColumnLabels,
        rows: &mut RowIter<'_>,
    ) -> ImpactResult<usize> {
        // Renamed into place only once every row has been written
        let mut file = NamedTempFile::new_in(&self.dir)?;
        let count = write_rows(file.as_file_mut(), labels, rows)?;
        file.persist(self.path_for(region))
            .map_err(|e| ImpactError::Io(e.error))?;

        self.index.insert(region.clone());
        Ok(count)
    }
}

impl ResultSource for DirectoryBundle {
    fn regions(&self) -> ImpactResult<Vec<RegionId>> {
        Ok(self.index.iter().cloned().collect())
    }

    fn read_region(&self, region: &RegionId) -> ImpactResult<Option<Vec<YearlyResult>>> {
        if !self.index.contains(region) {
            return Ok(None);
        }
        let path = self.path_for(region);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Region {} is indexed but {} is gone", region, path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        read_rows(file, &path.display().to_string()).map(Some)
    }
}

/// A bundle held in memory
///
/// Regions are listed in the order they were first written.
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    order: Vec<RegionId>,
    tables: HashMap<RegionId, (ColumnLabels, Vec<YearlyResult>)>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn labels(&self, region: &RegionId) -> Option<&ColumnLabels> {
        self.tables.get(region).map(|(labels, _)| labels)
    }

    pub fn rows(&self, region: &RegionId) -> Option<&[YearlyResult]> {
        self.tables.get(region).map(|(_, rows)| rows.as_slice())
    }

    pub fn insert(&mut self, region: RegionId, labels: ColumnLabels, rows: Vec<YearlyResult>) {
        if !self.tables.contains_key(&region) {
            self.order.push(region.clone());
        }
        self.tables.insert(region, (labels, rows));
    }
}

impl ResultSink for MemoryBundle {
    fn write_region(
        &mut self,
        region: &RegionId,
        labels: &ColumnLabels,
        rows: &mut RowIter<'_>,
    ) -> ImpactResult<usize> {
        let rows = rows.collect::<ImpactResult<Vec<_>>>()?;
        let count = rows.len();
        self.insert(region.clone(), labels.clone(), rows);
        Ok(count)
    }
}

impl ResultSource for MemoryBundle {
    fn regions(&self) -> ImpactResult<Vec<RegionId>> {
        Ok(self.order.clone())
    }

    fn read_region(&self, region: &RegionId) -> ImpactResult<Option<Vec<YearlyResult>>> {
        Ok(self.rows(region).map(|rows| rows.to_vec()))
    }
}
