//! Sales record ingestion
//!
//! Reads the sales CSV (one title per row) and validates each row into a
//! [`SalesRecord`]. Rows that cannot be used are not errors: each one yields a
//! [`RowOutcome::Skipped`] with its reason, and the outcomes are collected
//! into an [`IngestReport`].

use crate::errors::{Result, SalesError};
use crate::table::col;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::ops::RangeInclusive;
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Release years accepted by ingestion
pub const YEAR_RANGE: RangeInclusive<i32> = 1970..=2100;

/// One validated sales observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub name: String,
    pub platform: String,
    pub genre: String,
    pub publisher: String,
    pub year: i32,
    pub na_sales: f64,
    pub eu_sales: f64,
    pub jp_sales: f64,
    pub other_sales: f64,
    /// Target: global unit sales in millions
    pub global_sales: f64,
}

/// Why a row was excluded from the working set
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("missing value in {0}")]
    MissingField(&'static str),

    #[error("non-numeric value {value:?} in {column}")]
    NonNumeric { column: &'static str, value: String },

    #[error("negative value in {0}")]
    NegativeValue(&'static str),

    #[error("year {0} outside accepted range")]
    YearOutOfRange(i32),

    #[error("global sales must be positive")]
    NonPositiveTarget,

    #[error("malformed row: {0}")]
    Malformed(String),
}

impl SkipReason {
    /// Stable key used to aggregate skip counts
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::MissingField(_) => "missing_field",
            SkipReason::NonNumeric { .. } => "non_numeric",
            SkipReason::NegativeValue(_) => "negative_value",
            SkipReason::YearOutOfRange(_) => "year_out_of_range",
            SkipReason::NonPositiveTarget => "non_positive_target",
            SkipReason::Malformed(_) => "malformed",
        }
    }
}

/// Result of validating a single input row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Accepted(SalesRecord),
    Skipped(SkipReason),
}

/// A skipped row and the 1-based data line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub line: usize,
    pub reason: SkipReason,
}

/// Accumulated outcome of ingesting a batch of rows
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub records: Vec<SalesRecord>,
    pub skipped: Vec<SkippedRow>,
}

impl IngestReport {
    /// Collect per-row outcomes, numbering rows from 1
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = RowOutcome>,
    {
        let mut report = Self::default();
        for (idx, outcome) in outcomes.into_iter().enumerate() {
            report.push(idx + 1, outcome);
        }
        report
    }

    pub fn push(&mut self, line: usize, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Accepted(record) => self.records.push(record),
            RowOutcome::Skipped(reason) => self.skipped.push(SkippedRow { line, reason }),
        }
    }

    pub fn accepted_count(&self) -> usize {
        self.records.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Skip counts keyed by [`SkipReason::kind`]
    pub fn skipped_by_reason(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.skipped {
            *counts.entry(row.reason.kind().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Fail when nothing survived exclusion
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.records.is_empty() {
            return Err(SalesError::NoTrainingRows {
                excluded: self.skipped.len(),
            });
        }
        Ok(())
    }
}

/// Row as it appears in the CSV, before validation
#[derive(Debug, Default, Deserialize)]
pub struct RawSalesRow {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Platform", default)]
    pub platform: Option<String>,
    #[serde(rename = "Genre", default)]
    pub genre: Option<String>,
    #[serde(rename = "Publisher", default)]
    pub publisher: Option<String>,
    #[serde(rename = "Year", default)]
    pub year: Option<String>,
    #[serde(rename = "NA_Sales", default)]
    pub na_sales: Option<String>,
    #[serde(rename = "EU_Sales", default)]
    pub eu_sales: Option<String>,
    #[serde(rename = "JP_Sales", default)]
    pub jp_sales: Option<String>,
    #[serde(rename = "Other_Sales", default)]
    pub other_sales: Option<String>,
    #[serde(rename = "Global_Sales", default)]
    pub global_sales: Option<String>,
}

impl RawSalesRow {
    /// Validate into a record or a skip reason
    pub fn validate(self) -> RowOutcome {
        match self.try_into_record() {
            Ok(record) => RowOutcome::Accepted(record),
            Err(reason) => RowOutcome::Skipped(reason),
        }
    }

    fn try_into_record(self) -> std::result::Result<SalesRecord, SkipReason> {
        let name = required_text(self.name, col::NAME)?;
        let platform = required_text(self.platform, col::PLATFORM)?;
        let genre = required_text(self.genre, col::GENRE)?;
        let publisher = required_text(self.publisher, col::PUBLISHER)?;

        let year = parse_year(self.year)?;
        let na_sales = parse_sales(self.na_sales, col::NA_SALES)?;
        let eu_sales = parse_sales(self.eu_sales, col::EU_SALES)?;
        let jp_sales = parse_sales(self.jp_sales, col::JP_SALES)?;
        let other_sales = parse_sales(self.other_sales, col::OTHER_SALES)?;
        let global_sales = parse_sales(self.global_sales, col::GLOBAL_SALES)?;
        if global_sales <= 0.0 {
            return Err(SkipReason::NonPositiveTarget);
        }

        Ok(SalesRecord {
            name,
            platform,
            genre,
            publisher,
            year,
            na_sales,
            eu_sales,
            jp_sales,
            other_sales,
            global_sales,
        })
    }
}

fn required_text(
    value: Option<String>,
    column: &'static str,
) -> std::result::Result<String, SkipReason> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SkipReason::MissingField(column)),
    }
}

fn parse_number(value: Option<String>, column: &'static str) -> std::result::Result<f64, SkipReason> {
    let text = required_text(value, column)?;
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(SkipReason::NonNumeric {
            column,
            value: text,
        }),
    }
}

fn parse_sales(value: Option<String>, column: &'static str) -> std::result::Result<f64, SkipReason> {
    let v = parse_number(value, column)?;
    if v < 0.0 {
        return Err(SkipReason::NegativeValue(column));
    }
    Ok(v)
}

// Years are sometimes exported as floats ("2006.0"); only whole values pass.
fn parse_year(value: Option<String>) -> std::result::Result<i32, SkipReason> {
    let v = parse_number(value.clone(), col::YEAR)?;
    if v.fract() != 0.0 || v < f64::from(i32::MIN) || v > f64::from(i32::MAX) {
        return Err(SkipReason::NonNumeric {
            column: col::YEAR,
            value: value.unwrap_or_default(),
        });
    }
    let year = v as i32;
    if !YEAR_RANGE.contains(&year) {
        return Err(SkipReason::YearOutOfRange(year));
    }
    Ok(year)
}

const REQUIRED_HEADERS: [&str; 10] = [
    col::NAME,
    col::PLATFORM,
    col::GENRE,
    col::PUBLISHER,
    col::YEAR,
    col::NA_SALES,
    col::EU_SALES,
    col::JP_SALES,
    col::OTHER_SALES,
    col::GLOBAL_SALES,
];

/// Read and validate sales rows from any CSV source
///
/// A header row is required; extra columns (e.g. `Rank`) are ignored.
/// Fails with [`SalesError::ColumnMissing`] when a schema column is absent
/// from the header.
pub fn read_csv<R: Read>(reader: R) -> Result<IngestReport> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    for required in REQUIRED_HEADERS {
        if !headers.iter().any(|h| h == required) {
            return Err(SalesError::ColumnMissing(required.to_string()));
        }
    }

    let mut report = IngestReport::default();
    for (idx, row) in csv_reader.deserialize::<RawSalesRow>().enumerate() {
        let outcome = match row {
            Ok(raw) => raw.validate(),
            Err(err) => RowOutcome::Skipped(SkipReason::Malformed(err.to_string())),
        };
        report.push(idx + 1, outcome);
    }
    Ok(report)
}

/// Load and validate the sales CSV at `path`
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<IngestReport> {
    let file = std::fs::File::open(path.as_ref())?;
    let report = read_csv(std::io::BufReader::new(file))?;

    info!(
        "Loaded {} rows ({} skipped)",
        report.accepted_count(),
        report.skipped_count()
    );
    for (reason, count) in report.skipped_by_reason() {
        warn!("Skipped {} rows: {}", count, reason);
    }
    Ok(report)
}
