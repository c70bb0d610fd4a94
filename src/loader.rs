use crate::error::{DashboardError, Result};
use crate::record::{
    AGE_GROUP, DEATH_RATE, GENDER, INJURY_RATE, Metric, REQUIRED_COLUMNS, Record, RecordTable,
    VEHICLE_TYPE, YEAR,
};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Where the dashboard gets its records from
#[derive(Clone, Debug, PartialEq)]
pub enum DataSource {
    /// Fetched over HTTP(S) on every run
    Remote(String),

    /// Supplied by the signed-in user through the upload form
    Upload,

    /// Read from a local CSV file on every run
    File(PathBuf),
}

/// Load records from a local CSV file
///
/// # Examples
/// ```no_run
/// use dashboard::loader::from_csv;
///
/// match from_csv("road_traffic_injuries_sample.csv") {
///     Ok(table) => println!("Loaded {} records", table.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<RecordTable> {
    let path = filepath.as_ref();
    let bytes = std::fs::read(path)?;
    let table = parse_csv(&bytes)?;
    info!("loaded {} records from {}", table.len(), path.display());
    Ok(table)
}

/// Load records from the body of an uploaded file
///
/// An empty body means the form was submitted without a file.
pub fn from_upload(bytes: &[u8]) -> Result<RecordTable> {
    if bytes.is_empty() {
        return Err(DashboardError::NoUpload);
    }
    let table = parse_csv(bytes)?;
    info!("loaded {} records from upload", table.len());
    Ok(table)
}

/// Download and parse the CSV at `url`
///
/// A non-success status is treated like a network error. Nothing is retried.
#[cfg(feature = "web")]
pub async fn fetch_remote(client: &reqwest::Client, url: &str) -> Result<RecordTable> {
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    let table = parse_csv(&body)?;
    info!("fetched {} records from {}", table.len(), url);
    Ok(table)
}

/// Positions of the required columns within the header row
struct ColumnIndex {
    gender: usize,
    year: usize,
    age_group: usize,
    vehicle_type: usize,
    death_rate: usize,
    injury_rate: usize,
}

impl ColumnIndex {
    /// Locate every required column by name, reporting all absent ones at once
    fn from_header(header: &StringRecord) -> Result<Self> {
        let find = |name: &str| header.iter().position(|h| h == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .into_iter()
            .filter(|&name| find(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DashboardError::MissingColumns(missing));
        }

        // All present, checked above
        let at = |name: &str| find(name).unwrap_or_default();
        Ok(ColumnIndex {
            gender: at(GENDER),
            year: at(YEAR),
            age_group: at(AGE_GROUP),
            vehicle_type: at(VEHICLE_TYPE),
            death_rate: at(DEATH_RATE),
            injury_rate: at(INJURY_RATE),
        })
    }

    /// Build one record from a data row; short rows read as empty cells
    fn record(&self, row: &StringRecord) -> Result<Record> {
        let line = row.position().map_or(0, |p| p.line() as usize);
        let field = |i: usize| row.get(i).unwrap_or("");

        let year_raw = field(self.year);
        let year = parse_year(year_raw).ok_or_else(|| DashboardError::MalformedRow {
            line,
            column: YEAR,
            value: year_raw.to_string(),
        })?;

        Ok(Record {
            gender: field(self.gender).to_string(),
            year,
            age_group: field(self.age_group).to_string(),
            vehicle_type: field(self.vehicle_type).to_string(),
            death_rate: parse_rate(field(self.death_rate), line, Metric::Death)?,
            injury_rate: parse_rate(field(self.injury_rate), line, Metric::Injury)?,
        })
    }
}

/// Parse CSV bytes into a record table
///
/// The header row decides column positions, so column order is free and
/// extra columns are ignored. Missing required columns fail immediately,
/// before any row is read. Quoted fields may span lines; text that is not
/// valid UTF-8 is rejected rather than patched.
pub fn parse_csv(bytes: &[u8]) -> Result<RecordTable> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let header = reader.headers()?.clone();
    if header.iter().all(str::is_empty) {
        return Err(DashboardError::EmptyInput);
    }
    let index = ColumnIndex::from_header(&header)?;

    let table = reader
        .records()
        .map(|row| index.record(&row?))
        .collect::<Result<RecordTable>>()?;

    if table.is_empty() {
        return Err(DashboardError::EmptyInput);
    }

    debug!("parsed {} rows, {} columns", table.len(), header.len());
    Ok(table)
}

// Years sometimes arrive as "2020.0" when the exporting tool widened the column to float
fn parse_year(raw: &str) -> Option<i32> {
    if let Ok(year) = raw.parse::<i32>() {
        return Some(year);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 {
        Some(value as i32)
    } else {
        None
    }
}

// Empty cells and NaN markers are missing values, not zeros
fn parse_rate(raw: &str, line: usize, metric: Metric) -> Result<Option<f64>> {
    if raw.is_empty() || matches!(raw, "NaN" | "nan" | "NA" | "N/A") {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_nan() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(_) => Err(DashboardError::MalformedRow {
            line,
            column: metric.column(),
            value: raw.to_string(),
        }),
    }
}
