//! CSV loading and saving for time-indexed data
//!
//! Two surfaces: typed daily bar records (the common research input) and
//! generic frame persistence for arbitrary column sets.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use csv::{Reader, Writer};
use serde::{Deserialize, Serialize};

use crate::data::frame::TimeFrame;
use crate::error::{GraphError, Result};

/// Daily price bar record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    /// Calendar date of the bar
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: f64,
}

impl Bar {
    /// Timestamp of the bar (midnight UTC).
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.date.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Column order used when bars are converted to a frame.
pub const BAR_COLUMNS: [&str; 6] = ["open", "high", "low", "close", "adj_close", "volume"];

/// Load bar records from a CSV file, sorted by date.
pub fn load_bars<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
    let file = File::open(path)?;
    let mut reader = Reader::from_reader(file);

    let mut bars = Vec::new();
    for record in reader.deserialize() {
        let bar: Bar = record?;
        bars.push(bar);
    }
    bars.sort_by_key(|bar| bar.date);

    Ok(bars)
}

/// Save bar records to a CSV file.
pub fn save_bars<P: AsRef<Path>>(bars: &[Bar], path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = Writer::from_writer(file);

    for bar in bars {
        writer.serialize(bar)?;
    }
    writer.flush()?;

    Ok(())
}

/// Convert bar records into a frame indexed by their dates.
pub fn bars_to_frame(bars: &[Bar]) -> Result<TimeFrame> {
    let index = bars.iter().map(Bar::timestamp).collect();
    let columns = BAR_COLUMNS
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let values = bars
                .iter()
                .map(|bar| match c {
                    0 => bar.open,
                    1 => bar.high,
                    2 => bar.low,
                    3 => bar.close,
                    4 => bar.adj_close,
                    _ => bar.volume,
                })
                .collect();
            (name.to_string(), values)
        })
        .collect();
    TimeFrame::from_columns(index, columns)
}

/// Parse a timestamp cell: RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`.
fn parse_timestamp(cell: &str) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(cell) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S") {
        return Ok(t.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN).and_utc());
    }
    Err(GraphError::Parse(format!("unrecognized timestamp: {cell}")))
}

/// Load an arbitrary frame from CSV. The file must carry a `date` column;
/// every other column is read as `f64`, with empty cells undefined.
pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<TimeFrame> {
    let file = File::open(path)?;
    let mut reader = Reader::from_reader(file);

    let headers = reader.headers()?.clone();
    let date_position = headers
        .iter()
        .position(|name| name == "date")
        .ok_or_else(|| GraphError::MissingColumn("date".to_string()))?;
    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != date_position)
        .map(|(_, name)| name.to_string())
        .collect();

    let mut rows: Vec<(DateTime<Utc>, Vec<f64>)> = Vec::new();
    for record in reader.records() {
        let record = record?;
        let date_cell = record
            .get(date_position)
            .ok_or_else(|| GraphError::MissingColumn("date".to_string()))?;
        let timestamp = parse_timestamp(date_cell)?;

        let mut values = Vec::with_capacity(columns.len());
        for (i, cell) in record.iter().enumerate() {
            if i == date_position {
                continue;
            }
            if cell.is_empty() {
                values.push(f64::NAN);
            } else {
                values.push(
                    cell.parse::<f64>()
                        .map_err(|_| GraphError::Parse(format!("not a number: {cell}")))?,
                );
            }
        }
        rows.push((timestamp, values));
    }
    rows.sort_by_key(|(timestamp, _)| *timestamp);

    let index: Vec<DateTime<Utc>> = rows.iter().map(|(timestamp, _)| *timestamp).collect();
    let column_vectors = columns
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let values = rows.iter().map(|(_, row)| row[c]).collect();
            (name.clone(), values)
        })
        .collect();
    TimeFrame::from_columns(index, column_vectors)
}

/// Save a frame to CSV with a leading RFC 3339 `date` column. Undefined
/// cells are written empty.
pub fn save_frame<P: AsRef<Path>>(frame: &TimeFrame, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = Writer::from_writer(file);

    let mut header = vec!["date".to_string()];
    header.extend(frame.columns().iter().cloned());
    writer.write_record(&header)?;

    let values = frame.values();
    for (r, timestamp) in frame.index().iter().enumerate() {
        let mut record = vec![timestamp.to_rfc3339()];
        for c in 0..frame.n_cols() {
            let value = values[[r, c]];
            record.push(if value.is_nan() {
                String::new()
            } else {
                value.to_string()
            });
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;

    Ok(())
}
