//! Result sinks - append-only persistence of trial records
//!
//! Workers write concurrently; each record is written and flushed under a
//! single lock so rows never interleave.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::core::error::SinkError;
use crate::core::monte_carlo::TrialOutcome;

/// Receives every trial outcome as it completes
pub trait ResultSink: Sync {
    fn write(&self, outcome: &TrialOutcome) -> Result<(), SinkError>;
}

/// Header row: trial identity, swept fields, status, measurements and the
/// four clearance components of every bandolier (1-based)
pub fn header(swept_fields: &[String], bandoliers: usize) -> Vec<String> {
    let mut columns = vec!["trial".to_string(), "seed".to_string()];
    columns.extend(swept_fields.iter().cloned());
    columns.extend(["status", "stable", "totalWidth"].map(String::from));
    for k in 1..=bandoliers {
        for suffix in [
            "upperDistanceX",
            "upperDistanceY",
            "lowerDistanceX",
            "lowerDistanceY",
        ] {
            columns.push(format!("Bando{}_{}", k, suffix));
        }
    }
    columns
}

/// One row matching [`header`]; failed trials leave the measurements empty
pub fn record(outcome: &TrialOutcome, bandoliers: usize) -> Vec<String> {
    let mut row = vec![outcome.index.to_string(), outcome.seed.to_string()];
    row.extend(outcome.variant.display_values());
    row.push(outcome.status().to_string());

    match &outcome.result {
        Ok(result) => {
            row.push(result.stable.to_string());
            row.push(result.total_width.to_string());
            for k in 0..bandoliers {
                match result.clearances.get(k) {
                    Some(c) => row.extend(
                        [c.upper_x, c.upper_y, c.lower_x, c.lower_y].map(|v| v.to_string()),
                    ),
                    None => row.extend(std::iter::repeat(String::new()).take(4)),
                }
            }
        }
        Err(_) => row.extend(std::iter::repeat(String::new()).take(2 + 4 * bandoliers)),
    }
    row
}

/// CSV sink with a header fixed at construction
pub struct CsvSink<W: Write> {
    writer: Mutex<csv::Writer<W>>,
    bandoliers: usize,
}

impl CsvSink<File> {
    pub fn create(
        path: &Path,
        swept_fields: &[String],
        bandoliers: usize,
    ) -> Result<Self, SinkError> {
        Self::new(File::create(path)?, swept_fields, bandoliers)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W, swept_fields: &[String], bandoliers: usize) -> Result<Self, SinkError> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(header(swept_fields, bandoliers))?;
        writer.flush()?;
        Ok(Self {
            writer: Mutex::new(writer),
            bandoliers,
        })
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W, SinkError> {
        let writer = self.writer.into_inner().map_err(|_| SinkError::Poisoned)?;
        writer.into_inner().map_err(|e| SinkError::Io(e.into_error()))
    }
}

impl<W: Write + Send> ResultSink for CsvSink<W> {
    fn write(&self, outcome: &TrialOutcome) -> Result<(), SinkError> {
        let row = record(outcome, self.bandoliers);
        let mut writer = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        writer.write_record(&row)?;
        writer.flush()?;
        Ok(())
    }
}
