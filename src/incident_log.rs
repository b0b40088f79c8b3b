//! Append-only JSON-lines log with one record per camera per run.

use crate::camera::{Camera, CameraId};
use crate::metrics::RawMetrics;
use crate::risk::{IncidentType, RiskAssessment};
use crate::smoothing::SmoothedMetrics;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to write incident log {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read incident log {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("incident log lock poisoned")]
    Lock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Local wall-clock time of the run
    pub timestamp: DateTime<FixedOffset>,
    /// Camera display name
    pub camera: String,
    pub camera_id: CameraId,
    pub highway: Option<String>,
    pub risk: f64,
    pub incident_type: Option<IncidentType>,
    pub metrics_raw: RawMetrics,
    pub metrics_smoothed: SmoothedMetrics,
    pub alerted: bool,
}

impl LogRecord {
    pub fn new(
        camera: &Camera,
        timestamp: DateTime<FixedOffset>,
        assessment: &RiskAssessment,
        raw: RawMetrics,
        smoothed: SmoothedMetrics,
        alerted: bool,
    ) -> Self {
        Self {
            timestamp,
            camera: camera.name.clone(),
            camera_id: camera.id.clone(),
            highway: camera.highway.clone(),
            risk: round2(assessment.risk),
            incident_type: assessment.incident_type,
            metrics_raw: raw,
            metrics_smoothed: smoothed,
            alerted,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub trait IncidentLog {
    fn append(&self, record: &LogRecord) -> Result<(), LogError>;
}

#[derive(Debug, Clone)]
pub struct JsonlIncidentLog {
    path: PathBuf,
}

impl JsonlIncidentLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}

impl IncidentLog for JsonlIncidentLog {
    fn append(&self, record: &LogRecord) -> Result<(), LogError> {
        let line = serde_json::to_string(record)?;
        self.write_line(&line).map_err(|source| LogError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Reads every parseable record in file order. A missing file is an empty
/// log; blank or malformed lines are skipped.
pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<LogRecord>, LogError> {
    let path = path.as_ref();
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(LogError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| LogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<LogRecord>(line) {
            Ok(record) => records.push(record),
            Err(err) => warn!(line = index + 1, error = %err, "Skipping malformed log line"),
        }
    }
    Ok(records)
}

#[derive(Debug, Default)]
pub struct MemoryIncidentLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryIncidentLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl IncidentLog for MemoryIncidentLog {
    fn append(&self, record: &LogRecord) -> Result<(), LogError> {
        let mut guard = self.records.lock().map_err(|_| LogError::Lock)?;
        guard.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(label: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        Ok(std::env::temp_dir().join(format!("roadwatch-log-{label}-{unique}.jsonl")))
    }

    fn camera() -> Camera {
        Camera {
            id: "218".to_string(),
            name: "Malahat Summit".to_string(),
            highway: Some("1".to_string()),
            image_url: None,
        }
    }

    fn record(risk: f64, incident: Option<IncidentType>, alerted: bool) -> LogRecord {
        let timestamp = FixedOffset::west_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 1, 15, 8, 5, 9)
            .unwrap();
        LogRecord::new(
            &camera(),
            timestamp,
            &RiskAssessment {
                risk,
                incident_type: incident,
            },
            RawMetrics::default(),
            SmoothedMetrics::default(),
            alerted,
        )
    }

    #[test]
    fn risk_is_rounded_to_two_decimals() {
        assert_eq!(record(72.83333, None, false).risk, 72.83);
        assert_eq!(record(91.005_1, None, false).risk, 91.01);
    }

    #[test]
    fn record_serializes_expected_keys() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(record(0.0, None, false))?;

        assert_eq!(value["timestamp"], "2026-01-15T08:05:09-08:00");
        assert_eq!(value["camera"], "Malahat Summit");
        assert_eq!(value["camera_id"], "218");
        assert_eq!(value["highway"], "1");
        assert!(value["incident_type"].is_null());
        assert_eq!(value["alerted"], false);
        assert!(value["metrics_raw"]["motion_score"].is_number());
        assert!(value["metrics_smoothed"]["occupancy_score"].is_number());
        Ok(())
    }

    #[test]
    fn jsonl_log_appends_lines() -> Result<(), Box<dyn std::error::Error>> {
        let path = temp_path("append")?;
        let log = JsonlIncidentLog::new(&path);

        log.append(&record(0.0, None, false))?;
        log.append(&record(90.0, Some(IncidentType::BlockedOrClosedLane), true))?;
        let contents = fs::read_to_string(&path)?;
        let records = read_all(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(contents.lines().count(), 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].incident_type, Some(IncidentType::BlockedOrClosedLane));
        assert!(records[1].alerted);
        Ok(())
    }

    #[test]
    fn read_all_skips_blank_and_malformed_lines() -> Result<(), Box<dyn std::error::Error>> {
        let path = temp_path("malformed")?;
        let good = serde_json::to_string(&record(70.0, Some(IncidentType::MajorSlowdown), false))?;
        fs::write(&path, format!("{good}\n\n{{not json\n{good}\n"))?;

        let records = read_all(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(records.len(), 2);
        Ok(())
    }

    #[test]
    fn missing_log_reads_as_empty() -> Result<(), Box<dyn std::error::Error>> {
        let path = temp_path("missing")?;
        assert!(read_all(&path)?.is_empty());
        Ok(())
    }
}
