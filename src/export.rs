//! CSV and JSON export of presence history.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::{
    models::DetectionSession,
    observer::{LogLevel, LogSink},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

pub const NO_DATA_MESSAGE: &str = "No data to export.";
const CSV_HEADER: [&str; 4] = ["Start time", "End time", "Duration (s)", "Context"];
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of an export: a success flag plus a message meant for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub success: bool,
    pub message: String,
    pub paths: Vec<PathBuf>,
}

impl ExportReport {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
}

impl Format {
    fn label(&self) -> &'static str {
        match self {
            Format::Csv => "CSV",
            Format::Json => "JSON",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }
}

pub struct DataExporter {
    export_dir: PathBuf,
    log_sink: Option<Arc<dyn LogSink>>,
}

impl DataExporter {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
            log_sink: None,
        }
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// One row per session; duration with two decimals.
    pub fn export_csv(&self, history: &[DetectionSession], path: Option<&Path>) -> ExportReport {
        self.export(Format::Csv, history, path, &file_stamp())
    }

    /// The session list as a pretty-printed JSON array.
    pub fn export_json(&self, history: &[DetectionSession], path: Option<&Path>) -> ExportReport {
        self.export(Format::Json, history, path, &file_stamp())
    }

    /// Both formats under the same timestamp. Succeeds only if both do; when
    /// either fails, the file the other one wrote is removed again.
    pub fn export_all(&self, history: &[DetectionSession]) -> ExportReport {
        if history.is_empty() {
            return ExportReport::failure(NO_DATA_MESSAGE);
        }
        self.export_pair(history, &file_stamp())
    }

    fn export_pair(&self, history: &[DetectionSession], stamp: &str) -> ExportReport {
        let csv = self.export(Format::Csv, history, None, stamp);
        let json = self.export(Format::Json, history, None, stamp);
        let message = format!("{}\n{}", csv.message, json.message);

        if csv.success && json.success {
            return ExportReport {
                success: true,
                message,
                paths: csv.paths.into_iter().chain(json.paths).collect(),
            };
        }

        for path in csv.paths.iter().chain(&json.paths) {
            if let Err(err) = fs::remove_file(path) {
                log_error!("failed to remove partial export {}: {err}", path.display());
            }
        }
        ExportReport::failure(message)
    }

    fn export(
        &self,
        format: Format,
        history: &[DetectionSession],
        path: Option<&Path>,
        stamp: &str,
    ) -> ExportReport {
        if history.is_empty() {
            return ExportReport::failure(NO_DATA_MESSAGE);
        }

        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self
                .export_dir
                .join(format!("detections_{stamp}.{}", format.extension())),
        };

        let result = ensure_parent(&path).and_then(|_| match format {
            Format::Csv => write_csv(&path, history),
            Format::Json => write_json(&path, history),
        });

        match result {
            Ok(()) => {
                log_info!("exported {} sessions to {}", history.len(), path.display());
                let message = format!("Exported {}: {}", format.label(), path.display());
                self.report(&message, LogLevel::Success);
                ExportReport {
                    success: true,
                    message,
                    paths: vec![path],
                }
            }
            Err(err) => {
                log_error!("{} export to {} failed: {err:?}", format.label(), path.display());
                if path.is_file() {
                    let _ = fs::remove_file(&path);
                }
                let message = format!(
                    "{} export failed: {} ({err:#})",
                    format.label(),
                    path.display()
                );
                self.report(&message, LogLevel::Error);
                ExportReport::failure(message)
            }
        }
    }

    fn report(&self, message: &str, level: LogLevel) {
        if let Some(sink) = &self.log_sink {
            sink.log(message, level);
        }
    }
}

fn file_stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .with_context(|| format!("failed to create export directory {}", parent.display())),
        _ => Ok(()),
    }
}

fn write_csv(path: &Path, history: &[DetectionSession]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(CSV_HEADER)?;
    for session in history {
        writer.write_record([
            session.start_time().format(TIME_FORMAT).to_string(),
            session.end_time().format(TIME_FORMAT).to_string(),
            format!("{:.2}", session.duration()),
            session.context().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json(path: &Path, history: &[DetectionSession]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, history)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::LogRecorder;
    use chrono::{DateTime, Duration, TimeZone};

    fn t0() -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn history() -> Vec<DetectionSession> {
        vec![
            DetectionSession::new(t0(), t0() + Duration::milliseconds(3_456), "webcam"),
            DetectionSession::new(
                t0() + Duration::seconds(10),
                t0() + Duration::seconds(12),
                "video",
            ),
        ]
    }

    fn dir_is_empty(dir: &Path) -> bool {
        fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
    }

    #[test]
    fn empty_history_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = DataExporter::new(dir.path().join("exports"));

        for report in [
            exporter.export_csv(&[], None),
            exporter.export_json(&[], None),
            exporter.export_all(&[]),
        ] {
            assert!(!report.success);
            assert!(!report.message.is_empty());
            assert!(report.paths.is_empty());
        }
        assert!(dir_is_empty(&dir.path().join("exports")));
    }

    #[test]
    fn csv_has_header_and_rounded_durations() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = DataExporter::new(dir.path());

        let report = exporter.export_csv(&history(), None);
        assert!(report.success, "{}", report.message);

        let mut reader = csv::Reader::from_path(&report.paths[0]).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, CSV_HEADER);

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], t0().format(TIME_FORMAT).to_string());
        assert_eq!(&rows[0][2], "3.46");
        assert_eq!(&rows[0][3], "webcam");
        assert_eq!(&rows[1][2], "2.00");
        assert_eq!(&rows[1][3], "video");
    }

    #[test]
    fn json_preserves_fields_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("custom.json");
        let exporter = DataExporter::new(dir.path());

        let report = exporter.export_json(&history(), Some(&target));
        assert!(report.success);
        assert_eq!(report.paths, vec![target.clone()]);

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
        let entries = parsed.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["context"], "webcam");
        assert_eq!(entries[0]["duration"], 3.456);
        assert_eq!(entries[1]["context"], "video");
        assert!(entries[1]["start_time"].is_string());
        assert!(entries[1]["end_time"].is_string());
    }

    #[test]
    fn export_all_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(LogRecorder::new());
        let exporter = DataExporter::new(dir.path().join("out")).with_log_sink(log.clone());

        let report = exporter.export_all(&history());

        assert!(report.success);
        assert_eq!(report.paths.len(), 2);
        assert!(report.paths.iter().all(|p| p.is_file()));
        assert_eq!(report.message.lines().count(), 2);
        assert_eq!(log.count(LogLevel::Success), 2);
    }

    #[test]
    fn export_all_rolls_back_when_one_format_fails() {
        let dir = tempfile::tempdir().unwrap();
        let stamp = "20240101_000000";
        fs::create_dir(dir.path().join(format!("detections_{stamp}.json"))).unwrap();
        let exporter = DataExporter::new(dir.path());

        let report = exporter.export_pair(&history(), stamp);

        assert!(!report.success);
        assert!(report.paths.is_empty());
        assert!(!dir.path().join(format!("detections_{stamp}.csv")).exists());
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let log = Arc::new(LogRecorder::new());
        let exporter = DataExporter::new(blocker.join("nested")).with_log_sink(log.clone());

        let report = exporter.export_csv(&history(), None);

        assert!(!report.success);
        assert!(report.message.contains("nested"));
        assert_eq!(log.count(LogLevel::Error), 1);
    }
}
