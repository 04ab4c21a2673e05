//! Serialization of stored records to files.
//!
//! Every writer renders into an [`AtomicFileWriter`](crate::streaming::AtomicFileWriter),
//! so a failed export leaves no partial file and never touches an existing
//! destination.

pub mod delimited;
pub mod xlsx;
pub mod xml;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::model::Record;
use crate::streaming::DEFAULT_DELIMITER;

/// Column headers of tabular exports.
pub const HEADERS: [&str; 7] = [
    "ID",
    "Date",
    "FirstName",
    "LastName",
    "SurName",
    "City",
    "Country",
];

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Spreadsheet workbook with a single "Records" sheet.
    Xlsx,
    /// `TestProgram` document with one `Record` element per record.
    Xml,
    /// Input-compatible delimited text, re-importable as is.
    Delimited,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Xml => "xml",
            ExportFormat::Delimited => "csv",
        }
    }

    /// Infers the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(ExportFormat::Xlsx),
            "xml" => Ok(ExportFormat::Xml),
            "csv" | "txt" | "delimited" => Ok(ExportFormat::Delimited),
            other => Err(AppError::Config(format!("Unknown export format: {other}"))),
        }
    }
}

/// Writes `records` to `path` in `format` on a blocking thread.
///
/// Records are written in the given order. Returns the written path.
///
/// # Errors
///
/// Returns `AppError::ExportFailed` if the file cannot be rendered or written.
pub async fn export_records(
    records: Vec<Record>,
    path: impl AsRef<Path>,
    format: ExportFormat,
) -> Result<PathBuf, AppError> {
    let path = path.as_ref().to_path_buf();
    let count = records.len();
    let started = Instant::now();

    let result = tokio::task::spawn_blocking(move || match format {
        ExportFormat::Xlsx => xlsx::write_xlsx(&records, &path),
        ExportFormat::Xml => xml::write_xml(&records, &path),
        ExportFormat::Delimited => {
            delimited::write_delimited(&records, &path, DEFAULT_DELIMITER)
        }
    })
    .await
    .map_err(|e| AppError::Internal(format!("Export task failed: {e}")))?;

    match &result {
        Ok(path) => info!(
            "[EXPORT] Wrote {} records as {} to {} ({} ms)",
            count,
            format,
            path.display(),
            started.elapsed().as_millis()
        ),
        Err(e) => warn!("[EXPORT] {} export failed: {}", format, e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    pub(crate) fn sample_records() -> Vec<Record> {
        vec![
            Record {
                id: 1,
                record_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                first_name: "Anna".into(),
                last_name: "Ivanova".into(),
                sur_name: "Petrovna".into(),
                city: "Kyiv".into(),
                country: "Ukraine".into(),
            },
            Record {
                id: 3,
                record_date: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                first_name: "Bob".into(),
                last_name: "O'Brien & Sons".into(),
                sur_name: "".into(),
                city: "<Lviv>".into(),
                country: "Ukraine".into(),
            },
        ]
    }

    #[test]
    fn format_parsing() {
        assert_eq!("xlsx".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!("XML".parse::<ExportFormat>().unwrap(), ExportFormat::Xml);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Delimited);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn format_from_path_uses_extension() {
        assert_eq!(
            ExportFormat::from_path(Path::new("/tmp/out.xlsx")),
            Some(ExportFormat::Xlsx)
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("out.Xml")),
            Some(ExportFormat::Xml)
        );
        assert_eq!(ExportFormat::from_path(Path::new("out")), None);
    }

    #[tokio::test]
    async fn export_records_dispatches_by_format() {
        let dir = TempDir::new().expect("Failed to create temp dir");

        for format in [ExportFormat::Xlsx, ExportFormat::Xml, ExportFormat::Delimited] {
            let path = dir.path().join(format!("records.{}", format.extension()));
            let written = export_records(sample_records(), &path, format)
                .await
                .expect("Failed to export");
            assert_eq!(written, path);
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }

        let xml = std::fs::read_to_string(dir.path().join("records.xml")).unwrap();
        assert!(xml.contains("<TestProgram>"));
    }

    #[tokio::test]
    async fn export_to_missing_directory_fails() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("missing").join("records.xml");

        let err = export_records(sample_records(), &path, ExportFormat::Xml)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExportFailed(_)));
    }
}
