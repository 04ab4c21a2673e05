//! Pre-import inspection of a delimited source file.
//!
//! Reads only a fixed-size sample, so it is cheap on very large files, and
//! reports what the import is likely to see: how many sampled lines are valid
//! records, the line ending style, and an estimate of the total line count.
//! Missing and empty files are errors; everything else is a warning.

use std::io::Cursor;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::AppError;
use crate::streaming::DelimitedReader;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Size of the inspected sample (256 KB).
pub const SAMPLE_SIZE: usize = 256 * 1024;

/// File size threshold for the large file warning (100 MB).
const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Detected line ending style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEndings {
    LF,
    CRLF,
    Mixed,
    /// Single line or no line breaks at all.
    Unknown,
}

/// Conditions worth telling the operator about before importing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceWarning {
    HasBom,
    MixedLineEndings,
    LargeFile { size_bytes: u64 },
    /// Counts cover only the sample, not the whole file.
    SampleOnly { sampled_lines: u64 },
    /// No line of the sample is a valid record.
    NoValidLines,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReport {
    pub file_size_bytes: u64,
    pub sample_bytes: u64,
    pub line_endings: LineEndings,
    pub valid_lines: u64,
    pub malformed_lines: u64,
    /// Exact when the whole file was sampled.
    pub estimated_total_lines: u64,
    pub warnings: Vec<SourceWarning>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Inspects the file at `path` without reading more than [`SAMPLE_SIZE`] bytes.
///
/// # Errors
///
/// - `AppError::Io` if the file does not exist or cannot be read.
/// - `AppError::EmptySource` if the file has no bytes.
pub async fn inspect_source(path: &Path, delimiter: u8) -> Result<SourceReport, AppError> {
    let metadata = tokio::fs::metadata(path).await?;
    let file_size_bytes = metadata.len();

    if file_size_bytes == 0 {
        return Err(AppError::EmptySource(path.display().to_string()));
    }

    let mut warnings = Vec::new();
    if file_size_bytes > LARGE_FILE_THRESHOLD {
        warnings.push(SourceWarning::LargeFile {
            size_bytes: file_size_bytes,
        });
    }

    let mut sample = Vec::with_capacity((file_size_bytes as usize).min(SAMPLE_SIZE));
    File::open(path)
        .await?
        .take(SAMPLE_SIZE as u64)
        .read_to_end(&mut sample)
        .await?;

    let is_sample_only = file_size_bytes > sample.len() as u64;
    if is_sample_only {
        // Drop the line cut off at the sample boundary
        if let Some(last_newline) = sample.iter().rposition(|&b| b == b'\n') {
            sample.truncate(last_newline + 1);
        }
    }

    if sample.starts_with(UTF8_BOM) {
        warnings.push(SourceWarning::HasBom);
    }

    let line_endings = detect_line_endings(&sample);
    if line_endings == LineEndings::Mixed {
        warnings.push(SourceWarning::MixedLineEndings);
    }

    let sample_bytes = sample.len() as u64;
    let mut reader = DelimitedReader::new(Cursor::new(sample), delimiter);
    for record in reader.by_ref() {
        record?;
    }
    let valid_lines = reader.records_read();
    let malformed_lines = reader.skipped();
    let sampled_lines = valid_lines + malformed_lines;

    if valid_lines == 0 {
        warnings.push(SourceWarning::NoValidLines);
    }

    let estimated_total_lines = if is_sample_only && sample_bytes > 0 {
        warnings.push(SourceWarning::SampleOnly { sampled_lines });
        ((file_size_bytes as f64 / sample_bytes as f64) * sampled_lines as f64).ceil() as u64
    } else {
        sampled_lines
    };

    debug!(
        path = %path.display(),
        file_size_bytes,
        valid_lines,
        malformed_lines,
        estimated_total_lines,
        "[IMPORT] Source inspected"
    );

    Ok(SourceReport {
        file_size_bytes,
        sample_bytes,
        line_endings,
        valid_lines,
        malformed_lines,
        estimated_total_lines,
        warnings,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn detect_line_endings(data: &[u8]) -> LineEndings {
    let mut has_lf = false;
    let mut has_crlf = false;

    for (i, &byte) in data.iter().enumerate() {
        if byte == b'\n' {
            if i > 0 && data[i - 1] == b'\r' {
                has_crlf = true;
            } else {
                has_lf = true;
            }
        }
    }

    match (has_lf, has_crlf) {
        (true, true) => LineEndings::Mixed,
        (true, false) => LineEndings::LF,
        (false, true) => LineEndings::CRLF,
        (false, false) => LineEndings::Unknown,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::DEFAULT_DELIMITER;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_source(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content).expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[tokio::test]
    async fn counts_valid_and_malformed_lines() {
        let file = create_temp_source(
            b"2024-01-05;Anna;Ivanova;Petrovna;Kyiv;Ukraine\nbroken\n2024-02-01;Bob;Smith;Allen;Lviv;Ukraine\n",
        );

        let report = inspect_source(file.path(), DEFAULT_DELIMITER)
            .await
            .expect("Inspection should not fail");

        assert_eq!(report.valid_lines, 2);
        assert_eq!(report.malformed_lines, 1);
        assert_eq!(report.estimated_total_lines, 3);
        assert_eq!(report.line_endings, LineEndings::LF);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = inspect_source(&dir.path().join("missing.csv"), DEFAULT_DELIMITER).await;
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let file = create_temp_source(b"");
        let result = inspect_source(file.path(), DEFAULT_DELIMITER).await;
        assert!(matches!(result, Err(AppError::EmptySource(_))));
    }

    #[tokio::test]
    async fn bom_and_crlf_are_reported() {
        let mut content = UTF8_BOM.to_vec();
        content.extend_from_slice(b"2024-01-05;A;B;C;D;E\r\n2024-01-06;A;B;C;D;E\r\n");
        let file = create_temp_source(&content);

        let report = inspect_source(file.path(), DEFAULT_DELIMITER).await.unwrap();

        assert!(report.warnings.contains(&SourceWarning::HasBom));
        assert_eq!(report.line_endings, LineEndings::CRLF);
        assert_eq!(report.valid_lines, 2);
    }

    #[tokio::test]
    async fn wrong_delimiter_reports_no_valid_lines() {
        let file = create_temp_source(b"2024-01-05,A,B,C,D,E\n2024-01-06,A,B,C,D,E\n");

        let report = inspect_source(file.path(), DEFAULT_DELIMITER).await.unwrap();

        assert_eq!(report.valid_lines, 0);
        assert_eq!(report.malformed_lines, 2);
        assert!(report.warnings.contains(&SourceWarning::NoValidLines));
    }

    #[tokio::test]
    async fn large_file_is_sampled_and_estimated() {
        let line = b"2024-01-05;Anna;Ivanova;Petrovna;Kyiv;Ukraine\n";
        let lines = SAMPLE_SIZE / line.len() * 3;
        let content: Vec<u8> = line.repeat(lines);
        let file = create_temp_source(&content);

        let report = inspect_source(file.path(), DEFAULT_DELIMITER).await.unwrap();

        assert!(report.sample_bytes < report.file_size_bytes);
        assert_eq!(report.malformed_lines, 0, "boundary line must not count as malformed");
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, SourceWarning::SampleOnly { .. })));

        let estimate = report.estimated_total_lines as f64;
        assert!(
            (estimate - lines as f64).abs() <= 1.0,
            "estimate {} vs actual {}",
            estimate,
            lines
        );
    }

    #[test]
    fn test_detect_line_endings() {
        assert_eq!(detect_line_endings(b"a\nb\n"), LineEndings::LF);
        assert_eq!(detect_line_endings(b"a\r\nb\r\n"), LineEndings::CRLF);
        assert_eq!(detect_line_endings(b"a\r\nb\n"), LineEndings::Mixed);
        assert_eq!(detect_line_endings(b"single line"), LineEndings::Unknown);
    }
}
