//! Atomic file writer with automatic cleanup on failure.
//!
//! Writes to a temporary file in the same directory as the destination,
//! then atomically replaces the destination on `finish()`. If dropped
//! before finishing, the temporary file is automatically cleaned up, so a
//! failed export never leaves a partial file at the destination.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::AppError;

/// Buffered writer that persists to its destination only on `finish()`.
pub struct AtomicFileWriter {
    writer: BufWriter<NamedTempFile>,
    final_path: PathBuf,
}

impl AtomicFileWriter {
    /// Creates a new atomic writer targeting the specified path.
    ///
    /// The temporary file is created in the same directory as `final_path`
    /// so persisting is a rename on the same filesystem.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ExportFailed` if the parent directory cannot be
    /// determined or the temporary file cannot be created.
    pub fn new(final_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let final_path = final_path.as_ref().to_path_buf();

        let parent_dir = match final_path.parent() {
            Some(p) if p.as_os_str().is_empty() => Path::new("."),
            Some(p) => p,
            None => {
                return Err(AppError::ExportFailed(format!(
                    "Cannot determine parent directory for: {}",
                    final_path.display()
                )))
            }
        };

        let temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| {
            AppError::ExportFailed(format!(
                "Failed to create temporary file in {}: {}",
                parent_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            writer: BufWriter::new(temp_file),
            final_path,
        })
    }

    /// Destination the file is persisted to.
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Returns a mutable reference to the buffered temporary file.
    pub fn writer_mut(&mut self) -> &mut BufWriter<NamedTempFile> {
        &mut self.writer
    }

    /// Flushes all buffers and atomically persists the file to the final path.
    ///
    /// Returns the final path on success.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ExportFailed` if flushing or persisting fails.
    /// On error, the temporary file is cleaned up automatically.
    pub fn finish(self) -> Result<PathBuf, AppError> {
        let named_temp = self.writer.into_inner().map_err(|e| {
            AppError::ExportFailed(format!("Failed to flush buffer: {}", e.error()))
        })?;

        named_temp.persist(&self.final_path).map_err(|e| {
            AppError::ExportFailed(format!(
                "Failed to persist file to {}: {}",
                self.final_path.display(),
                e.error
            ))
        })?;

        Ok(self.final_path)
    }

    /// Writes `bytes` to `final_path` atomically.
    pub fn write_all_to(final_path: impl AsRef<Path>, bytes: &[u8]) -> Result<PathBuf, AppError> {
        let mut writer = Self::new(final_path)?;
        writer
            .write_all(bytes)
            .map_err(|e| AppError::ExportFailed(format!("Failed to write file: {}", e)))?;
        writer.finish()
    }
}

impl Write for AtomicFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).expect("Failed to read dir").count()
    }

    #[test]
    fn test_successful_write() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("records.xml");

        let mut writer = AtomicFileWriter::new(&final_path).expect("Failed to create writer");
        writer.write_all(b"<Records>").expect("Failed to write");
        writer.write_all(b"</Records>").expect("Failed to write");

        let result_path = writer.finish().expect("Failed to finish");

        assert_eq!(result_path, final_path);
        let content = fs::read_to_string(&final_path).expect("Failed to read file");
        assert_eq!(content, "<Records></Records>");
        assert_eq!(entries(temp_dir.path()), 1, "No temporary file should remain");
    }

    #[test]
    fn test_drop_cleanup() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("records.xlsx");
        assert_eq!(entries(temp_dir.path()), 0);

        {
            let mut writer = AtomicFileWriter::new(&final_path).expect("Failed to create writer");
            writer.write_all(b"partial").expect("Failed to write");
            // Dropped without finish()
        }

        assert_eq!(
            entries(temp_dir.path()),
            0,
            "Directory should be empty after drop (temp file cleaned up)"
        );
        assert!(!final_path.exists());
    }

    #[test]
    fn test_overwrite_behavior() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("records.csv");
        fs::write(&final_path, "OLD_CONTENT").expect("Failed to write dummy file");

        AtomicFileWriter::write_all_to(&final_path, b"NEW").expect("Failed to write");

        let content = fs::read_to_string(&final_path).expect("Failed to read file");
        assert_eq!(content, "NEW");
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("records.csv");
        fs::write(&final_path, "PREVIOUS").expect("Failed to write dummy file");

        {
            let mut writer = AtomicFileWriter::new(&final_path).expect("Failed to create writer");
            writer.write_all(b"half of the new").expect("Failed to write");
        }

        let content = fs::read_to_string(&final_path).expect("Failed to read file");
        assert_eq!(content, "PREVIOUS");
    }

    #[test]
    fn test_missing_parent_directory_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("no-such-dir").join("out.xml");

        let result = AtomicFileWriter::new(&final_path);
        assert!(matches!(result, Err(AppError::ExportFailed(_))));
    }

    #[test]
    fn test_invalid_parent_directory() {
        #[cfg(unix)]
        {
            let result = AtomicFileWriter::new("/");
            assert!(result.is_err(), "Should fail for path with no parent");
        }
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let final_path = temp_dir.path().join("empty.csv");

        let writer = AtomicFileWriter::new(&final_path).expect("Failed to create writer");
        writer.finish().expect("Failed to finish");

        let content = fs::read_to_string(&final_path).expect("Failed to read file");
        assert!(content.is_empty(), "File should be empty");
    }
}
