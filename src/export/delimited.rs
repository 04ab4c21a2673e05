//! Delimited re-export in the input file layout.
//!
//! Writes the six data fields per line with no header and no id column, so
//! the output imports again through the delimited reader. Quoting is never
//! applied because the reader treats quotes as text; a value that contains
//! the delimiter or a line break therefore cannot be represented and fails
//! the export.

use std::path::{Path, PathBuf};

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::AppError;
use crate::model::Record;
use crate::streaming::AtomicFileWriter;

fn check_representable(record: &Record, fields: &[String], delimiter: u8) -> Result<(), AppError> {
    let bad = fields
        .iter()
        .any(|f| f.bytes().any(|b| b == delimiter || b == b'\n' || b == b'\r'));
    if bad {
        return Err(AppError::ExportFailed(format!(
            "Record {} contains the delimiter {:?} or a line break",
            record.id, delimiter as char
        )));
    }
    Ok(())
}

/// Writes `records` to `path` atomically, one line per record.
pub fn write_delimited(records: &[Record], path: &Path, delimiter: u8) -> Result<PathBuf, AppError> {
    let mut atomic = AtomicFileWriter::new(path)?;

    {
        let mut csv_writer = WriterBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .quote_style(QuoteStyle::Never)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(atomic.writer_mut());

        for record in records {
            let fields = record.fields();
            check_representable(record, &fields, delimiter)?;
            csv_writer.write_record(&fields).map_err(|e| {
                AppError::ExportFailed(format!("Failed to write record {}: {}", record.id, e))
            })?;
        }

        csv_writer
            .flush()
            .map_err(|e| AppError::ExportFailed(format!("Failed to flush writer: {}", e)))?;
    }

    atomic.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::sample_records;
    use crate::model::NewRecord;
    use crate::streaming::{DelimitedReader, DEFAULT_DELIMITER};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn writes_input_layout_without_header() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("records.csv");

        write_delimited(&sample_records()[..1], &path, DEFAULT_DELIMITER).expect("Failed to write");

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "2024-01-05;Anna;Ivanova;Petrovna;Kyiv;Ukraine\n");
    }

    #[test]
    fn output_reimports_unchanged() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("records.csv");
        let records = sample_records();

        write_delimited(&records, &path, DEFAULT_DELIMITER).expect("Failed to write");

        let mut reader = DelimitedReader::open(&path, DEFAULT_DELIMITER).unwrap();
        let reimported: Vec<NewRecord> = reader.by_ref().collect::<Result<_, _>>().unwrap();

        assert_eq!(reader.skipped(), 0);
        assert_eq!(reimported.len(), records.len());
        for (new, original) in reimported.into_iter().zip(&records) {
            assert_eq!(new.with_id(original.id), *original);
        }
    }

    #[test]
    fn empty_input_writes_empty_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("empty.csv");

        write_delimited(&[], &path, DEFAULT_DELIMITER).expect("Failed to write");
        assert!(fs::read_to_string(&path).unwrap().is_empty());
    }

    #[test]
    fn unrepresentable_value_fails_without_output() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("records.csv");
        let mut records = sample_records();
        records[1].city = "Kyiv;Lviv".into();

        let err = write_delimited(&records, &path, DEFAULT_DELIMITER).unwrap_err();

        assert!(matches!(err, AppError::ExportFailed(_)));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
