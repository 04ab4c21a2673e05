//! Lazy, line-oriented reader for `;`-delimited record files.
//!
//! Uses the `csv` crate with quoting disabled, so every physical line is one
//! candidate record and quote characters are plain text. Lines that do not
//! have exactly six fields or whose first field is not a date are skipped and
//! counted; only I/O failures of the underlying stream are errors.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ByteRecord, ReaderBuilder};

use crate::error::AppError;
use crate::model::{is_storable_date, NewRecord, DATE_FORMAT};

/// Field delimiter of the input format.
pub const DEFAULT_DELIMITER: u8 = b';';

/// Number of fields in a valid input line.
pub const FIELD_COUNT: usize = 6;

/// Date-time layouts accepted in addition to [`DATE_FORMAT`]; the time part is dropped.
const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Alternative date-only layouts.
const ALT_DATE_FORMATS: &[&str] = &["%Y/%m/%d"];

/// Callback receiving whole-percent read progress (0-100).
pub type ReadProgressFn = Box<dyn FnMut(u8) + Send>;

/// Streaming record reader.
///
/// Produces `Result<NewRecord, AppError>` items. Iteration ends after the first
/// error, which is always an I/O failure of the source.
pub struct DelimitedReader<R> {
    reader: csv::Reader<R>,
    record: ByteRecord,
    records_read: u64,
    skipped: u64,
    finished: bool,
    total_bytes: Option<u64>,
    last_percent: Option<u8>,
    on_progress: Option<ReadProgressFn>,
}

impl DelimitedReader<File> {
    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, delimiter: u8) -> Result<Self, AppError> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(file, delimiter))
    }
}

impl<R: Read> DelimitedReader<R> {
    /// Wraps any byte stream.
    pub fn new(source: R, delimiter: u8) -> Self {
        let reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(source);

        Self {
            reader,
            record: ByteRecord::new(),
            records_read: 0,
            skipped: 0,
            finished: false,
            total_bytes: None,
            last_percent: None,
            on_progress: None,
        }
    }

    /// Enables byte-based read progress for a stream of known length.
    ///
    /// The callback is invoked only when the whole-percent value increases.
    pub fn with_progress(
        mut self,
        total_bytes: u64,
        on_progress: impl FnMut(u8) + Send + 'static,
    ) -> Self {
        self.total_bytes = Some(total_bytes);
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Number of valid records produced so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Number of malformed lines skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Bytes of the source consumed so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.reader.position().byte()
    }

    /// Pulls up to `max` valid records. A short (or empty) chunk means the
    /// source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the source fails; records already pulled into
    /// the partial chunk are discarded.
    pub fn next_chunk(&mut self, max: usize) -> Result<Vec<NewRecord>, AppError> {
        let mut chunk = Vec::with_capacity(max);
        while chunk.len() < max {
            match self.next() {
                Some(Ok(record)) => chunk.push(record),
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }
        Ok(chunk)
    }

    fn report_progress(&mut self) {
        let (Some(total), Some(callback)) = (self.total_bytes, self.on_progress.as_mut()) else {
            return;
        };
        if total == 0 {
            return;
        }

        let consumed = self.reader.position().byte().min(total);
        let percent = ((consumed as f64 / total as f64) * 100.0) as u8;

        if self.last_percent.map_or(true, |last| percent > last) {
            self.last_percent = Some(percent);
            callback(percent);
        }
    }
}

impl<R: Read> Iterator for DelimitedReader<R> {
    type Item = Result<NewRecord, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            match self.reader.read_byte_record(&mut self.record) {
                Ok(true) => {
                    self.report_progress();
                    match parse_record(&self.record) {
                        Some(record) => {
                            self.records_read += 1;
                            return Some(Ok(record));
                        }
                        None => {
                            self.skipped += 1;
                            tracing::trace!(
                                line = self.record.position().map(|p| p.line()),
                                fields = self.record.len(),
                                "Skipping malformed line"
                            );
                        }
                    }
                }
                Ok(false) => {
                    self.finished = true;
                    self.report_progress();
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(map_csv_error(e)));
                }
            }
        }
    }
}

/// Maps one raw line onto a record, or `None` if the line is malformed.
fn parse_record(record: &ByteRecord) -> Option<NewRecord> {
    if record.len() != FIELD_COUNT {
        return None;
    }

    let field = |i: usize| std::str::from_utf8(&record[i]).ok();

    Some(NewRecord {
        record_date: parse_date(field(0)?)?,
        first_name: field(1)?.to_string(),
        last_name: field(2)?.to_string(),
        sur_name: field(3)?.to_string(),
        city: field(4)?.to_string(),
        country: field(5)?.to_string(),
    })
}

/// Parses a date field using locale-independent layouts only.
///
/// Accepts `YYYY-MM-DD`, the same followed by a `T` or space separated
/// `HH:MM:SS` time, and `YYYY/MM/DD`. A leading byte-order mark and
/// surrounding whitespace are ignored. Signed or five-digit years are
/// rejected.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim_start_matches('\u{feff}').trim();

    parse_date_layouts(text).filter(|date| is_storable_date(*date))
}

fn parse_date_layouts(text: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        return Some(date);
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            ALT_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        })
}

fn map_csv_error(err: csv::Error) -> AppError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => AppError::Io(e),
        other => AppError::Internal(format!("Unexpected reader error: {:?}", other)),
    }
}
