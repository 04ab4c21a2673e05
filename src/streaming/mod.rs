//! Streaming utilities for processing large files.
//!
//! This module provides the lazy delimited-record reader, the chunked batch
//! importer built on it, and atomic file writing with automatic cleanup on
//! failure.

mod atomic_writer;
mod delimited_reader;
mod importer;

pub use atomic_writer::AtomicFileWriter;
pub use delimited_reader::{
    parse_date, DelimitedReader, ReadProgressFn, DEFAULT_DELIMITER, FIELD_COUNT,
};
pub use importer::{
    BatchImporter, ImportProgress, ImportSummary, DEFAULT_CHUNK_SIZE,
};
