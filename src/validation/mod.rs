//! Sample-based inspection of import sources.
//!
//! Provides a fast look at a delimited file before it is imported, reading
//! only a fixed-size sample so it is safe for very large files.

pub mod source_check;

pub use source_check::{inspect_source, LineEndings, SourceReport, SourceWarning, SAMPLE_SIZE};
