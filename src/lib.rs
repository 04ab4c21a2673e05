//! Chunked import, filtering and export of `;`-delimited record files backed
//! by SQLite.
//!
//! Pipeline: [`streaming::DelimitedReader`] feeds [`streaming::BatchImporter`],
//! which commits fixed-size chunks through a [`storage::RecordStore`].
//! [`filter::Predicate`] turns a [`filter::FilterSpec`] into a store query
//! whose result [`export`] writes as a workbook, an XML document or delimited
//! text. [`commands`] wraps these for a presentation layer.

pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod logging;
pub mod model;
pub mod state;
pub mod storage;
pub mod streaming;
pub mod validation;

pub use error::AppError;
pub use model::{NewRecord, Record};
