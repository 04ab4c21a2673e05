//! Storage module: the record-store interface and its SQLite implementation.

mod database;
pub mod store;

pub use database::Database;
pub use store::{InsertOutcome, RecordStore, StoreFuture, WriteMode};
