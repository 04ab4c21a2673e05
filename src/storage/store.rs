//! The record-store seam used by the importer and the command layer.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::filter::Predicate;
use crate::model::{NewRecord, Record};
use crate::storage::database::Database;

/// Boxed future returned by [`RecordStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>;

/// How a batch insert treats the rows it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    /// Known-new data: no per-record reconciliation, assigned ids are not read back.
    Bulk,
    /// Assigned ids are read back and returned to the caller.
    Tracked,
}

/// Result of one `insert_batch` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: u64,
    /// Ids assigned to the batch in input order. Empty in `WriteMode::Bulk`.
    pub assigned_ids: Vec<i64>,
}

/// Persistence operations on records, allowing test fakes.
pub trait RecordStore: Send + Sync {
    /// Persists a batch atomically and assigns ids.
    fn insert_batch(
        &self,
        records: Vec<NewRecord>,
        mode: WriteMode,
    ) -> StoreFuture<'_, InsertOutcome>;

    /// Returns records matching the predicate in a stable order.
    fn query(&self, predicate: &Predicate) -> StoreFuture<'_, Vec<Record>>;

    /// Returns every record.
    fn all(&self) -> StoreFuture<'_, Vec<Record>> {
        self.query(&Predicate::always())
    }

    /// Irreversibly removes every record. Returns how many were removed.
    fn clear_all(&self) -> StoreFuture<'_, u64>;

    /// Number of stored records.
    fn count(&self) -> StoreFuture<'_, u64>;

    /// Verifies the store is reachable.
    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.count().await.map(|_| ()) })
    }
}

impl RecordStore for Database {
    fn insert_batch(
        &self,
        records: Vec<NewRecord>,
        mode: WriteMode,
    ) -> StoreFuture<'_, InsertOutcome> {
        Box::pin(self.insert_records(records, mode))
    }

    fn query(&self, predicate: &Predicate) -> StoreFuture<'_, Vec<Record>> {
        let predicate = predicate.clone();
        Box::pin(async move { self.query_records(&predicate).await })
    }

    fn clear_all(&self) -> StoreFuture<'_, u64> {
        Box::pin(self.clear_records())
    }

    fn count(&self) -> StoreFuture<'_, u64> {
        Box::pin(self.count_records())
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(Database::health_check(self))
    }
}
