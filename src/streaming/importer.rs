//! Chunked import of delimited records into a [`RecordStore`].
//!
//! Records are pulled from a [`DelimitedReader`] on a blocking thread one
//! chunk at a time, and each chunk is committed with a single bulk insert
//! before the next one is read. Chunks commit independently: a failure stops
//! the run and reports how many records earlier chunks already committed.

use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::storage::{RecordStore, WriteMode};
use crate::streaming::DelimitedReader;

/// Records per insert call unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Progress of an import run, sent after every committed chunk.
///
/// `committed` is the running count of records durably stored; it never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub run_id: Uuid,
    pub committed: u64,
    pub chunks: u64,
}

/// Outcome of a completed import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub run_id: Uuid,
    /// Records stored.
    pub committed: u64,
    /// Malformed lines skipped by the reader.
    pub skipped: u64,
    /// Insert calls issued.
    pub chunks: u64,
    pub elapsed_ms: u64,
}

/// Drives reader → chunks → store.
pub struct BatchImporter<S: RecordStore + ?Sized> {
    store: Arc<S>,
    run_id: Uuid,
    chunk_size: usize,
    cancel: CancellationToken,
    progress: Option<UnboundedSender<ImportProgress>>,
}

impl<S: RecordStore + ?Sized> BatchImporter<S> {
    /// Creates an importer with the default chunk size and a fresh run id.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            run_id: Uuid::new_v4(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Sets the number of records per insert call (minimum 1).
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Uses a caller-chosen run id.
    pub fn run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Token checked between chunks.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Channel receiving an [`ImportProgress`] after each committed chunk.
    pub fn with_progress(mut self, progress: UnboundedSender<ImportProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn id(&self) -> Uuid {
        self.run_id
    }

    fn emit_progress(&self, committed: u64, chunks: u64) {
        if let Some(ref tx) = self.progress {
            let _ = tx.send(ImportProgress {
                run_id: self.run_id,
                committed,
                chunks,
            });
        }
    }

    /// Runs the import to completion.
    ///
    /// # Errors
    ///
    /// - `AppError::Cancelled` if the token was cancelled between chunks.
    /// - `AppError::ImportFailed` if reading or a chunk insert failed; the
    ///   error carries the number of records committed by earlier chunks and
    ///   the underlying cause. Nothing is retried.
    pub async fn run<R>(&self, reader: DelimitedReader<R>) -> Result<ImportSummary, AppError>
    where
        R: Read + Send + 'static,
    {
        let started = Instant::now();
        let chunk_size = self.chunk_size;
        let run_label = self.run_id.to_string();
        let short_id = &run_label[..8];

        let mut reader = reader;
        let mut committed: u64 = 0;
        let mut chunks: u64 = 0;

        info!(
            "[IMPORT] Run {} started (chunk size {})",
            short_id, chunk_size
        );

        loop {
            if self.cancel.is_cancelled() {
                info!(
                    "[IMPORT] Run {} cancelled after {} records",
                    short_id, committed
                );
                return Err(AppError::Cancelled { committed });
            }

            let (returned, pulled) = tokio::task::spawn_blocking(move || {
                let chunk = reader.next_chunk(chunk_size);
                (reader, chunk)
            })
            .await
            .map_err(|e| AppError::ImportFailed {
                committed,
                source: Box::new(AppError::Internal(format!("Reader task failed: {e}"))),
            })?;
            reader = returned;

            let chunk = pulled.map_err(|e| {
                warn!(
                    "[IMPORT] Run {} failed reading after {} records: {}",
                    short_id, committed, e
                );
                AppError::ImportFailed {
                    committed,
                    source: Box::new(e),
                }
            })?;

            if chunk.is_empty() {
                break;
            }

            let is_last = chunk.len() < chunk_size;

            let outcome = self
                .store
                .insert_batch(chunk, WriteMode::Bulk)
                .await
                .map_err(|e| {
                    warn!(
                        "[IMPORT] Run {} chunk {} failed after {} records: {}",
                        short_id,
                        chunks + 1,
                        committed,
                        e
                    );
                    AppError::ImportFailed {
                        committed,
                        source: Box::new(e),
                    }
                })?;

            committed += outcome.inserted;
            chunks += 1;

            debug!(
                run_id = %self.run_id,
                chunk = chunks,
                inserted = outcome.inserted,
                committed,
                "[IMPORT] Chunk committed"
            );
            self.emit_progress(committed, chunks);

            if is_last {
                break;
            }
        }

        let summary = ImportSummary {
            run_id: self.run_id,
            committed,
            skipped: reader.skipped(),
            chunks,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "[IMPORT] Run {} imported {} records in {} chunks, {} lines skipped ({} ms)",
            short_id, summary.committed, summary.chunks, summary.skipped, summary.elapsed_ms
        );

        Ok(summary)
    }
}
