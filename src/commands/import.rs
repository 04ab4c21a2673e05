//! Import commands.
//!
//! `import_file` registers the run's cancellation token under its id, inspects
//! the source, and drives the batch importer against the state's store.
//! `cancel_import` trips that token; the run stops before its next chunk.

use std::path::Path;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::streaming::{BatchImporter, DelimitedReader, ImportProgress, ImportSummary, ReadProgressFn};
use crate::validation::{inspect_source, SourceReport};

/// Per-run options of [`import_file`].
pub struct ImportOptions {
    /// Id under which the run can be cancelled.
    pub run_id: Uuid,
    /// Token the run watches. Cancelling it before the run starts stops it
    /// before the first chunk.
    pub cancel: CancellationToken,
    /// Receives the running committed count after every chunk.
    pub progress: Option<UnboundedSender<ImportProgress>>,
    /// Receives whole-percent read progress of the source file.
    pub read_progress: Option<ReadProgressFn>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            progress: None,
            read_progress: None,
        }
    }
}

/// Inspects a source file without importing it.
pub async fn check_source(state: &AppState, path: &Path) -> Result<SourceReport, AppError> {
    inspect_source(path, state.config.delimiter).await
}

/// Imports the delimited file at `path` into the store.
///
/// # Errors
///
/// - `AppError::Io` / `AppError::EmptySource` if the source is missing or empty
///   (nothing is written).
/// - `AppError::ImportFailed` / `AppError::Cancelled` with the number of
///   records already committed.
pub async fn import_file(
    state: &AppState,
    path: &Path,
    options: ImportOptions,
) -> Result<ImportSummary, AppError> {
    let run_id = options.run_id;
    state.imports.insert(run_id, options.cancel.clone()).await;

    let result = run_import(state, path, options).await;
    state.imports.remove(&run_id).await;

    result
}

async fn run_import(
    state: &AppState,
    path: &Path,
    options: ImportOptions,
) -> Result<ImportSummary, AppError> {
    let report = check_source(state, path).await?;
    for warning in &report.warnings {
        warn!("[IMPORT] {}: {:?}", path.display(), warning);
    }

    info!(
        "[IMPORT] Importing {} ({} bytes, ~{} lines)",
        path.display(),
        report.file_size_bytes,
        report.estimated_total_lines
    );

    let mut reader = DelimitedReader::open(path, state.config.delimiter)?;
    if let Some(callback) = options.read_progress {
        reader = reader.with_progress(report.file_size_bytes, callback);
    }

    let mut importer = BatchImporter::new(state.store.clone())
        .run_id(options.run_id)
        .chunk_size(state.config.chunk_size)
        .with_cancellation(options.cancel);
    if let Some(tx) = options.progress {
        importer = importer.with_progress(tx);
    }

    importer.run(reader).await
}

/// Requests cancellation of a running import.
///
/// Returns `false` if no import with that id is running.
pub async fn cancel_import(state: &AppState, run_id: Uuid) -> bool {
    match state.imports.get(&run_id).await {
        Some(token) => {
            info!("[IMPORT] Cancellation requested for run {}", run_id);
            token.cancel();
            true
        }
        None => false,
    }
}
