//! Command handlers.
//!
//! The operations a presentation layer (the CLI, or any UI) calls. Each takes
//! the shared [`AppState`](crate::state::AppState) and returns a
//! `Result<_, AppError>`; none of them talks to the user directly.

pub mod import;
pub mod records;

pub use import::{cancel_import, check_source, import_file, ImportOptions};
pub use records::{
    apply_filter, clear_database, count_records, export_records, load_all, ExportOutcome,
};
