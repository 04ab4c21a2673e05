use serde::Serialize;
use thiserror::Error;

/// User-friendly error presentation for a presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Application-wide error type.
///
/// Malformed input lines are never represented here: the reader counts them
/// and reports the total in the import summary.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Source / destination I/O ──────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source file is empty: {0}")]
    EmptySource(String),

    // ── Import ────────────────────────────────────────────────────────────────
    #[error("Import failed after {committed} committed records: {source}")]
    ImportFailed {
        committed: u64,
        #[source]
        source: Box<AppError>,
    },

    #[error("Import cancelled after {committed} committed records")]
    Cancelled { committed: u64 },

    // ── Export ────────────────────────────────────────────────────────────────
    #[error("Export failed: {0}")]
    ExportFailed(String),

    // ── Store ─────────────────────────────────────────────────────────────────
    #[error("Store error: {0}")]
    Store(String),

    // ── Configuration ─────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Number of records that were durably committed before this error, if the
    /// error came out of an import run.
    pub fn committed(&self) -> Option<u64> {
        match self {
            AppError::ImportFailed { committed, .. } | AppError::Cancelled { committed } => {
                Some(*committed)
            }
            _ => None,
        }
    }

    /// Converts the error into a user-friendly presentation suitable for UI display.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            AppError::Io(e) => ErrorPresentation {
                title: "File Error".into(),
                message: format!("The file could not be read or written: {}", e),
                action: Some("Check the file path and permissions".into()),
            },

            AppError::EmptySource(path) => ErrorPresentation {
                title: "Empty File".into(),
                message: format!("The file {} contains no data.", path),
                action: Some("Choose a different file".into()),
            },

            AppError::ImportFailed { committed, source } => ErrorPresentation {
                title: "Import Failed".into(),
                message: format!(
                    "The import stopped after {} records were saved: {}",
                    committed, source
                ),
                action: Some("Fix the problem and import the remaining records".into()),
            },

            AppError::Cancelled { committed } => ErrorPresentation {
                title: "Cancelled".into(),
                message: format!(
                    "The import was cancelled. {} records were already saved.",
                    committed
                ),
                action: None,
            },

            AppError::ExportFailed(msg) => ErrorPresentation {
                title: "Export Failed".into(),
                message: format!(
                    "The file could not be written. Close it if it is open in another program. {}",
                    msg
                ),
                action: Some("Close the file and try again".into()),
            },

            AppError::Store(_) => ErrorPresentation {
                title: "Database Error".into(),
                message: "The database operation could not be completed.".into(),
                action: Some("Try again".into()),
            },

            AppError::Config(msg) => ErrorPresentation {
                title: "Configuration Error".into(),
                message: msg.clone(),
                action: Some("Check the configuration settings".into()),
            },

            AppError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Store(e.to_string())
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}
