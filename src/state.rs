//! Application state shared by the command layer.
//!
//! Holds the record store, the runtime configuration and the cancellation
//! tokens of imports in flight.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::storage::{Database, RecordStore};

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation Token Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Cancellation tokens of running imports, keyed by run id.
#[derive(Default)]
pub struct CancellationTokens {
    tokens: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl CancellationTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, run_id: Uuid, token: CancellationToken) {
        self.tokens.lock().await.insert(run_id, token);
    }

    pub async fn get(&self, run_id: &Uuid) -> Option<CancellationToken> {
        self.tokens.lock().await.get(run_id).cloned()
    }

    pub async fn remove(&self, run_id: &Uuid) {
        self.tokens.lock().await.remove(run_id);
    }

    /// Run ids of imports currently registered.
    pub async fn active(&self) -> Vec<Uuid> {
        self.tokens.lock().await.keys().copied().collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Application State
// ─────────────────────────────────────────────────────────────────────────────

pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub config: AppConfig,
    pub imports: CancellationTokens,
}

impl AppState {
    /// Creates state over an existing store.
    pub fn new(store: Arc<dyn RecordStore>, config: AppConfig) -> Self {
        Self {
            store,
            config,
            imports: CancellationTokens::new(),
        }
    }

    /// Opens (creating and migrating if needed) the database named by `config`.
    pub async fn open(config: AppConfig) -> Result<Self, AppError> {
        config.validate()?;
        let db = Database::init(config.db_path.clone()).await?;
        Ok(Self::new(Arc::new(db), config))
    }
}
