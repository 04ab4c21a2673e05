//! Record browsing, filtering, export and wipe commands.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::export::{self, ExportFormat};
use crate::filter::{FilterSpec, Predicate};
use crate::model::Record;
use crate::state::AppState;

/// Result of an export command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub records: usize,
}

/// Every stored record in id order.
pub async fn load_all(state: &AppState) -> Result<Vec<Record>, AppError> {
    state.store.all().await
}

/// Records matching every present constraint of `spec`, in id order.
pub async fn apply_filter(state: &AppState, spec: &FilterSpec) -> Result<Vec<Record>, AppError> {
    let predicate = Predicate::from_spec(spec);
    let records = state.store.query(&predicate).await?;

    debug!(
        clauses = predicate.clauses().len(),
        matched = records.len(),
        "[STORE] Filter applied"
    );

    Ok(records)
}

/// Writes the records matching `spec` to `path`.
pub async fn export_records(
    state: &AppState,
    spec: &FilterSpec,
    path: &Path,
    format: ExportFormat,
) -> Result<ExportOutcome, AppError> {
    let records = apply_filter(state, spec).await?;
    let count = records.len();
    let path = export::export_records(records, path, format).await?;

    Ok(ExportOutcome {
        path,
        format,
        records: count,
    })
}

/// Number of stored records.
pub async fn count_records(state: &AppState) -> Result<u64, AppError> {
    state.store.count().await
}

/// Irreversibly removes every record and resets id assignment.
///
/// Confirmation is the caller's concern. Returns the number of records removed.
pub async fn clear_database(state: &AppState) -> Result<u64, AppError> {
    let active = state.imports.active().await;
    if !active.is_empty() {
        return Err(AppError::Store(format!(
            "Cannot clear while {} import(s) are running",
            active.len()
        )));
    }
    state.store.clear_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::model::NewRecord;
    use crate::storage::WriteMode;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    async fn seeded_state(dir: &TempDir) -> AppState {
        let config = AppConfig {
            db_path: dir.path().join("records.db"),
            ..AppConfig::default()
        };
        let state = AppState::open(config).await.expect("Failed to open state");

        let records = [
            ("2024-01-05", "Anna", "Kyiv"),
            ("2024-02-01", "Bob", "Lviv"),
            ("2024-03-10", "Hanna", "Kyiv"),
        ]
        .into_iter()
        .map(|(date, first, city)| NewRecord {
            record_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            first_name: first.into(),
            last_name: "L".into(),
            sur_name: "S".into(),
            city: city.into(),
            country: "Ukraine".into(),
        })
        .collect();

        state
            .store
            .insert_batch(records, WriteMode::Tracked)
            .await
            .expect("Failed to seed");
        state
    }

    #[tokio::test]
    async fn empty_filter_equals_load_all() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let state = seeded_state(&dir).await;

        let all = load_all(&state).await.unwrap();
        let filtered = apply_filter(&state, &FilterSpec::all()).await.unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(filtered, all);
    }

    #[tokio::test]
    async fn filter_combines_constraints() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let state = seeded_state(&dir).await;

        let spec = FilterSpec::all()
            .city("kyiv")
            .date_from(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        let records = apply_filter(&state, &spec).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].first_name, "Hanna");
    }

    #[tokio::test]
    async fn export_writes_filtered_records() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let state = seeded_state(&dir).await;
        let out = dir.path().join("kyiv.xml");

        let outcome = export_records(&state, &FilterSpec::all().city("Kyiv"), &out, ExportFormat::Xml)
            .await
            .expect("Export failed");

        assert_eq!(outcome.records, 2);
        assert_eq!(outcome.path, out);
        let parsed = export::xml::read_xml(&out).unwrap();
        assert_eq!(parsed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[tokio::test]
    async fn clear_database_removes_everything() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let state = seeded_state(&dir).await;

        assert_eq!(clear_database(&state).await.unwrap(), 3);
        assert_eq!(count_records(&state).await.unwrap(), 0);
        assert!(load_all(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_is_refused_during_import() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let state = seeded_state(&dir).await;
        state
            .imports
            .insert(uuid::Uuid::new_v4(), tokio_util::sync::CancellationToken::new())
            .await;

        assert!(matches!(clear_database(&state).await, Err(AppError::Store(_))));
        assert_eq!(count_records(&state).await.unwrap(), 3);
    }
}
