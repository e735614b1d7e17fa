//! Record Store: persistence for confirmed assessment records.
//!
//! Two interchangeable backends sit behind `RecordStore`:
//! - `SqliteRecordStore`: local embedded database, opened lazily
//! - `RemoteTableStore`: PostgREST-style table service over HTTP
//!
//! Both propagate read failures; callers decide on any fallback.

pub mod remote;
pub mod repository;
pub mod sqlite;

pub use remote::*;
pub use repository::*;
pub use sqlite::*;

use std::sync::Arc;

use thiserror::Error;

use crate::config::StoreConfig;
use crate::models::AssessmentRecord;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque storage failure. Callers show a generic storage notice and
/// leave local state untouched.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Remote store returned status {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Remote store unreachable: {0}")]
    Transport(String),

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Persistence contract shared by every backend.
pub trait RecordStore: Send + Sync {
    /// All records, newest first by creation timestamp.
    fn list_all(&self) -> Result<Vec<AssessmentRecord>, StoreError>;

    /// Insert or replace a record by id.
    fn save(&self, record: &AssessmentRecord) -> Result<(), StoreError>;

    /// Remove a record. Unknown ids are not an error.
    fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Build the backend selected by configuration.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    match config {
        StoreConfig::Local { db_path } => {
            tracing::info!(path = %db_path.display(), "Using local record store");
            Ok(Arc::new(SqliteRecordStore::at_path(db_path)))
        }
        StoreConfig::Remote {
            base_url,
            api_key,
            table,
        } => {
            tracing::info!(url = %base_url, table = %table, "Using remote record store");
            Ok(Arc::new(RemoteTableStore::new(
                base_url,
                api_key.clone(),
                table,
                REMOTE_TIMEOUT_SECS,
            )?))
        }
    }
}
