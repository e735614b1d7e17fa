//! Local record store backed by an embedded SQLite database.
//!
//! The database file is opened on first use, not at construction, so a
//! misconfigured path only surfaces when a record is actually read or written.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::DateTime;
use rusqlite::{params, Connection};

use super::sqlite::{open_database, open_memory_database};
use super::{DatabaseError, RecordStore, StoreError};
use crate::models::AssessmentRecord;

enum DbLocation {
    File(PathBuf),
    Memory,
}

/// SQLite-backed record store, keyed by record id.
pub struct SqliteRecordStore {
    location: DbLocation,
    conn: Mutex<Option<Connection>>,
}

impl SqliteRecordStore {
    pub fn at_path(path: &Path) -> Self {
        Self {
            location: DbLocation::File(path.to_path_buf()),
            conn: Mutex::new(None),
        }
    }

    /// In-memory store (for testing)
    pub fn in_memory() -> Self {
        Self {
            location: DbLocation::Memory,
            conn: Mutex::new(None),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        if guard.is_none() {
            let conn = match &self.location {
                DbLocation::File(path) => {
                    tracing::debug!(path = %path.display(), "Opening record database");
                    open_database(path)?
                }
                DbLocation::Memory => open_memory_database()?,
            };
            *guard = Some(conn);
        }
        match guard.as_ref() {
            Some(conn) => Ok(f(conn)?),
            None => Err(StoreError::LockPoisoned),
        }
    }
}

impl RecordStore for SqliteRecordStore {
    fn list_all(&self) -> Result<Vec<AssessmentRecord>, StoreError> {
        self.with_conn(list_records)
    }

    fn save(&self, record: &AssessmentRecord) -> Result<(), StoreError> {
        self.with_conn(|conn| upsert_record(conn, record))
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| delete_record(conn, id).map(|_| ()))
    }
}

pub fn upsert_record(conn: &Connection, record: &AssessmentRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO assessments (id, test_name, canonical_name, item_count, file_name,
         file_data, mime_type, administration_mode, test_type, administration_method,
         test_purpose, age_target, is_self_report, extracted_content, uploaded_at, contains_test)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            record.id,
            record.test_name,
            record.canonical_name,
            record.item_count,
            record.file_name,
            record.file_data,
            record.mime_type,
            record.administration_mode,
            record.test_type,
            record.administration_method,
            record.test_purpose,
            record.age_target,
            record.is_self_report as i32,
            record.extracted_content,
            record.uploaded_at.timestamp_millis(),
            record.contains_test as i32,
        ],
    )?;
    Ok(())
}

pub fn list_records(conn: &Connection) -> Result<Vec<AssessmentRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, test_name, canonical_name, item_count, file_name, file_data, mime_type,
         administration_mode, test_type, administration_method, test_purpose, age_target,
         is_self_report, extracted_content, uploaded_at, contains_test
         FROM assessments ORDER BY uploaded_at DESC"
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(RecordRow {
            id: row.get(0)?,
            test_name: row.get(1)?,
            canonical_name: row.get(2)?,
            item_count: row.get(3)?,
            file_name: row.get(4)?,
            file_data: row.get(5)?,
            mime_type: row.get(6)?,
            administration_mode: row.get(7)?,
            test_type: row.get(8)?,
            administration_method: row.get(9)?,
            test_purpose: row.get(10)?,
            age_target: row.get(11)?,
            is_self_report: row.get(12)?,
            extracted_content: row.get(13)?,
            uploaded_at: row.get(14)?,
            contains_test: row.get(15)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row?)?);
    }
    Ok(records)
}

/// Returns the number of rows removed (0 or 1).
pub fn delete_record(conn: &Connection, id: &str) -> Result<usize, DatabaseError> {
    let removed = conn.execute("DELETE FROM assessments WHERE id = ?1", params![id])?;
    Ok(removed)
}

// ═══════════════════════════════════════════
// Internal row mapping
// ═══════════════════════════════════════════

struct RecordRow {
    id: String,
    test_name: String,
    canonical_name: String,
    item_count: i64,
    file_name: String,
    file_data: String,
    mime_type: String,
    administration_mode: String,
    test_type: String,
    administration_method: String,
    test_purpose: String,
    age_target: String,
    is_self_report: i32,
    extracted_content: String,
    uploaded_at: i64,
    contains_test: i32,
}

fn record_from_row(row: RecordRow) -> Result<AssessmentRecord, DatabaseError> {
    let item_count = u32::try_from(row.item_count).map_err(|_| DatabaseError::InvalidValue {
        field: "item_count".into(),
        value: row.item_count.to_string(),
    })?;
    let uploaded_at =
        DateTime::from_timestamp_millis(row.uploaded_at).ok_or_else(|| DatabaseError::InvalidValue {
            field: "uploaded_at".into(),
            value: row.uploaded_at.to_string(),
        })?;

    Ok(AssessmentRecord {
        id: row.id,
        test_name: row.test_name,
        canonical_name: row.canonical_name,
        item_count,
        file_name: row.file_name,
        file_data: row.file_data,
        mime_type: row.mime_type,
        administration_mode: row.administration_mode,
        test_type: row.test_type,
        administration_method: row.administration_method,
        test_purpose: row.test_purpose,
        age_target: row.age_target,
        is_self_report: row.is_self_report != 0,
        extracted_content: row.extracted_content,
        uploaded_at,
        contains_test: row.contains_test != 0,
    })
}
