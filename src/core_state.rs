//! Application state shared by every HTTP handler.
//!
//! `CoreState` owns the record store, the AI client, and the in-memory
//! working set that mirrors the store. The working set only changes after a
//! store write has succeeded, never optimistically.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ai::AssessmentAi;
use crate::db::{RecordStore, StoreError};
use crate::models::{now_millis, AssessmentRecord};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("State lock poisoned")]
    LockPoisoned,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

// ═══════════════════════════════════════════════════════════
// Busy indicator
// ═══════════════════════════════════════════════════════════

/// Global "operation in flight" flag with a status message.
///
/// Exclusive by convention only: a second `begin` overwrites the message.
#[derive(Default)]
pub struct BusyIndicator {
    message: Mutex<Option<String>>,
    #[cfg(test)]
    shown: Mutex<Vec<String>>,
}

/// Clears the busy indicator when dropped.
pub struct BusyGuard<'a> {
    indicator: &'a BusyIndicator,
}

impl BusyIndicator {
    pub fn begin(&self, message: impl Into<String>) -> BusyGuard<'_> {
        self.set_message(message);
        BusyGuard { indicator: self }
    }

    /// Replace the status message of the operation in flight.
    pub fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        #[cfg(test)]
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(message.clone());
        }
        if let Ok(mut slot) = self.message.lock() {
            *slot = Some(message);
        }
    }

    /// Every message set so far, in order.
    #[cfg(test)]
    pub(crate) fn shown(&self) -> Vec<String> {
        self.shown.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn current(&self) -> Option<String> {
        self.message.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn is_busy(&self) -> bool {
        self.current().is_some()
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.message.lock() {
            *slot = None;
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.indicator.clear();
    }
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    store: Arc<dyn RecordStore>,
    ai: Arc<dyn AssessmentAi>,
    /// Working set, newest first.
    records: RwLock<Vec<AssessmentRecord>>,
    active_id: RwLock<Option<String>>,
    /// Analyzed candidates awaiting confirm/discard, oldest first.
    pending: Mutex<Vec<AssessmentRecord>>,
    /// Held from the duplicate check through the working-set insert of a confirm.
    commit: Mutex<()>,
    busy: BusyIndicator,
    pub session_started_at: DateTime<Utc>,
}

impl CoreState {
    /// Empty working set; nothing is read from the store.
    pub fn new(store: Arc<dyn RecordStore>, ai: Arc<dyn AssessmentAi>) -> Self {
        Self {
            store,
            ai,
            records: RwLock::new(Vec::new()),
            active_id: RwLock::new(None),
            pending: Mutex::new(Vec::new()),
            commit: Mutex::new(()),
            busy: BusyIndicator::default(),
            session_started_at: now_millis(),
        }
    }

    /// Load the working set from the store. The newest record becomes active.
    pub fn load(store: Arc<dyn RecordStore>, ai: Arc<dyn AssessmentAi>) -> Result<Self, CoreError> {
        let records = store.list_all()?;
        let state = Self::new(store, ai);
        *state.active_id.write().map_err(|_| CoreError::LockPoisoned)? =
            records.first().map(|r| r.id.clone());
        *state.records.write().map_err(|_| CoreError::LockPoisoned)? = records;
        Ok(state)
    }

    /// Like `load`, but a store failure is logged and leaves an empty working set.
    pub fn initialize(store: Arc<dyn RecordStore>, ai: Arc<dyn AssessmentAi>) -> Self {
        match Self::load(store.clone(), ai.clone()) {
            Ok(state) => {
                tracing::info!(records = state.record_count(), "Working set loaded");
                state
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load records, starting with an empty archive");
                Self::new(store, ai)
            }
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn ai(&self) -> &Arc<dyn AssessmentAi> {
        &self.ai
    }

    pub fn busy(&self) -> &BusyIndicator {
        &self.busy
    }

    // ── Working set (read path) ─────────────────────────────

    pub fn records(&self) -> Result<Vec<AssessmentRecord>, CoreError> {
        let guard = self.records.read().map_err(|_| CoreError::LockPoisoned)?;
        Ok(guard.clone())
    }

    /// Run `f` against the working set without cloning it.
    pub fn with_records<T>(&self, f: impl FnOnce(&[AssessmentRecord]) -> T) -> Result<T, CoreError> {
        let guard = self.records.read().map_err(|_| CoreError::LockPoisoned)?;
        Ok(f(&guard))
    }

    pub fn record(&self, id: &str) -> Result<Option<AssessmentRecord>, CoreError> {
        self.with_records(|records| records.iter().find(|r| r.id == id).cloned())
    }

    pub fn record_count(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    // ── Active record ───────────────────────────────────────

    pub fn active_record(&self) -> Result<Option<AssessmentRecord>, CoreError> {
        let active = self.active_id.read().map_err(|_| CoreError::LockPoisoned)?.clone();
        match active {
            Some(id) => self.record(&id),
            None => Ok(None),
        }
    }

    /// Make a record active. Returns false if the id is not in the working set.
    pub fn select(&self, id: &str) -> Result<bool, CoreError> {
        if self.record(id)?.is_none() {
            return Ok(false);
        }
        *self.active_id.write().map_err(|_| CoreError::LockPoisoned)? = Some(id.to_string());
        Ok(true)
    }

    // ── Working set (write path) ────────────────────────────

    /// Serializes confirmations so two candidates cannot both pass the
    /// duplicate check before either is persisted.
    pub(crate) fn commit_lock(&self) -> Result<MutexGuard<'_, ()>, CoreError> {
        self.commit.lock().map_err(|_| CoreError::LockPoisoned)
    }

    /// Add a record that has already been written to the store and make it active.
    pub(crate) fn insert_persisted(&self, record: AssessmentRecord) -> Result<(), CoreError> {
        let id = record.id.clone();
        {
            let mut records = self.records.write().map_err(|_| CoreError::LockPoisoned)?;
            records.retain(|r| r.id != id);
            let position = records
                .iter()
                .position(|r| r.uploaded_at <= record.uploaded_at)
                .unwrap_or(records.len());
            records.insert(position, record);
        }
        *self.active_id.write().map_err(|_| CoreError::LockPoisoned)? = Some(id);
        Ok(())
    }

    /// Delete a record from the store, then from the working set.
    ///
    /// Returns whether a record was removed from the working set. If the
    /// deleted record was active, selection falls back to the newest
    /// remaining record or none. A store failure changes nothing locally.
    pub fn delete_record(&self, id: &str) -> Result<bool, CoreError> {
        self.store.delete(id)?;

        let fallback = {
            let mut records = self.records.write().map_err(|_| CoreError::LockPoisoned)?;
            let before = records.len();
            records.retain(|r| r.id != id);
            if records.len() == before {
                return Ok(false);
            }
            records.first().map(|r| r.id.clone())
        };

        let mut active = self.active_id.write().map_err(|_| CoreError::LockPoisoned)?;
        if active.as_deref() == Some(id) {
            *active = fallback;
        }
        tracing::info!(record_id = %id, "Record deleted");
        Ok(true)
    }

    // ── Pending candidates ──────────────────────────────────

    pub fn pending(&self) -> Result<Vec<AssessmentRecord>, CoreError> {
        let guard = self.pending.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(guard.clone())
    }

    pub fn pending_record(&self, id: &str) -> Result<Option<AssessmentRecord>, CoreError> {
        let guard = self.pending.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(guard.iter().find(|r| r.id == id).cloned())
    }

    pub(crate) fn push_pending(&self, record: AssessmentRecord) -> Result<(), CoreError> {
        let mut guard = self.pending.lock().map_err(|_| CoreError::LockPoisoned)?;
        guard.push(record);
        Ok(())
    }

    /// Remove a pending candidate, returning it if present.
    pub(crate) fn take_pending(&self, id: &str) -> Result<Option<AssessmentRecord>, CoreError> {
        let mut guard = self.pending.lock().map_err(|_| CoreError::LockPoisoned)?;
        let index = guard.iter().position(|r| r.id == id);
        Ok(index.map(|i| guard.remove(i)))
    }
}
