pub mod duplicate;
pub mod format;
pub mod importer;

pub use duplicate::*;
pub use format::*;
pub use importer::*;

use thiserror::Error;

use crate::core_state::CoreError;
use crate::db::StoreError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Pending candidate not found: {0}")]
    PendingNotFound(String),

    #[error("Duplicate of existing record {existing_id}")]
    Duplicate { existing_id: String },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("State error: {0}")]
    State(#[from] CoreError),
}
