use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::division::Division;

/// Errors surfaced by the workbook store and the request boundary.
///
/// Nothing here is retried: the backing store is a local file and a failed
/// read-modify-write is reported to the caller as-is.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The workbook file could not be opened, decoded or written.
    #[error("workbook store failure at {}: {reason}", path.display())]
    StoreIo { path: PathBuf, reason: String },

    /// No entry with this identifier exists in any sheet.
    #[error("entry {0} not found")]
    EntryNotFound(u32),

    /// Every data row of the division block is taken on this sheet.
    #[error("sheet {sheet} has no free rows left for {division}")]
    CapacityExceeded { sheet: String, division: Division },

    #[error("unknown division: {0}")]
    UnknownDivision(String),

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    /// An occupied data row whose cells cannot be decoded into an entry.
    #[error("malformed row {row} on sheet {sheet}: {reason}")]
    MalformedRow {
        sheet: String,
        row: u32,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, ReportError>;

impl ReportError {
    pub fn store_io(path: &Path, reason: impl ToString) -> Self {
        ReportError::StoreIo {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
