use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Queue file corrupt: {reason}")]
    Corrupt { reason: String },
    #[error("Cannot remove {requested} records, only {available} queued")]
    RemoveOutOfRange { requested: usize, available: usize },
    #[error("Record of {len} bytes exceeds element limit of {max} bytes")]
    RecordTooLarge { len: usize, max: usize },
    #[error("Invalid storage path: {0}")]
    InvalidStoragePath(String),
    #[error("Queue is closed")]
    Closed,
    #[error("Store task failed: {0}")]
    TaskFailed(String),
}

impl StorageError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        StorageError::Corrupt {
            reason: reason.into(),
        }
    }

    /// Corruption is recovered by recreating the queue; everything else is
    /// reported to the caller.
    pub fn is_corruption(&self) -> bool {
        matches!(self, StorageError::Corrupt { .. })
    }
}
