use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Coordinator has been shut down")]
    ShutDown,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
