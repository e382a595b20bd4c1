//! Durable record storage.
//!
//! A [`RecordStore`] is a FIFO of opaque byte records. Two implementations
//! share the contract:
//! - [`QueueFile`]: crash-safe file-backed queue, one file per `(dir, tag)`
//! - [`MemoryQueue`]: volatile fallback used when the disk queue cannot be
//!   created
//!
//! Stores never interpret record contents and never enforce count or size
//! policy beyond their own format limits; that belongs to the coordinator.

pub mod error;
pub mod memory;
pub mod queue_file;

pub use error::StorageError;
pub use memory::MemoryQueue;
pub use queue_file::QueueFile;

use std::io::{self, Read};
use std::path::Path;
use tracing::error;

/// Callback handed each record oldest-first as a length-delimited reader.
/// Returning `Ok(false)` stops the scan.
pub type RecordVisitor<'a> = dyn FnMut(&mut dyn Read, usize) -> io::Result<bool> + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Persistent,
    Volatile,
}

pub trait RecordStore: Send {
    /// Number of queued records.
    fn size(&self) -> usize;

    /// Appends a record at the tail. Durable before returning for persistent
    /// stores.
    fn append(&mut self, record: &[u8]) -> Result<(), StorageError>;

    /// Removes the `n` oldest records. Removing more than are queued is an
    /// error; removing zero is a no-op.
    fn remove_first(&mut self, n: usize) -> Result<(), StorageError>;

    /// Visits records oldest-to-newest until the visitor returns `false` or
    /// the queue is exhausted. Returns the number of records visited.
    fn for_each(&mut self, visit: &mut RecordVisitor<'_>) -> Result<usize, StorageError>;

    /// Releases underlying resources. Idempotent.
    fn close(&mut self) -> Result<(), StorageError>;

    fn kind(&self) -> StoreKind;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Opens the persistent queue for `tag` under `dir`, falling back to a
/// volatile queue when the directory or file cannot be set up.
pub fn open_store(dir: &Path, tag: &str) -> Box<dyn RecordStore> {
    match QueueFile::open_or_recreate(dir, tag) {
        Ok(queue) => Box::new(queue),
        Err(e) => {
            error!(
                "Could not create disk queue in {}: {}. Falling back to memory queue.",
                dir.display(),
                e
            );
            Box::new(MemoryQueue::new())
        }
    }
}
