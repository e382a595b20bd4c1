use crate::storage::{RecordStore, StorageError, StoreKind};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Record store shared by the coordinator's tasks.
///
/// Store calls do synchronous file I/O (fsync, compaction), so every call runs
/// on the blocking pool. The record count is mirrored in an atomic so `len()`
/// never waits on an in-progress write.
#[derive(Clone)]
pub(crate) struct SharedStore {
    inner: Arc<Inner>,
}

struct Inner {
    store: Mutex<Box<dyn RecordStore>>,
    len: AtomicUsize,
    kind: StoreKind,
}

impl SharedStore {
    pub(crate) fn new(store: Box<dyn RecordStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                len: AtomicUsize::new(store.size()),
                kind: store.kind(),
                store: Mutex::new(store),
            }),
        }
    }

    /// Record count as of the last completed store call.
    pub(crate) fn len(&self) -> usize {
        self.inner.len.load(Ordering::Acquire)
    }

    pub(crate) fn kind(&self) -> StoreKind {
        self.inner.kind
    }

    pub(crate) async fn run<R, F>(&self, op: F) -> Result<R, StorageError>
    where
        F: FnOnce(&mut dyn RecordStore) -> Result<R, StorageError> + Send + 'static,
        R: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut store = inner.store.lock();
            let result = op(store.as_mut());
            inner.len.store(store.size(), Ordering::Release);
            result
        })
        .await
        .map_err(|e| StorageError::TaskFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryQueue;

    #[tokio::test]
    async fn test_len_tracks_completed_calls() {
        let shared = SharedStore::new(Box::new(MemoryQueue::new()));
        assert_eq!(shared.len(), 0);
        assert_eq!(shared.kind(), StoreKind::Volatile);

        shared.run(|store| store.append(b"a")).await.unwrap();
        shared.run(|store| store.append(b"b")).await.unwrap();
        assert_eq!(shared.len(), 2);

        let err = shared.run(|store| store.remove_first(5)).await.unwrap_err();
        assert!(matches!(err, StorageError::RemoveOutOfRange { .. }));
        assert_eq!(shared.len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_call_is_reported() {
        let shared = SharedStore::new(Box::new(MemoryQueue::new()));
        let err = shared
            .run(|_store| -> Result<(), StorageError> { panic!("boom") })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::TaskFailed(_)));

        // The parking_lot mutex is not poisoned by the panic
        shared.run(|store| store.append(b"a")).await.unwrap();
        assert_eq!(shared.len(), 1);
    }
}
