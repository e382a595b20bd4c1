use super::{RecordStore, RecordVisitor, StorageError, StoreKind};
use bytes::Bytes;
use std::collections::VecDeque;

/// Volatile record queue. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    records: VecDeque<Bytes>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryQueue {
    fn size(&self) -> usize {
        self.records.len()
    }

    fn append(&mut self, record: &[u8]) -> Result<(), StorageError> {
        self.records.push_back(Bytes::copy_from_slice(record));
        Ok(())
    }

    fn remove_first(&mut self, n: usize) -> Result<(), StorageError> {
        if n > self.records.len() {
            return Err(StorageError::RemoveOutOfRange {
                requested: n,
                available: self.records.len(),
            });
        }
        self.records.drain(..n);
        Ok(())
    }

    fn for_each(&mut self, visit: &mut RecordVisitor<'_>) -> Result<usize, StorageError> {
        let mut visited = 0;
        for record in &self.records {
            visited += 1;
            let mut reader: &[u8] = record;
            if !visit(&mut reader, record.len())? {
                break;
            }
        }
        Ok(visited)
    }

    fn close(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Volatile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_fifo_order_and_removal() {
        let mut queue = MemoryQueue::new();
        queue.append(b"a").unwrap();
        queue.append(b"bb").unwrap();
        queue.append(b"ccc").unwrap();

        queue.remove_first(1).unwrap();

        let mut seen = Vec::new();
        queue
            .for_each(&mut |reader, len| {
                let mut buf = String::new();
                reader.read_to_string(&mut buf)?;
                assert_eq!(buf.len(), len);
                seen.push(buf);
                Ok(true)
            })
            .unwrap();
        assert_eq!(seen, vec!["bb", "ccc"]);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut queue = MemoryQueue::new();
        queue.append(b"x").unwrap();
        assert!(queue.remove_first(3).is_err());
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn test_close_keeps_contents() {
        let mut queue = MemoryQueue::new();
        queue.append(b"x").unwrap();
        queue.close().unwrap();
        queue.close().unwrap();
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.kind(), StoreKind::Volatile);
    }
}
