use proptest::prelude::*;
use rask_analytics::storage::{MemoryQueue, QueueFile, RecordStore};
use std::io::Read;
use tempfile::TempDir;

#[derive(Debug, Clone)]
enum Op {
    Append(Vec<u8>),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop::collection::vec(any::<u8>(), 0..512).prop_map(Op::Append),
        1 => (0usize..4).prop_map(Op::Remove),
    ]
}

fn contents(store: &mut dyn RecordStore) -> Vec<Vec<u8>> {
    let mut records = Vec::new();
    store
        .for_each(&mut |reader, len| {
            let mut buf = Vec::with_capacity(len);
            reader.read_to_end(&mut buf)?;
            records.push(buf);
            Ok(true)
        })
        .unwrap();
    records
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn queue_file_behaves_like_memory_queue(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue");
        let mut file_queue = QueueFile::open(&path).unwrap();
        let mut memory_queue = MemoryQueue::new();

        for op in &ops {
            match op {
                Op::Append(record) => {
                    file_queue.append(record).unwrap();
                    memory_queue.append(record).unwrap();
                }
                Op::Remove(n) => {
                    let n = (*n).min(memory_queue.size());
                    file_queue.remove_first(n).unwrap();
                    memory_queue.remove_first(n).unwrap();
                }
            }
            prop_assert_eq!(file_queue.size(), memory_queue.size());
        }

        let expected = contents(&mut memory_queue);
        prop_assert_eq!(contents(&mut file_queue), expected.clone());

        file_queue.close().unwrap();
        let mut reopened = QueueFile::open(&path).unwrap();
        prop_assert_eq!(reopened.size(), expected.len());
        prop_assert_eq!(contents(&mut reopened), expected);
    }
}

#[test]
fn test_large_records_compact_and_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("queue");
    let record = vec![7u8; 64 * 1024];

    let mut queue = QueueFile::open(&path).unwrap();
    for _ in 0..40 {
        queue.append(&record).unwrap();
    }
    queue.remove_first(30).unwrap();
    queue.append(b"tail").unwrap();
    assert_eq!(queue.size(), 11);

    // Dead space was reclaimed once it outgrew the live region
    let file_len = std::fs::metadata(&path).unwrap().len();
    assert!(file_len < 20 * 64 * 1024, "file is {file_len} bytes");
    queue.close().unwrap();

    let mut reopened = QueueFile::open(&path).unwrap();
    let records = contents(&mut reopened);
    assert_eq!(records.len(), 11);
    assert_eq!(records[10], b"tail");
}

#[test]
fn test_scan_stops_early() {
    let temp_dir = TempDir::new().unwrap();
    let mut queue = QueueFile::open(temp_dir.path().join("queue")).unwrap();
    for n in 0..5u8 {
        queue.append(&[n]).unwrap();
    }

    let mut seen = Vec::new();
    let visited = queue
        .for_each(&mut |reader, _| {
            let mut buf = [0u8; 1];
            reader.read_exact(&mut buf)?;
            seen.push(buf[0]);
            Ok(seen.len() < 2)
        })
        .unwrap();
    assert_eq!(visited, 2);
    assert_eq!(seen, vec![0, 1]);
    assert_eq!(queue.size(), 5);
}
