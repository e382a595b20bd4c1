use crate::codec::{BatchWriter, CodecError, PayloadCodec};
use crate::storage::{RecordStore, StorageError};
use chrono::{DateTime, Utc};
use std::io;
use tracing::{debug, warn};

/// Result of scanning the head of the queue for one upload.
#[derive(Debug, Default)]
pub(crate) struct ScannedBatch {
    /// Finished envelope, absent when no record decoded.
    pub body: Option<Vec<u8>>,
    /// Oldest records covered by this batch, undecodable ones included.
    pub consumed: usize,
    pub payloads: usize,
    pub skipped: usize,
    /// The first record alone exceeds the batch ceiling.
    pub oversized_head: bool,
}

/// Collects the longest prefix of the queue whose stored size fits in
/// `max_batch_size`. Records that fail to decode are skipped but still
/// counted as consumed.
pub(crate) fn scan_batch(
    store: &mut dyn RecordStore,
    codec: &PayloadCodec,
    max_batch_size: usize,
    sent_at: DateTime<Utc>,
) -> Result<ScannedBatch, StorageError> {
    let mut writer = BatchWriter::begin(Vec::new()).map_err(into_storage)?;
    let mut scanned = ScannedBatch::default();
    let mut total_size = 0usize;

    store.for_each(&mut |reader, len| {
        if total_size + len > max_batch_size {
            scanned.oversized_head = scanned.consumed == 0;
            return Ok(false);
        }

        match codec.decode(reader, len) {
            Ok(json) => writer
                .emit_payload(&json)
                .map_err(|e| io::Error::other(e.to_string()))?,
            Err(CodecError::Io(e)) => return Err(e),
            Err(e) => {
                warn!(
                    "Skipping undecodable record at position {}: {}",
                    scanned.consumed, e
                );
                scanned.skipped += 1;
            }
        }

        total_size += len;
        scanned.consumed += 1;
        Ok(true)
    })?;

    scanned.payloads = writer.payload_count();
    if scanned.payloads > 0 {
        scanned.body = Some(writer.finish(sent_at).map_err(into_storage)?);
    }

    debug!(
        "Scanned {} records ({} bytes, {} skipped)",
        scanned.consumed, total_size, scanned.skipped
    );
    Ok(scanned)
}

fn into_storage(error: CodecError) -> StorageError {
    match error {
        CodecError::Io(e) => StorageError::Io(e),
        other => StorageError::Io(io::Error::other(other.to_string())),
    }
}
