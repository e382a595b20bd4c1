use super::error::CodecError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::Write;

/// Writes the upload envelope `{"batch":[...],"sentAt":"..."}` incrementally.
/// Payloads are already-encoded JSON text and are copied verbatim.
#[derive(Debug)]
pub struct BatchWriter<W: Write> {
    writer: W,
    payloads: usize,
}

impl<W: Write> BatchWriter<W> {
    pub fn begin(mut writer: W) -> Result<Self, CodecError> {
        writer.write_all(b"{\"batch\":[")?;
        Ok(Self {
            writer,
            payloads: 0,
        })
    }

    pub fn emit_payload(&mut self, raw_json: &str) -> Result<(), CodecError> {
        if self.payloads > 0 {
            self.writer.write_all(b",")?;
        }
        self.writer.write_all(raw_json.as_bytes())?;
        self.payloads += 1;
        Ok(())
    }

    pub fn payload_count(&self) -> usize {
        self.payloads
    }

    /// Closes the envelope. A batch without payloads is never sent.
    pub fn finish(mut self, sent_at: DateTime<Utc>) -> Result<W, CodecError> {
        if self.payloads == 0 {
            return Err(CodecError::EmptyBatch);
        }
        self.writer.write_all(b"],\"sentAt\":")?;
        serde_json::to_writer(&mut self.writer, &format_sent_at(sent_at))?;
        self.writer.write_all(b"}")?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-03-01T12:00:00.000Z`.
pub fn format_sent_at(sent_at: DateTime<Utc>) -> String {
    sent_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
