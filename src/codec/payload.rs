use super::error::CodecError;
use super::transform::{ByteTransform, IdentityTransform};
use crate::domain::EventRecord;
use serde::de::IgnoredAny;
use std::io::Read;
use std::sync::Arc;

/// Converts events to stored records and stored records back to the raw JSON
/// text that goes into a batch.
#[derive(Debug, Clone)]
pub struct PayloadCodec {
    transform: Arc<dyn ByteTransform>,
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new(Arc::new(IdentityTransform))
    }
}

impl PayloadCodec {
    pub fn new(transform: Arc<dyn ByteTransform>) -> Self {
        Self { transform }
    }

    /// Serializes the event's fields with sorted keys and applies the
    /// transform.
    pub fn encode(&self, event: &EventRecord) -> Result<Vec<u8>, CodecError> {
        let json = serde_json::to_vec(event.fields())?;
        self.transform.encode(&json).map_err(CodecError::Transform)
    }

    /// Reads exactly `len` stored bytes from `reader` and decodes them.
    pub fn decode(&self, reader: &mut dyn Read, len: usize) -> Result<String, CodecError> {
        let mut stored = vec![0u8; len];
        reader.read_exact(&mut stored)?;
        self.decode_bytes(&stored)
    }

    pub fn decode_bytes(&self, stored: &[u8]) -> Result<String, CodecError> {
        let plain = self
            .transform
            .decode(stored)
            .map_err(CodecError::Transform)?;
        let text = String::from_utf8(plain)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CodecError::Malformed("empty payload".to_string()));
        }
        serde_json::from_str::<IgnoredAny>(trimmed)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;

        if trimmed.len() == text.len() {
            Ok(text)
        } else {
            Ok(trimmed.to_string())
        }
    }
}

/// Size policy applied to an encoded record before it is queued.
pub fn check_record_size(len: usize, max: usize) -> Result<(), CodecError> {
    if len == 0 {
        return Err(CodecError::Empty);
    }
    if len > max {
        return Err(CodecError::TooLarge { size: len, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GzipTransform;
    use crate::domain::{EventKind, Property};

    fn sample_event() -> EventRecord {
        EventRecord::builder(EventKind::Track)
            .user_id("user-1")
            .event("Order Completed")
            .property("revenue", 42.5)
            .property("currency", "EUR")
            .build()
            .unwrap()
    }

    #[test]
    fn test_encode_sorts_keys() {
        let codec = PayloadCodec::default();
        let encoded = codec.encode(&sample_event()).unwrap();
        let text = String::from_utf8(encoded).unwrap();

        let event_pos = text.find("\"event\"").unwrap();
        let type_pos = text.find("\"type\"").unwrap();
        let user_pos = text.find("\"userId\"").unwrap();
        assert!(event_pos < type_pos && type_pos < user_pos);
        assert!(text.contains(r#""properties":{"currency":"EUR","revenue":42.5}"#));
    }

    #[test]
    fn test_non_finite_numbers_encode_as_zero() {
        let event = EventRecord::builder(EventKind::Track)
            .anonymous_id("anon")
            .event("Measured")
            .property("nan", f64::NAN)
            .property("inf", f64::INFINITY)
            .property("neg_inf", f64::NEG_INFINITY)
            .build()
            .unwrap();

        let text = String::from_utf8(PayloadCodec::default().encode(&event).unwrap()).unwrap();
        assert!(text.contains(r#""properties":{"inf":0,"nan":0,"neg_inf":0}"#));
    }

    #[test]
    fn test_decode_trims_whitespace() {
        let codec = PayloadCodec::default();
        let decoded = codec.decode_bytes(b"  {\"a\":1}\n").unwrap();
        assert_eq!(decoded, "{\"a\":1}");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = PayloadCodec::default();
        assert!(matches!(
            codec.decode_bytes(b"{\"a\":"),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            codec.decode_bytes(&[0xff, 0xfe]),
            Err(CodecError::Utf8(_))
        ));
        assert!(matches!(
            codec.decode_bytes(b"   "),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_gzip_codec_decodes_to_plain_json() {
        let codec = PayloadCodec::new(Arc::new(GzipTransform::default()));
        let event = sample_event();
        let stored = codec.encode(&event).unwrap();

        let mut reader: &[u8] = &stored;
        let decoded = codec.decode(&mut reader, stored.len()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(value["event"], "Order Completed");
        assert_eq!(
            event.get("event"),
            Some(&Property::String("Order Completed".to_string()))
        );
    }

    #[test]
    fn test_record_size_policy() {
        assert!(matches!(check_record_size(0, 10), Err(CodecError::Empty)));
        assert!(check_record_size(10, 10).is_ok());
        assert!(matches!(
            check_record_size(32001, 32000),
            Err(CodecError::TooLarge {
                size: 32001,
                max: 32000
            })
        ));
    }
}
