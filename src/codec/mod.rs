//! Event payload encoding and batch envelope construction.

pub mod batch;
pub mod error;
pub mod payload;
pub mod transform;

pub use batch::{BatchWriter, format_sent_at};
pub use error::CodecError;
pub use payload::{PayloadCodec, check_record_size};
pub use transform::{ByteTransform, GzipTransform, IdentityTransform};
