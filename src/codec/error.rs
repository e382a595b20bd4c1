use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Encoded payload is empty")]
    Empty,
    #[error("Encoded payload of {size} bytes exceeds limit of {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error during serialization: {0}")]
    Io(#[from] io::Error),
    #[error("Byte transform failed: {0}")]
    Transform(io::Error),
    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Stored payload is not valid JSON: {0}")]
    Malformed(String),
    #[error("Batch is empty")]
    EmptyBatch,
}
