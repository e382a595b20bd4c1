use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fmt;
use std::io::{self, Read, Write};

/// Reversible byte transform applied to every record before it is stored and
/// undone before it is uploaded.
pub trait ByteTransform: Send + Sync + fmt::Debug {
    fn encode(&self, input: &[u8]) -> io::Result<Vec<u8>>;
    fn decode(&self, input: &[u8]) -> io::Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl ByteTransform for IdentityTransform {
    fn encode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn decode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        Ok(input.to_vec())
    }
}

/// Stores records gzip-compressed.
#[derive(Debug, Clone, Copy)]
pub struct GzipTransform {
    level: Compression,
}

impl GzipTransform {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for GzipTransform {
    fn default() -> Self {
        Self {
            level: Compression::fast(),
        }
    }
}

impl ByteTransform for GzipTransform {
    fn encode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(input.len() / 2 + 32), self.level);
        encoder.write_all(input)?;
        encoder.finish()
    }

    fn decode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        let mut decoded = Vec::with_capacity(input.len() * 2);
        GzDecoder::new(input).read_to_end(&mut decoded)?;
        Ok(decoded)
    }
}
