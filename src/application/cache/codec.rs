//! Serialized cache payloads with optional gzip compression.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::Result;

/// Stored form of a cached value.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    Plain(Vec<u8>),
    Gzip(Vec<u8>),
}

impl Payload {
    pub(crate) fn is_compressed(&self) -> bool {
        matches!(self, Self::Gzip(_))
    }

    /// Stored size in bytes.
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Plain(bytes) | Self::Gzip(bytes) => bytes.len(),
        }
    }
}

/// A payload that could not be turned back into a value.
///
/// Never leaves the cache: the entry is dropped and the lookup is a miss.
#[derive(Debug, Error)]
pub(crate) enum CacheDecodeError {
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("invalid payload: {0}")]
    Json(#[source] serde_json::Error),
}

/// Serialize `value` as JSON, gzipping it when larger than `threshold` bytes.
pub(crate) fn encode<T: Serialize>(value: &T, threshold: usize) -> Result<Payload> {
    let json = serde_json::to_vec(value)?;
    if json.len() <= threshold {
        return Ok(Payload::Plain(json));
    }
    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 4), Compression::fast());
    encoder.write_all(&json)?;
    Ok(Payload::Gzip(encoder.finish()?))
}

pub(crate) fn decode<T: DeserializeOwned>(payload: &Payload) -> std::result::Result<T, CacheDecodeError> {
    match payload {
        Payload::Plain(bytes) => serde_json::from_slice(bytes).map_err(CacheDecodeError::Json),
        Payload::Gzip(bytes) => {
            let mut json = Vec::with_capacity(bytes.len() * 4);
            GzDecoder::new(bytes.as_slice())
                .read_to_end(&mut json)
                .map_err(CacheDecodeError::Decompress)?;
            serde_json::from_slice(&json).map_err(CacheDecodeError::Json)
        }
    }
}
