//! Lossless payload codec used for every persisted value.
//!
//! The encoded form is text so it can live in any key/value backend:
//!
//! ```text
//! base64( tag: u8 | payload bytes )
//!   tag 0x00  payload is stored raw
//!   tag 0x01  payload is zstd-compressed
//! ```
//!
//! Small payloads, and payloads zstd cannot shrink, are stored raw. Structured
//! records are serialized to JSON first; field order follows the struct
//! declaration so the encoding of a given value is stable.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{DecodeError, EncodeError};

const TAG_RAW: u8 = 0x00;
const TAG_ZSTD: u8 = 0x01;

/// Payloads at or below this size are never worth compressing.
const COMPRESS_THRESH: usize = 32;

/// Compress `data` into its persisted text form.
pub fn compress(data: &[u8]) -> String {
    STANDARD.encode(frame(data))
}

/// Reverse [`compress`].
pub fn decompress(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    let framed = STANDARD.decode(encoded)?;
    let (tag, payload) = framed.split_first().ok_or(DecodeError::Empty)?;
    match *tag {
        TAG_RAW => Ok(payload.to_vec()),
        TAG_ZSTD => zstd::stream::decode_all(payload).map_err(DecodeError::Decompress),
        other => Err(DecodeError::UnknownTag(other)),
    }
}

/// Serialize a record to JSON and compress it.
pub fn encode_record<T: Serialize>(record: &T) -> Result<String, EncodeError> {
    let bytes = serde_json::to_vec(record)?;
    Ok(compress(&bytes))
}

/// Decompress and deserialize a record written by [`encode_record`].
pub fn decode_record<T: DeserializeOwned>(encoded: &str) -> Result<T, DecodeError> {
    let bytes = decompress(encoded)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn frame(data: &[u8]) -> Vec<u8> {
    if data.len() > COMPRESS_THRESH {
        match zstd::stream::encode_all(data, zstd::DEFAULT_COMPRESSION_LEVEL) {
            Ok(compressed) if compressed.len() < data.len() => {
                log::debug!(
                    "compressed payload {} -> {} bytes",
                    data.len(),
                    compressed.len()
                );
                return tagged(TAG_ZSTD, &compressed);
            }
            Ok(_) => {}
            Err(err) => log::warn!("zstd compression failed, storing raw: {err}"),
        }
    }
    tagged(TAG_RAW, data)
}

fn tagged(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 1);
    framed.push(tag);
    framed.extend_from_slice(payload);
    framed
}
