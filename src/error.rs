//! Error taxonomy shared by the cache, sampler and sync components.
//!
//! Components that must never crash the presentation layer (tile cache, sync
//! queue) log these and convert them into "absent" or "retained" states.
//! The sampler keeps position errors as state instead of returning them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persisted bytes could not be turned back into a value.
///
/// Callers treat this as loss of that single record.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("payload frame is empty")]
    Empty,
    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),
    #[error("failed to decompress payload: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("record body is malformed: {0}")]
    Record(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Transient failure talking to the remote endpoint.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NetworkError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
}

/// Errors reported by the position source.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionError {
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("timed out waiting for a position fix")]
    Timeout,
    #[error("permission to access location was denied")]
    PermissionDenied,
}

/// A persistence call failed. Either way the caller treats the data as
/// absent for now.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The backend could not be opened or has shut down.
    #[error("persistent store unavailable: {0}")]
    Unavailable(String),
    /// The backend is up but this statement failed.
    #[error("storage query failed: {0}")]
    Query(String),
}
