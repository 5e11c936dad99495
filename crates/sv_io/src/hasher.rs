//! crates/sv_io/src/hasher.rs
//!
//! SHA-256 digests and artifact IDs.
//!
//! - `sha256_canonical(..)` hashes a serializable value through canonical JSON;
//!   `sha256_hex(..)` / `sha256_file(..)` hash raw bytes.
//! - Hex digests are lowercase.
//! - `RES:<hex>` identifies a result; `RUN:<ts>:<hex>` a run record, where
//!   `<ts>` is RFC3339 UTC normalized to whole seconds with a `Z` suffix.

#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::canonical_json::{to_canonical_bytes, to_canonical_bytes_of};

#[derive(Error, Debug)]
pub enum HashError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("canonicalization error: {0}")]
    Canonical(String),

    #[error("invalid hex (expected lowercase 64-hex): {0}")]
    InvalidHex(String),

    #[error("invalid timestamp (expected RFC3339 UTC like 2026-10-16T10:00:00Z): {0}")]
    InvalidTimestamp(String),
}

/// True for a lowercase 64-char hex digest.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|c| matches!(c, b'0'..=b'9' | b'a'..=b'f'))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha256_canonical<T: Serialize>(value: &T) -> Result<String, HashError> {
    let bytes = to_canonical_bytes_of(value).map_err(|e| HashError::Canonical(e.to_string()))?;
    Ok(sha256_hex(&bytes))
}

pub fn sha256_canonical_value(v: &Value) -> Result<String, HashError> {
    let bytes = to_canonical_bytes(v).map_err(|e| HashError::Canonical(e.to_string()))?;
    Ok(sha256_hex(&bytes))
}

/// Raw digest of a file's bytes (streamed).
pub fn sha256_file(path: &Path) -> Result<String, HashError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// `RES:<hex>` over the canonical result payload.
pub fn res_id_from_canonical<T: Serialize>(value: &T) -> Result<String, HashError> {
    Ok(format!("RES:{}", sha256_canonical(value)?))
}

/// Normalize an RFC3339 timestamp with a zero UTC offset to `YYYY-MM-DDTHH:MM:SSZ`.
pub fn normalize_utc_timestamp(ts: &str) -> Result<String, HashError> {
    let parsed = DateTime::parse_from_rfc3339(ts.trim())
        .map_err(|_| HashError::InvalidTimestamp(ts.to_string()))?;
    if parsed.offset().local_minus_utc() != 0 {
        return Err(HashError::InvalidTimestamp(ts.to_string()));
    }
    Ok(parsed.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// `RUN:<ts>:<hex>` over canonical run-record bytes.
pub fn run_id_from_bytes(timestamp_utc: &str, canonical_bytes: &[u8]) -> Result<String, HashError> {
    let ts = normalize_utc_timestamp(timestamp_utc)?;
    Ok(format!("RUN:{ts}:{}", sha256_hex(canonical_bytes)))
}

pub fn run_id_from_canonical<T: Serialize>(timestamp_utc: &str, value: &T) -> Result<String, HashError> {
    let bytes = to_canonical_bytes_of(value).map_err(|e| HashError::Canonical(e.to_string()))?;
    run_id_from_bytes(timestamp_utc, &bytes)
}

/// Current time as normalized RFC3339 UTC.
pub fn now_utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
