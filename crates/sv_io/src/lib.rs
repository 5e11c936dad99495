//! crates/sv_io/src/lib.rs
//! I/O for the election simulator: input loading with schema validation,
//! canonical JSON, SHA-256 digests and the scenario manifest.
//!
//! - Shared error type (`IoError`) with `From` conversions used across modules.
//! - Details live in the submodules; the prelude re-exports the common items.

#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (open, create_dir_all, rename, fsync).
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON parse/decode errors, located by pointer or file:line:column.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// JSON Schema violations.
    #[error("schema error: {0}")]
    Schema(String),

    #[error("hash error: {0}")]
    Hash(String),

    /// Generic validation failures on otherwise well-formed input.
    #[error("invalid: {0}")]
    Invalid(String),

    #[error("manifest error: {0}")]
    Manifest(#[from] manifest::ManifestError),

    /// Input exceeds the size cap.
    #[error("limit exceeded: {0}")]
    Limit(String),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::Json { pointer: "/".to_string(), msg: e.to_string() }
    }
}

impl From<hasher::HashError> for IoError {
    fn from(e: hasher::HashError) -> Self {
        IoError::Hash(e.to_string())
    }
}

pub mod canonical_json;
pub mod hasher;
pub mod loader;
pub mod manifest;
pub mod schema;

pub mod prelude {
    pub use crate::canonical_json::{to_canonical_bytes, to_canonical_bytes_of, write_atomic, write_canonical_file};
    pub use crate::hasher::{res_id_from_canonical, run_id_from_canonical, sha256_canonical, sha256_hex};
    pub use crate::loader::{
        load_scenario_from_manifest, load_scenario_from_paths, Dataset, InputDigests, LoadedScenario,
    };
    pub use crate::{IoError, IoResult};
}
