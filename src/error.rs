//! Error kinds surfaced by the indexing core.
//!
//! Single-sequence problems at build time are logged and skipped by the
//! callers; the kinds below are the ones that cross an API boundary. The
//! binary maps them onto process exit codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KseedError {
    /// The index file exists but was produced by an incompatible version.
    #[error("index version mismatch: found {found:?}, expected {expected:?}")]
    VersionMismatch { found: String, expected: String },

    /// A required blob is absent from the index container.
    #[error("index file is missing required blob {name} (key {key})")]
    MissingBlob { key: u32, name: &'static str },

    /// A sequence byte did not map to any residue under strict decoding.
    #[error("invalid residue {byte:#04x} at position {position} in sequence {seq_id}")]
    InvalidResidue {
        seq_id: u32,
        position: usize,
        byte: u8,
    },

    /// A parameter was rejected before any I/O happened.
    #[error("invalid parameter: {0}")]
    Parameter(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed textual input (store index lines, ORF headers).
    #[error("parse error: {0}")]
    Parse(String),
}

impl KseedError {
    /// Process exit code for this error kind: 2 for version mismatches,
    /// 3 for parameter errors, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            KseedError::VersionMismatch { .. } => 2,
            KseedError::Parameter(_) => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, KseedError>;
