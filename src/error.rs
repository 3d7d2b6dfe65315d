//! Error and diagnostic types.
//!
//! Hard failures abort a parse and surface as [`Error`]. Recoverable oddities in a
//! document (a wrong magic, an unexpected version) are recorded as [`Diagnostic`]s
//! and parsing goes on, unless the caller asked for strict decoding.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A hard decoding failure.
#[derive(Debug, Error)]
pub enum Error {
    /// A read or skip would move past the end of the buffer.
    #[error("read of {wanted} bytes at offset {offset} overruns buffer of {len} bytes")]
    OutOfBounds { offset: usize, wanted: usize, len: usize },
    /// The buffer ends before the fixed header does.
    #[error("header is too short: buffer holds only {len} bytes")]
    HeaderTooShort { len: usize },
    /// A wire feature this decoder does not implement.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// A property type tag outside the known set.
    #[error("unknown property type 0x{tag:02X} at offset {offset}")]
    UnknownPropertyType { tag: u8, offset: usize },
    /// The decompression primitive failed on an array payload.
    #[error("failed to inflate array payload: {0}")]
    Inflate(#[source] io::Error),
    /// A diagnostic promoted to an error by strict decoding.
    #[error(transparent)]
    Rejected(#[from] Diagnostic),
}

/// A recoverable irregularity found while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Diagnostic {
    /// The leading magic bytes do not match the format's signature.
    #[error("magic mismatch: expected {expected:?}, found {found:?}")]
    MagicMismatch { expected: Vec<u8>, found: Vec<u8> },
    /// The document version lies outside the supported range.
    #[error("file is version {found}, supported versions are {supported}")]
    VersionMismatch { found: String, supported: String },
    /// Two top-level nodes share a name; the later one is kept.
    #[error("duplicate top-level node {name:?}, keeping the last one")]
    DuplicateTopLevel { name: String },
    /// A property table record could not be interpreted and was dropped.
    #[error("malformed property record at offset {offset}: {reason}")]
    MalformedPropertyRecord { offset: usize, reason: String },
}

/// Reports an overrun while reading a fixed header as a short header.
pub(crate) fn header_too_short(err: Error) -> Error {
    match err {
        Error::OutOfBounds { len, .. } => Error::HeaderTooShort { len },
        other => other,
    }
}
