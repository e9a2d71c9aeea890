//! Error types for vicinity operations

use std::io;

use thiserror::Error;

/// Result type alias for vicinity operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by handle, codec, engine, and registry operations.
///
/// Every error is detected at the boundary of the operation that caused it
/// and leaves the handle in the state it had before the call, except where
/// an operation documents otherwise (a failed `create_index` still keeps
/// the accumulated points).
#[derive(Debug, Error)]
pub enum Error {
    /// Bad space/method name or malformed parameter list.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Data type or distance-value type combination that this crate
    /// deliberately rejects (anything other than VECTOR x FLOAT).
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Malformed point or query input: wrong shape, non-finite element,
    /// or wrong memory layout.
    #[error("data format error: {0}")]
    DataFormat(String),

    /// Engine failure while constructing the search structure.
    #[error("index build failed: {0}")]
    Build(String),

    /// Operation requires a built index that is absent.
    #[error("index is not built: call create_index or load_index before {0}")]
    NotBuilt(&'static str),

    /// Position lookup outside the point collection.
    #[error("data point position {index} is out of range: valid positions are 0..{qty}")]
    IndexOutOfRange {
        /// Requested zero-based position.
        index: usize,
        /// Number of points currently held.
        qty: usize,
    },

    /// I/O failure while persisting or loading an index.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Persisted index state that cannot be interpreted or does not match
    /// the point collection it is being loaded against.
    #[error("index format error: {0}")]
    Format(String),

    /// Operation against a freed or never-issued handle token.
    #[error("invalid index handle {0:#x}: token is stale, freed, or unknown")]
    InvalidHandle(u64),
}
