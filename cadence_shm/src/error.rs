//! Error types for shared segment operations.

use thiserror::Error;

/// Errors that can occur while creating, attaching to or destroying a
/// shared segment.
#[derive(Error, Debug)]
pub enum SegmentError {
    /// Segment already exists
    #[error("segment already exists: {id}")]
    AlreadyExists {
        /// Segment id
        id: String,
    },

    /// Segment not found
    #[error("segment not found: {id}")]
    NotFound {
        /// Segment id
        id: String,
    },

    /// Mapped file does not match the expected layout
    #[error("segment {id} has incompatible layout: {detail}")]
    LayoutMismatch {
        /// Segment id
        id: String,
        /// What disagreed (magic, version, size)
        detail: String,
    },

    /// Requested segment geometry is out of range
    #[error("invalid segment geometry: {detail}")]
    InvalidGeometry {
        /// Offending parameter description
        detail: String,
    },

    /// IO error
    #[error("io error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Metadata sidecar (de)serialization error
    #[error("metadata error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type for shared segment operations.
pub type SegmentResult<T> = Result<T, SegmentError>;
