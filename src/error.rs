use thiserror::Error;

/// Errors surfaced while restoring a tree from bytes or bridging to JSON.
///
/// Saving never fails: every in-memory tree has a byte encoding, and the
/// writer only appends to a growable buffer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not a binary tree image (bad magic)")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("payload checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("truncated input: needed {needed} more bytes at offset {offset}")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("unknown value tag {tag:#04x} at offset {offset}")]
    BadValueTag { tag: u8, offset: usize },

    #[error("unknown subtype tag {tag:#04x} at offset {offset}")]
    BadSubType { tag: u8, offset: usize },

    #[error("element count {count} out of range for {what}")]
    BadCount { what: &'static str, count: u64 },

    #[error("value nesting deeper than {limit} levels at offset {offset}")]
    TooDeep { offset: usize, limit: usize },

    #[error("string payload is not UTF-8")]
    InvalidString(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("JSON value has no tree representation: {0}")]
    UnsupportedJson(String),
}

pub type Result<T> = std::result::Result<T, Error>;
