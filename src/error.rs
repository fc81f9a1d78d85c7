//! Error types for starhopper

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for container parsing and extraction
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected end of stream at offset {offset} (wanted {wanted} bytes)")]
    EndOfStream { offset: u64, wanted: u64 },

    #[error("Bad magic: expected {expected:?}, found {found:?}")]
    BadMagic { expected: String, found: String },

    #[error("Invalid value for {field}: {value}")]
    Validation { field: &'static str, value: String },

    #[error("Corrupt data: {0}")]
    CorruptData(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Unsupported variant: {0}")]
    UnsupportedVariant(String),

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation not supported by this container: {0}")]
    Unsupported(&'static str),
}

/// Result type alias for starhopper operations
pub type Result<T> = std::result::Result<T, Error>;
