use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid multibase prefix: expected '{expected}', got {actual:?}")]
    InvalidPrefix { expected: char, actual: Option<char> },

    #[error("unsupported hash algorithm code: {0:#x}")]
    UnsupportedAlgorithm(u64),

    #[error("invalid staging key: {0}")]
    InvalidStagingKey(String),
}
