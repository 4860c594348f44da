//! Error types for quarry

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Index corruption: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Keys written out of order: {key:?} after {previous:?}")]
    KeyOrder { previous: Vec<u8>, key: Vec<u8> },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Operator '{operator}' expects {expected} children, got {got}")]
    Arity {
        operator: String,
        expected: String,
        got: usize,
    },

    #[error("Query error: {0}")]
    Query(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
