//! Error types for patricia_db

use thiserror::Error;

/// Result type alias for patricia_db operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in patricia_db operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("branch does not have path = {0}")]
    SlotEmpty(u8),

    #[error("branch already covers path = {0}")]
    SlotOccupied(u8),

    #[error("path diverges after {0} matching bytes")]
    PathDiverge(usize),

    #[error("{0} does not store value")]
    NotAValue(&'static str),

    #[error("invalid patricia operation: {0}")]
    InvalidPatricia(String),

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid database file: {0}")]
    InvalidFile(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

impl Error {
    /// True for violations of a structural precondition of the trie
    pub fn is_invalid_patricia(&self) -> bool {
        matches!(
            self,
            Error::SlotEmpty(_)
                | Error::SlotOccupied(_)
                | Error::NotAValue(_)
                | Error::InvalidPatricia(_)
        )
    }

    /// True when a key stopped matching a compressed path
    pub fn is_divergence(&self) -> bool {
        matches!(self, Error::PathDiverge(_))
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
