//! Error types shared by every stage of the reconstruction pipeline
//!
//! Two failure families are kept apart on purpose: errors that mean "not enough
//! pieces yet" ([`Error::is_incomplete`]) and errors that mean "these pieces are
//! provably wrong" ([`Error::is_corrupt`]). Callers resolve the first by
//! collecting more input and the second by discarding what they have.

/// Malformed text input (share or chunk strings)
///
/// Locally recoverable: orchestration code skips the offending item and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A share string is not of the form `<x>-<hex>`.
    #[error("malformed share: {0}")]
    MalformedShare(String),

    /// A chunk string or compressed transport text could not be decoded.
    #[error("malformed chunk: {0}")]
    MalformedChunk(String),
}

/// Reconstructed data failed verification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    /// The checksum separator is missing or not at offset 64.
    #[error("reconstructed payload is malformed (wrong shares or below threshold)")]
    MalformedPayload,

    /// The embedded SHA-256 checksum does not match the recovered secret.
    #[error("checksum mismatch (corrupted or wrong shares)")]
    ChecksumMismatch,

    /// A reassembled chunk stream does not hash to the advertised short hash.
    #[error("chunk stream hash mismatch: expected {expected}, got {actual}")]
    ChunkHashMismatch { expected: String, actual: String },
}

/// Errors produced by the safeshare library
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Rejected before any work was done.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("insufficient shares: found {found}, need at least {needed}")]
    InsufficientShares { found: usize, needed: usize },

    #[error("not enough valid key files: found {found}, need {needed}")]
    InsufficientKeyFiles { found: usize, needed: usize },

    /// A chunk transfer is still missing some indices.
    #[error("incomplete chunk transfer: missing {missing:?}")]
    IncompleteChunks { missing: Vec<usize> },

    #[error("integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("corrupt package: {0}")]
    CorruptPackage(String),

    #[error("shard mismatch: {0}")]
    ShardMismatch(String),

    #[error("missing shard: {0}")]
    MissingShard(String),

    /// Wrong password, wrong key file, wrong secret or tampered data.
    #[error("decryption failed: wrong password, missing key file, or corrupted data")]
    DecryptionFailed,

    #[error("vault is not protected by multiple key files")]
    NotMultiKeyProtected,

    #[error("division by zero in GF(256)")]
    DivisionByZero,
}

impl Error {
    /// True when the failure is resolved by supplying more input.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::InsufficientShares { .. }
                | Self::InsufficientKeyFiles { .. }
                | Self::IncompleteChunks { .. }
                | Self::MissingShard(_)
        )
    }

    /// True when the supplied input is provably wrong or tampered with.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Self::Integrity(_) | Self::CorruptPackage(_) | Self::ShardMismatch(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
