//! Chunked transport of a text blob across many small frames (QR codes)
//!
//! A blob is cut into chunks rendered as `v1|{total}|{index}|{hash}|{data}`:
//! `index` is 1-based and `hash` is the first 10 characters of the unpadded
//! URL-safe base64 SHA-256 of the *whole* blob. The hash groups chunks of one
//! transfer and verifies the reassembled result.
//!
//! Blobs are normally produced by [`compress_text`], whose alphabet never
//! contains the `|` field separator.
//!
//! # Examples
//!
//! ```rust
//! use safeshare::chunk::{Reassembler, ReassemblyStatus, compress_text, create_chunks, decompress_text};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let blob = compress_text("1-abcdef\n2-123456")?;
//! let chunks = create_chunks(&blob, 40)?;
//!
//! let mut reassembler = Reassembler::new();
//! for chunk in chunks.iter().rev() {
//!     reassembler.accept(chunk);
//! }
//! assert_eq!(reassembler.status(), ReassemblyStatus::Complete);
//!
//! let text = decompress_text(&reassembler.finish()?)?;
//! assert_eq!(text, "1-abcdef\n2-123456");
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use sha2::{Digest, Sha256};

use crate::error::{Error, IntegrityError, ParseError, Result};

/// Protocol version tag, the first field of every chunk
pub const VERSION_TAG: &str = "v1";

/// Field separator inside a chunk string
pub const FIELD_SEPARATOR: char = '|';

/// Length of the short hash carried by each chunk
pub const SHORT_HASH_LEN: usize = 10;

/// Characters reserved per chunk for `v1|total|index|hash|`
pub const METADATA_OVERHEAD: usize = 30;

/// Default chunk size, sized for a dense QR code
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 4000;

/// Largest `total` a transfer may advertise
///
/// Ten thousand default-sized chunks carry about 40 MB of text, far beyond
/// anything scanned frame by frame. Frames claiming more are rejected, which
/// also bounds the `missing` list a [`Reassembler`] reports.
pub const MAX_CHUNKS: usize = 10_000;

/// One parsed transport chunk
///
/// The version field is implied: only `v1` chunks parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub total: usize,
    /// 1-based position of this chunk
    pub index: usize,
    pub hash: String,
    pub data: String,
}

impl std::fmt::Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{VERSION_TAG}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
            self.total, self.index, self.hash, self.data
        )
    }
}

impl FromStr for Chunk {
    type Err = ParseError;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
        let [version, total, index, hash, data] = fields.as_slice() else {
            return Err(ParseError::MalformedChunk(format!(
                "expected 5 fields, got {}",
                fields.len()
            )));
        };
        if *version != VERSION_TAG {
            return Err(ParseError::MalformedChunk(format!(
                "unknown chunk version '{version}'"
            )));
        }
        let total = total
            .parse()
            .map_err(|_| ParseError::MalformedChunk(format!("invalid total '{total}'")))?;
        let index = index
            .parse()
            .map_err(|_| ParseError::MalformedChunk(format!("invalid index '{index}'")))?;

        Ok(Self {
            total,
            index,
            hash: (*hash).to_string(),
            data: (*data).to_string(),
        })
    }
}

/// First 10 characters of the URL-safe base64 SHA-256 of `blob`
#[must_use]
pub fn short_hash(blob: &str) -> String {
    let mut encoded = URL_SAFE_NO_PAD.encode(Sha256::digest(blob.as_bytes()));
    encoded.truncate(SHORT_HASH_LEN);
    encoded
}

/// Cuts `blob` into chunk strings of at most `max_chunk_chars` characters of payload plus metadata
///
/// An empty blob produces no chunks.
///
/// # Errors
/// Returns [`Error::InvalidParameters`] if `max_chunk_chars` leaves no room for
/// payload, if `blob` contains the `|` field separator, or if the blob would
/// need more than [`MAX_CHUNKS`] chunks
pub fn create_chunks(blob: &str, max_chunk_chars: usize) -> Result<Vec<String>> {
    if max_chunk_chars <= METADATA_OVERHEAD {
        return Err(Error::InvalidParameters(format!(
            "chunk size {max_chunk_chars} must exceed the {METADATA_OVERHEAD}-character metadata overhead"
        )));
    }
    if blob.contains(FIELD_SEPARATOR) {
        return Err(Error::InvalidParameters(
            "blob must not contain the '|' field separator".to_string(),
        ));
    }

    let payload_size = max_chunk_chars - METADATA_OVERHEAD;
    let hash = short_hash(blob);
    let characters: Vec<char> = blob.chars().collect();
    let total = characters.len().div_ceil(payload_size);
    if total > MAX_CHUNKS {
        return Err(Error::InvalidParameters(format!(
            "blob needs {total} chunks, more than the {MAX_CHUNKS} a transfer may carry"
        )));
    }

    tracing::debug!(total, payload_size, hash = %hash, "creating chunks");

    Ok(characters
        .chunks(payload_size)
        .enumerate()
        .map(|(i, data)| {
            Chunk {
                total,
                index: i + 1,
                hash: hash.clone(),
                data: data.iter().collect(),
            }
            .to_string()
        })
        .collect())
}

/// Parses a raw chunk string, returning `None` for anything that is not a v1 chunk
///
/// Whether `None` is a hard error or a stray scan is the caller's decision.
#[must_use]
pub fn parse_chunk(raw: &str) -> Option<Chunk> {
    raw.parse().ok()
}

/// Checks a reassembled blob against the short hash its chunks carried
#[must_use]
pub fn verify_integrity(blob: &str, expected_short_hash: &str) -> bool {
    short_hash(blob) == expected_short_hash
}

/// Compresses text and renders it as unpadded URL-safe base64
///
/// # Errors
/// Returns [`Error::InvalidParameters`] if the compressor fails
pub fn compress_text(text: &str) -> Result<String> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(text.as_bytes())
        .map_err(|e| Error::InvalidParameters(format!("compression failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| Error::InvalidParameters(format!("compression failed: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Reverses [`compress_text`]
///
/// # Errors
/// Returns [`ParseError::MalformedChunk`] if the text is not valid base64, the
/// stream is corrupt, or the result is not UTF-8
pub fn decompress_text(blob: &str) -> Result<String> {
    let compressed = URL_SAFE_NO_PAD
        .decode(blob.trim())
        .map_err(|e| ParseError::MalformedChunk(format!("invalid base64: {e}")))?;
    let mut text = String::new();
    DeflateDecoder::new(compressed.as_slice())
        .read_to_string(&mut text)
        .map_err(|e| ParseError::MalformedChunk(format!("decompression failed: {e}")))?;
    Ok(text)
}

/// Why a scanned frame was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A non-chunk string arrived after chunk mode started, or a second raw string.
    NotAChunk,
    /// The chunk belongs to a different transfer.
    ForeignHash { expected: String, found: String },
    /// The chunk advertises a different total than earlier chunks.
    TotalMismatch { expected: usize, found: usize },
    /// The index is 0 or greater than the advertised total.
    IndexOutOfRange { index: usize, total: usize },
    /// The advertised total exceeds [`MAX_CHUNKS`].
    TooManyChunks { total: usize },
    /// Same index as an accepted chunk but different data.
    ConflictingData { index: usize },
    /// A chunk arrived after a raw single-frame payload was accepted.
    ModeConflict,
}

/// Result of offering one scanned frame to a [`Reassembler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Accepted,
    /// Already have this exact chunk.
    Duplicate,
    Rejected(RejectReason),
}

/// Progress of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyStatus {
    /// Nothing accepted yet.
    Empty,
    /// Some indices are still missing.
    Partial {
        received: usize,
        total: usize,
        missing: Vec<usize>,
    },
    /// Every index `1..=total` is present.
    Complete,
}

/// Collects chunks of one transfer in any order
///
/// The first accepted chunk fixes the transfer's hash and total; later chunks
/// that disagree are rejected, never mixed in. A lone non-chunk string
/// accepted before any chunk is treated as a complete single-frame payload.
#[derive(Debug, Default)]
pub struct Reassembler {
    hash: Option<String>,
    total: Option<usize>,
    parts: BTreeMap<usize, String>,
    raw: Option<String>,
}

impl Reassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers one scanned frame
    pub fn accept(&mut self, raw: &str) -> ChunkOutcome {
        let outcome = self.accept_inner(raw);
        if let ChunkOutcome::Rejected(reason) = &outcome {
            tracing::warn!(?reason, "rejected scanned frame");
        }
        outcome
    }

    fn accept_inner(&mut self, raw: &str) -> ChunkOutcome {
        let Some(chunk) = parse_chunk(raw) else {
            if self.parts.is_empty() && self.raw.is_none() {
                self.raw = Some(raw.to_string());
                return ChunkOutcome::Accepted;
            }
            if self.raw.as_deref() == Some(raw) {
                return ChunkOutcome::Duplicate;
            }
            return ChunkOutcome::Rejected(RejectReason::NotAChunk);
        };

        if self.raw.is_some() {
            return ChunkOutcome::Rejected(RejectReason::ModeConflict);
        }
        if chunk.total > MAX_CHUNKS {
            return ChunkOutcome::Rejected(RejectReason::TooManyChunks { total: chunk.total });
        }
        if chunk.index == 0 || chunk.index > chunk.total {
            return ChunkOutcome::Rejected(RejectReason::IndexOutOfRange {
                index: chunk.index,
                total: chunk.total,
            });
        }
        if let Some(expected) = &self.hash
            && *expected != chunk.hash
        {
            return ChunkOutcome::Rejected(RejectReason::ForeignHash {
                expected: expected.clone(),
                found: chunk.hash,
            });
        }
        if let Some(expected) = self.total
            && expected != chunk.total
        {
            return ChunkOutcome::Rejected(RejectReason::TotalMismatch {
                expected,
                found: chunk.total,
            });
        }
        if let Some(existing) = self.parts.get(&chunk.index) {
            if *existing == chunk.data {
                return ChunkOutcome::Duplicate;
            }
            return ChunkOutcome::Rejected(RejectReason::ConflictingData { index: chunk.index });
        }

        self.hash.get_or_insert(chunk.hash);
        self.total.get_or_insert(chunk.total);
        self.parts.insert(chunk.index, chunk.data);
        ChunkOutcome::Accepted
    }

    /// Short hash of the transfer, once the first chunk is accepted
    #[must_use]
    pub fn expected_hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    #[must_use]
    pub fn status(&self) -> ReassemblyStatus {
        if self.raw.is_some() {
            return ReassemblyStatus::Complete;
        }
        let Some(total) = self.total else {
            return ReassemblyStatus::Empty;
        };
        let missing = self.missing(total);
        if missing.is_empty() {
            ReassemblyStatus::Complete
        } else {
            ReassemblyStatus::Partial {
                received: self.parts.len(),
                total,
                missing,
            }
        }
    }

    fn missing(&self, total: usize) -> Vec<usize> {
        (1..=total).filter(|i| !self.parts.contains_key(i)).collect()
    }

    /// Concatenates the chunks in index order and verifies the result
    ///
    /// # Errors
    /// - [`Error::IncompleteChunks`] while indices are missing (empty `missing`
    ///   when no chunk has been seen yet)
    /// - [`IntegrityError::ChunkHashMismatch`] if the blob fails verification
    pub fn finish(mut self) -> Result<String> {
        if let Some(raw) = self.raw.take() {
            return Ok(raw);
        }
        let (Some(total), Some(expected)) = (self.total, self.hash.clone()) else {
            return Err(Error::IncompleteChunks {
                missing: Vec::new(),
            });
        };
        let missing = self.missing(total);
        if !missing.is_empty() {
            return Err(Error::IncompleteChunks { missing });
        }

        let blob: String = self.parts.into_values().collect();
        if !verify_integrity(&blob, &expected) {
            return Err(IntegrityError::ChunkHashMismatch {
                expected,
                actual: short_hash(&blob),
            }
            .into());
        }
        Ok(blob)
    }
}
