//! Multi-file packages: the plaintext that goes inside a vault envelope
//!
//! Layout: `headerLen (u32 LE) || headerJSON || payload`. The payload is the
//! concatenation of every file's bytes, optionally gzip-compressed as a whole.
//! File offsets in the header always refer to the uncompressed payload.

use std::io::{Read, Write};

use flate2::Compression as GzLevel;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Package header version understood by this crate
pub const PACKAGE_VERSION: u32 = 1;

/// One file inside a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedFile {
    pub name: String,
    /// MIME type, empty when unknown
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl PackedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PayloadCompression {
    #[default]
    None,
    Gzip,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    name: String,
    #[serde(rename = "type")]
    mime_type: String,
    size: u64,
    offset: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageHeader {
    version: u32,
    files: Vec<FileEntry>,
    total_size: u64,
    #[serde(default)]
    compression: PayloadCompression,
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Packs files into a single self-describing byte string
///
/// If compression is requested but fails, the payload is stored uncompressed
/// and the header says so.
///
/// # Errors
/// Returns [`Error::InvalidParameters`] if the header cannot be serialized or
/// exceeds `u32::MAX` bytes
pub fn pack_files(files: &[PackedFile], compress: bool) -> Result<Vec<u8>> {
    let mut entries = Vec::with_capacity(files.len());
    let mut payload = Vec::with_capacity(files.iter().map(|f| f.data.len()).sum());

    for file in files {
        entries.push(FileEntry {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.data.len() as u64,
            offset: payload.len() as u64,
        });
        payload.extend_from_slice(&file.data);
    }
    let total_size = payload.len() as u64;

    let mut compression = PayloadCompression::None;
    if compress {
        match gzip(&payload) {
            Ok(compressed) => {
                payload = compressed;
                compression = PayloadCompression::Gzip;
            }
            Err(e) => tracing::warn!(error = %e, "compression failed, storing uncompressed"),
        }
    }

    let header = PackageHeader {
        version: PACKAGE_VERSION,
        files: entries,
        total_size,
        compression,
    };
    let header = serde_json::to_vec(&header)
        .map_err(|e| Error::InvalidParameters(format!("failed to serialize header: {e}")))?;
    let header_len = u32::try_from(header.len())
        .map_err(|_| Error::InvalidParameters("package header too large".to_string()))?;

    tracing::debug!(
        files = files.len(),
        total_size,
        stored_size = payload.len(),
        ?compression,
        "packed files"
    );

    let mut packed = Vec::with_capacity(4 + header.len() + payload.len());
    packed.extend_from_slice(&header_len.to_le_bytes());
    packed.extend_from_slice(&header);
    packed.extend_from_slice(&payload);
    Ok(packed)
}

/// Unpacks a byte string produced by [`pack_files`]
///
/// # Errors
/// Returns [`Error::CorruptPackage`] if the header is truncated or unparseable,
/// the version is unknown, decompression fails, or a file lies outside the payload
pub fn unpack_files(data: &[u8]) -> Result<Vec<PackedFile>> {
    let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
        return Err(Error::CorruptPackage("data too short".to_string()));
    };
    let header_len = u32::from_le_bytes(*len_bytes) as usize;
    if rest.len() < header_len {
        return Err(Error::CorruptPackage("header incomplete".to_string()));
    }
    let (header, stored) = rest.split_at(header_len);

    let header: PackageHeader = serde_json::from_slice(header)
        .map_err(|e| Error::CorruptPackage(format!("header corrupted: {e}")))?;
    if header.version != PACKAGE_VERSION {
        return Err(Error::CorruptPackage(format!(
            "unsupported package version {}",
            header.version
        )));
    }

    let decompressed;
    let payload: &[u8] = match header.compression {
        PayloadCompression::None => stored,
        PayloadCompression::Gzip => {
            let mut buffer = Vec::new();
            GzDecoder::new(stored)
                .read_to_end(&mut buffer)
                .map_err(|e| Error::CorruptPackage(format!("decompression failed: {e}")))?;
            decompressed = buffer;
            &decompressed
        }
    };

    header
        .files
        .into_iter()
        .map(|entry| {
            let start = usize::try_from(entry.offset).ok();
            let end = start.zip(usize::try_from(entry.size).ok()).and_then(|(s, n)| s.checked_add(n));
            let (Some(start), Some(end)) = (start, end) else {
                return Err(Error::CorruptPackage(format!(
                    "file data out of range for {}",
                    entry.name
                )));
            };
            let Some(bytes) = payload.get(start..end) else {
                return Err(Error::CorruptPackage(format!(
                    "file data incomplete for {}",
                    entry.name
                )));
            };
            Ok(PackedFile {
                name: entry.name,
                mime_type: entry.mime_type,
                data: bytes.to_vec(),
            })
        })
        .collect()
}
