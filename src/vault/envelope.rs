//! Password/key-file/secret based encryption envelope
//!
//! Current layout (little-endian):
//!
//! ```text
//! "SAFE" | version (1) | iterations (4) | salt (16) | iv (12) | [metaLen (4) | meta JSON] | ciphertext
//! ```
//!
//! Version 2 carries no metadata; version 3 carries `metaLen` and a JSON
//! metadata block at offset 37. Envelopes that do not begin with the magic
//! are read as the legacy layout `salt (16) | iv (12) | ciphertext` with
//! [`LEGACY_ITERATIONS`].
//!
//! The AES-256-GCM key is PBKDF2-HMAC-SHA256 over the concatenated SHA-256
//! digests of whichever inputs are present (password, key file, secret), in
//! that order. With no inputs at all the material is `SHA-256("")`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

pub const MAGIC: [u8; 4] = *b"SAFE";
pub const VERSION_V2: u8 = 2;
pub const VERSION_V3: u8 = 3;

/// PBKDF2 rounds used for new envelopes
pub const DEFAULT_ITERATIONS: u32 = 600_000;
/// PBKDF2 rounds assumed for legacy envelopes
pub const LEGACY_ITERATIONS: u32 = 100_000;

pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

/// Size of the fixed v2/v3 header
pub const HEADER_LEN: usize = MAGIC.len() + 1 + 4 + SALT_LEN + IV_LEN;
const META_LEN_SIZE: usize = 4;

/// Inputs that feed the key derivation
///
/// Empty strings and empty key files count as absent.
#[derive(Clone, Copy, Default)]
pub struct KeyMaterial<'a> {
    pub password: Option<&'a str>,
    pub key_file: Option<&'a [u8]>,
    pub secret: Option<&'a str>,
}

impl<'a> KeyMaterial<'a> {
    #[must_use]
    pub fn password(password: &'a str) -> Self {
        Self {
            password: Some(password),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_key_file(mut self, key_file: &'a [u8]) -> Self {
        self.key_file = Some(key_file);
        self
    }

    #[must_use]
    pub fn with_secret(mut self, secret: &'a str) -> Self {
        self.secret = Some(secret);
        self
    }

    fn digest_material(&self) -> Zeroizing<Vec<u8>> {
        let inputs = [
            self.password.map(str::as_bytes),
            self.key_file,
            self.secret.map(str::as_bytes),
        ];
        let mut material = Zeroizing::new(Vec::with_capacity(3 * 32));
        for input in inputs.into_iter().flatten().filter(|input| !input.is_empty()) {
            material.extend_from_slice(&Sha256::digest(input));
        }
        if material.is_empty() {
            material.extend_from_slice(&Sha256::digest(b""));
        }
        material
    }
}

/// Options for [`encrypt_binary`]
#[derive(Clone)]
pub struct EncryptOptions<'a> {
    pub keys: KeyMaterial<'a>,
    pub iterations: u32,
    /// Written as a v3 metadata block when present
    pub metadata: Option<EnvelopeMetadata>,
}

impl<'a> EncryptOptions<'a> {
    #[must_use]
    pub fn new(keys: KeyMaterial<'a>) -> Self {
        Self {
            keys,
            iterations: DEFAULT_ITERATIONS,
            metadata: None,
        }
    }

    #[must_use]
    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: EnvelopeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Marker for key-file protected vaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataKind {
    #[serde(rename = "shamir-keyfiles")]
    ShamirKeyFiles,
}

/// One key-file encrypted share of the vault secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedShare {
    /// 1-based share index
    pub id: u32,
    /// `iv || AES-GCM(ciphertext || tag)`
    pub data: Vec<u8>,
}

/// Metadata of a vault whose secret is split across key files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFileMetadata {
    #[serde(rename = "type")]
    pub kind: MetadataKind,
    pub threshold: usize,
    pub shares: Vec<EncryptedShare>,
}

/// Metadata block carried by a v3 envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeMetadata {
    KeyFiles(KeyFileMetadata),
    Other(serde_json::Value),
}

/// A parsed envelope, borrowing from the input bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope<'a> {
    Legacy {
        salt: &'a [u8],
        iv: &'a [u8],
        ciphertext: &'a [u8],
    },
    Current {
        version: u8,
        iterations: u32,
        salt: &'a [u8],
        iv: &'a [u8],
        metadata: Option<&'a [u8]>,
        ciphertext: &'a [u8],
    },
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

impl<'a> Envelope<'a> {
    /// Parses the envelope layout without decrypting
    ///
    /// # Errors
    /// Returns [`Error::CorruptPackage`] if the data is too short for any layout,
    /// the version is unknown, or the metadata block is truncated
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() >= HEADER_LEN && data.starts_with(&MAGIC) {
            return Self::parse_current(data);
        }
        if data.len() < SALT_LEN + IV_LEN {
            return Err(Error::CorruptPackage("data too short".to_string()));
        }
        let (salt, rest) = data.split_at(SALT_LEN);
        let (iv, ciphertext) = rest.split_at(IV_LEN);
        Ok(Self::Legacy {
            salt,
            iv,
            ciphertext,
        })
    }

    fn parse_current(data: &'a [u8]) -> Result<Self> {
        let version = data[MAGIC.len()];
        let iterations = read_u32(data, MAGIC.len() + 1)
            .ok_or_else(|| Error::CorruptPackage("data too short".to_string()))?;
        let salt_start = MAGIC.len() + 1 + 4;
        let salt = &data[salt_start..salt_start + SALT_LEN];
        let iv = &data[salt_start + SALT_LEN..HEADER_LEN];

        let (metadata, ciphertext) = match version {
            VERSION_V2 => (None, &data[HEADER_LEN..]),
            VERSION_V3 => {
                let meta_len = read_u32(data, HEADER_LEN)
                    .ok_or_else(|| Error::CorruptPackage("metadata length missing".to_string()))?
                    as usize;
                let meta_start = HEADER_LEN + META_LEN_SIZE;
                let meta_end = meta_start
                    .checked_add(meta_len)
                    .filter(|&end| end <= data.len())
                    .ok_or_else(|| Error::CorruptPackage("metadata truncated".to_string()))?;
                (Some(&data[meta_start..meta_end]), &data[meta_end..])
            }
            other => {
                return Err(Error::CorruptPackage(format!(
                    "unsupported envelope version {other}"
                )));
            }
        };

        Ok(Self::Current {
            version,
            iterations,
            salt,
            iv,
            metadata,
            ciphertext,
        })
    }

    #[must_use]
    pub fn iterations(&self) -> u32 {
        match self {
            Self::Legacy { .. } => LEGACY_ITERATIONS,
            Self::Current { iterations, .. } => *iterations,
        }
    }

    #[must_use]
    pub fn salt(&self) -> &'a [u8] {
        match self {
            Self::Legacy { salt, .. } | Self::Current { salt, .. } => salt,
        }
    }

    #[must_use]
    pub fn iv(&self) -> &'a [u8] {
        match self {
            Self::Legacy { iv, .. } | Self::Current { iv, .. } => iv,
        }
    }

    #[must_use]
    pub fn ciphertext(&self) -> &'a [u8] {
        match self {
            Self::Legacy { ciphertext, .. } | Self::Current { ciphertext, .. } => ciphertext,
        }
    }

    /// Raw metadata JSON, only present in v3 envelopes
    #[must_use]
    pub fn metadata_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Self::Legacy { .. } => None,
            Self::Current { metadata, .. } => *metadata,
        }
    }
}

/// Derives the AES-256 key for an envelope
#[must_use]
pub fn derive_key(keys: &KeyMaterial<'_>, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let material = keys.digest_material();
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(&material, salt, iterations, &mut *key);
    key
}

/// AES-256-GCM encryption; output is ciphertext with the 16-byte tag appended
pub(crate) fn seal(key: &[u8; KEY_LEN], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|_| Error::InvalidParameters("plaintext too large to encrypt".to_string()))
}

/// AES-256-GCM decryption; `None` on any authentication failure
pub(crate) fn open(key: &[u8; KEY_LEN], iv: &[u8], ciphertext: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
    if iv.len() != IV_LEN {
        return None;
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .ok()
        .map(Zeroizing::new)
}

/// Encrypts `data` into a v2 envelope, or v3 when metadata is supplied
///
/// # Errors
/// Returns [`Error::InvalidParameters`] if the iteration count is zero or the
/// metadata cannot be serialized
pub fn encrypt_binary(data: &[u8], options: &EncryptOptions<'_>) -> Result<Vec<u8>> {
    if options.iterations == 0 {
        return Err(Error::InvalidParameters(
            "iterations must be at least 1".to_string(),
        ));
    }

    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(&options.keys, &salt, options.iterations);
    let ciphertext = seal(&key, &iv, data)?;

    let metadata = options
        .metadata
        .as_ref()
        .map(serde_json::to_vec)
        .transpose()
        .map_err(|e| Error::InvalidParameters(format!("failed to serialize metadata: {e}")))?;
    let version = if metadata.is_some() { VERSION_V3 } else { VERSION_V2 };

    let mut envelope = Vec::with_capacity(
        HEADER_LEN
            + metadata.as_ref().map_or(0, |m| META_LEN_SIZE + m.len())
            + ciphertext.len(),
    );
    envelope.extend_from_slice(&MAGIC);
    envelope.push(version);
    envelope.extend_from_slice(&options.iterations.to_le_bytes());
    envelope.extend_from_slice(&salt);
    envelope.extend_from_slice(&iv);
    if let Some(metadata) = &metadata {
        let meta_len = u32::try_from(metadata.len())
            .map_err(|_| Error::InvalidParameters("metadata too large".to_string()))?;
        envelope.extend_from_slice(&meta_len.to_le_bytes());
        envelope.extend_from_slice(metadata);
    }
    envelope.extend_from_slice(&ciphertext);

    tracing::debug!(
        version,
        iterations = options.iterations,
        size = envelope.len(),
        "encrypted envelope"
    );
    Ok(envelope)
}

/// Decrypts a v2, v3 or legacy envelope
///
/// # Errors
/// Returns [`Error::CorruptPackage`] for unparseable layouts and
/// [`Error::DecryptionFailed`] for every cryptographic failure
pub fn decrypt_binary(data: &[u8], keys: &KeyMaterial<'_>) -> Result<Zeroizing<Vec<u8>>> {
    let envelope = Envelope::parse(data)?;
    let iterations = envelope.iterations();
    if iterations == 0 {
        return Err(Error::DecryptionFailed);
    }
    tracing::debug!(
        legacy = matches!(envelope, Envelope::Legacy { .. }),
        iterations,
        "decrypting envelope"
    );

    let key = derive_key(keys, envelope.salt(), iterations);
    open(&key, envelope.iv(), envelope.ciphertext()).ok_or(Error::DecryptionFailed)
}

/// Reads the metadata block of a v3 envelope without decrypting it
///
/// Returns `None` for v2, legacy, truncated or unparseable metadata.
#[must_use]
pub fn extract_metadata(data: &[u8]) -> Option<EnvelopeMetadata> {
    let bytes = Envelope::parse(data).ok()?.metadata_bytes()?;
    match serde_json::from_slice(bytes) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unparseable envelope metadata");
            None
        }
    }
}
