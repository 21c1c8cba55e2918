//! Vaults unlocked by any `k` of `n` key files
//!
//! A random vault secret encrypts the payload. The secret is split `k`-of-`n`,
//! and share `i` is encrypted under `SHA-256(key_file_i)` with AES-256-GCM.
//! The encrypted shares travel in the envelope's v3 metadata block, so any
//! `k` of the original key files (plus the password, if one was set) recover
//! the vault.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::codec;
use crate::error::{Error, Result};
use crate::shamir;
use crate::vault::envelope::{
    self, EncryptOptions, EncryptedShare, EnvelopeMetadata, IV_LEN, KEY_LEN, KeyFileMetadata,
    KeyMaterial, MetadataKind,
};

/// Bytes of randomness in a vault secret
pub const SECRET_BYTES: usize = 32;

/// Generates a fresh vault secret as 64 lowercase hex characters
#[must_use]
pub fn generate_secret() -> Zeroizing<String> {
    let mut bytes = Zeroizing::new([0u8; SECRET_BYTES]);
    OsRng.fill_bytes(bytes.as_mut_slice());
    Zeroizing::new(hex::encode(bytes.as_slice()))
}

fn key_file_key(key_file: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    Zeroizing::new(Sha256::digest(key_file).into())
}

/// Encrypts one share under a key file; output is `iv || ciphertext || tag`
///
/// # Errors
/// Propagates encryption failures as [`Error::InvalidParameters`]
pub fn encrypt_share(share: &str, key_file: &[u8]) -> Result<Vec<u8>> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let ciphertext = envelope::seal(&key_file_key(key_file), &iv, share.as_bytes())?;

    let mut encrypted = Vec::with_capacity(IV_LEN + ciphertext.len());
    encrypted.extend_from_slice(&iv);
    encrypted.extend_from_slice(&ciphertext);
    Ok(encrypted)
}

/// Attempts to decrypt one share with a key file; `None` if it does not match
#[must_use]
pub fn decrypt_share(encrypted: &[u8], key_file: &[u8]) -> Option<Zeroizing<String>> {
    if encrypted.len() < IV_LEN {
        return None;
    }
    let (iv, ciphertext) = encrypted.split_at(IV_LEN);
    let plain = envelope::open(&key_file_key(key_file), iv, ciphertext)?;
    String::from_utf8(plain.to_vec()).ok().map(Zeroizing::new)
}

/// Encrypts `payload` so that any `threshold` of `key_files` unlock it
///
/// # Errors
/// Returns [`Error::InvalidParameters`] if the key-file count or threshold
/// cannot form a valid split
pub fn protect_with_key_files<K: AsRef<[u8]>>(
    payload: &[u8],
    key_files: &[K],
    threshold: usize,
    password: Option<&str>,
    iterations: u32,
) -> Result<Vec<u8>> {
    let secret = generate_secret();
    let shares = shamir::split(&secret, key_files.len(), threshold)?;

    let encrypted = shares
        .iter()
        .zip(key_files)
        .zip(1u32..)
        .map(|((share, key_file), id)| {
            Ok(EncryptedShare {
                id,
                data: encrypt_share(share.as_str(), key_file.as_ref())?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let metadata = EnvelopeMetadata::KeyFiles(KeyFileMetadata {
        kind: MetadataKind::ShamirKeyFiles,
        threshold,
        shares: encrypted,
    });
    let keys = KeyMaterial {
        password,
        key_file: None,
        secret: Some(secret.as_str()),
    };

    tracing::info!(
        key_files = key_files.len(),
        threshold,
        "protecting vault with key files"
    );
    envelope::encrypt_binary(
        payload,
        &EncryptOptions::new(keys)
            .iterations(iterations)
            .metadata(metadata),
    )
}

/// Recovers a key-file protected vault from any set of candidate key files
///
/// Every candidate is tried against every stored share, so one key file used
/// for several slots opens all of them. Candidates that open no share are
/// ignored; a share stored under a different id than it decodes to does not count.
///
/// # Errors
/// - [`Error::NotMultiKeyProtected`] if the envelope has no key-file metadata
/// - [`Error::InsufficientKeyFiles`] if fewer than the threshold open distinct shares
/// - [`Error::Integrity`] or [`Error::DecryptionFailed`] if the recovered
///   secret or password does not unlock the vault
pub fn recover_with_key_files<K: AsRef<[u8]>>(
    data: &[u8],
    candidates: &[K],
    password: Option<&str>,
) -> Result<Zeroizing<Vec<u8>>> {
    let Some(EnvelopeMetadata::KeyFiles(metadata)) = envelope::extract_metadata(data) else {
        return Err(Error::NotMultiKeyProtected);
    };

    let mut recovered: Vec<Zeroizing<String>> = Vec::new();
    for (position, candidate) in candidates.iter().enumerate() {
        let mut opened_any = false;
        for encrypted in &metadata.shares {
            let Some(share) = decrypt_share(&encrypted.data, candidate.as_ref()) else {
                continue;
            };
            if !codec::decode(&share).is_ok_and(|decoded| decoded.x == encrypted.id) {
                tracing::warn!(candidate = position, id = encrypted.id, "share stored under the wrong id");
                continue;
            }
            opened_any = true;
            if recovered.contains(&share) {
                tracing::debug!(candidate = position, id = encrypted.id, "share already recovered");
            } else {
                recovered.push(share);
            }
        }
        if !opened_any {
            tracing::warn!(candidate = position, "key file does not match any share");
        }
    }

    if recovered.len() < metadata.threshold {
        return Err(Error::InsufficientKeyFiles {
            found: recovered.len(),
            needed: metadata.threshold,
        });
    }

    let shares: Vec<&str> = recovered.iter().map(|share| share.as_str()).collect();
    let secret = shamir::combine(&shares)?;
    let keys = KeyMaterial {
        password,
        key_file: None,
        secret: Some(secret.as_str()),
    };
    envelope::decrypt_binary(data, &keys)
}
