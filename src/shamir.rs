//! Threshold secret sharing with an embedded integrity checksum
//!
//! The shared payload is `sha256_hex(secret) || '|' || secret`. Every payload
//! byte becomes the constant term of its own random polynomial of degree
//! `k - 1` over GF(256), and share `x` holds every polynomial evaluated at `x`.
//!
//! Reconstruction interpolates each byte at x=0 and then checks that the
//! separator sits at offset 64 and that the checksum matches. Interpolating
//! from too few shares, or from shares of different splits, yields plausible
//! bytes; the checksum turns that into [`IntegrityError`] instead of a wrong
//! secret.
//!
//! # Examples
//!
//! ```rust
//! use safeshare::shamir::{combine, split};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let shares = split("hello world", 5, 3)?;
//! let picked = [&shares[0], &shares[2], &shares[4]].map(|s| s.to_string());
//!
//! assert_eq!(combine(&picked)?.as_str(), "hello world");
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::codec::{self, EncodedShare, Share};
use crate::domain::{ShareIndex, SplitConfig};
use crate::error::{Error, IntegrityError, Result};
use crate::field;

/// Length of the hex checksum prefix
pub const CHECKSUM_LEN: usize = 64;

/// Byte separating the checksum from the secret
pub const PAYLOAD_SEPARATOR: u8 = b'|';

/// Minimum number of shares any reconstruction needs
const MIN_SHARES: usize = 2;

/// Lowercase hex SHA-256 of `data`
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Builds `sha256_hex(secret) || '|' || secret`
fn build_payload(secret: &str) -> Zeroizing<Vec<u8>> {
    let mut payload = Zeroizing::new(Vec::with_capacity(CHECKSUM_LEN + 1 + secret.len()));
    payload.extend_from_slice(sha256_hex(secret.as_bytes()).as_bytes());
    payload.push(PAYLOAD_SEPARATOR);
    payload.extend_from_slice(secret.as_bytes());
    payload
}

/// Splits `secret` into `n` shares, any `k` of which reconstruct it
///
/// # Errors
/// Returns [`Error::InvalidParameters`] if `k < 2`, `k > n`, or `n > 255`
pub fn split(secret: &str, n: usize, k: usize) -> Result<Vec<EncodedShare>> {
    let config = SplitConfig::from_counts(n, k)?;
    Ok(split_with_rng(secret, config, &mut OsRng))
}

/// Splits `secret` according to a validated configuration
///
/// Coefficients are drawn from `rng`, fresh for every payload byte.
pub fn split_with_rng<R: RngCore + CryptoRng>(
    secret: &str,
    config: SplitConfig,
    rng: &mut R,
) -> Vec<EncodedShare> {
    let payload = build_payload(secret);
    let degree = *config.threshold() as usize - 1;

    // One polynomial per payload byte: [payload[p], r_1, ..., r_{k-1}]
    let mut coefficients = Zeroizing::new(vec![0u8; payload.len() * (degree + 1)]);
    for (polynomial, &byte) in coefficients.chunks_mut(degree + 1).zip(payload.iter()) {
        polynomial[0] = byte;
        rng.fill_bytes(&mut polynomial[1..]);
    }

    tracing::debug!(
        shares = *config.share_count(),
        threshold = *config.threshold(),
        payload_len = payload.len(),
        "splitting secret"
    );

    config
        .share_count()
        .indices()
        .map(|index| evaluate_share(&coefficients, degree + 1, index))
        .collect()
}

fn evaluate_share(coefficients: &[u8], width: usize, index: ShareIndex) -> EncodedShare {
    let evaluated: Zeroizing<Vec<u8>> = Zeroizing::new(
        coefficients
            .chunks(width)
            .map(|polynomial| field::eval_polynomial(polynomial, *index))
            .collect(),
    );
    codec::encode(*index, &evaluated)
}

/// Decodes share strings, keeping only usable, distinct, equal-length shares
///
/// Malformed strings, out-of-range indices and duplicate indices are skipped.
/// When payload lengths disagree the most common length wins; ties go to the
/// length seen first.
fn collect_shares<S: AsRef<str>>(shares: &[S]) -> Vec<(ShareIndex, Share)> {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();

    for (position, text) in shares.iter().enumerate() {
        let share = match codec::decode(text.as_ref()) {
            Ok(share) => share,
            Err(e) => {
                tracing::warn!(share = position + 1, error = %e, "skipping malformed share");
                continue;
            }
        };
        let Ok(index) = ShareIndex::try_from(share.x) else {
            tracing::warn!(share = position + 1, x = share.x, "skipping share outside GF(256)");
            continue;
        };
        if !seen.insert(index) {
            tracing::debug!(share = position + 1, x = *index, "ignoring duplicate share index");
            continue;
        }
        kept.push((index, share));
    }

    let mut counts: HashMap<usize, usize> = HashMap::new();
    let mut first_seen: Vec<usize> = Vec::new();
    for (_, share) in &kept {
        let len = share.payload.len();
        let count = counts.entry(len).or_insert(0);
        if *count == 0 {
            first_seen.push(len);
        }
        *count += 1;
    }

    if counts.len() > 1 {
        let majority = first_seen
            .iter()
            .copied()
            .fold(None::<(usize, usize)>, |best, len| {
                let count = counts[&len];
                match best {
                    Some((_, best_count)) if best_count >= count => best,
                    _ => Some((len, count)),
                }
            })
            .map_or(0, |(len, _)| len);

        let dropped = kept.len() - counts[&majority];
        tracing::warn!(
            kept_length = majority,
            dropped,
            "share payload lengths disagree; dropping minority-length shares"
        );
        kept.retain(|(_, share)| share.payload.len() == majority);
    }

    kept
}

/// Reconstructs a secret from encoded shares
///
/// Malformed or duplicate shares are skipped rather than treated as fatal.
///
/// # Errors
/// - [`Error::InsufficientShares`] if fewer than 2 usable shares remain
/// - [`IntegrityError::MalformedPayload`] if the separator is not at offset 64
/// - [`IntegrityError::ChecksumMismatch`] if the recovered secret fails its checksum
pub fn combine<S: AsRef<str>>(shares: &[S]) -> Result<Zeroizing<String>> {
    let shares = collect_shares(shares);
    if shares.len() < MIN_SHARES {
        return Err(Error::InsufficientShares {
            found: shares.len(),
            needed: MIN_SHARES,
        });
    }

    let payload_len = shares[0].1.payload.len();
    let mut points: Vec<(u8, u8)> = shares.iter().map(|(index, _)| (**index, 0)).collect();
    let mut payload = Zeroizing::new(Vec::with_capacity(payload_len));

    for position in 0..payload_len {
        for (point, (_, share)) in points.iter_mut().zip(&shares) {
            point.1 = share.payload[position];
        }
        payload.push(field::interpolate_at_zero(&points)?);
    }

    verify_payload(&payload)
}

/// Checks the separator position and checksum, returning the secret text
fn verify_payload(payload: &[u8]) -> Result<Zeroizing<String>> {
    let separator = payload.iter().position(|&b| b == PAYLOAD_SEPARATOR);
    if separator != Some(CHECKSUM_LEN) {
        return Err(IntegrityError::MalformedPayload.into());
    }

    let checksum = &payload[..CHECKSUM_LEN];
    let secret = &payload[CHECKSUM_LEN + 1..];
    if sha256_hex(secret).as_bytes() != checksum {
        return Err(IntegrityError::ChecksumMismatch.into());
    }

    let secret = String::from_utf8(secret.to_vec())
        .map_err(|_| Error::Integrity(IntegrityError::MalformedPayload))?;
    Ok(Zeroizing::new(secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(shares: &[EncodedShare]) -> Vec<String> {
        shares.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_split_produces_one_based_shares() {
        let shares = split("secret", 4, 2).unwrap();
        assert_eq!(shares.len(), 4);
        for (i, share) in shares.iter().enumerate() {
            assert!(share.as_str().starts_with(&format!("{}-", i + 1)));
        }
    }

    #[test]
    fn test_share_payload_length_matches_checksum_plus_secret() {
        let secret = "hello world";
        let shares = split(secret, 3, 2).unwrap();
        let share = codec::decode(shares[0].as_str()).unwrap();
        assert_eq!(share.payload.len(), CHECKSUM_LEN + 1 + secret.len());
    }

    #[test]
    fn test_split_rejects_bad_parameters() {
        assert!(matches!(split("s", 5, 1), Err(Error::InvalidParameters(_))));
        assert!(matches!(split("s", 3, 4), Err(Error::InvalidParameters(_))));
        assert!(matches!(split("s", 256, 3), Err(Error::InvalidParameters(_))));
    }

    #[test]
    fn test_hello_world_three_of_five() {
        let shares = strings(&split("hello world", 5, 3).unwrap());

        let picked = vec![shares[0].clone(), shares[2].clone(), shares[4].clone()];
        assert_eq!(combine(&picked).unwrap().as_str(), "hello world");

        let too_few = vec![shares[1].clone(), shares[3].clone()];
        let error = combine(&too_few).unwrap_err();
        assert!(matches!(
            error,
            Error::Integrity(_) | Error::InsufficientShares { .. }
        ));
    }

    #[test]
    fn test_combine_with_all_shares() {
        let shares = strings(&split("every share", 6, 4).unwrap());
        assert_eq!(combine(&shares).unwrap().as_str(), "every share");
    }

    #[test]
    fn test_unicode_secret() {
        let secret = "秘密のフレーズ 🔑 zürich";
        let shares = strings(&split(secret, 3, 2).unwrap());
        assert_eq!(combine(&shares[1..]).unwrap().as_str(), secret);
    }

    #[test]
    fn test_empty_secret() {
        let shares = strings(&split("", 3, 2).unwrap());
        assert_eq!(combine(&shares[..2]).unwrap().as_str(), "");
    }

    #[test]
    fn test_combine_skips_malformed_and_duplicate_shares() {
        let shares = strings(&split("resilient", 5, 3).unwrap());
        let input = vec![
            "garbage".to_string(),
            shares[0].clone(),
            shares[0].clone(),
            "0-abcd".to_string(),
            shares[1].clone(),
            shares[3].clone(),
        ];
        assert_eq!(combine(&input).unwrap().as_str(), "resilient");
    }

    #[test]
    fn test_combine_drops_minority_length_share() {
        let shares = strings(&split("majority rules", 5, 3).unwrap());
        let foreign = strings(&split("a much longer unrelated secret", 5, 3).unwrap());
        let input = vec![
            shares[0].clone(),
            foreign[1].clone(),
            shares[2].clone(),
            shares[4].clone(),
        ];
        assert_eq!(combine(&input).unwrap().as_str(), "majority rules");
    }

    #[test]
    fn test_combine_insufficient_after_filtering() {
        let shares = strings(&split("lonely", 3, 2).unwrap());
        let input = vec![shares[0].clone(), "not-a-share".to_string()];
        let error = combine(&input).unwrap_err();
        assert!(matches!(
            error,
            Error::InsufficientShares { found: 1, needed: 2 }
        ));
        assert!(error.is_incomplete());
    }

    #[test]
    fn test_combine_empty_input() {
        let empty: Vec<String> = vec![];
        assert!(matches!(
            combine(&empty),
            Err(Error::InsufficientShares { found: 0, .. })
        ));
    }

    #[test]
    fn test_corrupted_share_is_detected() {
        let shares = strings(&split("tamper evident", 3, 3).unwrap());
        let mut corrupted = shares.clone();
        // Flip a nibble in the last payload byte of share 2
        let mut bytes = corrupted[1].clone().into_bytes();
        let last = bytes.len() - 1;
        bytes[last] = if bytes[last] == b'0' { b'1' } else { b'0' };
        corrupted[1] = String::from_utf8(bytes).unwrap();

        let error = combine(&corrupted).unwrap_err();
        assert!(matches!(
            error,
            Error::Integrity(IntegrityError::ChecksumMismatch)
        ));
        assert!(error.is_corrupt());
    }

    #[test]
    fn test_mixed_splits_fail_integrity() {
        let first = strings(&split("first secret!", 3, 2).unwrap());
        let second = strings(&split("other secret!", 3, 2).unwrap());
        let mixed = vec![first[0].clone(), second[1].clone()];
        assert!(matches!(combine(&mixed), Err(Error::Integrity(_))));
    }

    #[test]
    fn test_verify_payload_rejects_displaced_separator() {
        let mut payload = vec![b'a'; 70];
        payload[10] = PAYLOAD_SEPARATOR;
        assert!(matches!(
            verify_payload(&payload),
            Err(Error::Integrity(IntegrityError::MalformedPayload))
        ));
        assert!(matches!(
            verify_payload(b"no separator"),
            Err(Error::Integrity(IntegrityError::MalformedPayload))
        ));
    }
}
