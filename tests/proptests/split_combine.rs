//! Property tests for split/combine workflows

use quickcheck::{Arbitrary, Gen, TestResult};
use quickcheck_macros::quickcheck;
use safeshare::error::{Error, IntegrityError};
use safeshare::shamir;

/// Wrapper for valid threshold and share count pairs
#[derive(Clone, Copy, Debug)]
struct ValidShamirParams {
    threshold: usize,
    num_shares: usize,
}

impl Arbitrary for ValidShamirParams {
    fn arbitrary(g: &mut Gen) -> Self {
        // Generate share count between 2 and 20 (keep it reasonable for testing)
        let num_shares = usize::from(u8::arbitrary(g) % 19) + 2; // 2..=20

        // Generate threshold between 2 and num_shares (never 1)
        let threshold = usize::from(u8::arbitrary(g)) % (num_shares - 1) + 2; // 2..=num_shares

        ValidShamirParams {
            threshold,
            num_shares,
        }
    }
}

/// Picks `count` distinct positions out of `0..len`
fn pick_distinct(g: &mut Gen, len: usize, count: usize) -> Vec<usize> {
    let mut positions: Vec<usize> = (0..len).collect();
    for i in (1..len).rev() {
        let j = usize::arbitrary(g) % (i + 1);
        positions.swap(i, j);
    }
    positions.truncate(count);
    positions
}

/// Test that splitting and combining with all shares recovers the original secret
#[quickcheck]
fn prop_split_combine_round_trip(secret: String, params: ValidShamirParams) -> bool {
    let shares = shamir::split(&secret, params.num_shares, params.threshold).unwrap();
    if shares.len() != params.num_shares {
        return false;
    }
    let strings: Vec<String> = shares.iter().map(ToString::to_string).collect();
    shamir::combine(&strings).is_ok_and(|recovered| *recovered == secret)
}

/// Test that random selections of threshold shares work
#[quickcheck]
fn prop_random_share_selection_works(secret: String, params: ValidShamirParams, seed: u64) -> bool {
    let shares = shamir::split(&secret, params.num_shares, params.threshold).unwrap();

    let mut g = Gen::new(usize::try_from(seed % 1024).unwrap_or(0) + 1);
    let selected: Vec<String> = pick_distinct(&mut g, shares.len(), params.threshold)
        .into_iter()
        .map(|i| shares[i].to_string())
        .collect();

    shamir::combine(&selected).is_ok_and(|recovered| *recovered == secret)
}

/// Test that one share fewer than the threshold never yields the secret
#[quickcheck]
fn prop_insufficient_shares_fail(secret: String, params: ValidShamirParams) -> bool {
    let shares = shamir::split(&secret, params.num_shares, params.threshold).unwrap();
    let selected: Vec<String> = shares
        .iter()
        .take(params.threshold - 1)
        .map(ToString::to_string)
        .collect();

    match shamir::combine(&selected) {
        Err(Error::InsufficientShares { .. } | Error::Integrity(_)) => true,
        Err(_) => false,
        Ok(recovered) => *recovered != secret,
    }
}

/// Test that mutating one hex digit of one share is detected
#[quickcheck]
fn prop_mutated_share_detected(
    secret: String,
    params: ValidShamirParams,
    victim: usize,
    position: usize,
) -> TestResult {
    let shares = shamir::split(&secret, params.num_shares, params.threshold).unwrap();
    let mut selected: Vec<String> = shares
        .iter()
        .take(params.threshold)
        .map(ToString::to_string)
        .collect();

    let share = &mut selected[victim % params.threshold];
    let hex_start = share.find('-').unwrap() + 1;
    let offset = hex_start + position % (share.len() - hex_start);
    let original = share.as_bytes()[offset];
    let replacement = if original == b'0' { "1" } else { "0" };
    share.replace_range(offset..=offset, replacement);

    TestResult::from_bool(matches!(
        shamir::combine(&selected),
        Err(Error::Integrity(
            IntegrityError::ChecksumMismatch | IntegrityError::MalformedPayload
        ))
    ))
}

/// Test that shares from different secrets don't combine into either secret
///
/// Secrets of different byte lengths give shares of different lengths, and the
/// majority-length rule drops one side before interpolation; that case is
/// covered by `prop_mixed_lengths_are_incomplete_or_corrupt`.
#[quickcheck]
fn prop_mixed_shares_fail(first: String, second: String, params: ValidShamirParams) -> TestResult {
    if first == second || first.len() != second.len() {
        return TestResult::discard();
    }
    let a = shamir::split(&first, params.num_shares, params.threshold).unwrap();
    let b = shamir::split(&second, params.num_shares, params.threshold).unwrap();

    // Half from each split, distinct indices
    let selected: Vec<String> = (0..params.threshold)
        .map(|i| if i % 2 == 0 { a[i].to_string() } else { b[i].to_string() })
        .collect();

    match shamir::combine(&selected) {
        Ok(recovered) => TestResult::from_bool(*recovered != first && *recovered != second),
        Err(e) => TestResult::from_bool(e.is_corrupt()),
    }
}

/// Test that mixing shares of different lengths never yields either secret
#[quickcheck]
fn prop_mixed_lengths_are_incomplete_or_corrupt(
    first: String,
    second: String,
    params: ValidShamirParams,
) -> TestResult {
    if first.len() == second.len() {
        return TestResult::discard();
    }
    let a = shamir::split(&first, params.num_shares, params.threshold).unwrap();
    let b = shamir::split(&second, params.num_shares, params.threshold).unwrap();

    let selected: Vec<String> = (0..params.threshold)
        .map(|i| if i % 2 == 0 { a[i].to_string() } else { b[i].to_string() })
        .collect();

    match shamir::combine(&selected) {
        Ok(recovered) => TestResult::from_bool(*recovered != first && *recovered != second),
        Err(e) => TestResult::from_bool(e.is_incomplete() || e.is_corrupt()),
    }
}

#[cfg(test)]
mod regression_tests {
    use super::*;

    /// Full-size split: every x in 1..=255 is a valid share
    #[test]
    fn test_maximum_share_count() {
        let shares = shamir::split("max", 255, 2).unwrap();
        assert_eq!(shares.len(), 255);
        assert!(shares[254].as_str().starts_with("255-"));
        let pair = [shares[0].to_string(), shares[254].to_string()];
        assert_eq!(shamir::combine(&pair).unwrap().as_str(), "max");
    }

    /// Threshold 1 is rejected outright rather than producing copies of the secret
    #[test]
    fn test_threshold_1_rejected() {
        assert!(matches!(
            shamir::split("secret", 3, 1),
            Err(Error::InvalidParameters(_))
        ));
    }

    /// An empty and a one-byte secret at threshold 2: the shorter share is dropped
    #[test]
    fn test_mixed_lengths_at_threshold_two() {
        let a = shamir::split("", 7, 2).unwrap();
        let b = shamir::split("\0", 7, 2).unwrap();
        let selected = [a[0].to_string(), b[1].to_string()];
        assert!(matches!(
            shamir::combine(&selected),
            Err(Error::InsufficientShares { .. })
        ));
    }

    #[test]
    fn test_threshold_above_share_count_rejected() {
        assert!(matches!(
            shamir::split("secret", 3, 4),
            Err(Error::InvalidParameters(_))
        ));
        assert!(matches!(
            shamir::split("secret", 256, 2),
            Err(Error::InvalidParameters(_))
        ));
    }
}
