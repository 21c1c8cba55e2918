//! Splitting an envelope into physically separate pieces
//!
//! A shard is `[index (1-based), total] || data`. Shards are plain slices of
//! the envelope, not a threshold scheme: every shard is needed to merge.

use crate::error::{Error, Result};

/// Bytes of per-shard header
pub const SHARD_HEADER_LEN: usize = 2;

/// Cuts `data` into `n` shards of `ceil(len / n)` bytes (the last may be shorter)
///
/// # Errors
/// Returns [`Error::InvalidParameters`] if `n` is zero or above 255
pub fn shard_binary(data: &[u8], n: usize) -> Result<Vec<Vec<u8>>> {
    let total = u8::try_from(n)
        .ok()
        .filter(|&total| total > 0)
        .ok_or_else(|| Error::InvalidParameters(format!("shard count must be 1..=255, got {n}")))?;

    let chunk_size = data.len().div_ceil(n);
    let shards = (1..=total)
        .map(|index| {
            let start = (usize::from(index - 1) * chunk_size).min(data.len());
            let end = (start + chunk_size).min(data.len());
            let mut shard = Vec::with_capacity(SHARD_HEADER_LEN + end - start);
            shard.push(index);
            shard.push(total);
            shard.extend_from_slice(&data[start..end]);
            shard
        })
        .collect();

    tracing::debug!(total, chunk_size, size = data.len(), "sharded envelope");
    Ok(shards)
}

/// Reassembles shards produced by [`shard_binary`], in any order
///
/// # Errors
/// - [`Error::MissingShard`] if no shards are given, fewer than the declared
///   total are given, or some index is absent
/// - [`Error::ShardMismatch`] if a shard has no header, declared totals differ,
///   or more shards than the declared total are given
pub fn merge_shards<S: AsRef<[u8]>>(shards: &[S]) -> Result<Vec<u8>> {
    if shards.is_empty() {
        return Err(Error::MissingShard("no shards provided".to_string()));
    }

    let mut parsed = Vec::with_capacity(shards.len());
    for shard in shards {
        let shard = shard.as_ref();
        let [index, total, data @ ..] = shard else {
            return Err(Error::ShardMismatch(format!(
                "shard of {} bytes has no header",
                shard.len()
            )));
        };
        parsed.push((*index, *total, data));
    }

    let total = parsed[0].1;
    if let Some((_, other, _)) = parsed.iter().find(|(_, t, _)| *t != total) {
        return Err(Error::ShardMismatch(format!(
            "shards belong to different sets (total {total} vs {other})"
        )));
    }
    let expected = usize::from(total);
    if parsed.len() < expected {
        return Err(Error::MissingShard(format!(
            "expected {expected} shards, got {}",
            parsed.len()
        )));
    }
    if parsed.len() > expected {
        return Err(Error::ShardMismatch(format!(
            "expected {expected} shards, got {}",
            parsed.len()
        )));
    }

    parsed.sort_by_key(|(index, _, _)| *index);
    let mut merged = Vec::with_capacity(parsed.iter().map(|(_, _, data)| data.len()).sum());
    for (position, (index, _, data)) in parsed.iter().enumerate() {
        if usize::from(*index) != position + 1 {
            return Err(Error::MissingShard(format!(
                "shard {} of {total} is missing",
                position + 1
            )));
        }
        merged.extend_from_slice(data);
    }
    Ok(merged)
}
