//! Property tests for the chunk protocol and vault codecs

use quickcheck::{Arbitrary, Gen, TestResult};
use quickcheck_macros::quickcheck;
use safeshare::chunk::{self, Reassembler};
use safeshare::error::Error;
use safeshare::vault::{self, EncryptOptions, KeyMaterial, PackedFile};

/// PBKDF2 cost is irrelevant to these properties
const ITERATIONS: u32 = 1;

/// Blob made of base64url characters, like compressed transport text
#[derive(Clone, Debug)]
struct TransportBlob(String);

impl Arbitrary for TransportBlob {
    fn arbitrary(g: &mut Gen) -> Self {
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
        let len = usize::arbitrary(g) % 2000 + 1;
        TransportBlob(
            (0..len)
                .map(|_| char::from(*g.choose(ALPHABET).unwrap_or(&b'A')))
                .collect(),
        )
    }
}

/// Chunk size strictly above the metadata overhead
#[derive(Clone, Copy, Debug)]
struct ChunkSize(usize);

impl Arbitrary for ChunkSize {
    fn arbitrary(g: &mut Gen) -> Self {
        ChunkSize(chunk::METADATA_OVERHEAD + 1 + usize::arbitrary(g) % 500)
    }
}

#[derive(Clone, Debug)]
struct Files(Vec<PackedFile>);

impl Arbitrary for Files {
    fn arbitrary(g: &mut Gen) -> Self {
        let count = usize::arbitrary(g) % 5;
        Files(
            (0..count)
                .map(|i| {
                    let data = if bool::arbitrary(g) { Vec::new() } else { Vec::<u8>::arbitrary(g) };
                    PackedFile::new(format!("file-{i}.bin"), "application/octet-stream", data)
                })
                .collect(),
        )
    }
}

#[quickcheck]
fn prop_chunks_reassemble_in_any_order(blob: TransportBlob, size: ChunkSize, rotation: usize) -> bool {
    let mut chunks = chunk::create_chunks(&blob.0, size.0).unwrap();
    let len = chunks.len();
    chunks.rotate_left(rotation % len);

    let mut reassembler = Reassembler::new();
    for raw in &chunks {
        reassembler.accept(raw);
    }
    let hash = reassembler.expected_hash().map(str::to_string);
    match (reassembler.finish(), hash) {
        (Ok(reassembled), Some(hash)) => {
            reassembled == blob.0 && chunk::verify_integrity(&reassembled, &hash)
        }
        _ => false,
    }
}

#[quickcheck]
fn prop_chunks_respect_size_limit(blob: TransportBlob, size: ChunkSize) -> bool {
    chunk::create_chunks(&blob.0, size.0)
        .unwrap()
        .iter()
        .all(|raw| chunk::parse_chunk(raw).is_some_and(|c| c.data.chars().count() <= size.0 - chunk::METADATA_OVERHEAD))
}

#[quickcheck]
fn prop_missing_chunk_is_incomplete(blob: TransportBlob, size: ChunkSize, drop: usize) -> TestResult {
    let chunks = chunk::create_chunks(&blob.0, size.0).unwrap();
    if chunks.len() < 2 {
        return TestResult::discard();
    }
    let dropped = drop % chunks.len();

    let mut reassembler = Reassembler::new();
    for (i, raw) in chunks.iter().enumerate() {
        if i != dropped {
            reassembler.accept(raw);
        }
    }
    match reassembler.finish() {
        Err(Error::IncompleteChunks { missing }) => TestResult::from_bool(missing == vec![dropped + 1]),
        _ => TestResult::failed(),
    }
}

#[quickcheck]
fn prop_compress_round_trip(text: String) -> bool {
    chunk::compress_text(&text)
        .and_then(|compressed| chunk::decompress_text(&compressed))
        .is_ok_and(|restored| restored == text)
}

#[quickcheck]
fn prop_pack_unpack_round_trip(files: Files, compress: bool) -> bool {
    let packed = vault::pack_files(&files.0, compress).unwrap();
    vault::unpack_files(&packed).is_ok_and(|unpacked| unpacked == files.0)
}

#[quickcheck]
fn prop_encrypt_decrypt_round_trip(data: Vec<u8>, password: String, key_file: Vec<u8>) -> bool {
    let keys = KeyMaterial::password(&password).with_key_file(&key_file);
    let envelope =
        vault::encrypt_binary(&data, &EncryptOptions::new(keys).iterations(ITERATIONS)).unwrap();
    vault::decrypt_binary(&envelope, &keys).is_ok_and(|plain| *plain == data)
}

#[quickcheck]
fn prop_wrong_password_fails(data: Vec<u8>, password: String, other: String) -> TestResult {
    if password == other {
        return TestResult::discard();
    }
    let envelope = vault::encrypt_binary(
        &data,
        &EncryptOptions::new(KeyMaterial::password(&password)).iterations(ITERATIONS),
    )
    .unwrap();
    TestResult::from_bool(matches!(
        vault::decrypt_binary(&envelope, &KeyMaterial::password(&other)),
        Err(Error::DecryptionFailed)
    ))
}

#[quickcheck]
fn prop_shard_merge_round_trip(data: Vec<u8>, n: u8) -> TestResult {
    if n == 0 {
        return TestResult::discard();
    }
    let mut shards = vault::shard_binary(&data, usize::from(n)).unwrap();
    shards.reverse();
    TestResult::from_bool(vault::merge_shards(&shards).is_ok_and(|merged| merged == data))
}

#[quickcheck]
fn prop_shard_omitted_is_missing(data: Vec<u8>, n: u8, omit: usize) -> TestResult {
    if n < 2 {
        return TestResult::discard();
    }
    let mut shards = vault::shard_binary(&data, usize::from(n)).unwrap();
    shards.remove(omit % shards.len());
    TestResult::from_bool(matches!(
        vault::merge_shards(&shards),
        Err(Error::MissingShard(_))
    ))
}
