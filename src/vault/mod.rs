//! Encrypted vaults: file packaging, the `SAFE` envelope, physical sharding
//! and key-file threshold protection

pub mod envelope;
pub mod keyfiles;
pub mod package;
pub mod shard;

pub use envelope::{
    DEFAULT_ITERATIONS, EncryptOptions, Envelope, EnvelopeMetadata, KeyFileMetadata, KeyMaterial,
    LEGACY_ITERATIONS, decrypt_binary, encrypt_binary, extract_metadata,
};
pub use keyfiles::{generate_secret, protect_with_key_files, recover_with_key_files};
pub use package::{PackedFile, pack_files, unpack_files};
pub use shard::{merge_shards, shard_binary};
