//! WASM bindings for safeshare
//!
//! JavaScript-friendly wrappers around split/combine, the QR chunk
//! protocol and the vault. Structured results are returned as JSON strings;
//! binary values inside JSON are standard base64.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::chunk;
use crate::error::Error;
use crate::shamir;
use crate::vault::{self, EncryptOptions, KeyMaterial, PackedFile, keyfiles};

/// Initialize panic hook for better error messages in the browser console
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Use wee_alloc as the global allocator for smaller WASM binary size
#[cfg(target_arch = "wasm32")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Result of a split operation (for JSON serialization)
#[derive(Serialize, Deserialize)]
pub struct SplitResult {
    /// The generated shares as `<x>-<hex>` strings
    pub shares: Vec<String>,
    /// Number of shares generated
    pub share_count: usize,
    /// Threshold required to reconstruct
    pub threshold: usize,
}

/// A parsed chunk (for JSON serialization)
#[derive(Serialize, Deserialize)]
pub struct ChunkInfo {
    pub total: usize,
    pub index: usize,
    pub hash: String,
    pub data: String,
}

/// One file going into or coming out of a package (for JSON serialization)
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    /// File bytes, base64
    pub data: String,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> crate::Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::InvalidParameters(format!("serialization failed: {e}")))
}

fn from_base64(encoded: &str) -> crate::Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| Error::InvalidParameters(format!("invalid base64: {e}")))
}

fn split_json(secret: &str, shares: usize, threshold: usize) -> crate::Result<String> {
    let encoded = shamir::split(secret, shares, threshold)?;
    let result = SplitResult {
        shares: encoded.iter().map(ToString::to_string).collect(),
        share_count: shares,
        threshold,
    };
    to_json(&result)
}

fn chunks_json(blob: &str, max_chunk_chars: usize) -> crate::Result<String> {
    to_json(&chunk::create_chunks(blob, max_chunk_chars)?)
}

fn parse_chunk_json(raw: &str) -> Option<String> {
    let parsed = chunk::parse_chunk(raw)?;
    let info = ChunkInfo {
        total: parsed.total,
        index: parsed.index,
        hash: parsed.hash,
        data: parsed.data,
    };
    serde_json::to_string(&info).ok()
}

fn encrypt_bytes(
    data: &[u8],
    password: &str,
    key_file: Option<&[u8]>,
    iterations: Option<u32>,
) -> crate::Result<Vec<u8>> {
    let mut keys = KeyMaterial::password(password);
    if let Some(key_file) = key_file {
        keys = keys.with_key_file(key_file);
    }
    let options =
        EncryptOptions::new(keys).iterations(iterations.unwrap_or(vault::DEFAULT_ITERATIONS));
    vault::encrypt_binary(data, &options)
}

fn decrypt_bytes(data: &[u8], password: &str, key_file: Option<&[u8]>) -> crate::Result<Vec<u8>> {
    let mut keys = KeyMaterial::password(password);
    if let Some(key_file) = key_file {
        keys = keys.with_key_file(key_file);
    }
    vault::decrypt_binary(data, &keys).map(|plain| plain.to_vec())
}

fn pack_json(files_json: &str, compress: bool) -> crate::Result<Vec<u8>> {
    let infos: Vec<FileInfo> = serde_json::from_str(files_json)
        .map_err(|e| Error::InvalidParameters(format!("invalid file list: {e}")))?;
    let files = infos
        .into_iter()
        .map(|info| Ok(PackedFile::new(info.name, info.mime_type, from_base64(&info.data)?)))
        .collect::<crate::Result<Vec<_>>>()?;
    vault::pack_files(&files, compress)
}

fn unpack_json(data: &[u8]) -> crate::Result<String> {
    let infos: Vec<FileInfo> = vault::unpack_files(data)?
        .into_iter()
        .map(|file| FileInfo {
            name: file.name,
            mime_type: file.mime_type,
            data: STANDARD.encode(&file.data),
        })
        .collect();
    to_json(&infos)
}

fn shards_json(data: &[u8], n: usize) -> crate::Result<String> {
    let shards: Vec<String> = vault::shard_binary(data, n)?
        .iter()
        .map(|shard| STANDARD.encode(shard))
        .collect();
    to_json(&shards)
}

fn merge_json(list_json: &str) -> crate::Result<Vec<u8>> {
    let encoded: Vec<String> = serde_json::from_str(list_json)
        .map_err(|e| Error::InvalidParameters(format!("invalid shard list: {e}")))?;
    let shards = encoded
        .iter()
        .map(|shard| from_base64(shard))
        .collect::<crate::Result<Vec<_>>>()?;
    vault::merge_shards(&shards)
}

fn metadata_json(data: &[u8]) -> Option<String> {
    serde_json::to_string(&vault::extract_metadata(data)?).ok()
}

fn to_js_error(context: &str, error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{context}: {error}"))
}

/// Split a secret into threshold shares
///
/// # Example (JavaScript)
/// ```javascript
/// const data = JSON.parse(wasm_split("my secret", 5, 3));
/// console.log(`Created ${data.share_count} shares with threshold ${data.threshold}`);
/// ```
#[wasm_bindgen]
pub fn wasm_split(secret: &str, shares: usize, threshold: usize) -> Result<String, JsValue> {
    split_json(secret, shares, threshold).map_err(|e| to_js_error("Split failed", e))
}

/// Combine shares to reconstruct the original secret
#[wasm_bindgen]
pub fn wasm_combine(shares: Vec<String>) -> Result<String, JsValue> {
    shamir::combine(&shares)
        .map(|secret| secret.as_str().to_string())
        .map_err(|e| to_js_error("Combine failed", e))
}

/// Cut a blob into QR-sized chunks, returned as a JSON array of strings
#[wasm_bindgen]
pub fn wasm_create_chunks(blob: &str, max_chunk_chars: usize) -> Result<String, JsValue> {
    chunks_json(blob, max_chunk_chars).map_err(|e| to_js_error("Chunking failed", e))
}

/// Parse a scanned chunk into JSON, or `undefined` if it is not a chunk
#[wasm_bindgen]
pub fn wasm_parse_chunk(raw: &str) -> Option<String> {
    parse_chunk_json(raw)
}

/// Check a reassembled blob against the short hash carried by its chunks
#[wasm_bindgen]
pub fn wasm_verify_integrity(blob: &str, expected_short_hash: &str) -> bool {
    chunk::verify_integrity(blob, expected_short_hash)
}

/// Generate a fresh 64-character hex vault secret
#[wasm_bindgen]
pub fn wasm_generate_secret() -> String {
    keyfiles::generate_secret().as_str().to_string()
}

/// Encrypt bytes into a `SAFE` envelope
///
/// An empty password counts as absent; at least one of password and key file
/// should be given. `iterations` defaults to 600 000.
#[wasm_bindgen]
pub fn wasm_encrypt_binary(
    data: &[u8],
    password: &str,
    key_file: Option<Vec<u8>>,
    iterations: Option<u32>,
) -> Result<Vec<u8>, JsValue> {
    encrypt_bytes(data, password, key_file.as_deref(), iterations)
        .map_err(|e| to_js_error("Encryption failed", e))
}

/// Decrypt a `SAFE` envelope (v2, v3 or legacy)
#[wasm_bindgen]
pub fn wasm_decrypt_binary(
    data: &[u8],
    password: &str,
    key_file: Option<Vec<u8>>,
) -> Result<Vec<u8>, JsValue> {
    decrypt_bytes(data, password, key_file.as_deref())
        .map_err(|e| to_js_error("Decryption failed", e))
}

/// Multi-key metadata of an envelope as JSON, or `undefined` if it has none
#[wasm_bindgen]
pub fn wasm_extract_metadata(data: &[u8]) -> Option<String> {
    metadata_json(data)
}

/// Pack files given as a JSON array of `{name, type, data}` (data in base64)
///
/// # Example (JavaScript)
/// ```javascript
/// const packed = wasm_pack_files(JSON.stringify([{ name: "a.txt", type: "text/plain", data: btoa("hi") }]), true);
/// ```
#[wasm_bindgen]
pub fn wasm_pack_files(files_json: &str, compress: bool) -> Result<Vec<u8>, JsValue> {
    pack_json(files_json, compress).map_err(|e| to_js_error("Packing failed", e))
}

/// Unpack a package into the JSON shape accepted by [`wasm_pack_files`]
#[wasm_bindgen]
pub fn wasm_unpack_files(data: &[u8]) -> Result<String, JsValue> {
    unpack_json(data).map_err(|e| to_js_error("Unpacking failed", e))
}

/// Split an envelope into `n` shards, returned as a JSON array of base64 strings
#[wasm_bindgen]
pub fn wasm_shard_binary(data: &[u8], n: usize) -> Result<String, JsValue> {
    shards_json(data, n).map_err(|e| to_js_error("Sharding failed", e))
}

/// Merge shards given as a JSON array of base64 strings
#[wasm_bindgen]
pub fn wasm_merge_shards(list_json: &str) -> Result<Vec<u8>, JsValue> {
    merge_json(list_json).map_err(|e| to_js_error("Merging failed", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ITERATIONS: u32 = 1_000;

    #[test]
    fn test_split_json_shape() {
        let json = split_json("hello world", 5, 3).unwrap();
        let data: SplitResult = serde_json::from_str(&json).unwrap();
        assert_eq!(data.shares.len(), 5);
        assert_eq!(data.share_count, 5);
        assert_eq!(data.threshold, 3);
        assert!(data.shares[0].starts_with("1-"));
    }

    #[test]
    fn test_split_json_invalid_threshold() {
        assert!(split_json("hello", 5, 1).is_err());
    }

    #[test]
    fn test_wasm_combine_round_trip() {
        let json = wasm_split("hello world", 5, 3).unwrap();
        let data: SplitResult = serde_json::from_str(&json).unwrap();
        let recovered = wasm_combine(data.shares[2..5].to_vec()).unwrap();
        assert_eq!(recovered, "hello world");
    }

    #[test]
    fn test_chunks_json() {
        let json = chunks_json(&"a".repeat(100), 50).unwrap();
        let chunks: Vec<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(chunks.len(), 5);
        assert!(chunks[0].starts_with("v1|5|1|"));
    }

    #[test]
    fn test_parse_chunk_json() {
        let chunks = chunk::create_chunks("payload", 100).unwrap();
        let info: ChunkInfo = serde_json::from_str(&wasm_parse_chunk(&chunks[0]).unwrap()).unwrap();
        assert_eq!(info.total, 1);
        assert_eq!(info.index, 1);
        assert_eq!(info.data, "payload");
        assert!(wasm_verify_integrity("payload", &info.hash));
        assert!(wasm_parse_chunk("not a chunk").is_none());
    }

    #[test]
    fn test_generate_secret() {
        assert_eq!(wasm_generate_secret().len(), 64);
    }

    #[test]
    fn test_encrypt_decrypt_bytes() {
        let key_file = b"key file".to_vec();
        let envelope =
            encrypt_bytes(b"vault", "pw", Some(key_file.as_slice()), Some(TEST_ITERATIONS)).unwrap();
        assert_eq!(&envelope[..4], b"SAFE");

        assert_eq!(decrypt_bytes(&envelope, "pw", Some(key_file.as_slice())).unwrap(), b"vault");
        assert!(matches!(
            decrypt_bytes(&envelope, "pw", None),
            Err(Error::DecryptionFailed)
        ));
        assert!(matches!(
            encrypt_bytes(b"vault", "pw", None, Some(0)),
            Err(Error::InvalidParameters(_))
        ));
        assert!(metadata_json(&envelope).is_none());
    }

    #[test]
    fn test_pack_unpack_json() {
        let files = vec![
            FileInfo {
                name: "a.txt".to_string(),
                mime_type: "text/plain".to_string(),
                data: STANDARD.encode(b"hello"),
            },
            FileInfo {
                name: "empty".to_string(),
                mime_type: String::new(),
                data: String::new(),
            },
        ];
        let packed = pack_json(&to_json(&files).unwrap(), true).unwrap();
        let unpacked: Vec<FileInfo> = serde_json::from_str(&unpack_json(&packed).unwrap()).unwrap();
        assert_eq!(unpacked, files);

        assert!(matches!(pack_json("not json", false), Err(Error::InvalidParameters(_))));
        assert!(matches!(
            pack_json(r#"[{"name":"x","data":"!!"}]"#, false),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_shard_merge_json() {
        let data: Vec<u8> = (0..=255).collect();
        let encoded: Vec<String> = serde_json::from_str(&shards_json(&data, 3).unwrap()).unwrap();
        assert_eq!(encoded.len(), 3);

        let reversed: Vec<&String> = encoded.iter().rev().collect();
        assert_eq!(merge_json(&to_json(&reversed).unwrap()).unwrap(), data);

        assert!(matches!(
            merge_json(&to_json(&encoded[..2]).unwrap()),
            Err(Error::MissingShard(_))
        ));
    }

    #[test]
    fn test_metadata_json_for_key_file_vault() {
        let key_files = [b"one".to_vec(), b"two".to_vec()];
        let envelope =
            vault::protect_with_key_files(b"data", &key_files, 2, None, TEST_ITERATIONS).unwrap();
        let metadata: serde_json::Value =
            serde_json::from_str(&wasm_extract_metadata(&envelope).unwrap()).unwrap();
        assert_eq!(metadata["type"], "shamir-keyfiles");
        assert_eq!(metadata["threshold"], 2);
    }
}
