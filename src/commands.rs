use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use zeroize::Zeroizing;

use crate::chunk::{self, ChunkOutcome, Reassembler, ReassemblyStatus};
use crate::domain::SplitConfig;
use crate::shamir;
use crate::vault::{
    self, EncryptOptions, EnvelopeMetadata, KeyMaterial, PackedFile, extract_metadata,
};

/// Split a secret into threshold shares
///
/// Returns one `<x>-<hex>` string per share.
///
/// # Errors
/// Returns an error if the secret is empty
pub fn split_secret(secret: &str, config: SplitConfig) -> Result<Vec<String>> {
    if secret.is_empty() {
        bail!("Secret is empty");
    }
    let shares = shamir::split_with_rng(secret, config, &mut rand::rngs::OsRng);
    Ok(shares.iter().map(ToString::to_string).collect())
}

/// Combine shares to reconstruct the original secret
///
/// # Errors
/// Returns an error if no shares are given or reconstruction fails
pub fn combine_shares(share_strings: &[String]) -> Result<Zeroizing<String>> {
    if share_strings.is_empty() {
        bail!("No shares provided");
    }
    shamir::combine(share_strings).context("Failed to reconstruct secret")
}

/// Cut text into transport chunks, optionally compressing it first
///
/// # Errors
/// Returns an error if compression fails or `max_chunk` is too small
pub fn chunk_text(text: &str, max_chunk: usize, compress: bool) -> Result<Vec<String>> {
    let blob = if compress {
        chunk::compress_text(text).context("Failed to compress text")?
    } else {
        text.to_string()
    };
    chunk::create_chunks(&blob, max_chunk).context("Failed to create chunks")
}

/// Reassemble chunks given in any order
///
/// Lines that are not chunks of the first-seen transfer are skipped with a warning.
///
/// # Errors
/// Returns an error if chunks are missing, the hash does not match, or
/// decompression fails
pub fn reassemble_chunks(lines: &[String], decompress: bool) -> Result<String> {
    let mut reassembler = Reassembler::new();
    let accepted = lines
        .iter()
        .filter(|line| reassembler.accept(line) == ChunkOutcome::Accepted)
        .count();
    if let ReassemblyStatus::Partial {
        received, total, ..
    } = reassembler.status()
    {
        tracing::info!(accepted, received, total, "chunk transfer incomplete");
    }

    let blob = reassembler.finish().context("Failed to reassemble chunks")?;
    if decompress {
        chunk::decompress_text(&blob).context("Failed to decompress reassembled text")
    } else {
        Ok(blob)
    }
}

/// How a vault is keyed when sealing or opening
#[derive(Default)]
pub struct VaultKeys {
    pub password: Option<Zeroizing<String>>,
    pub key_file: Option<PathBuf>,
    pub key_files: Vec<PathBuf>,
}

impl VaultKeys {
    fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.as_str())
    }
}

/// Options for [`seal_files`]
pub struct SealOptions {
    pub out: PathBuf,
    pub keys: VaultKeys,
    pub threshold: Option<usize>,
    pub shards: Option<usize>,
    pub compress: bool,
    pub iterations: u32,
}

fn read_key_file(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    fs::read(path)
        .map(Zeroizing::new)
        .with_context(|| format!("Failed to read key file {}", path.display()))
}

fn read_key_files(paths: &[PathBuf]) -> Result<Vec<Zeroizing<Vec<u8>>>> {
    paths.iter().map(|path| read_key_file(path)).collect()
}

fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "",
    }
}

/// Pack files and encrypt them into a vault, optionally sharded
///
/// Returns the paths written: `out`, or `out.part1..N` when sharding.
///
/// # Errors
/// Returns an error if any input cannot be read, the key configuration is
/// invalid, or an output cannot be written
pub fn seal_files(files: &[PathBuf], options: &SealOptions) -> Result<Vec<PathBuf>> {
    let packed_files = files
        .iter()
        .map(|path| {
            let data =
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow!("Invalid file name: {}", path.display()))?;
            Ok(PackedFile::new(name, mime_type_for(path), data))
        })
        .collect::<Result<Vec<_>>>()?;
    let payload = Zeroizing::new(vault::pack_files(&packed_files, options.compress)?);

    let keys = &options.keys;
    let envelope = if keys.key_files.is_empty() {
        if options.threshold.is_some() {
            bail!("--threshold only applies together with --key-files");
        }
        let key_file = keys.key_file.as_deref().map(read_key_file).transpose()?;
        let key_material = KeyMaterial {
            password: keys.password(),
            key_file: key_file.as_deref().map(Vec::as_slice),
            secret: None,
        };
        if key_material.password.is_none() && key_material.key_file.is_none() {
            bail!("Refusing to seal a vault without a password or key file");
        }
        vault::encrypt_binary(
            &payload,
            &EncryptOptions::new(key_material).iterations(options.iterations),
        )?
    } else {
        let threshold = options
            .threshold
            .ok_or_else(|| anyhow!("--threshold is required with --key-files"))?;
        let key_files = read_key_files(&keys.key_files)?;
        let key_files: Vec<&[u8]> = key_files.iter().map(|k| k.as_slice()).collect();
        vault::protect_with_key_files(
            &payload,
            &key_files,
            threshold,
            keys.password(),
            options.iterations,
        )?
    };

    match options.shards {
        Some(n) if n > 1 => {
            let shards = vault::shard_binary(&envelope, n)?;
            shards
                .iter()
                .zip(1..)
                .map(|(shard, index)| {
                    let mut path = options.out.clone().into_os_string();
                    path.push(format!(".part{index}"));
                    let path = PathBuf::from(path);
                    fs::write(&path, shard)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    Ok(path)
                })
                .collect()
        }
        _ => {
            fs::write(&options.out, &envelope)
                .with_context(|| format!("Failed to write {}", options.out.display()))?;
            Ok(vec![options.out.clone()])
        }
    }
}

/// Decrypt a vault (merging its parts if more than one is given) and write
/// its files into `out_dir`
///
/// Returns the paths written.
///
/// # Errors
/// Returns an error if parts are missing or mismatched, the keys are wrong,
/// or the package is corrupt
pub fn open_vault(parts: &[PathBuf], out_dir: &Path, keys: &VaultKeys) -> Result<Vec<PathBuf>> {
    let contents = parts
        .iter()
        .map(|path| fs::read(path).with_context(|| format!("Failed to read {}", path.display())))
        .collect::<Result<Vec<_>>>()?;
    let envelope = match contents.as_slice() {
        [] => bail!("No vault given"),
        [single] => single.clone(),
        many => vault::merge_shards(many).context("Failed to merge vault parts")?,
    };

    let plain = match extract_metadata(&envelope) {
        Some(EnvelopeMetadata::KeyFiles(metadata)) => {
            if keys.key_files.is_empty() {
                bail!(
                    "Vault is protected by key files: supply at least {} with --key-files",
                    metadata.threshold
                );
            }
            let candidates = read_key_files(&keys.key_files)?;
            let candidates: Vec<&[u8]> = candidates.iter().map(|k| k.as_slice()).collect();
            vault::recover_with_key_files(&envelope, &candidates, keys.password())
                .context("Failed to open vault with key files")?
        }
        _ => {
            let key_file = keys.key_file.as_deref().map(read_key_file).transpose()?;
            let key_material = KeyMaterial {
                password: keys.password(),
                key_file: key_file.as_deref().map(Vec::as_slice),
                secret: None,
            };
            vault::decrypt_binary(&envelope, &key_material).context("Failed to open vault")?
        }
    };

    let files = vault::unpack_files(&plain).context("Failed to unpack vault contents")?;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    files
        .iter()
        .map(|file| {
            // Stored names are untrusted: keep the final component only
            let name = Path::new(&file.name)
                .file_name()
                .ok_or_else(|| anyhow!("Vault contains an invalid file name: {:?}", file.name))?;
            let path = out_dir.join(name);
            fs::write(&path, &file.data)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(path)
        })
        .collect()
}
