use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::chunk::DEFAULT_MAX_CHUNK_CHARS;
use crate::domain::Threshold;
use crate::vault::DEFAULT_ITERATIONS;

/// Validates that threshold is at least 2
/// A threshold of 1 defeats the purpose of secret sharing
/// (any single share would be able to recover the entire secret)
fn validate_threshold(s: &str) -> Result<Threshold, String> {
    let value: u8 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    Threshold::new(value).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "safeshare")]
#[command(about = "Split secrets into threshold shares, move them as QR-sized chunks, and seal files into encrypted vaults")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split a secret read from stdin into shares
    Split {
        /// Number of shares to create
        #[arg(short, long)]
        shares: u8,

        /// Threshold: minimum number of shares needed to reconstruct (must be >= 2)
        #[arg(short, long, value_parser = validate_threshold)]
        threshold: Threshold,
    },
    /// Combine shares read from stdin to reconstruct the secret
    Combine,
    /// Cut text read from stdin into QR-sized chunks
    Chunk {
        /// Maximum characters per chunk, including the chunk header
        #[arg(short, long, default_value_t = DEFAULT_MAX_CHUNK_CHARS)]
        max_chunk: usize,

        /// Deflate and base64url-encode the text before chunking
        #[arg(short, long)]
        compress: bool,
    },
    /// Reassemble chunks read from stdin, one per line, in any order
    Reassemble {
        /// Treat the reassembled text as output of `chunk --compress`
        #[arg(short, long)]
        decompress: bool,
    },
    /// Encrypt files into a vault
    Seal {
        /// Files to pack into the vault
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Vault path; with --shards, parts are written to PATH.part1..N
        #[arg(short, long)]
        out: PathBuf,

        #[command(flatten)]
        keys: KeyArgs,

        /// Minimum key files needed to open (with --key-files)
        #[arg(short, long, requires = "key_files")]
        threshold: Option<usize>,

        /// Split the vault into this many physical parts, all required to open
        #[arg(long)]
        shards: Option<usize>,

        /// Gzip the packed files before encryption
        #[arg(long)]
        compress: bool,

        /// PBKDF2 iterations
        #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
        iterations: u32,
    },
    /// Decrypt a vault (or all of its parts) and extract its files
    Open {
        /// Vault file, or every part of a sharded vault
        #[arg(required = true)]
        parts: Vec<PathBuf>,

        /// Directory to write the extracted files into
        #[arg(short = 'd', long)]
        out_dir: PathBuf,

        #[command(flatten)]
        keys: KeyArgs,
    },
}

/// Key inputs shared by `seal` and `open`
#[derive(clap::Args)]
pub struct KeyArgs {
    /// Additional key file mixed into the password
    #[arg(long, conflicts_with = "key_files")]
    pub key_file: Option<PathBuf>,

    /// Key files for threshold protection (seal: all of them; open: any subset)
    #[arg(long, num_args = 1..)]
    pub key_files: Vec<PathBuf>,

    /// Do not prompt for a password
    #[arg(long)]
    pub no_password: bool,
}
