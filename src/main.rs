use std::io::{self, BufRead, Read};

use anyhow::{Context, Result};
use clap::Parser;
use zeroize::Zeroizing;

use safeshare::cli::{Cli, Commands, KeyArgs};
use safeshare::commands::{
    SealOptions, VaultKeys, chunk_text, combine_shares, open_vault, reassemble_chunks,
    seal_files, split_secret,
};
use safeshare::domain::{ShareCount, SplitConfig};

/// Read a secret securely from stdin (hidden input when TTY available)
fn read_secret(prompt: &str) -> Result<Zeroizing<String>> {
    if atty::is(atty::Stream::Stdin) {
        eprintln!("{prompt}");
        rpassword::read_password()
            .map(Zeroizing::new)
            .context("Failed to read secret from stdin")
    } else {
        // Non-interactive mode (piped input) - read a single line
        let mut line = Zeroizing::new(String::new());
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read secret from stdin")?;
        Ok(Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Read lines from stdin until an empty line or EOF
/// Hidden input when TTY available, since lines may be shares
fn read_lines(prompt: &str) -> Result<Vec<String>> {
    let mut lines = Vec::new();

    if atty::is(atty::Stream::Stdin) {
        eprintln!("{prompt}");

        loop {
            let line = rpassword::read_password().context("Failed to read line from stdin")?;

            // Empty line signals we're done
            if line.trim().is_empty() {
                break;
            }

            lines.push(line.trim().to_string());
        }
    } else {
        for line in io::stdin().lock().lines() {
            let line = line.context("Failed to read line from stdin")?;
            let trimmed = line.trim();

            // Empty line signals we're done
            if trimmed.is_empty() {
                break;
            }

            lines.push(trimmed.to_string());
        }
    }

    if lines.is_empty() {
        anyhow::bail!("No input provided");
    }

    Ok(lines)
}

fn read_all_stdin() -> Result<String> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read stdin")?;
    Ok(text)
}

/// Passwords are only prompted for on a TTY; piped stdin stays free for data
fn vault_keys(args: KeyArgs, confirm: bool) -> Result<VaultKeys> {
    let password = if args.no_password || !atty::is(atty::Stream::Stdin) {
        None
    } else {
        let password = Zeroizing::new(
            rpassword::prompt_password("Vault password: ").context("Failed to read password")?,
        );
        if confirm {
            let again = Zeroizing::new(
                rpassword::prompt_password("Confirm password: ")
                    .context("Failed to read password")?,
            );
            anyhow::ensure!(*password == *again, "Passwords do not match");
        }
        Some(password).filter(|p| !p.is_empty())
    };

    Ok(VaultKeys {
        password,
        key_file: args.key_file,
        key_files: args.key_files,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safeshare=warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Split { shares, threshold } => {
            let secret = read_secret("Enter secret:")?;

            // Validate share count and create config
            let share_count = ShareCount::new(shares)?;
            let config = SplitConfig::new(threshold, share_count)?;

            for share in split_secret(&secret, config)? {
                println!("{share}");
            }
        }
        Commands::Combine => {
            let shares = read_lines("Enter shares (one per line, empty line to finish):")?;
            let secret = combine_shares(&shares)?;
            println!("{}", secret.as_str());
        }
        Commands::Chunk {
            max_chunk,
            compress,
        } => {
            let text = read_all_stdin()?;
            for chunk in chunk_text(text.trim_end(), max_chunk, compress)? {
                println!("{chunk}");
            }
        }
        Commands::Reassemble { decompress } => {
            let lines = read_lines("Enter chunks (one per line, empty line to finish):")?;
            println!("{}", reassemble_chunks(&lines, decompress)?);
        }
        Commands::Seal {
            files,
            out,
            keys,
            threshold,
            shards,
            compress,
            iterations,
        } => {
            let options = SealOptions {
                out,
                keys: vault_keys(keys, true)?,
                threshold,
                shards,
                compress,
                iterations,
            };
            for path in seal_files(&files, &options)? {
                println!("{}", path.display());
            }
        }
        Commands::Open {
            parts,
            out_dir,
            keys,
        } => {
            let keys = vault_keys(keys, false)?;
            for path in open_vault(&parts, &out_dir, &keys)? {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}
