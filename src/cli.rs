// src/cli.rs
//! CLI definitions for packlift
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "packlift")]
#[command(author = "Packlift Project")]
#[command(version)]
#[command(about = "Encrypted installer package publisher for device-management services", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt and publish an installer package
    Publish {
        /// Installer source: a local path or an http(s) URL
        source: String,

        /// Display name for the application record
        #[arg(short, long)]
        name: String,

        /// Publisher shown to administrators
        #[arg(short, long)]
        publisher: String,

        /// Optional description for the application record
        #[arg(long)]
        description: Option<String>,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Service endpoint, overriding the config file
        #[arg(long)]
        endpoint: Option<String>,

        /// Bearer token, overriding the config file
        #[arg(long)]
        token: Option<String>,

        /// Overall time budget in seconds, overriding the config file
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Disable the upload progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Encrypt an installer without publishing it
    Encrypt {
        /// Path to the installer file
        source: PathBuf,

        /// Ciphertext destination (default: <source>.enc)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Where to write the encryption metadata JSON
        #[arg(short, long, default_value = "encryption-metadata.json")]
        metadata_out: PathBuf,
    },

    /// Decrypt a previously encrypted package (diagnostics)
    Decrypt {
        /// Path to the encrypted file
        encrypted: PathBuf,

        /// Encryption metadata JSON written by `encrypt`
        #[arg(short, long)]
        metadata: PathBuf,

        /// Plaintext destination
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}
