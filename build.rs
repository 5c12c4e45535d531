// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: configuration file path
fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("PATH")
        .help("Configuration file (TOML)")
}

fn build_cli() -> Command {
    Command::new("packlift")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Packlift Contributors")
        .about("Encrypted installer package publisher for device-management services")
        .subcommand_required(true)
        .subcommand(
            Command::new("publish")
                .about("Encrypt and publish an installer package")
                .arg(
                    Arg::new("source")
                        .required(true)
                        .help("Installer source: a local path or an http(s) URL"),
                )
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .required(true)
                        .help("Display name for the application record"),
                )
                .arg(
                    Arg::new("publisher")
                        .short('p')
                        .long("publisher")
                        .required(true)
                        .help("Publisher shown to administrators"),
                )
                .arg(
                    Arg::new("description")
                        .long("description")
                        .help("Optional description for the application record"),
                )
                .arg(config_arg())
                .arg(Arg::new("endpoint").long("endpoint").help("Service endpoint"))
                .arg(Arg::new("token").long("token").help("Bearer token"))
                .arg(
                    Arg::new("timeout_secs")
                        .long("timeout-secs")
                        .help("Overall time budget in seconds"),
                )
                .arg(
                    Arg::new("no_progress")
                        .long("no-progress")
                        .num_args(0)
                        .help("Disable the upload progress bar"),
                ),
        )
        .subcommand(
            Command::new("encrypt")
                .about("Encrypt an installer without publishing it")
                .arg(Arg::new("source").required(true).help("Path to the installer file"))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Ciphertext destination (default: <source>.enc)"),
                )
                .arg(
                    Arg::new("metadata_out")
                        .short('m')
                        .long("metadata-out")
                        .default_value("encryption-metadata.json")
                        .help("Where to write the encryption metadata JSON"),
                ),
        )
        .subcommand(
            Command::new("decrypt")
                .about("Decrypt a previously encrypted package (diagnostics)")
                .arg(Arg::new("encrypted").required(true).help("Path to the encrypted file"))
                .arg(
                    Arg::new("metadata")
                        .short('m')
                        .long("metadata")
                        .required(true)
                        .help("Encryption metadata JSON written by 'encrypt'"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .required(true)
                        .help("Plaintext destination"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("packlift.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
        return;
    }
}
