//! jsonstore CLI
//!
//! Command-line tools for jsonstore files.
//!
//! # Commands
//!
//! - `inspect` - List top-level collections and items
//! - `decrypt` - Print the plaintext JSON of an encrypted store
//! - `encrypt` - Write the encrypted envelope of a plain store

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// jsonstore command-line tools.
#[derive(Parser)]
#[command(name = "jsonstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List top-level collections and items
    Inspect {
        /// Passphrase of an encrypted store
        #[arg(long)]
        passphrase: Option<String>,

        /// Identifier field used for next-id reporting
        #[arg(short, long)]
        key_field: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the plaintext JSON of an encrypted store
    Decrypt {
        /// Passphrase the store was encrypted with
        #[arg(long)]
        passphrase: String,

        /// Indent the output
        #[arg(long)]
        pretty: bool,
    },

    /// Write the encrypted envelope of a plain store
    Encrypt {
        /// Passphrase to encrypt with
        #[arg(long)]
        passphrase: String,

        /// Where to write the envelope (default: replace the store file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect {
            passphrase,
            key_field,
            format,
        } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, passphrase, key_field, &format)?;
        }
        Commands::Decrypt { passphrase, pretty } => {
            let path = cli.path.ok_or("Store path required for decrypt")?;
            commands::decrypt::run(&path, &passphrase, pretty)?;
        }
        Commands::Encrypt { passphrase, output } => {
            let path = cli.path.ok_or("Store path required for encrypt")?;
            commands::encrypt::run(&path, &passphrase, output.as_deref())?;
        }
        Commands::Version => {
            println!("jsonstore CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// `RUST_LOG` when set, otherwise `debug` with `--verbose` and `warn` without.
fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    })
}
