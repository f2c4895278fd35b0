//! Encrypt command implementation.

use jsonstore_core::{parse_tree, render_tree};
use jsonstore_storage::{Cipher, EncryptedTextStore, FileTextStore, TextStore, DEFAULT_RETRY_BUDGET};
use std::path::Path;
use tracing::info;

/// Runs the encrypt command.
///
/// Reads the plain store at `path` and writes its encrypted envelope to
/// `output`, or back over `path` when no output is given.
pub fn run(
    path: &Path,
    passphrase: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(format!("No store found at {}", path.display()).into());
    }

    let source = FileTextStore::open(path, DEFAULT_RETRY_BUDGET)?;
    // Refuse anything that is not a plain store, including one that is
    // already encrypted.
    let tree = parse_tree(&source.read_text()?)?;
    let plain = render_tree(&tree, true)?;

    let target_path = output.unwrap_or(path);
    let target = FileTextStore::open(target_path, DEFAULT_RETRY_BUDGET)?;
    EncryptedTextStore::new(Box::new(target), Cipher::new(passphrase)).write_text(&plain)?;

    info!(source = %path.display(), target = %target_path.display(), "encrypted store");
    println!("Encrypted {} -> {}", path.display(), target_path.display());
    Ok(())
}
