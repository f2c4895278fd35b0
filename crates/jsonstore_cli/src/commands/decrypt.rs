//! Decrypt command implementation.

use jsonstore_core::{parse_tree, render_tree};
use jsonstore_storage::{Cipher, EncryptedTextStore, FileTextStore, TextStore, DEFAULT_RETRY_BUDGET};
use std::path::Path;

/// Runs the decrypt command.
pub fn run(path: &Path, passphrase: &str, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", decrypt(path, passphrase, pretty)?);
    Ok(())
}

/// Returns the plaintext JSON of the encrypted store at `path`.
pub fn decrypt(
    path: &Path,
    passphrase: &str,
    pretty: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(format!("No store found at {}", path.display()).into());
    }

    let file = FileTextStore::open(path, DEFAULT_RETRY_BUDGET)?;
    let store = EncryptedTextStore::new(Box::new(file), Cipher::new(passphrase));
    let text = store.read_text()?;

    // Parsing also catches a correct envelope around text that is not a store.
    let tree = parse_tree(&text)?;
    Ok(render_tree(&tree, !pretty)?)
}
