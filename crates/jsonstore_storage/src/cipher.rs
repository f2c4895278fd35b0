//! OpenSSL-compatible passphrase encryption.
//!
//! Produces and consumes the envelope written by
//! `openssl enc -aes-256-cbc -md md5 -base64 -pass pass:<passphrase>`:
//!
//! ```text
//! base64( "Salted__" || salt (8 bytes) || AES-256-CBC(PKCS#7)(plaintext) )
//! ```
//!
//! Key and IV come from OpenSSL's `EVP_BytesToKey` with MD5 and a single
//! iteration: `D_1 = MD5(passphrase || salt)`, `D_i = MD5(D_{i-1} ||
//! passphrase || salt)`, concatenated until 48 bytes are available.

use crate::error::{StorageError, StorageResult};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::{Digest, Md5};
use rand::RngCore;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the CBC initialization vector in bytes.
pub const IV_SIZE: usize = 16;
/// Size of the random salt in bytes.
pub const SALT_SIZE: usize = 8;
/// Marker that starts every envelope.
pub const SALT_MARKER: &[u8; 8] = b"Salted__";

/// Symmetric cipher bound to one passphrase.
///
/// Decryption never fails loudly: malformed input, a wrong marker or a wrong
/// passphrase all yield an empty string, and detecting the problem is left
/// to whoever parses the plaintext.
#[derive(Clone)]
pub struct Cipher {
    passphrase: Zeroizing<Vec<u8>>,
}

impl Cipher {
    /// Creates a cipher for the given passphrase.
    #[must_use]
    pub fn new(passphrase: &str) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase.as_bytes().to_vec()),
        }
    }

    /// Encrypts `plaintext` with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns an error if the derived key material is rejected by the
    /// block cipher, which cannot happen with the fixed sizes used here.
    pub fn encrypt(&self, plaintext: &str) -> StorageResult<String> {
        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);
        self.encrypt_with_salt(plaintext, &salt)
    }

    /// Encrypts `plaintext` with a caller-chosen salt.
    ///
    /// Deterministic; useful for known-answer tests against `openssl enc -S`.
    ///
    /// # Errors
    ///
    /// See [`encrypt`](Self::encrypt).
    pub fn encrypt_with_salt(&self, plaintext: &str, salt: &[u8; SALT_SIZE]) -> StorageResult<String> {
        let material = derive_key_iv(&self.passphrase, salt);
        let (key, iv) = material.split_at(KEY_SIZE);

        let ciphertext = Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(|e| StorageError::Encryption(e.to_string()))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut envelope = Vec::with_capacity(SALT_MARKER.len() + SALT_SIZE + ciphertext.len());
        envelope.extend_from_slice(SALT_MARKER);
        envelope.extend_from_slice(salt);
        envelope.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(envelope))
    }

    /// Decrypts an envelope produced by [`encrypt`](Self::encrypt) or by
    /// OpenSSL. Returns an empty string for anything that does not decrypt
    /// cleanly to UTF-8 text.
    #[must_use]
    pub fn decrypt(&self, envelope: &str) -> String {
        self.try_decrypt(envelope).unwrap_or_default()
    }

    fn try_decrypt(&self, envelope: &str) -> Option<String> {
        // OpenSSL wraps base64 output at 64 columns.
        let compact: String = envelope.chars().filter(|c| !c.is_whitespace()).collect();
        let raw = STANDARD.decode(compact).ok()?;

        let header = SALT_MARKER.len() + SALT_SIZE;
        if raw.len() <= header || &raw[..SALT_MARKER.len()] != SALT_MARKER {
            return None;
        }
        let salt = &raw[SALT_MARKER.len()..header];

        let material = derive_key_iv(&self.passphrase, salt);
        let (key, iv) = material.split_at(KEY_SIZE);
        let plaintext = Aes256CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_vec_mut::<Pkcs7>(&raw[header..])
            .ok()?;

        String::from_utf8(plaintext).ok()
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// OpenSSL `EVP_BytesToKey` (MD5, one iteration) producing key || iv.
#[must_use]
pub fn derive_key_iv(passphrase: &[u8], salt: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut material = Zeroizing::new(Vec::with_capacity(KEY_SIZE + IV_SIZE + 16));
    let mut previous: Option<Vec<u8>> = None;

    while material.len() < KEY_SIZE + IV_SIZE {
        let mut hasher = Md5::new();
        if let Some(prev) = &previous {
            hasher.update(prev);
        }
        hasher.update(passphrase);
        hasher.update(salt);
        let digest = hasher.finalize().to_vec();
        material.extend_from_slice(&digest);
        previous = Some(digest);
    }

    material.truncate(KEY_SIZE + IV_SIZE);
    material
}
