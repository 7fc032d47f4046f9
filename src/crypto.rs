//! Password-based encryption for private key material.
//!
//! Grounded in `cryptor.py`'s `encrypt`/`decrypt` pair (rncryptor +
//! base64), generalized to a real AEAD construction: PBKDF2-HMAC-SHA256
//! derives a 256-bit key from the password and a random salt, AES-256-GCM
//! seals the plaintext under a random nonce. The wire format is
//! `base64(salt || nonce || ciphertext)`, matching the original's
//! single-string encrypted value.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{Error, Result};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const PBKDF2_ROUNDS: u32 = 100_000;

fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    key
}

/// Encrypt `plaintext` under `password`, returning a base64 string safe to
/// write to the key-storage file (`spec.md` §6).
pub fn encrypt(plaintext: &str, password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .expect("AES-GCM encryption over a bounded in-memory buffer cannot fail");

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    BASE64.encode(out)
}

/// Decrypt a string produced by [`encrypt`]. Fails with
/// [`Error::DecryptionError`] on a wrong password or corrupt ciphertext.
pub fn decrypt(encrypted: &str, password: &str) -> Result<String> {
    let raw = BASE64
        .decode(encrypted)
        .map_err(|_| Error::DecryptionError)?;
    if raw.len() < SALT_LEN + NONCE_LEN {
        return Err(Error::DecryptionError);
    }
    let (salt, rest) = raw.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(password, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| Error::DecryptionError)?;
    String::from_utf8(plaintext).map_err(|_| Error::DecryptionError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_same_password() {
        let encrypted = encrypt("5JKY...private-key...", "correct horse battery staple");
        let decrypted = decrypt(&encrypted, "correct horse battery staple").unwrap();
        assert_eq!(decrypted, "5JKY...private-key...");
    }

    #[test]
    fn wrong_password_fails_with_decryption_error() {
        let encrypted = encrypt("secret", "right-password");
        let err = decrypt(&encrypted, "wrong-password").unwrap_err();
        assert!(matches!(err, Error::DecryptionError));
    }

    #[test]
    fn corrupt_ciphertext_fails_with_decryption_error() {
        let mut encrypted = encrypt("secret", "password").into_bytes();
        encrypted.truncate(4);
        let err = decrypt(&String::from_utf8(encrypted).unwrap(), "password").unwrap_err();
        assert!(matches!(err, Error::DecryptionError));
    }
}
