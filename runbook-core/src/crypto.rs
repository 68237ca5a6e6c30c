/// Passphrase-based note encryption
///
/// Notes can be sealed with a passphrase that is never stored. A 256-bit key
/// is derived from the passphrase and a fresh 16-byte salt with Argon2id, and
/// the text is sealed with AES-256-GCM under a random 96-bit nonce.
///
/// Both outputs are base64 so they fit in text columns:
///
/// - ciphertext: `base64(nonce (12) || ciphertext || tag (16))`
/// - salt: `base64(salt (16))`
///
/// A wrong passphrase derives a different key, so GCM tag verification fails
/// and [`decrypt`] returns [`CryptoError::Decryption`]. It never returns
/// garbage plaintext.
///
/// # Example
///
/// ```
/// use runbook_core::crypto::{decrypt, encrypt};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (ciphertext, salt) = encrypt("secret", "pw")?;
/// assert_eq!(decrypt(&ciphertext, "pw", &salt)?, "secret");
/// assert!(decrypt(&ciphertext, "wrong-pw", &salt).is_err());
/// # Ok(())
/// # }
/// ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Error type for note encryption
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Key derivation failed
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Authentication failed (wrong passphrase or tampered data)
    #[error("{0}")]
    Decryption(String),

    /// Stored ciphertext or salt cannot be decoded
    #[error("Malformed encrypted data: {0}")]
    MalformedInput(String),
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
    let mut key = [0u8; KEY_LEN];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

/// Encrypts `text` under a key derived from `passphrase`
///
/// Returns `(ciphertext, salt)`, both base64-encoded. Every call uses a fresh
/// salt and nonce, so encrypting the same text twice gives different output.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` or `CryptoError::Encryption` if a
/// primitive fails.
pub fn encrypt(text: &str, passphrase: &str) -> Result<(String, String), CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::Encryption(format!("failed to create cipher: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(nonce, text.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut combined = Vec::with_capacity(NONCE_LEN + sealed.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&sealed);

    Ok((
        general_purpose::STANDARD.encode(&combined),
        general_purpose::STANDARD.encode(salt),
    ))
}

/// Decrypts output produced by [`encrypt`]
///
/// # Errors
///
/// - `CryptoError::MalformedInput` if the ciphertext or salt is not valid
///   base64 or is too short
/// - `CryptoError::Decryption` if the passphrase is wrong or the data was
///   modified
pub fn decrypt(ciphertext: &str, passphrase: &str, salt: &str) -> Result<String, CryptoError> {
    let combined = general_purpose::STANDARD
        .decode(ciphertext)
        .map_err(|e| CryptoError::MalformedInput(format!("ciphertext: {e}")))?;
    let salt = general_purpose::STANDARD
        .decode(salt)
        .map_err(|e| CryptoError::MalformedInput(format!("salt: {e}")))?;

    if combined.len() < NONCE_LEN {
        return Err(CryptoError::MalformedInput(
            "ciphertext too short (need at least 12 bytes for nonce)".to_string(),
        ));
    }

    let key = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::Encryption(format!("failed to create cipher: {e}")))?;

    let nonce = Nonce::from_slice(&combined[..NONCE_LEN]);
    let plaintext = cipher
        .decrypt(nonce, &combined[NONCE_LEN..])
        .map_err(|_| {
            CryptoError::Decryption("wrong passphrase or corrupted note".to_string())
        })?;

    String::from_utf8(plaintext)
        .map_err(|e| CryptoError::MalformedInput(format!("invalid UTF-8 in plaintext: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let (ciphertext, salt) = encrypt("secret", "pw").expect("encrypt");
        let plaintext = decrypt(&ciphertext, "pw", &salt).expect("decrypt");
        assert_eq!(plaintext, "secret");
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let (ciphertext, salt) = encrypt("secret", "pw").expect("encrypt");
        let result = decrypt(&ciphertext, "wrong-pw", &salt);
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_call() {
        let (c1, s1) = encrypt("same text", "pw").expect("encrypt");
        let (c2, s2) = encrypt("same text", "pw").expect("encrypt");
        assert_ne!(c1, c2);
        assert_ne!(s1, s2);
    }

    #[test]
    fn test_wrong_salt_fails() {
        let (ciphertext, _) = encrypt("secret", "pw").expect("encrypt");
        let (_, other_salt) = encrypt("other", "pw").expect("encrypt");
        assert!(matches!(
            decrypt(&ciphertext, "pw", &other_salt),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let (ciphertext, salt) = encrypt("secret", "pw").expect("encrypt");
        let mut raw = general_purpose::STANDARD.decode(&ciphertext).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = general_purpose::STANDARD.encode(&raw);
        assert!(matches!(
            decrypt(&tampered, "pw", &salt),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            decrypt("not base64!!", "pw", "AAAA"),
            Err(CryptoError::MalformedInput(_))
        ));
        let short = general_purpose::STANDARD.encode([0u8; 4]);
        let (_, salt) = encrypt("x", "pw").expect("encrypt");
        assert!(matches!(
            decrypt(&short, "pw", &salt),
            Err(CryptoError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_unicode_and_empty_text() {
        for text in ["", "密码 パスワード", "line one\nline two"] {
            let (c, s) = encrypt(text, "passphrase").expect("encrypt");
            assert_eq!(decrypt(&c, "passphrase", &s).expect("decrypt"), text);
        }
    }
}
