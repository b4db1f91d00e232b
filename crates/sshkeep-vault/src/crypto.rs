//! AES-256-GCM field encryption using the `ring` crate.
//!
//! Sensitive connection fields (password, private key) are encrypted one at a
//! time. Each call draws a fresh random 96-bit nonce, so encrypting the same
//! plaintext twice yields different ciphertext. The stored form of a field is
//! standard base64 of:
//!
//! ```text
//! [12 bytes: nonce][ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Decryption is authenticated: a wrong key, a truncated value or any flipped
//! bit is reported as [`VaultError::DecryptionFailed`] instead of yielding
//! garbage plaintext.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::aead::{self, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, VaultError};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// AES-256-GCM algorithm from `ring`.
static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Raw primitives
// ---------------------------------------------------------------------------

fn check_key_len(key: &[u8]) -> std::result::Result<(), String> {
    if key.len() != KEY_LEN {
        return Err(format!("key must be {} bytes, got {}", KEY_LEN, key.len()));
    }
    Ok(())
}

/// Encrypt `plaintext` with AES-256-GCM using the given 256-bit `key`.
///
/// Returns `(nonce, ciphertext)`; the ciphertext carries the tag.
///
/// # Errors
///
/// Returns [`VaultError::EncryptionFailed`] if the key length is wrong or the
/// system RNG fails.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<([u8; NONCE_LEN_BYTES], Vec<u8>)> {
    check_key_len(key).map_err(|reason| VaultError::EncryptionFailed { reason })?;
    let sealing = LessSafeKey::new(UnboundKey::new(AEAD_ALG, key).map_err(|_| {
        VaultError::EncryptionFailed {
            reason: "failed to create AES-256-GCM key".into(),
        }
    })?);
    seal(&sealing, plaintext)
}

/// Decrypt `ciphertext` (tag included) with the given `nonce` and `key`.
///
/// # Errors
///
/// Returns [`VaultError::DecryptionFailed`] on a wrong key, wrong nonce or
/// tampered ciphertext.
pub fn decrypt(nonce: &[u8; NONCE_LEN_BYTES], ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    check_key_len(key).map_err(|reason| VaultError::DecryptionFailed { reason })?;
    let opening = LessSafeKey::new(UnboundKey::new(AEAD_ALG, key).map_err(|_| {
        VaultError::DecryptionFailed {
            reason: "failed to create AES-256-GCM key".into(),
        }
    })?);
    open(&opening, nonce, ciphertext)
}

fn seal(key: &LessSafeKey, plaintext: &[u8]) -> Result<([u8; NONCE_LEN_BYTES], Vec<u8>)> {
    let mut nonce_bytes = [0u8; NONCE_LEN_BYTES];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| VaultError::EncryptionFailed {
            reason: "failed to generate random nonce".into(),
        })?;

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        Aad::empty(),
        &mut in_out,
    )
    .map_err(|_| VaultError::EncryptionFailed {
        reason: "seal_in_place failed".into(),
    })?;

    Ok((nonce_bytes, in_out))
}

fn open(key: &LessSafeKey, nonce: &[u8; NONCE_LEN_BYTES], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let mut in_out = ciphertext.to_vec();
    let plaintext = key
        .open_in_place(Nonce::assume_unique_for_key(*nonce), Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::DecryptionFailed {
            reason: "authentication failed (wrong key or corrupted data)".into(),
        })?;
    Ok(plaintext.to_vec())
}

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`VaultError::Internal`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| VaultError::Internal("failed to generate random bytes".into()))?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Field cipher
// ---------------------------------------------------------------------------

/// A field cipher bound to the process-wide master key.
///
/// The key schedule is computed once in [`Cipher::new`] and reused for every
/// field of a load or store cycle.
pub struct Cipher {
    key: LessSafeKey,
}

impl Cipher {
    /// Build a cipher from a raw 32-byte master key.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DecryptionFailed`] if the key is not
    /// [`KEY_LEN`] bytes long, so that a misconfigured key fails closed on
    /// the read path.
    pub fn new(key: &[u8]) -> Result<Self> {
        check_key_len(key).map_err(|reason| VaultError::DecryptionFailed { reason })?;
        let unbound = UnboundKey::new(AEAD_ALG, key).map_err(|_| VaultError::DecryptionFailed {
            reason: "failed to create AES-256-GCM key".into(),
        })?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
        })
    }

    /// Encrypt a string field into its base64 at-rest form.
    pub fn encrypt_field(&self, plaintext: &str) -> Result<String> {
        let (nonce, ciphertext) = seal(&self.key, plaintext.as_bytes())?;

        let mut packed = Vec::with_capacity(NONCE_LEN_BYTES + ciphertext.len());
        packed.extend_from_slice(&nonce);
        packed.extend_from_slice(&ciphertext);

        tracing::trace!(
            plaintext_len = plaintext.len(),
            packed_len = packed.len(),
            "encrypted field"
        );
        Ok(BASE64.encode(packed))
    }

    /// Decrypt a field produced by [`Cipher::encrypt_field`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DecryptionFailed`] if the value is not base64,
    /// is too short to hold a nonce and tag, fails authentication, or does
    /// not decrypt to UTF-8.
    pub fn decrypt_field(&self, encoded: &str) -> Result<String> {
        let packed = BASE64
            .decode(encoded.trim())
            .map_err(|e| VaultError::DecryptionFailed {
                reason: format!("field is not valid base64: {e}"),
            })?;

        if packed.len() < NONCE_LEN_BYTES + TAG_LEN {
            return Err(VaultError::DecryptionFailed {
                reason: format!(
                    "field is {} bytes, shorter than nonce and tag ({})",
                    packed.len(),
                    NONCE_LEN_BYTES + TAG_LEN
                ),
            });
        }

        let (nonce_bytes, ciphertext) = packed.split_at(NONCE_LEN_BYTES);
        let mut nonce = [0u8; NONCE_LEN_BYTES];
        nonce.copy_from_slice(nonce_bytes);

        let plaintext = open(&self.key, &nonce, ciphertext)?;
        String::from_utf8(plaintext).map_err(|_| VaultError::DecryptionFailed {
            reason: "decrypted field is not valid UTF-8".into(),
        })
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> Cipher {
        Cipher::new(&random_bytes(KEY_LEN).unwrap()).unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = random_bytes(KEY_LEN).unwrap();
        let plaintext = b"hello, sshkeep!";

        let (nonce, ciphertext) = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&nonce, &ciphertext, &key).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let key1 = random_bytes(KEY_LEN).unwrap();
        let key2 = random_bytes(KEY_LEN).unwrap();

        let (nonce, ciphertext) = encrypt(b"secret data", &key1).unwrap();
        let result = decrypt(&nonce, &ciphertext, &key2);

        assert!(matches!(result, Err(VaultError::DecryptionFailed { .. })));
    }

    #[test]
    fn invalid_key_length_rejected() {
        let short_key = vec![0u8; 16];
        assert!(matches!(
            encrypt(b"test", &short_key),
            Err(VaultError::EncryptionFailed { .. })
        ));
        assert!(matches!(
            Cipher::new(&short_key),
            Err(VaultError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn field_roundtrip() {
        let cipher = test_cipher();
        for s in ["", "pw", "päss wörd = with\nnewline", "🔑"] {
            let sealed = cipher.encrypt_field(s).unwrap();
            assert_ne!(sealed, s);
            assert_eq!(cipher.decrypt_field(&sealed).unwrap(), s);
        }
    }

    #[test]
    fn field_ciphertext_is_randomized() {
        let cipher = test_cipher();
        let a = cipher.encrypt_field("same").unwrap();
        let b = cipher.encrypt_field("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn field_from_other_key_fails() {
        let sealed = test_cipher().encrypt_field("pw").unwrap();
        let result = test_cipher().decrypt_field(&sealed);
        assert!(matches!(result, Err(VaultError::DecryptionFailed { .. })));
    }

    #[test]
    fn tampered_field_fails() {
        let cipher = test_cipher();
        let sealed = cipher.encrypt_field("pw").unwrap();
        let mut packed = BASE64.decode(&sealed).unwrap();
        let last = packed.len() - 1;
        packed[last] ^= 0x01;

        let result = cipher.decrypt_field(&BASE64.encode(packed));
        assert!(matches!(result, Err(VaultError::DecryptionFailed { .. })));
    }

    #[test]
    fn plaintext_and_short_fields_fail() {
        let cipher = test_cipher();
        assert!(matches!(
            cipher.decrypt_field("pw"),
            Err(VaultError::DecryptionFailed { .. })
        ));
        assert!(matches!(
            cipher.decrypt_field(&BASE64.encode([0u8; 8])),
            Err(VaultError::DecryptionFailed { .. })
        ));
    }
}
