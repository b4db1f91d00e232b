//! Master key provisioning.
//!
//! The master key must never sit next to the ciphertext it protects, so the
//! connection document never contains it. Instead a [`KeychainProvider`]
//! supplies it from a separately scoped place:
//!
//! - [`ConfigKeychain`] keeps it as unpadded base64 under the `SECRET` key of the
//!   [`ConfigStore`]. This is what `sshkeep init` writes.
//! - [`EnvKeychain`] reads it from an environment variable (by default
//!   `SSHKEEP_SECRET`) and is read-only.
//!
//! A missing key is [`VaultError::MasterKeyNotFound`]; a key that is present
//! but not 32 bytes of valid base64 is [`VaultError::DecryptionFailed`].

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64;

use crate::config::ConfigStore;
use crate::crypto::{self, Cipher};
use crate::error::{Result, VaultError};

/// Config key holding the master key.
pub const SECRET_KEY: &str = "SECRET";

/// Environment variable read by [`EnvKeychain::from_env`].
pub const SECRET_ENV_VAR: &str = "SSHKEEP_SECRET";

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over where the master key lives.
pub trait KeychainProvider: Send + Sync {
    /// Retrieve the master key.
    ///
    /// Returns [`VaultError::MasterKeyNotFound`] if no key has been stored.
    fn get_master_key(&self) -> Result<Vec<u8>>;

    /// Store (or overwrite) the master key.
    fn set_master_key(&self, key: &[u8]) -> Result<()>;

    /// Check whether a master key is available.
    fn has_master_key(&self) -> Result<bool>;

    /// Build a field cipher from the stored key.
    fn cipher(&self) -> Result<Cipher> {
        Cipher::new(&self.get_master_key()?)
    }
}

/// Generate a fresh random master key and store it in `provider`.
///
/// Refuses to replace an existing key, since every stored ciphertext would
/// become unreadable.
pub fn generate_master_key(provider: &dyn KeychainProvider) -> Result<()> {
    if provider.has_master_key()? {
        return Err(VaultError::MasterKeyExists);
    }
    let key = crypto::random_bytes(crypto::KEY_LEN)?;
    provider.set_master_key(&key)?;
    tracing::info!("generated new master key");
    Ok(())
}

fn decode_key(encoded: &str) -> Result<Vec<u8>> {
    let key = BASE64
        .decode(encoded.trim().trim_end_matches('='))
        .map_err(|e| VaultError::DecryptionFailed {
            reason: format!("master key is not valid base64: {e}"),
        })?;
    if key.len() != crypto::KEY_LEN {
        return Err(VaultError::DecryptionFailed {
            reason: format!(
                "master key must be {} bytes, got {}",
                crypto::KEY_LEN,
                key.len()
            ),
        });
    }
    Ok(key)
}

// ---------------------------------------------------------------------------
// Config-file backend
// ---------------------------------------------------------------------------

/// Keeps the master key in the plain config store.
///
/// The key is written without base64 padding because `=` is the config
/// separator.
pub struct ConfigKeychain {
    config: ConfigStore,
}

impl ConfigKeychain {
    pub fn new(config: ConfigStore) -> Self {
        Self { config }
    }
}

impl KeychainProvider for ConfigKeychain {
    fn get_master_key(&self) -> Result<Vec<u8>> {
        let encoded = self
            .config
            .try_get(SECRET_KEY)?
            .ok_or(VaultError::MasterKeyNotFound)?;
        let key = decode_key(&encoded)?;
        tracing::debug!("retrieved master key from config");
        Ok(key)
    }

    fn set_master_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != crypto::KEY_LEN {
            return Err(VaultError::MasterKeyStoreFailed {
                reason: format!("key must be {} bytes, got {}", crypto::KEY_LEN, key.len()),
            });
        }
        self.config.set(SECRET_KEY, &BASE64.encode(key))
    }

    fn has_master_key(&self) -> Result<bool> {
        Ok(self.config.try_get(SECRET_KEY)?.is_some())
    }
}

// ---------------------------------------------------------------------------
// Environment backend
// ---------------------------------------------------------------------------

/// Reads the master key from an environment variable captured at
/// construction time.
#[derive(Default)]
pub struct EnvKeychain {
    value: Option<String>,
}

impl EnvKeychain {
    /// Capture [`SECRET_ENV_VAR`] from the process environment.
    pub fn from_env() -> Self {
        Self::from_var(SECRET_ENV_VAR)
    }

    /// Capture an arbitrary environment variable.
    pub fn from_var(name: &str) -> Self {
        Self::with_value(std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Use an explicit value instead of the environment.
    pub fn with_value(value: Option<String>) -> Self {
        Self { value }
    }
}

impl KeychainProvider for EnvKeychain {
    fn get_master_key(&self) -> Result<Vec<u8>> {
        let encoded = self.value.as_deref().ok_or(VaultError::MasterKeyNotFound)?;
        decode_key(encoded)
    }

    fn set_master_key(&self, _key: &[u8]) -> Result<()> {
        Err(VaultError::MasterKeyStoreFailed {
            reason: format!("{SECRET_ENV_VAR} is read-only; export the key instead"),
        })
    }

    fn has_master_key(&self) -> Result<bool> {
        Ok(self.value.is_some())
    }
}

impl std::fmt::Debug for EnvKeychain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvKeychain")
            .field("present", &self.value.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
