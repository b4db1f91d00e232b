//! Encrypted connection profile store.
//!
//! The [`ConnectionStore`] keeps every profile in one JSON document:
//!
//! ```json
//! {
//!   "connects": [
//!     {
//!       "alias": "prod",
//!       "login": "root",
//!       "password": "<base64 ciphertext>",
//!       "address": "10.0.0.1",
//!       "type": "ssh",
//!       "createdAt": "2026-01-01T00:00:00Z",
//!       "updatedAt": "2026-01-01T00:00:00Z",
//!       "options": { "port": 22, "privateKey": "<base64 ciphertext>" }
//!     }
//!   ]
//! }
//! ```
//!
//! Password and private key are encrypted with the [`Cipher`] before the
//! document is written and decrypted right after it is read. Every operation
//! re-reads the document; a mutation is a full load, decrypt, mutate,
//! encrypt, replace cycle. Nothing is cached between calls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::Cipher;
use crate::error::{Result, VaultError};
use crate::storage::Storage;

/// Default name of the connection document inside the app directory.
pub const CONNECTIONS_FILE: &str = "connections.json";

/// Default SSH port used when a document omits it.
pub const DEFAULT_SSH_PORT: u16 = 22;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Remote protocol of a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    #[default]
    Ssh,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SSH-specific options.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshOptions {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Private key material. Encrypted at rest.
    #[serde(default)]
    pub private_key: String,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_SSH_PORT,
            private_key: String::new(),
        }
    }
}

impl std::fmt::Debug for SshOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshOptions")
            .field("port", &self.port)
            .field("private_key", &redacted(&self.private_key))
            .finish()
    }
}

/// A connection profile.
///
/// Values returned by [`ConnectionStore`] always carry decrypted secrets.
/// `created_at` and `updated_at` are owned by the store; whatever the caller
/// puts there is overwritten on create and update.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub alias: String,
    pub login: String,
    pub password: String,
    pub address: String,
    #[serde(rename = "type", default)]
    pub connection_type: ConnectionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub options: SshOptions,
}

impl Connection {
    /// Build a new SSH profile. Timestamps are placeholders until the
    /// profile is stored.
    pub fn ssh(
        alias: impl Into<String>,
        login: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            alias: alias.into(),
            login: login.into(),
            password: String::new(),
            address: address.into(),
            connection_type: ConnectionType::Ssh,
            created_at: now,
            updated_at: now,
            options: SshOptions::default(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.options.private_key = private_key.into();
        self
    }

    /// `login@address`, as passed to `ssh`.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.login, self.address)
    }

    fn seal(&self, cipher: &Cipher) -> Result<Self> {
        let mut sealed = self.clone();
        sealed.password = cipher.encrypt_field(&self.password)?;
        sealed.options.private_key = cipher.encrypt_field(&self.options.private_key)?;
        Ok(sealed)
    }

    fn unseal(&mut self, cipher: &Cipher) -> Result<()> {
        self.password = cipher.decrypt_field(&self.password)?;
        self.options.private_key = cipher.decrypt_field(&self.options.private_key)?;
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("alias", &self.alias)
            .field("login", &self.login)
            .field("password", &redacted(&self.password))
            .field("address", &self.address)
            .field("connection_type", &self.connection_type)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("options", &self.options)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "<redacted>" }
}

/// The persisted document: an ordered list of profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCollection {
    #[serde(default)]
    pub connects: Vec<Connection>,
}

impl ConnectionCollection {
    pub fn position(&self, alias: &str) -> Option<usize> {
        self.connects.iter().position(|c| c.alias == alias)
    }

    pub fn find(&self, alias: &str) -> Option<&Connection> {
        self.connects.iter().find(|c| c.alias == alias)
    }

    pub fn len(&self) -> usize {
        self.connects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connects.is_empty()
    }
}

fn validate_alias(alias: &str) -> Result<()> {
    if alias.trim().is_empty() {
        return Err(VaultError::InvalidAlias {
            reason: "alias is empty".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Encrypted connection store over a single JSON document.
///
/// # Example
///
/// ```rust
/// # use std::sync::Arc;
/// # use sshkeep_vault::crypto::{self, Cipher};
/// # use sshkeep_vault::storage::MemoryStorage;
/// # use sshkeep_vault::store::{Connection, ConnectionStore};
/// # fn example() -> sshkeep_vault::Result<()> {
/// let cipher = Cipher::new(&crypto::random_bytes(crypto::KEY_LEN)?)?;
/// let store = ConnectionStore::new(Arc::new(MemoryStorage::new()), cipher);
///
/// store.create(Connection::ssh("prod", "root", "10.0.0.1").with_password("pw"))?;
/// assert_eq!(store.get("prod")?.password, "pw");
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct ConnectionStore {
    storage: Arc<dyn Storage>,
    cipher: Cipher,
    file_name: String,
}

impl ConnectionStore {
    /// Open the default connection document in `storage`.
    pub fn new(storage: Arc<dyn Storage>, cipher: Cipher) -> Self {
        Self::with_file_name(storage, cipher, CONNECTIONS_FILE)
    }

    /// Open a connection document with a custom name.
    pub fn with_file_name(
        storage: Arc<dyn Storage>,
        cipher: Cipher,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            cipher,
            file_name: file_name.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    // -- Operations ---------------------------------------------------------

    /// Add a new profile.
    ///
    /// # Errors
    ///
    /// [`VaultError::DuplicateAlias`] if the alias is taken; the document is
    /// left untouched.
    pub fn create(&self, mut profile: Connection) -> Result<Connection> {
        validate_alias(&profile.alias)?;
        let mut collection = self.load()?;

        if collection.find(&profile.alias).is_some() {
            return Err(VaultError::DuplicateAlias {
                alias: profile.alias,
            });
        }

        let now = Utc::now();
        profile.created_at = now;
        profile.updated_at = now;
        collection.connects.push(profile.clone());
        self.store(&collection)?;

        tracing::info!(
            alias = %profile.alias,
            connection_type = %profile.connection_type,
            "created connection"
        );
        Ok(profile)
    }

    /// Replace the profile stored under `old_alias` with `profile`, which may
    /// carry a new alias.
    ///
    /// The replaced entry's `created_at` is kept and `updated_at` is
    /// refreshed.
    ///
    /// # Errors
    ///
    /// [`VaultError::AliasNotFound`] if `old_alias` is absent, or
    /// [`VaultError::DuplicateAlias`] if the new alias belongs to another
    /// entry. Neither writes anything.
    pub fn update(&self, mut profile: Connection, old_alias: &str) -> Result<Connection> {
        validate_alias(&profile.alias)?;
        let mut collection = self.load()?;

        let idx = collection
            .position(old_alias)
            .ok_or_else(|| VaultError::AliasNotFound {
                alias: old_alias.to_string(),
            })?;

        if profile.alias != old_alias && collection.find(&profile.alias).is_some() {
            return Err(VaultError::DuplicateAlias {
                alias: profile.alias,
            });
        }

        profile.created_at = collection.connects[idx].created_at;
        profile.updated_at = Utc::now();
        collection.connects[idx] = profile.clone();
        self.store(&collection)?;

        tracing::info!(alias = %profile.alias, old_alias = old_alias, "updated connection");
        Ok(profile)
    }

    /// Fetch one decrypted profile.
    pub fn get(&self, alias: &str) -> Result<Connection> {
        self.load()?
            .connects
            .into_iter()
            .find(|c| c.alias == alias)
            .ok_or_else(|| VaultError::AliasNotFound {
                alias: alias.to_string(),
            })
    }

    /// All decrypted profiles in insertion order.
    pub fn list(&self) -> Result<Vec<Connection>> {
        Ok(self.load()?.connects)
    }

    /// Remove the profile stored under `alias`.
    pub fn delete(&self, alias: &str) -> Result<Connection> {
        let mut collection = self.load()?;
        let idx = collection
            .position(alias)
            .ok_or_else(|| VaultError::AliasNotFound {
                alias: alias.to_string(),
            })?;

        let removed = collection.connects.remove(idx);
        self.store(&collection)?;

        tracing::info!(alias = alias, "deleted connection");
        Ok(removed)
    }

    /// Whether a profile with `alias` exists.
    pub fn exists(&self, alias: &str) -> Result<bool> {
        Ok(self.load()?.find(alias).is_some())
    }

    // -- Persistence --------------------------------------------------------

    /// Read and decrypt the whole document.
    ///
    /// A missing or empty document is an empty collection. Any decryption
    /// failure aborts the load.
    pub fn load(&self) -> Result<ConnectionCollection> {
        let bytes = match self.storage.read_optional(&self.file_name)? {
            Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => bytes,
            _ => return Ok(ConnectionCollection::default()),
        };

        let mut collection: ConnectionCollection = serde_json::from_slice(&bytes)?;
        for connection in &mut collection.connects {
            connection.unseal(&self.cipher)?;
        }

        tracing::debug!(
            file = %self.file_name,
            count = collection.len(),
            "loaded connections"
        );
        Ok(collection)
    }

    /// Encrypt and atomically write the whole document.
    fn store(&self, collection: &ConnectionCollection) -> Result<()> {
        let sealed = ConnectionCollection {
            connects: collection
                .connects
                .iter()
                .map(|c| c.seal(&self.cipher))
                .collect::<Result<_>>()?,
        };

        let json = serde_json::to_vec_pretty(&sealed)?;
        self.storage.replace(&self.file_name, &json)?;

        tracing::debug!(
            file = %self.file_name,
            count = sealed.len(),
            "stored connections"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
