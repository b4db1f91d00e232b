//! Encrypted connection profile vault for sshkeep.
//!
//! This crate stores remote-login profiles (host, login, password, SSH port
//! and private key) under short aliases. Secrets are encrypted field by field
//! with AES-256-GCM while on disk and only decrypted in memory.
//!
//! # Modules
//!
//! - [`storage`]: the narrow file surface, with filesystem and in-memory
//!   implementations.
//! - [`crypto`]: AES-256-GCM primitives and the field [`Cipher`].
//! - [`config`]: the flat `KEY=value` config store.
//! - [`keychain`]: where the master key comes from.
//! - [`store`]: the encrypted connection store.
//! - [`settings`]: app directory resolution.
//! - [`error`]: unified error type.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sshkeep_vault::keychain::{self, ConfigKeychain, KeychainProvider};
//! use sshkeep_vault::settings::Settings;
//! use sshkeep_vault::store::Connection;
//!
//! # fn example() -> sshkeep_vault::Result<()> {
//! let settings = Settings::resolve(None)?;
//! let storage = settings.storage();
//!
//! // Provision the master key once, in the config file.
//! let keys = ConfigKeychain::new(settings.config_store(storage.clone()));
//! if !keys.has_master_key()? {
//!     keychain::generate_master_key(&keys)?;
//! }
//!
//! let store = settings.connection_store(storage, keys.cipher()?);
//! store.create(Connection::ssh("prod", "root", "10.0.0.1").with_password("pw"))?;
//! println!("{}", store.get("prod")?.destination());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod keychain;
pub mod settings;
pub mod storage;
pub mod store;

pub use config::{ConfigEntry, ConfigStore};
pub use crypto::Cipher;
pub use error::{Result, VaultError};
pub use keychain::{ConfigKeychain, EnvKeychain, KeychainProvider};
pub use settings::Settings;
pub use storage::{FsStorage, MemoryStorage, Storage};
pub use store::{Connection, ConnectionCollection, ConnectionStore, ConnectionType, SshOptions};
