//! Application directory and file layout.
//!
//! [`Settings`] is the explicit context handed to the stores; nothing in the
//! crate reads a global app directory. The directory is resolved from, in
//! order: an explicit override, the `SSHKEEP_HOME` environment variable, and
//! `$HOME/.sshkeep`.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{CONFIG_FILE, ConfigStore};
use crate::crypto::Cipher;
use crate::error::{Result, VaultError};
use crate::storage::{FsStorage, Storage};
use crate::store::{CONNECTIONS_FILE, ConnectionStore};

/// Environment variable overriding the app directory.
pub const HOME_ENV_VAR: &str = "SSHKEEP_HOME";

/// Config key overriding the connection document name.
pub const CONNECTIONS_KEY: &str = "CONNECTIONS";

/// Directory name created under the user's home.
const APP_DIR_NAME: &str = ".sshkeep";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub app_dir: PathBuf,
    pub config_file: String,
    pub connections_file: String,
}

impl Settings {
    /// Settings for an explicit directory with default file names.
    pub fn with_app_dir(app_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: app_dir.into(),
            config_file: CONFIG_FILE.to_string(),
            connections_file: CONNECTIONS_FILE.to_string(),
        }
    }

    /// Resolve the app directory from the process environment.
    pub fn resolve(override_dir: Option<PathBuf>) -> Result<Self> {
        let env_home = std::env::var_os(HOME_ENV_VAR).map(PathBuf::from);
        let user_home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from);
        Self::resolve_from(override_dir, env_home, user_home)
    }

    /// Resolution with every input passed in explicitly.
    pub fn resolve_from(
        override_dir: Option<PathBuf>,
        env_home: Option<PathBuf>,
        user_home: Option<PathBuf>,
    ) -> Result<Self> {
        let app_dir = override_dir
            .or(env_home.filter(|p| !p.as_os_str().is_empty()))
            .or_else(|| user_home.map(|home| home.join(APP_DIR_NAME)))
            .ok_or_else(|| {
                VaultError::Internal(format!(
                    "cannot determine app directory; set {HOME_ENV_VAR} or HOME"
                ))
            })?;

        tracing::debug!(app_dir = %app_dir.display(), "resolved app directory");
        Ok(Self::with_app_dir(app_dir))
    }

    /// Filesystem storage rooted at the app directory.
    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::new(FsStorage::new(self.app_dir.clone()))
    }

    pub fn config_store(&self, storage: Arc<dyn Storage>) -> ConfigStore {
        ConfigStore::with_file_name(storage, self.config_file.clone())
    }

    pub fn connection_store(&self, storage: Arc<dyn Storage>, cipher: Cipher) -> ConnectionStore {
        ConnectionStore::with_file_name(storage, cipher, self.connections_file.clone())
    }

    /// Apply overrides kept in the config file.
    ///
    /// `CONNECTIONS` must be a bare file name; anything with a path separator
    /// is ignored.
    pub fn apply_config(&mut self, config: &ConfigStore) -> Result<()> {
        if let Some(name) = config.try_get(CONNECTIONS_KEY)? {
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                tracing::warn!(value = %name, "ignoring CONNECTIONS override with a path");
            } else {
                self.connections_file = name;
            }
        }
        Ok(())
    }
}
