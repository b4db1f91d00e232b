//! Vault error types.
//!
//! Every public API in this crate returns [`VaultError`]. Validation and
//! identity errors are raised before any write is attempted, so a caller that
//! sees one of them can assume the files on disk were not touched.

/// Unified error type for the sshkeep vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Config validation --------------------------------------------------
    /// A config key contained something other than ASCII letters.
    #[error("invalid config key {key:?}: only letters are allowed")]
    InvalidKey { key: String },

    /// A config value was empty or contained a separator or line break.
    #[error("invalid config value: {reason}")]
    InvalidValue { reason: String },

    /// The config file has a line that is not exactly `KEY=value`.
    #[error("malformed config at line {line}: {reason}")]
    MalformedConfig { line: usize, reason: String },

    // -- Connection identity ------------------------------------------------
    /// A connection alias was empty.
    #[error("invalid alias: {reason}")]
    InvalidAlias { reason: String },

    /// Another connection already uses this alias.
    #[error("connection alias already exists: {alias}")]
    DuplicateAlias { alias: String },

    /// No connection has this alias.
    #[error("connection alias not found: {alias}")]
    AliasNotFound { alias: String },

    /// The connection document could not be parsed.
    #[error("malformed connection document: {0}")]
    MalformedDocument(#[from] serde_json::Error),

    // -- Crypto -------------------------------------------------------------
    /// Encryption failed (bad key length, RNG failure).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Decryption failed (wrong key, tampered or foreign ciphertext).
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    /// No master key has been provisioned.
    #[error("master key not found; run `sshkeep init` or set SSHKEEP_SECRET")]
    MasterKeyNotFound,

    /// A master key is already provisioned and would be overwritten.
    #[error("master key already exists")]
    MasterKeyExists,

    /// Writing the master key to its backend failed.
    #[error("failed to store master key: {reason}")]
    MasterKeyStoreFailed { reason: String },

    // -- Storage ------------------------------------------------------------
    /// Underlying filesystem failure.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for unexpected internal errors.  Prefer a typed variant.
    #[error("internal vault error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
