//! Flat `KEY=value` configuration store.
//!
//! The config file holds small scalar settings such as the master key and
//! file name overrides, one entry per line:
//!
//! ```text
//! SECRET=3q2+7w...
//! CONNECTIONS=connections.json
//! ```
//!
//! Keys are letters only and normalized to upper case. Values are opaque but
//! may not be empty and may not contain `=` or a line break, since the format
//! has no escaping. Every line must split into exactly two fields on `=`;
//! anything else makes the whole file [`VaultError::MalformedConfig`].
//!
//! Setting an existing key rewrites the whole file through
//! [`Storage::replace`]; a new key is appended as one line, after a line
//! break if the file's last line was left unterminated by a hand edit.
//! A file that is not valid UTF-8 is also [`VaultError::MalformedConfig`].

use std::io::{self, BufRead, BufReader};
use std::sync::Arc;

use crate::error::{Result, VaultError};
use crate::storage::Storage;

/// Default name of the config file inside the app directory.
pub const CONFIG_FILE: &str = "config";

/// Separator between key and value on each line.
pub const SEPARATOR: char = '=';

/// Returned by [`ConfigStore::get`] when no value is available.
pub const EMPTY_VALUE: &str = "";

/// One `KEY=value` line, key already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

impl std::fmt::Display for ConfigEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.key, SEPARATOR, self.value)
    }
}

/// Validate a key and return its normalized (upper-case) form.
pub fn normalize_key(key: &str) -> Result<String> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(VaultError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(key.to_ascii_uppercase())
}

/// Validate a value for storage in the line format.
pub fn validate_value(value: &str) -> Result<()> {
    let reason = if value.is_empty() {
        "value is empty"
    } else if value.contains(SEPARATOR) {
        "value contains '='"
    } else if value.contains(['\n', '\r']) {
        "value contains a line break"
    } else {
        return Ok(());
    };
    Err(VaultError::InvalidValue {
        reason: reason.into(),
    })
}

fn parse_line(line_no: usize, line: &str) -> Result<ConfigEntry> {
    let fields: Vec<&str> = line.split(SEPARATOR).collect();
    match fields.as_slice() {
        [key, value] => Ok(ConfigEntry {
            key: (*key).to_string(),
            value: (*value).to_string(),
        }),
        _ => Err(VaultError::MalformedConfig {
            line: line_no,
            reason: format!("expected KEY=value, found {} field(s)", fields.len()),
        }),
    }
}

/// Validated key-value store over a single config file.
pub struct ConfigStore {
    storage: Arc<dyn Storage>,
    file_name: String,
}

impl ConfigStore {
    /// Open the default config file in `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_file_name(storage, CONFIG_FILE)
    }

    /// Open a config file with a custom name.
    pub fn with_file_name(storage: Arc<dyn Storage>, file_name: impl Into<String>) -> Self {
        Self {
            storage,
            file_name: file_name.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Set `key` to `value`.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidKey`] and [`VaultError::InvalidValue`] are raised
    /// before the file is touched. [`VaultError::MalformedConfig`] if the
    /// existing file cannot be parsed.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = normalize_key(key)?;
        validate_value(value)?;

        let entries = self.entries()?;
        if !entries.iter().any(|e| e.key == key) {
            let mut line = String::new();
            if self.needs_line_break()? {
                line.push('\n');
            }
            line.push_str(&format!("{key}{SEPARATOR}{value}\n"));
            self.storage.append(&self.file_name, line.as_bytes())?;
            tracing::info!(key = %key, "added config entry");
            return Ok(());
        }

        self.rewrite(entries, &key, value)?;
        tracing::info!(key = %key, "updated config entry");
        Ok(())
    }

    /// Whether the file ends in an unterminated last line.
    fn needs_line_break(&self) -> Result<bool> {
        Ok(self
            .storage
            .read_optional(&self.file_name)?
            .and_then(|bytes| bytes.last().copied())
            .is_some_and(|last| last != b'\n'))
    }

    /// Rebuild the whole file with `key` set to `value`.
    ///
    /// Later duplicates of `key` (from hand edits) are dropped so the file
    /// ends with one line per key.
    fn rewrite(&self, entries: Vec<ConfigEntry>, key: &str, value: &str) -> Result<()> {
        let mut out = String::new();
        let mut written = false;
        for entry in entries {
            if entry.key == key {
                if written {
                    continue;
                }
                written = true;
                out.push_str(&format!("{key}{SEPARATOR}{value}\n"));
            } else {
                out.push_str(&format!("{entry}\n"));
            }
        }
        self.storage.replace(&self.file_name, out.as_bytes())
    }

    /// Look up `key`, returning [`EMPTY_VALUE`] if it is invalid, absent, or
    /// the file cannot be read.
    ///
    /// Use [`ConfigStore::exists`] to tell "absent" apart, or
    /// [`ConfigStore::try_get`] to see the error.
    pub fn get(&self, key: &str) -> String {
        match self.try_get(key) {
            Ok(Some(value)) => value,
            Ok(None) => EMPTY_VALUE.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "config lookup failed");
                EMPTY_VALUE.to_string()
            }
        }
    }

    /// Look up `key`, surfacing validation, parse and I/O errors.
    pub fn try_get(&self, key: &str) -> Result<Option<String>> {
        let key = normalize_key(key)?;
        Ok(self
            .entries()?
            .into_iter()
            .find(|e| e.key == key)
            .map(|e| e.value))
    }

    /// Whether a line with exactly this normalized key exists.
    pub fn exists(&self, key: &str) -> bool {
        match self.try_get(key) {
            Ok(found) => found.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "config existence check failed");
                false
            }
        }
    }

    /// All entries in file order. A missing file has no entries.
    pub fn entries(&self) -> Result<Vec<ConfigEntry>> {
        if !self.storage.exists(&self.file_name) {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(self.storage.open_read(&self.file_name)?);
        let mut entries = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    return Err(VaultError::MalformedConfig {
                        line: idx + 1,
                        reason: "line is not valid UTF-8".into(),
                    });
                }
                Err(e) => return Err(e.into()),
            };
            let line = line.strip_suffix('\r').unwrap_or(&line);
            entries.push(parse_line(idx + 1, line)?);
        }

        tracing::debug!(file = %self.file_name, count = entries.len(), "read config");
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
