//! Integration tests for the sshkeep-vault crate.
//!
//! These run the stores against a real temporary directory and cover the
//! full profile lifecycle, key provisioning and the config file format.

use std::sync::Arc;

use sshkeep_vault::config::ConfigStore;
use sshkeep_vault::crypto::{self, Cipher};
use sshkeep_vault::keychain::{self, ConfigKeychain, KeychainProvider};
use sshkeep_vault::settings::Settings;
use sshkeep_vault::storage::{FsStorage, Storage};
use sshkeep_vault::store::{CONNECTIONS_FILE, Connection, ConnectionStore, ConnectionType};
use sshkeep_vault::VaultError;

fn random_cipher() -> Cipher {
    Cipher::new(&crypto::random_bytes(crypto::KEY_LEN).unwrap()).unwrap()
}

fn fs_store(dir: &std::path::Path) -> (Arc<dyn Storage>, ConnectionStore) {
    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new(dir));
    let store = ConnectionStore::new(storage.clone(), random_cipher());
    (storage, store)
}

// ═══════════════════════════════════════════════════════════════════════
//  Connection lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn create_get_rename_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let (storage, store) = fs_store(dir.path());

    let profile = Connection::ssh("test", "root", "localhost")
        .with_password("pw")
        .with_port(22);
    store.create(profile.clone()).unwrap();

    // Decrypted in memory.
    let got = store.get("test").unwrap();
    assert_eq!(got.password, "pw");
    assert_eq!(got.connection_type, ConnectionType::Ssh);

    // Encrypted on disk.
    let doc: serde_json::Value =
        serde_json::from_slice(&storage.read_all(CONNECTIONS_FILE).unwrap()).unwrap();
    assert_ne!(doc["connects"][0]["password"], "pw");

    // Rename through update.
    let mut renamed = profile;
    renamed.alias = "test-new".into();
    store.update(renamed, "test").unwrap();

    assert!(matches!(
        store.get("test"),
        Err(VaultError::AliasNotFound { .. })
    ));
    let got = store.get("test-new").unwrap();
    assert_eq!(got.password, "pw");
    assert_eq!(got.destination(), "root@localhost");
}

#[test]
fn aliases_stay_unique_across_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let (_storage, store) = fs_store(dir.path());

    for alias in ["a", "b", "c"] {
        store.create(Connection::ssh(alias, "u", "h")).unwrap();
    }
    assert!(store.create(Connection::ssh("b", "u", "h")).is_err());
    assert!(store.update(Connection::ssh("c", "u", "h"), "a").is_err());
    store.update(Connection::ssh("d", "u", "h"), "a").unwrap();
    store.delete("b").unwrap();
    store.create(Connection::ssh("b", "u2", "h2")).unwrap();

    let mut aliases: Vec<_> = store.list().unwrap().into_iter().map(|c| c.alias).collect();
    let total = aliases.len();
    aliases.sort();
    aliases.dedup();
    assert_eq!(aliases.len(), total);
    assert_eq!(aliases, ["b", "c", "d"]);
}

#[test]
fn document_written_with_one_key_fails_with_another() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new(dir.path()));

    ConnectionStore::new(storage.clone(), random_cipher())
        .create(Connection::ssh("x", "u", "h").with_password("pw"))
        .unwrap();

    let other = ConnectionStore::new(storage, random_cipher());
    assert!(matches!(
        other.list(),
        Err(VaultError::DecryptionFailed { .. })
    ));
    assert!(matches!(
        other.get("x"),
        Err(VaultError::DecryptionFailed { .. })
    ));
}

#[test]
fn no_temp_file_left_after_writes() {
    let dir = tempfile::tempdir().unwrap();
    let (_storage, store) = fs_store(dir.path());

    store.create(Connection::ssh("a", "u", "h")).unwrap();
    store.delete("a").unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, [CONNECTIONS_FILE]);
}

// ═══════════════════════════════════════════════════════════════════════
//  Config + key provisioning
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn config_overwrite_keeps_one_line() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new(dir.path()));
    let config = ConfigStore::new(storage);

    config.set("k", "v1").unwrap();
    config.set("k", "v2").unwrap();
    assert_eq!(config.get("k"), "v2");

    let text = std::fs::read_to_string(dir.path().join("config")).unwrap();
    assert_eq!(text.lines().filter(|l| l.starts_with("K=")).count(), 1);
}

#[test]
fn config_validation_does_not_touch_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new(dir.path()));
    let config = ConfigStore::new(storage);

    assert!(matches!(
        config.set("a1b", "v"),
        Err(VaultError::InvalidKey { .. })
    ));
    assert!(matches!(
        config.set("OK", ""),
        Err(VaultError::InvalidValue { .. })
    ));
    assert!(!dir.path().join("config").exists());
}

#[test]
fn provisioned_key_lives_outside_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::with_app_dir(dir.path());
    let storage = settings.storage();

    let keys = ConfigKeychain::new(settings.config_store(storage.clone()));
    keychain::generate_master_key(&keys).unwrap();

    let store = settings.connection_store(storage.clone(), keys.cipher().unwrap());
    store
        .create(Connection::ssh("p", "u", "h").with_password("pw"))
        .unwrap();

    let secret = ConfigStore::new(storage.clone()).get("secret");
    assert!(!secret.is_empty());
    let doc = String::from_utf8(storage.read_all(CONNECTIONS_FILE).unwrap()).unwrap();
    assert!(!doc.contains(&secret));

    // A fresh process reading the same files sees the same profile.
    let keys = ConfigKeychain::new(settings.config_store(settings.storage()));
    let reopened = settings.connection_store(settings.storage(), keys.cipher().unwrap());
    assert_eq!(reopened.get("p").unwrap().password, "pw");
}

#[test]
fn missing_key_fails_explicitly() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::with_app_dir(dir.path());
    let keys = ConfigKeychain::new(settings.config_store(settings.storage()));

    assert!(matches!(
        keys.cipher(),
        Err(VaultError::MasterKeyNotFound)
    ));
}
