use std::fs;
use std::path::PathBuf;

use base64::Engine;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::crypto::KEY_LEN;
use crate::error::StoreError;
use crate::storage;

/// Fixed identifier of one entry in a secret backend.
#[derive(Debug, Clone, Copy)]
pub struct SecretId {
    pub service: &'static str,
    pub account: &'static str,
}

pub const ENCRYPTION_KEY_ID: SecretId = SecretId {
    service: "habit-vault",
    account: "habits.encryption.key",
};

/// Minimal capability over a secure credential backend.
///
/// `get_secret` returns `None` only for a clean not-found; any other
/// abnormal status surfaces as [`StoreError::KeyStore`]. Implementations
/// own whatever encoding their backend needs.
pub trait SecretStore {
    fn get_secret(&self, id: SecretId) -> Result<Option<Vec<u8>>, StoreError>;
    fn set_secret(&self, id: SecretId, value: &[u8]) -> Result<(), StoreError>;
}

/// OS keyring backend. Key material is base64-encoded because the keyring
/// API stores string passwords.
pub struct KeyringSecretStore;

impl SecretStore for KeyringSecretStore {
    fn get_secret(&self, id: SecretId) -> Result<Option<Vec<u8>>, StoreError> {
        let entry = keyring::Entry::new(id.service, id.account)
            .map_err(|e| StoreError::KeyStore(format!("keyring entry: {e}")))?;
        match entry.get_password() {
            Ok(stored) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(stored)
                    .map_err(|e| {
                        StoreError::KeyStore(format!("stored secret is not valid base64: {e}"))
                    })?;
                Ok(Some(bytes))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::KeyStore(format!("keyring read: {e}"))),
        }
    }

    fn set_secret(&self, id: SecretId, value: &[u8]) -> Result<(), StoreError> {
        let entry = keyring::Entry::new(id.service, id.account)
            .map_err(|e| StoreError::KeyStore(format!("keyring entry: {e}")))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(value);
        entry
            .set_password(&encoded)
            .map_err(|e| StoreError::KeyStore(format!("keyring write: {e}")))
    }
}

/// File-backed substitute with keychain-like access control: one raw file
/// per entry under `dir`, mode 0600 on Unix. For platforms without a
/// usable OS keyring, and for tests.
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, id: SecretId) -> PathBuf {
        self.dir.join(format!("{}.{}", id.service, id.account))
    }
}

impl SecretStore for FileSecretStore {
    fn get_secret(&self, id: SecretId) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.entry_path(id);
        if !path.exists() {
            return Ok(None);
        }
        fs::read(&path)
            .map(Some)
            .map_err(|e| StoreError::KeyStore(format!("secret file read: {e}")))
    }

    fn set_secret(&self, id: SecretId, value: &[u8]) -> Result<(), StoreError> {
        storage::atomic_write(&self.entry_path(id), value)
            .map_err(|e| StoreError::KeyStore(format!("secret file write: {e}")))
    }
}

/// Return the persistent 256-bit key, generating and storing one on first
/// use. A key that was generated but could not be persisted is never
/// returned: anything sealed with it would be unreadable after restart.
pub fn obtain_or_create_key(secrets: &dyn SecretStore) -> Result<[u8; KEY_LEN], StoreError> {
    if let Some(stored) = secrets.get_secret(ENCRYPTION_KEY_ID)? {
        let key: [u8; KEY_LEN] = stored
            .try_into()
            .map_err(|_| StoreError::KeyStore("stored key has invalid length".into()))?;
        return Ok(key);
    }

    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    secrets.set_secret(ENCRYPTION_KEY_ID, &key)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_returns_none_for_missing_entry() {
        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::new(dir.path());
        assert!(store.get_secret(ENCRYPTION_KEY_ID).unwrap().is_none());
    }

    #[test]
    fn file_store_roundtrips_raw_bytes() {
        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::new(dir.path().join("secrets"));
        store.set_secret(ENCRYPTION_KEY_ID, &[7u8; KEY_LEN]).unwrap();
        assert_eq!(
            store.get_secret(ENCRYPTION_KEY_ID).unwrap(),
            Some(vec![7u8; KEY_LEN])
        );
    }

    #[test]
    fn obtain_or_create_persists_and_reuses_the_key() {
        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::new(dir.path());

        let first = obtain_or_create_key(&store).unwrap();
        let second = obtain_or_create_key(&store).unwrap();

        assert_eq!(first, second);
        assert!(store.get_secret(ENCRYPTION_KEY_ID).unwrap().is_some());
    }

    #[test]
    fn stored_key_with_wrong_length_is_a_keystore_error() {
        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::new(dir.path());
        store.set_secret(ENCRYPTION_KEY_ID, &[1u8; 16]).unwrap();

        assert!(matches!(
            obtain_or_create_key(&store),
            Err(StoreError::KeyStore(_))
        ));
    }
}
