use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::StoreError;

pub const APP_DIR: &str = "habit-vault";
pub const ENCRYPTED_FILE: &str = "habits.enc";
pub const LEGACY_PLAIN_FILE: &str = "habits.json";
pub const DEFAULTS_FILE: &str = "defaults.json";
pub const LEGACY_DEFAULTS_KEY: &str = "SavedHabits";

/// Application-private data directory, not yet created.
pub fn default_base_dir() -> Result<PathBuf, StoreError> {
    let data = dirs::data_dir().ok_or_else(|| {
        StoreError::Filesystem(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no writable application data directory",
        ))
    })?;
    Ok(data.join(APP_DIR))
}

pub fn ensure_private_dir(dir: &Path) -> Result<(), StoreError> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    restrict_dir(dir)?;
    Ok(())
}

/// All-or-nothing file replacement: write to a temp file in the target
/// directory, flush and sync, then rename over the destination.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| {
        StoreError::Filesystem(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "target path has no parent directory",
        ))
    })?;
    ensure_private_dir(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|e| StoreError::Filesystem(e.error))?;
    restrict_file(path)?;
    Ok(())
}

pub fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(fs::read(path)?))
}

pub fn restrict_file(path: &Path) -> Result<(), StoreError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
    }
    // On non-Unix platforms we skip explicit chmod; rely on platform defaults.
    Ok(())
}

pub fn restrict_dir(path: &Path) -> Result<(), StoreError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
        }
    }
    Ok(())
}

/// Simple persistent key-value defaults: one JSON object per file. Stands
/// in for the preference store older releases kept habit records in.
pub struct KvDefaults {
    path: PathBuf,
}

impl KvDefaults {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut map = self.read_map()?;
        Ok(map.remove(key))
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value);
        self.write_map(&map)
    }

    /// Remove one entry; the backing file disappears with its last entry.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.read_map()?;
        if map.remove(key).is_none() {
            return Ok(());
        }
        if map.is_empty() {
            fs::remove_file(&self.path)?;
            return Ok(());
        }
        self.write_map(&map)
    }

    fn read_map(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        match read_if_exists(&self.path)? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Ok(BTreeMap::new()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(map)?;
        atomic_write(&self.path, data.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parent_and_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data.bin");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn read_if_exists_returns_none_for_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(read_if_exists(&dir.path().join("gone")).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn written_files_are_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        atomic_write(&path, b"x").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn kv_defaults_roundtrip_and_removal() {
        let dir = TempDir::new().unwrap();
        let defaults = KvDefaults::new(dir.path().join("defaults.json"));

        assert!(defaults.get("SavedHabits").unwrap().is_none());

        defaults.set("SavedHabits", json!([{"title": "Read"}])).unwrap();
        defaults.set("theme", json!("dark")).unwrap();
        assert_eq!(
            defaults.get("SavedHabits").unwrap(),
            Some(json!([{"title": "Read"}]))
        );

        defaults.remove("SavedHabits").unwrap();
        assert!(defaults.get("SavedHabits").unwrap().is_none());
        assert_eq!(defaults.get("theme").unwrap(), Some(json!("dark")));

        defaults.remove("theme").unwrap();
        assert!(!dir.path().join("defaults.json").exists());
    }

    #[test]
    fn kv_defaults_remove_of_missing_key_is_noop() {
        let dir = TempDir::new().unwrap();
        let defaults = KvDefaults::new(dir.path().join("defaults.json"));
        defaults.remove("SavedHabits").unwrap();
        assert!(!dir.path().join("defaults.json").exists());
    }
}
