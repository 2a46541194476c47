use std::fs;
use std::path::PathBuf;

use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{self, KEY_LEN};
use crate::error::StoreError;
use crate::keys::{KeyringSecretStore, SecretStore, obtain_or_create_key};
use crate::models::{Frequency, Habit};
use crate::reorder;
use crate::storage::{
    DEFAULTS_FILE, ENCRYPTED_FILE, KvDefaults, LEGACY_DEFAULTS_KEY, LEGACY_PLAIN_FILE,
    atomic_write, default_base_dir, read_if_exists,
};

#[derive(Zeroize, ZeroizeOnDrop)]
struct CachedKey([u8; KEY_LEN]);

/// Recovery sources for the load path, tried in order; the first one that
/// yields a collection wins. Adding or removing a legacy format is one
/// entry here plus its reader below.
const RECOVERY_SOURCES: &[RecoverySource] = &[
    RecoverySource::Encrypted,
    RecoverySource::LegacyPlainFile,
    RecoverySource::LegacyDefaults,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoverySource {
    Encrypted,
    LegacyPlainFile,
    LegacyDefaults,
}

/// Owner of the habit collection and its durable form.
///
/// Every mutation writes through: the collection is re-serialized, sealed
/// under the managed key, and atomically replaced on disk before the call
/// returns. Beyond the collection it was handed, the store holds no
/// mutable state except the key cache, which is zeroed on drop.
pub struct SecureHabitStore {
    base_dir: PathBuf,
    secrets: Box<dyn SecretStore>,
    key: Option<CachedKey>,
    habits: Vec<Habit>,
}

impl SecureHabitStore {
    /// Store rooted at the platform data directory, keyed through the OS
    /// keyring.
    pub fn open_default() -> Result<Self, StoreError> {
        Ok(Self::open(default_base_dir()?, Box::new(KeyringSecretStore)))
    }

    pub fn open(base_dir: impl Into<PathBuf>, secrets: Box<dyn SecretStore>) -> Self {
        Self {
            base_dir: base_dir.into(),
            secrets,
            key: None,
            habits: Vec::new(),
        }
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn habit(&self, id: Uuid) -> Option<&Habit> {
        self.habits.iter().find(|h| h.id == id)
    }

    /// Daily habits in collection order.
    pub fn daily_habits(&self) -> Vec<&Habit> {
        self.habits
            .iter()
            .filter(|h| matches!(h.frequency, Frequency::Daily))
            .collect()
    }

    /// Weekly habits in collection order.
    pub fn weekly_habits(&self) -> Vec<&Habit> {
        self.habits
            .iter()
            .filter(|h| matches!(h.frequency, Frequency::Weekly { .. }))
            .collect()
    }

    pub fn encrypted_file_path(&self) -> PathBuf {
        self.base_dir.join(ENCRYPTED_FILE)
    }

    fn legacy_plain_path(&self) -> PathBuf {
        self.base_dir.join(LEGACY_PLAIN_FILE)
    }

    fn defaults(&self) -> KvDefaults {
        KvDefaults::new(self.base_dir.join(DEFAULTS_FILE))
    }

    fn key(&mut self) -> Result<[u8; KEY_LEN], StoreError> {
        if let Some(cached) = &self.key {
            return Ok(cached.0);
        }
        let key = obtain_or_create_key(self.secrets.as_ref())?;
        self.key = Some(CachedKey(key));
        Ok(key)
    }

    /// Serialize, seal, and atomically replace the encrypted file.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let key = self.key()?;
        let payload = serde_json::to_vec(&self.habits)?;
        let blob = crypto::seal(&key, &payload)?;
        atomic_write(&self.encrypted_file_path(), &blob)
    }

    /// Populate the collection from the first readable source: the
    /// encrypted file, then the legacy plaintext file, then the legacy
    /// key-value entry. Data recovered from a legacy source is re-sealed
    /// through the encrypted path and the legacy copy removed (kept when
    /// the re-seal fails, so nothing is lost). A corrupt or unreadable
    /// source is skipped with a warning, never fatal; when every source
    /// comes up empty the collection stays empty for the caller to seed.
    pub fn load(&mut self) -> &[Habit] {
        for source in RECOVERY_SOURCES {
            match self.try_load_source(*source) {
                Ok(Some(habits)) => {
                    self.habits = habits;
                    if *source != RecoverySource::Encrypted {
                        self.migrate_from(*source);
                    }
                    return &self.habits;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!("habit recovery source {source:?} unusable: {err}");
                }
            }
        }
        self.habits.clear();
        &self.habits
    }

    fn try_load_source(
        &mut self,
        source: RecoverySource,
    ) -> Result<Option<Vec<Habit>>, StoreError> {
        match source {
            RecoverySource::Encrypted => self.load_encrypted(),
            RecoverySource::LegacyPlainFile => match read_if_exists(&self.legacy_plain_path())? {
                Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
                None => Ok(None),
            },
            RecoverySource::LegacyDefaults => match self.defaults().get(LEGACY_DEFAULTS_KEY)? {
                Some(value) => Ok(Some(serde_json::from_value(value)?)),
                None => Ok(None),
            },
        }
    }

    fn load_encrypted(&mut self) -> Result<Option<Vec<Habit>>, StoreError> {
        let Some(blob) = read_if_exists(&self.encrypted_file_path())? else {
            return Ok(None);
        };
        let key = self.key()?;
        let payload = crypto::open(&key, &blob)?;
        Ok(Some(serde_json::from_slice(&payload)?))
    }

    fn migrate_from(&mut self, source: RecoverySource) {
        if let Err(err) = self.save() {
            tracing::warn!("could not re-seal habits recovered from {source:?}: {err}");
            return;
        }
        let cleanup = match source {
            RecoverySource::Encrypted => Ok(()),
            RecoverySource::LegacyPlainFile => {
                fs::remove_file(self.legacy_plain_path()).map_err(StoreError::from)
            }
            RecoverySource::LegacyDefaults => self.defaults().remove(LEGACY_DEFAULTS_KEY),
        };
        match cleanup {
            Ok(()) => tracing::debug!("migrated habits from legacy source {source:?}"),
            Err(err) => {
                tracing::warn!("failed to remove migrated legacy source {source:?}: {err}");
            }
        }
    }

    /// First-run default: an empty store gets two starter daily habits.
    pub fn seed_if_empty(&mut self) -> Result<(), StoreError> {
        if !self.habits.is_empty() {
            return Ok(());
        }
        self.add_habit("Drink Water", Frequency::Daily)?;
        self.add_habit("Exercise", Frequency::Daily)?;
        Ok(())
    }

    pub fn add_habit(&mut self, title: &str, frequency: Frequency) -> Result<Uuid, StoreError> {
        let habit = Habit::new(title, frequency);
        let id = habit.id;
        self.habits.push(habit);
        self.save()?;
        Ok(id)
    }

    pub fn delete_habit(&mut self, id: Uuid) -> Result<(), StoreError> {
        let before = self.habits.len();
        self.habits.retain(|h| h.id != id);
        if self.habits.len() == before {
            return Ok(());
        }
        self.save()
    }

    pub fn update_habit(
        &mut self,
        id: Uuid,
        title: &str,
        frequency: Frequency,
    ) -> Result<(), StoreError> {
        self.with_habit(id, |h| h.update(title, frequency))
    }

    pub fn toggle_completion(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.with_habit(id, Habit::toggle_completion)
    }

    pub fn add_weekly_completion(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.with_habit(id, Habit::add_weekly_completion)
    }

    pub fn remove_weekly_completion(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.with_habit(id, Habit::remove_weekly_completion)
    }

    /// Reorder `dragged` relative to `destination` inside the subsequence
    /// selected by `predicate`, then write through. Ids missing from the
    /// filtered view leave the collection untouched and skip the save.
    pub fn move_within_filter<P>(
        &mut self,
        predicate: P,
        dragged: Uuid,
        destination: Uuid,
    ) -> Result<(), StoreError>
    where
        P: Fn(&Habit) -> bool,
    {
        let reordered = reorder::move_within_filter(&self.habits, predicate, dragged, destination);
        let unchanged = self
            .habits
            .iter()
            .zip(&reordered)
            .all(|(a, b)| a.id == b.id);
        self.habits = reordered;
        if unchanged {
            return Ok(());
        }
        self.save()
    }

    /// Replace the whole collection and write through: the explicit
    /// commit surface for callers that edit habits wholesale.
    pub fn replace(&mut self, habits: Vec<Habit>) -> Result<(), StoreError> {
        self.habits = habits;
        self.save()
    }

    /// Run one mutation against the habit with `id`, then write through.
    /// Unknown ids are a silent no-op, matching the silent-edge policy of
    /// the domain model.
    fn with_habit<F: FnOnce(&mut Habit)>(&mut self, id: Uuid, mutate: F) -> Result<(), StoreError> {
        let Some(habit) = self.habits.iter_mut().find(|h| h.id == id) else {
            return Ok(());
        };
        mutate(habit);
        self.save()
    }
}
