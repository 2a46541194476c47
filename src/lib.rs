//! Local-first habit tracking core.
//!
//! The durable half is an encrypted, tamper-evident habit store: records
//! are sealed with an authenticated cipher under a key kept in the
//! platform credential store, written atomically, and recovered at
//! startup through a forward-only chain of historical storage formats.
//! The domain half is the habit collection itself: frequency-aware
//! completion rules and stable reordering within a filtered sub-list.

pub mod crypto;
pub mod error;
pub mod keys;
pub mod models;
pub mod reorder;
pub mod stats;
pub mod storage;
pub mod store;

pub use error::StoreError;
pub use keys::{FileSecretStore, KeyringSecretStore, SecretId, SecretStore};
pub use models::{Frequency, Habit};
pub use reorder::move_within_filter;
pub use store::SecureHabitStore;
