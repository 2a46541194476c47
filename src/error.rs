use thiserror::Error;

/// Failure taxonomy for the habit store.
///
/// On the load path, `Authentication` and `Serialization` mean "this
/// recovery source is unusable" and the caller falls through to the next
/// one. Save failures are always reported to the caller; the store never
/// aborts the process.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The secure credential store was unavailable or returned an
    /// unexpected status.
    #[error("credential store failure: {0}")]
    KeyStore(String),

    /// An authenticated-encryption operation rejected its input: wrong
    /// key, truncated data, or tampering.
    #[error("encrypted payload failed authentication")]
    Authentication,

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("filesystem failure: {0}")]
    Filesystem(#[from] std::io::Error),
}
