use thiserror::Error;

/// Errors produced by the transparent store and its capability gate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Key is missing the `decrypt` usage, has an algorithm the cipher does not
    /// handle, or the container is not a JSON object.
    #[error("invalid key: {reason}")]
    InvalidKey { reason: String },
    /// Explicit write attempted with a key that cannot encrypt.
    #[error("could not set {property}: key does not support encryption")]
    UnsupportedOperation { property: String },
    /// Stored ciphertext could not be decrypted.
    #[error("failed to decrypt {property}: {reason}")]
    Decryption { property: String, reason: String },
    /// Value could not be encrypted.
    #[error("failed to encrypt {property}: {reason}")]
    Encryption { property: String, reason: String },
    /// Backing store or task failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

impl StoreError {
    pub(crate) fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }
}
