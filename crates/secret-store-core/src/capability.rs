//! Usage checks run before a store is allowed to exist.

use crate::{
    error::StoreError,
    key::{CryptoKey, KeyUsage},
};

/// What a validated key may do with a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Reads only; explicit writes fail with `UnsupportedOperation`.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

impl Capability {
    pub fn can_encrypt(&self) -> bool {
        matches!(self, Capability::ReadWrite)
    }
}

/// Fails unless the key declares the `decrypt` usage. Every store needs it.
pub fn validate_for_decrypt(key: &CryptoKey) -> Result<Capability, StoreError> {
    if !key.usages().contains(KeyUsage::Decrypt) {
        return Err(StoreError::invalid_key(format!(
            "key {} must include the \"decrypt\" usage, has {}",
            key.id(),
            key.usages()
        )));
    }

    Ok(if supports_encrypt(key) {
        Capability::ReadWrite
    } else {
        Capability::ReadOnly
    })
}

pub fn supports_encrypt(key: &CryptoKey) -> bool {
    key.usages().contains(KeyUsage::Encrypt)
}
