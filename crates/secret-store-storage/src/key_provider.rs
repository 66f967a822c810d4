use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use secret_store_core::{CryptoKey, KeyAlgorithm, KeyUsages};
use thiserror::Error;

const DEFAULT_KEY_ID: &str = "default";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
}

/// Provides the data key (OS keychain in production; memory in tests).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn get_or_create(&self) -> Result<CryptoKey, KeyError>;
}

/// OS keyring-backed provider. Stores the key as base64 under
/// `service`/`account`; usages are declared by the caller on every load.
pub struct KeyringProvider {
    service: String,
    account: String,
    usages: KeyUsages,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>, usages: KeyUsages) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
            usages,
        }
    }
}

#[async_trait]
impl KeyProvider for KeyringProvider {
    async fn get_or_create(&self) -> Result<CryptoKey, KeyError> {
        // Keyring operations are synchronous; wrap in async for trait compatibility.
        let entry = keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))?;

        if let Some(key) = stored_key(entry.get_password(), &self.usages)? {
            return Ok(key);
        }

        let key = generate_key(self.usages.clone());
        entry
            .set_password(&encode_key(&key))
            .map_err(|e| KeyError::Keyring(e.to_string()))?;
        Ok(key)
    }
}

/// Only a missing entry may lead to a new key; any other failure must not
/// overwrite the stored one.
fn stored_key(
    stored: Result<String, keyring::Error>,
    usages: &KeyUsages,
) -> Result<Option<CryptoKey>, KeyError> {
    match stored {
        Ok(secret) => decode_key(&secret, usages.clone()).map(Some),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(KeyError::Keyring(err.to_string())),
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Clone)]
pub struct InMemoryKeyProvider {
    usages: KeyUsages,
    inner: Arc<Mutex<Option<CryptoKey>>>,
}

impl InMemoryKeyProvider {
    pub fn new(usages: KeyUsages) -> Self {
        Self {
            usages,
            inner: Arc::default(),
        }
    }

    /// Provider that always hands out `key`.
    pub fn with_key(key: CryptoKey) -> Self {
        Self {
            usages: key.usages().clone(),
            inner: Arc::new(Mutex::new(Some(key))),
        }
    }
}

impl Default for InMemoryKeyProvider {
    fn default() -> Self {
        Self::new(KeyUsages::all())
    }
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn get_or_create(&self) -> Result<CryptoKey, KeyError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let key = generate_key(self.usages.clone());
        *guard = Some(key.clone());
        Ok(key)
    }
}

/// Fresh random AES-256-GCM key with the given usages.
pub fn generate_key(usages: KeyUsages) -> CryptoKey {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    CryptoKey::aes256(DEFAULT_KEY_ID, usages, bytes)
}

/// Base64 export of the raw key bytes. Usages are not part of the export.
pub fn encode_key(key: &CryptoKey) -> String {
    general_purpose::STANDARD.encode(key.expose_material())
}

/// Import a base64 key, declaring its usages.
pub fn decode_key(secret: &str, usages: KeyUsages) -> Result<CryptoKey, KeyError> {
    let bytes = general_purpose::STANDARD
        .decode(secret.trim())
        .map_err(|e| KeyError::Decode(e.to_string()))?;

    let len = bytes.len();
    CryptoKey::new(DEFAULT_KEY_ID, KeyAlgorithm::Aes256Gcm, usages, bytes).ok_or_else(|| {
        KeyError::Decode(format!(
            "expected {} bytes, got {len}",
            KeyAlgorithm::Aes256Gcm.key_len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use secret_store_core::KeyUsage;

    use super::*;

    #[tokio::test]
    async fn memory_provider_returns_same_key() {
        let provider = InMemoryKeyProvider::default();
        let first = provider.get_or_create().await.unwrap();
        let second = provider.get_or_create().await.unwrap();

        assert_eq!(first.expose_material(), second.expose_material());
        assert_eq!(first.id(), second.id());
        assert_eq!(first.usages(), &KeyUsages::all());
    }

    #[tokio::test]
    async fn memory_provider_keeps_declared_usages() {
        let usages: KeyUsages = [KeyUsage::Decrypt].into_iter().collect();
        let provider = InMemoryKeyProvider::new(usages.clone());
        let key = provider.get_or_create().await.unwrap();
        assert_eq!(key.usages(), &usages);
    }

    #[tokio::test]
    async fn memory_provider_hands_out_given_key() {
        let key = generate_key([KeyUsage::Decrypt].into_iter().collect());
        let provider = InMemoryKeyProvider::with_key(key.clone());

        let loaded = provider.get_or_create().await.unwrap();
        assert_eq!(loaded.expose_material(), key.expose_material());
        assert_eq!(loaded.usages(), key.usages());
    }

    #[test]
    fn missing_keyring_entry_allows_generation() {
        let loaded =
            stored_key(Err(keyring::Error::NoEntry), &KeyUsages::all()).expect("no error");
        assert!(loaded.is_none());
    }

    #[test]
    fn keyring_failures_never_regenerate() {
        let err = stored_key(Err(keyring::Error::BadEncoding(vec![0xff])), &KeyUsages::all())
            .expect_err("bad encoding must surface");
        assert!(matches!(err, KeyError::Keyring(_)));

        let err = stored_key(Ok("abcd".to_string()), &KeyUsages::all())
            .expect_err("corrupt secret must surface");
        assert!(matches!(err, KeyError::Decode(_)));
    }

    #[test]
    fn stored_secret_is_decoded() {
        let key = generate_key(KeyUsages::all());
        let loaded = stored_key(Ok(encode_key(&key)), &KeyUsages::all())
            .expect("decode")
            .expect("present");
        assert_eq!(loaded.expose_material(), key.expose_material());
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = decode_key("abcd", KeyUsages::all()).expect_err("should reject wrong length");
        assert!(matches!(err, KeyError::Decode(_)));
    }

    #[test]
    fn encode_then_decode_preserves_material() {
        let key = generate_key(KeyUsages::all());
        let restored = decode_key(&encode_key(&key), KeyUsages::all()).expect("decode");
        assert_eq!(restored.expose_material(), key.expose_material());
    }
}
