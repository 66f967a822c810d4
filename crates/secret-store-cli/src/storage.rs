use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use color_eyre::{eyre::eyre, Result};
use dirs::data_dir;
use secret_store_core::{
    create_store, Cipher, CryptoKey, ExplicitSetter, KeyUsages, TransparentView,
};
use secret_store_storage::{
    decode_key, open_store_file, AesGcmCipher, KeyProvider, KeyringProvider, OpenOptions,
};
use tracing::debug;

use crate::config::Config;

/// Base64 key that takes precedence over the keyring.
pub const KEY_ENV: &str = "SECRET_STORE_KEY";

/// Resolve the default document path.
pub fn default_document() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| eyre!("no data dir available"))?;
    Ok(base.join("secret-store").join("secrets.json"))
}

/// `--file` wins over the configured document, which wins over the default.
pub fn document_path(config: &Config, file: Option<PathBuf>) -> Result<PathBuf> {
    match file.or_else(|| config.document.clone()) {
        Some(path) => Ok(path),
        None => default_document(),
    }
}

pub fn cipher() -> Arc<dyn Cipher> {
    Arc::new(AesGcmCipher::new())
}

/// Load the data key from `SECRET_STORE_KEY`, else from the OS keychain.
pub async fn resolve_key(config: &Config) -> Result<CryptoKey> {
    let provider = KeyringProvider::new(
        config.keyring_service(),
        config.keyring_account(),
        config.key_usages(),
    );
    resolve_key_with(
        std::env::var(KEY_ENV).ok(),
        config.key_usages(),
        &provider,
    )
    .await
}

async fn resolve_key_with(
    env_secret: Option<String>,
    usages: KeyUsages,
    provider: &dyn KeyProvider,
) -> Result<CryptoKey> {
    if let Some(secret) = env_secret {
        debug!("using data key from {KEY_ENV}");
        return decode_key(&secret, usages).map_err(|e| eyre!(e.to_string()));
    }

    debug!("using data key from keyring");
    provider
        .get_or_create()
        .await
        .map_err(|e| eyre!(e.to_string()))
}

/// Open the document, or start an empty store when it does not exist yet and
/// `create` is set.
pub async fn open_document(
    key: CryptoKey,
    path: &Path,
    create: bool,
) -> Result<(TransparentView, ExplicitSetter)> {
    if create && !path.exists() {
        debug!(?path, "document missing, starting empty");
        return create_store(key, cipher(), None, None).map_err(|e| eyre!(e.to_string()));
    }

    open_store_file(key, cipher(), path, OpenOptions::default())
        .await
        .map_err(|e| eyre!(e.to_string()))
}
