//! JSON documents whose values are ciphertext, loaded into or saved from a
//! transparent store.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use secret_store_core::{
    capability, create_store, Cipher, Container, CryptoKey, Delegate, ExplicitSetter, StoreError,
    TransparentView,
};
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum DocumentError {
    /// Cancellation was requested before or during the read.
    #[error("load of {path} cancelled")]
    Cancelled { path: PathBuf },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not serialize document: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Optional settings for [`open_store_file`].
#[derive(Default, Clone)]
pub struct OpenOptions {
    /// Raw access strategy for the resulting view.
    pub delegate: Option<Arc<dyn Delegate>>,
    /// Checked before any work begins and raced against the read.
    pub cancel: Option<CancellationToken>,
}

impl OpenOptions {
    pub fn with_delegate(mut self, delegate: Arc<dyn Delegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Read a UTF-8 JSON object from `path` and wrap it in a transparent store.
///
/// The document must be an object; its string values are expected to be
/// ciphertext produced with `key`. A key without `decrypt` fails before any
/// file access.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn open_store_file(
    key: CryptoKey,
    cipher: Arc<dyn Cipher>,
    path: impl AsRef<Path>,
    options: OpenOptions,
) -> Result<(TransparentView, ExplicitSetter), DocumentError> {
    let path = path.as_ref();
    capability::validate_for_decrypt(&key)?;

    let cancel = options.cancel.unwrap_or_default();
    if cancel.is_cancelled() {
        return Err(DocumentError::Cancelled {
            path: path.to_path_buf(),
        });
    }

    let bytes = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(DocumentError::Cancelled { path: path.to_path_buf() });
        }
        read = tokio::fs::read(path) => read.map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?,
    };

    let document: Value =
        serde_json::from_slice(&bytes).map_err(|source| DocumentError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let container = Container::from_value(document)?;
    debug!(properties = container.len(), "loaded document");

    Ok(create_store(key, cipher, Some(container), options.delegate)?)
}

/// Persist the container's ciphertext as pretty JSON, replacing `path`
/// atomically.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn save_store_file(container: &Container, path: impl AsRef<Path>) -> Result<(), DocumentError> {
    let path = path.as_ref();
    let io_err = |source: std::io::Error| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(io_err)?;

    let json = serde_json::to_vec_pretty(&Value::Object(container.snapshot()))
        .map_err(DocumentError::Serialize)?;
    let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(&json).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    debug!(properties = container.len(), "saved document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use secret_store_core::{KeyUsage, KeyUsages};
    use serde_json::json;

    use super::*;
    use crate::{cipher::AesGcmCipher, key_provider::generate_key};

    fn cipher() -> Arc<dyn Cipher> {
        Arc::new(AesGcmCipher)
    }

    #[tokio::test]
    async fn opens_document_with_matching_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("secrets.json");
        let key = generate_key(KeyUsages::all());
        let ciphertext = AesGcmCipher
            .encrypt(&key, &json!("Hello, World!"))
            .await
            .expect("encrypt");
        std::fs::write(&path, json!({ "msg": ciphertext }).to_string()).expect("write doc");

        let (store, _) = open_store_file(key, cipher(), &path, OpenOptions::default())
            .await
            .expect("open");

        assert_eq!(store.get("msg").await, Ok(Some("Hello, World!".to_string())));
        assert_eq!(store.get("dne").await, Ok(None));
    }

    #[tokio::test]
    async fn save_then_reopen_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("store.json");
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "{}").expect("write doc");
        let key = generate_key(KeyUsages::all());

        let (view, set) = open_store_file(key.clone(), cipher(), &path, OpenOptions::default())
            .await
            .expect("open");
        set.set("token", "abc123").await.expect("set");
        save_store_file(view.container(), &path).expect("save");

        let on_disk = std::fs::read_to_string(&path).expect("read");
        assert!(!on_disk.contains("abc123"), "plaintext must not be stored");

        let (reopened, _) = open_store_file(key, cipher(), &path, OpenOptions::default())
            .await
            .expect("reopen");
        assert_eq!(reopened.get("token").await, Ok(Some("abc123".to_string())));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_reading() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = open_store_file(
            generate_key(KeyUsages::all()),
            cipher(),
            "/definitely/not/here.json",
            OpenOptions::default().with_cancel(cancel),
        )
        .await
        .expect_err("cancelled");
        assert!(matches!(err, DocumentError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn bad_key_fails_before_cancellation_or_io() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = open_store_file(
            generate_key([KeyUsage::Encrypt].into_iter().collect()),
            cipher(),
            "/definitely/not/here.json",
            OpenOptions::default().with_cancel(cancel),
        )
        .await
        .expect_err("encrypt-only key");
        assert!(matches!(err, DocumentError::Store(StoreError::InvalidKey { .. })));
    }

    /// Counts raw reads while keeping direct access.
    #[derive(Default)]
    struct CountingReads {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl Delegate for CountingReads {
        async fn get(
            &self,
            container: &Container,
            property: &str,
        ) -> Result<Option<Value>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(container.get(property))
        }
    }

    #[tokio::test]
    async fn reads_go_through_configured_delegate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("secrets.json");
        let key = generate_key(KeyUsages::all());
        let ciphertext = AesGcmCipher
            .encrypt(&key, &json!("via delegate"))
            .await
            .expect("encrypt");
        std::fs::write(&path, json!({ "msg": ciphertext }).to_string()).expect("write doc");

        let delegate = Arc::new(CountingReads::default());
        let (store, _) = open_store_file(
            key,
            cipher(),
            &path,
            OpenOptions::default().with_delegate(delegate.clone()),
        )
        .await
        .expect("open");

        assert_eq!(store.get("msg").await, Ok(Some("via delegate".to_string())));
        assert_eq!(store.get("dne").await, Ok(None));
        assert_eq!(delegate.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = open_store_file(
            generate_key(KeyUsages::all()),
            cipher(),
            dir.path().join("missing.json"),
            OpenOptions::default(),
        )
        .await
        .expect_err("missing");
        assert!(matches!(err, DocumentError::Io { .. }));
    }

    #[tokio::test]
    async fn invalid_json_and_non_objects_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broken = dir.path().join("broken.json");
        let list = dir.path().join("list.json");
        std::fs::write(&broken, "{ not json").expect("write");
        std::fs::write(&list, "[1, 2, 3]").expect("write");

        let err = open_store_file(
            generate_key(KeyUsages::all()),
            cipher(),
            &broken,
            OpenOptions::default(),
        )
        .await
        .expect_err("parse error");
        assert!(matches!(err, DocumentError::Parse { .. }));

        let err = open_store_file(
            generate_key(KeyUsages::all()),
            cipher(),
            &list,
            OpenOptions::default(),
        )
        .await
        .expect_err("not an object");
        assert!(matches!(err, DocumentError::Store(StoreError::InvalidKey { .. })));
    }

    #[tokio::test]
    async fn key_without_decrypt_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{}").expect("write");

        let err = open_store_file(
            generate_key([KeyUsage::Encrypt].into_iter().collect()),
            cipher(),
            &path,
            OpenOptions::default(),
        )
        .await
        .expect_err("encrypt-only key");
        assert!(matches!(err, DocumentError::Store(StoreError::InvalidKey { .. })));
    }
}
