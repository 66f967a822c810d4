//! Transparent encrypting view over a [`Container`].
//!
//! Property access goes through typed accessors instead of native indexing:
//! [`TransparentView::get`] decrypts lazily, [`TransparentView::assign`]
//! encrypts in the background, and [`ExplicitSetter::set`] encrypts and
//! commits before it resolves.

mod pending;

use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, debug_span, instrument, warn, Instrument};

pub use pending::PendingWrite;

use crate::{
    capability::{self, Capability},
    cipher::Cipher,
    container::{Container, Delegate, DirectAccess},
    error::StoreError,
    key::CryptoKey,
};

/// Key, cipher and container fixed for the lifetime of a view.
struct Binding {
    key: CryptoKey,
    cipher: Arc<dyn Cipher>,
    container: Container,
}

impl Binding {
    async fn encrypt(&self, property: &str, value: &Value) -> Result<String, StoreError> {
        self.cipher
            .encrypt(&self.key, value)
            .await
            .map_err(|e| StoreError::Encryption {
                property: property.to_string(),
                reason: e.to_string(),
            })
    }

    async fn decrypt(&self, property: &str, encoded: &str) -> Result<String, StoreError> {
        self.cipher
            .decrypt(&self.key, encoded)
            .await
            .map_err(|e| StoreError::Decryption {
                property: property.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Wrap `container` (empty when `None`) so reads decrypt and writes encrypt
/// with `key`.
///
/// Fails with [`StoreError::InvalidKey`] when the key cannot decrypt. Raw
/// reads and
/// intercepted writes go through `delegate`, defaulting to [`DirectAccess`].
pub fn create_store(
    key: CryptoKey,
    cipher: Arc<dyn Cipher>,
    container: Option<Container>,
    delegate: Option<Arc<dyn Delegate>>,
) -> Result<(TransparentView, ExplicitSetter), StoreError> {
    let capability = capability::validate_for_decrypt(&key)?;

    debug!(key_id = key.id(), ?capability, "creating transparent store");

    let binding = Arc::new(Binding {
        key,
        cipher,
        container: container.unwrap_or_default(),
    });
    let view = TransparentView {
        binding: Arc::clone(&binding),
        delegate: delegate.unwrap_or_else(|| Arc::new(DirectAccess)),
    };
    let setter = ExplicitSetter {
        binding,
        capability,
    };
    Ok((view, setter))
}

/// Live view whose reads yield plaintext while the container holds only
/// ciphertext. Cheap to clone; clones share the same binding.
#[derive(Clone)]
pub struct TransparentView {
    binding: Arc<Binding>,
    delegate: Arc<dyn Delegate>,
}

impl TransparentView {
    /// Decrypt the stored value for `property`.
    ///
    /// Absent and non-text values resolve to `None`; text that fails to
    /// decrypt is a [`StoreError::Decryption`].
    #[instrument(skip_all, fields(property = %property))]
    pub async fn get(&self, property: &str) -> Result<Option<String>, StoreError> {
        let raw = self.delegate.get(&self.binding.container, property).await?;
        match raw {
            Some(Value::String(encoded)) => {
                self.binding.decrypt(property, &encoded).await.map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Encrypt and commit `value` in the background.
    ///
    /// Returns once the write is enqueued. Two assigns to the same property
    /// race; the last one to commit wins. Outside a Tokio runtime nothing is
    /// spawned and the returned write has already failed.
    pub fn assign(&self, property: &str, value: impl Into<Value>) -> PendingWrite {
        let property = property.to_string();
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(%property, %err, "intercepted write not started");
                return PendingWrite::failed(
                    property,
                    StoreError::Storage {
                        reason: format!("no async runtime to run the write: {err}"),
                    },
                );
            }
        };

        let value = value.into();
        let binding = Arc::clone(&self.binding);
        let delegate = Arc::clone(&self.delegate);
        let span = debug_span!("assign", property = %property);

        let task_property = property.clone();
        let handle = runtime.spawn(
            async move {
                let result: Result<(), StoreError> = async {
                    let encrypted = binding.encrypt(&task_property, &value).await?;
                    delegate
                        .set(&binding.container, &task_property, Value::String(encrypted))
                        .await
                }
                .await;

                match &result {
                    Ok(()) => debug!("committed intercepted write"),
                    Err(err) => warn!(%err, "intercepted write failed"),
                }
                result
            }
            .instrument(span),
        );

        PendingWrite::spawned(property, handle)
    }

    /// Property names currently in the container, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.binding.container.keys()
    }

    /// Presence of ciphertext (or any raw value), without decrypting.
    pub fn contains(&self, property: &str) -> bool {
        self.binding.container.contains(property)
    }

    pub fn len(&self) -> usize {
        self.binding.container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binding.container.is_empty()
    }

    /// The aliased container.
    pub fn container(&self) -> &Container {
        &self.binding.container
    }

}

impl std::fmt::Debug for TransparentView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransparentView")
            .field("key", &self.binding.key)
            .field("properties", &self.binding.container.len())
            .finish_non_exhaustive()
    }
}

/// Awaitable write path. Always commits straight into the container,
/// bypassing any delegate.
#[derive(Clone)]
pub struct ExplicitSetter {
    binding: Arc<Binding>,
    capability: Capability,
}

impl ExplicitSetter {
    /// Encrypt `value` and commit it under `property`.
    ///
    /// A read-only key fails with [`StoreError::UnsupportedOperation`] before
    /// any encryption is attempted.
    #[instrument(skip_all, fields(property = %property))]
    pub async fn set(&self, property: &str, value: impl Into<Value>) -> Result<(), StoreError> {
        if !self.capability.can_encrypt() {
            return Err(StoreError::UnsupportedOperation {
                property: property.to_string(),
            });
        }

        let encrypted = self.binding.encrypt(property, &value.into()).await?;
        self.binding
            .container
            .insert(property, Value::String(encrypted));
        debug!("committed explicit write");
        Ok(())
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }
}

impl std::fmt::Debug for ExplicitSetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplicitSetter")
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}
