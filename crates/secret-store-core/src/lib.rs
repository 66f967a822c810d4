//! Core abstractions for secret-store: key capabilities, the cipher contract,
//! and the transparent encrypting view over a key-value container.
//! Concrete ciphers and file loading live in `secret-store-storage`.

pub mod capability;
pub mod cipher;
pub mod container;
pub mod error;
pub mod key;
pub mod store;

pub use capability::Capability;
pub use cipher::{Cipher, CipherError};
pub use container::{Container, Delegate, DirectAccess};
pub use error::StoreError;
pub use key::{CryptoKey, KeyAlgorithm, KeyUsage, KeyUsages};
pub use store::{create_store, ExplicitSetter, PendingWrite, TransparentView};

#[cfg(test)]
pub(crate) mod test_support;
