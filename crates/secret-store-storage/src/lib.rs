//! Concrete pieces around the transparent store: AES-GCM encryption, key
//! material handling (OS keyring or test doubles), and JSON document files.

pub mod cipher;
pub mod document;
pub mod key_provider;

pub use cipher::AesGcmCipher;
pub use document::{open_store_file, save_store_file, DocumentError, OpenOptions};
pub use key_provider::{
    decode_key, encode_key, generate_key, InMemoryKeyProvider, KeyError, KeyProvider,
    KeyringProvider,
};
