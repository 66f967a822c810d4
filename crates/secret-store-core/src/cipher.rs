use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::key::{CryptoKey, KeyUsage};

/// Errors reported by a cipher implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Key does not declare the usage the operation needs.
    #[error("key does not permit {usage}")]
    UsageNotPermitted { usage: KeyUsage },
    /// Only text values can be encrypted.
    #[error("cannot encrypt a {kind} value")]
    UnsupportedValue { kind: &'static str },
    /// Ciphertext is not in the expected encoding.
    #[error("malformed ciphertext: {reason}")]
    Malformed { reason: String },
    /// Primitive failure (authentication, key setup).
    #[error("crypto failure: {reason}")]
    Crypto { reason: String },
}

/// Authenticated symmetric encryption producing text-encoded ciphertext.
#[async_trait]
pub trait Cipher: Send + Sync {
    /// Encrypt a text value, returning encoded ciphertext.
    async fn encrypt(&self, key: &CryptoKey, plaintext: &Value) -> Result<String, CipherError>;

    /// Decrypt encoded ciphertext back into text.
    async fn decrypt(&self, key: &CryptoKey, encoded: &str) -> Result<String, CipherError>;
}

/// Shared usage check for implementations.
pub fn require_usage(key: &CryptoKey, usage: KeyUsage) -> Result<(), CipherError> {
    if key.usages().contains(usage) {
        Ok(())
    } else {
        Err(CipherError::UsageNotPermitted { usage })
    }
}

/// Borrow the text of a value, rejecting everything that is not a string.
pub fn plaintext_str(value: &Value) -> Result<&str, CipherError> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(CipherError::UnsupportedValue {
            kind: value_kind(other),
        }),
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
