//! Test doubles shared by the core unit tests.

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    cipher::{plaintext_str, require_usage, Cipher, CipherError},
    key::{CryptoKey, KeyAlgorithm, KeyUsage, KeyUsages},
};

const PREFIX: &str = "masked:";
const MASK_BYTE: u8 = 0xA5;

pub fn key_with(usages: impl IntoIterator<Item = KeyUsage>) -> CryptoKey {
    CryptoKey::new(
        "test",
        KeyAlgorithm::Aes256Gcm,
        usages.into_iter().collect::<KeyUsages>(),
        vec![1; 32],
    )
    .expect("test key material has the right length")
}

pub fn full_key() -> CryptoKey {
    key_with([KeyUsage::Encrypt, KeyUsage::Decrypt])
}

/// XOR-masking cipher. Not cryptographically secure; keeps plaintext out of
/// containers in tests without pulling in the AES stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaskCipher;

#[async_trait]
impl Cipher for MaskCipher {
    async fn encrypt(&self, key: &CryptoKey, plaintext: &Value) -> Result<String, CipherError> {
        require_usage(key, KeyUsage::Encrypt)?;
        let text = plaintext_str(plaintext)?;
        let hex: String = text
            .bytes()
            .map(|b| format!("{:02x}", b ^ MASK_BYTE))
            .collect();
        Ok(format!("{PREFIX}{hex}"))
    }

    async fn decrypt(&self, key: &CryptoKey, encoded: &str) -> Result<String, CipherError> {
        require_usage(key, KeyUsage::Decrypt)?;
        let hex = encoded
            .strip_prefix(PREFIX)
            .ok_or_else(|| CipherError::Malformed {
                reason: "missing mask prefix".to_string(),
            })?;
        if !hex.is_ascii() || hex.len() % 2 != 0 {
            return Err(CipherError::Malformed {
                reason: "not an even-length hex string".to_string(),
            });
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map(|b| b ^ MASK_BYTE))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|e| CipherError::Malformed {
                reason: e.to_string(),
            })?;
        String::from_utf8(bytes).map_err(|e| CipherError::Crypto {
            reason: e.to_string(),
        })
    }
}
