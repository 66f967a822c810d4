use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secret_store_core::{
    cipher::{plaintext_str, require_usage},
    Cipher, CipherError, CryptoKey, KeyUsage,
};
use serde_json::Value;

const NONCE_LEN: usize = 12;

/// AES-256-GCM with a random 96-bit nonce per value.
///
/// Ciphertext at rest is standard base64 of `nonce || ciphertext || tag`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Cipher for AesGcmCipher {
    async fn encrypt(&self, key: &CryptoKey, plaintext: &Value) -> Result<String, CipherError> {
        require_usage(key, KeyUsage::Encrypt)?;
        let text = plaintext_str(plaintext)?;
        let cipher = build_cipher(key)?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, text.as_bytes())
            .map_err(|e| CipherError::Crypto {
                reason: format!("encrypt failed: {e}"),
            })?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    async fn decrypt(&self, key: &CryptoKey, encoded: &str) -> Result<String, CipherError> {
        require_usage(key, KeyUsage::Decrypt)?;
        let sealed = STANDARD
            .decode(encoded)
            .map_err(|e| CipherError::Malformed {
                reason: format!("base64 decode failed: {e}"),
            })?;
        if sealed.len() <= NONCE_LEN {
            return Err(CipherError::Malformed {
                reason: format!("expected more than {NONCE_LEN} bytes, got {}", sealed.len()),
            });
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let cipher = build_cipher(key)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CipherError::Crypto {
                reason: format!("decrypt failed: {e}"),
            })?;

        String::from_utf8(plaintext).map_err(|e| CipherError::Crypto {
            reason: format!("plaintext is not utf-8: {e}"),
        })
    }
}

fn build_cipher(key: &CryptoKey) -> Result<Aes256Gcm, CipherError> {
    Aes256Gcm::new_from_slice(key.expose_material()).map_err(|e| CipherError::Crypto {
        reason: format!("cipher init failed: {e}"),
    })
}
