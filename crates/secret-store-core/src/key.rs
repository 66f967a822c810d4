use std::{collections::BTreeSet, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Operation a key is allowed to take part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUsage {
    Encrypt,
    Decrypt,
}

impl KeyUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyUsage::Encrypt => "encrypt",
            KeyUsage::Decrypt => "decrypt",
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable set of usages declared when a key is created or imported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyUsages(BTreeSet<KeyUsage>);

impl KeyUsages {
    /// Both `encrypt` and `decrypt`.
    pub fn all() -> Self {
        Self::from_iter([KeyUsage::Encrypt, KeyUsage::Decrypt])
    }

    pub fn contains(&self, usage: KeyUsage) -> bool {
        self.0.contains(&usage)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = KeyUsage> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<KeyUsage> for KeyUsages {
    fn from_iter<I: IntoIterator<Item = KeyUsage>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for KeyUsages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|u| u.as_str()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Symmetric algorithm a key was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

impl KeyAlgorithm {
    /// Required key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            KeyAlgorithm::Aes256Gcm => 32,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Aes256Gcm => f.write_str("AES-256-GCM"),
        }
    }
}

/// Opaque symmetric key handle.
///
/// Material is zeroized on drop and never printed; clones share the same
/// allocation.
#[derive(Clone)]
pub struct CryptoKey {
    id: String,
    algorithm: KeyAlgorithm,
    usages: KeyUsages,
    material: Arc<Zeroizing<Vec<u8>>>,
}

impl CryptoKey {
    /// Wrap raw key material. Returns `None` when the length does not match
    /// the algorithm.
    pub fn new(
        id: impl Into<String>,
        algorithm: KeyAlgorithm,
        usages: KeyUsages,
        material: Vec<u8>,
    ) -> Option<Self> {
        let material = Zeroizing::new(material);
        if material.len() != algorithm.key_len() {
            return None;
        }
        Some(Self {
            id: id.into(),
            algorithm,
            usages,
            material: Arc::new(material),
        })
    }

    /// AES-256-GCM key from a fixed-size array.
    pub fn aes256(id: impl Into<String>, usages: KeyUsages, bytes: [u8; 32]) -> Self {
        Self {
            id: id.into(),
            algorithm: KeyAlgorithm::Aes256Gcm,
            usages,
            material: Arc::new(Zeroizing::new(bytes.to_vec())),
        }
    }

    /// Identifier for logging (never log key bytes).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn usages(&self) -> &KeyUsages {
        &self.usages
    }

    /// Raw key bytes, for cipher implementations only.
    pub fn expose_material(&self) -> &[u8] {
        &self.material
    }
}

impl fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoKey")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("usages", &self.usages)
            .finish_non_exhaustive()
    }
}
