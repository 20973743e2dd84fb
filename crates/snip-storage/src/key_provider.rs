use std::{
    fs, io,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tracing::info;

/// 256-bit keys throughout.
pub const KEY_LEN: usize = 32;

/// Key material used for encryption at rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Symmetric key bytes. Never log these.
    pub bytes: [u8; KEY_LEN],
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key file io: {0}")]
    Io(#[from] io::Error),
    #[error("key file is {found} bytes, expected {expected}")]
    WrongLength { found: usize, expected: usize },
    #[error("generation error: {0}")]
    Generation(String),
}

/// Provides the store's symmetric key (key file in production; memory in tests).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError>;
}

/// Load-or-create provider backed by a raw-bytes key file.
///
/// First call with no file present generates a key and persists it; every
/// later call reads the same bytes back. There is no locking: two processes
/// racing the first start can each write a key, last writer wins. Once a key
/// is established for a data file it must never change without re-encrypting
/// every record; no rotation mechanism exists.
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl KeyProvider for FileKeyProvider {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                if bytes.len() != KEY_LEN {
                    // A truncated key file is unrecoverable; regenerating
                    // would orphan every existing ciphertext.
                    return Err(KeyError::WrongLength {
                        found: bytes.len(),
                        expected: KEY_LEN,
                    });
                }
                let mut out = [0u8; KEY_LEN];
                out.copy_from_slice(&bytes);
                Ok(KeyMaterial { bytes: out })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let material = generate_key();
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&self.path, material.bytes)?;
                info!(path = %self.path.display(), "generated new store key");
                Ok(material)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<KeyMaterial>>>,
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let material = generate_key();
        *guard = Some(material.clone());
        Ok(material)
    }
}

fn generate_key() -> KeyMaterial {
    let mut bytes = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut bytes);
    KeyMaterial { bytes }
}
