use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

use crate::snippet::{next_id, Snippet, SnippetPatch};

/// Errors produced by snippet store implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No snippet carries the requested id.
    #[error("no snippet with id {id}")]
    NoSuchId { id: u64 },
    /// No snippet matches the requested language.
    #[error("no snippets for language: {language}")]
    NoSuchLanguage { language: String },
    /// Encrypt or decrypt failure. Terminal for the triggering request.
    #[error("crypto failure: {reason}")]
    Crypto { reason: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

/// CRUD contract over an encrypted-at-rest snippet collection.
///
/// Read operations return `code` decrypted. Mutating operations must reach
/// durable storage before returning success, and return the record as stored
/// (ciphertext `code`).
#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Every record with `code` decrypted. One undecryptable record fails the
    /// whole call; there are no partial results.
    async fn list_all(&self) -> Result<Vec<Snippet>, StoreError>;

    /// Records whose language matches case-insensitively, `code` decrypted.
    /// Zero matches is `NoSuchLanguage`.
    async fn list_by_language(&self, language: &str) -> Result<Vec<Snippet>, StoreError>;

    /// The record with the given id, `code` decrypted.
    async fn get_by_id(&self, id: u64) -> Result<Snippet, StoreError>;

    /// Assign the next id, encrypt `code`, append, flush.
    async fn create(&self, language: String, code: String) -> Result<Snippet, StoreError>;

    /// Apply a partial update, re-encrypting `code` when replaced, then flush.
    async fn update(&self, id: u64, patch: SnippetPatch) -> Result<Snippet, StoreError>;

    /// Remove every record matching the language (bulk, not id-scoped), flush,
    /// and return the removed set. Zero matches is `NoSuchLanguage`.
    async fn delete_by_language(&self, language: &str) -> Result<Vec<Snippet>, StoreError>;
}

/// In-memory store that simulates encryption for tests and smoke runs.
/// This is not cryptographically secure; production implementations must
/// apply real authenticated encryption to the `code` field.
#[derive(Debug, Default, Clone)]
pub struct InMemorySnippetStore {
    inner: Arc<Mutex<Vec<Snippet>>>,
}

impl InMemorySnippetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Snippet>>, StoreError> {
        self.inner.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

#[async_trait]
impl SnippetStore for InMemorySnippetStore {
    async fn list_all(&self) -> Result<Vec<Snippet>, StoreError> {
        let records = self.lock()?;
        records.iter().map(unmask_record).collect()
    }

    async fn list_by_language(&self, language: &str) -> Result<Vec<Snippet>, StoreError> {
        let records = self.lock()?;
        let matches: Vec<&Snippet> = records
            .iter()
            .filter(|s| s.matches_language(language))
            .collect();
        if matches.is_empty() {
            return Err(StoreError::NoSuchLanguage {
                language: language.to_string(),
            });
        }
        matches.into_iter().map(unmask_record).collect()
    }

    async fn get_by_id(&self, id: u64) -> Result<Snippet, StoreError> {
        let records = self.lock()?;
        let found = records
            .iter()
            .find(|s| s.id == id)
            .ok_or(StoreError::NoSuchId { id })?;
        unmask_record(found)
    }

    async fn create(&self, language: String, code: String) -> Result<Snippet, StoreError> {
        let mut records = self.lock()?;
        let record = Snippet {
            id: next_id(&records),
            language,
            code: mask(&code),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: u64, patch: SnippetPatch) -> Result<Snippet, StoreError> {
        let mut records = self.lock()?;
        let record = records
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NoSuchId { id })?;
        if let Some(language) = patch.language {
            record.language = language;
        }
        if let Some(code) = patch.code {
            record.code = mask(&code);
        }
        Ok(record.clone())
    }

    async fn delete_by_language(&self, language: &str) -> Result<Vec<Snippet>, StoreError> {
        let mut records = self.lock()?;
        let (removed, kept): (Vec<Snippet>, Vec<Snippet>) = records
            .drain(..)
            .partition(|s| s.matches_language(language));
        *records = kept;
        if removed.is_empty() {
            return Err(StoreError::NoSuchLanguage {
                language: language.to_string(),
            });
        }
        Ok(removed)
    }
}

const MASK_BYTE: u8 = 0xA5;

// XOR plus base64 stands in for the real field cipher so tests can observe
// the ciphertext-on-create asymmetry without key material.
fn mask(code: &str) -> String {
    let masked: Vec<u8> = code.bytes().map(|b| b ^ MASK_BYTE).collect();
    URL_SAFE_NO_PAD.encode(masked)
}

fn unmask(code: &str) -> Result<String, StoreError> {
    let masked = URL_SAFE_NO_PAD
        .decode(code)
        .map_err(|err| StoreError::Crypto {
            reason: format!("decode failed: {err}"),
        })?;
    let bytes: Vec<u8> = masked.iter().map(|b| b ^ MASK_BYTE).collect();
    String::from_utf8(bytes).map_err(|err| StoreError::Crypto {
        reason: format!("invalid utf-8: {err}"),
    })
}

fn unmask_record(record: &Snippet) -> Result<Snippet, StoreError> {
    Ok(Snippet {
        id: record.id,
        language: record.language.clone(),
        code: unmask(&record.code)?,
    })
}
