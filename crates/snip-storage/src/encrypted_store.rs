use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use snip_core::{next_id, Snippet, SnippetPatch, SnippetStore, StoreError};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use crate::field_cipher::FieldCipher;
use crate::key_provider::KeyProvider;

/// File-backed snippet store implementing the shared `SnippetStore` contract.
///
/// The collection lives in memory, mirrors the last successful flush, and is
/// rewritten to the data file wholesale after every mutation; a mutation only
/// returns success once the rewrite lands. `code` is held as cipher tokens
/// both in memory and on disk, so reads decrypt per record.
pub struct EncryptedSnippetStore {
    path: PathBuf,
    cipher: FieldCipher,
    records: Mutex<Vec<Snippet>>,
}

impl EncryptedSnippetStore {
    /// Load the key via the provider and the collection from the data file.
    ///
    /// A missing or unreadable data file is logged and yields an empty
    /// collection rather than an error; the first flush recreates it.
    pub async fn open<K: KeyProvider>(
        path: impl Into<PathBuf>,
        keys: &K,
        max_token_age_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let material = keys
            .get_or_create()
            .await
            .map_err(|err| StoreError::Storage {
                reason: format!("key provider: {err}"),
            })?;

        let mut cipher = FieldCipher::new(&material).map_err(crypto_err)?;
        if let Some(secs) = max_token_age_secs {
            cipher = cipher.with_max_token_age(secs);
        }

        let records = load_records(&path);
        Ok(Self {
            path,
            cipher,
            records: Mutex::new(records),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Snippet>>, StoreError> {
        self.records.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }

    /// Rewrite the whole collection to the data file, staged through a
    /// same-directory temp file.
    fn flush(&self, records: &[Snippet]) -> Result<(), StoreError> {
        let parent = self.path.parent().ok_or_else(|| StoreError::Storage {
            reason: "invalid storage path".to_string(),
        })?;
        fs::create_dir_all(parent).map_err(storage_err)?;

        let json = serde_json::to_vec_pretty(records).map_err(storage_err)?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
        tmp.write_all(&json).map_err(storage_err)?;
        tmp.flush().map_err(storage_err)?;
        tmp.persist(&self.path).map_err(|e| storage_err(e.error))?;
        Ok(())
    }

    fn decrypt_record(&self, record: &Snippet) -> Result<Snippet, StoreError> {
        let code = self.cipher.decrypt(&record.code).map_err(|err| {
            warn!(id = record.id, error = %err, "failed to decrypt snippet");
            crypto_err(err)
        })?;
        Ok(Snippet {
            id: record.id,
            language: record.language.clone(),
            code,
        })
    }
}

#[async_trait]
impl SnippetStore for EncryptedSnippetStore {
    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Snippet>, StoreError> {
        let records = self.lock()?;
        // One undecryptable record fails the whole listing; no partials.
        records.iter().map(|r| self.decrypt_record(r)).collect()
    }

    #[instrument(skip(self))]
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
        matches
            .into_iter()
            .map(|r| self.decrypt_record(r))
            .collect()
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: u64) -> Result<Snippet, StoreError> {
        let records = self.lock()?;
        let found = records
            .iter()
            .find(|s| s.id == id)
            .ok_or(StoreError::NoSuchId { id })?;
        self.decrypt_record(found)
    }

    #[instrument(skip(self, code))]
    async fn create(&self, language: String, code: String) -> Result<Snippet, StoreError> {
        let token = self.cipher.encrypt(&code).map_err(crypto_err)?;
        let mut records = self.lock()?;
        let record = Snippet {
            id: next_id(&records),
            language,
            code: token,
        };
        records.push(record.clone());
        self.flush(&records)?;
        Ok(record)
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: u64, patch: SnippetPatch) -> Result<Snippet, StoreError> {
        let token = match &patch.code {
            Some(code) => Some(self.cipher.encrypt(code).map_err(crypto_err)?),
            None => None,
        };

        let mut records = self.lock()?;
        let record = records
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NoSuchId { id })?;
        if let Some(language) = patch.language {
            record.language = language;
        }
        if let Some(token) = token {
            record.code = token;
        }
        let updated = record.clone();
        self.flush(&records)?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_by_language(&self, language: &str) -> Result<Vec<Snippet>, StoreError> {
        let mut records = self.lock()?;
        let removed: Vec<Snippet> = records
            .iter()
            .filter(|s| s.matches_language(language))
            .cloned()
            .collect();
        if removed.is_empty() {
            return Err(StoreError::NoSuchLanguage {
                language: language.to_string(),
            });
        }
        records.retain(|s| !s.matches_language(language));
        self.flush(&records)?;
        Ok(removed)
    }
}

fn load_records(path: &Path) -> Vec<Snippet> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no data file yet, starting empty");
            return Vec::new();
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read data file, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(records) => records,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "malformed data file, starting empty");
            Vec::new()
        }
    }
}

fn crypto_err<E: ToString>(err: E) -> StoreError {
    StoreError::Crypto {
        reason: err.to_string(),
    }
}

fn storage_err<E: ToString>(err: E) -> StoreError {
    StoreError::Storage {
        reason: err.to_string(),
    }
}
