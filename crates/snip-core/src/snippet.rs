use serde::{Deserialize, Serialize};

/// One stored snippet. On durable media `code` is always ciphertext under the
/// store's key; read operations return it decrypted, while mutating operations
/// return the record as stored (ciphertext).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snippet {
    /// Unique, monotonically assigned. Never reused after deletion.
    pub id: u64,
    pub language: String,
    pub code: String,
}

impl Snippet {
    /// Case-insensitive exact match on the language tag.
    pub fn matches_language(&self, language: &str) -> bool {
        self.language.to_lowercase() == language.to_lowercase()
    }
}

/// Partial update for a snippet; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnippetPatch {
    pub language: Option<String>,
    pub code: Option<String>,
}

/// Next id for a new snippet: `max(existing) + 1`, or 1 for an empty
/// collection. Deleting records never frees their ids.
pub fn next_id(snippets: &[Snippet]) -> u64 {
    snippets.iter().map(|s| s.id).max().unwrap_or(0) + 1
}
