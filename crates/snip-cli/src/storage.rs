use std::path::PathBuf;

use color_eyre::Result;
use dirs::data_dir;
use snip_storage::{EncryptedSnippetStore, FileKeyProvider};
use tracing::debug;

use crate::config::Config;

const DATA_FILE: &str = "snippets.json";
const KEY_FILE: &str = "store.key";

/// Resolve the default data directory for snip.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("snip"))
}

/// Open the encrypted store using config overrides where present.
pub async fn store_from_config(config: &Config) -> Result<EncryptedSnippetStore> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    let key_path = config
        .key_file
        .clone()
        .unwrap_or_else(|| root.join(KEY_FILE));
    debug!(?root, ?key_path, "opening encrypted store");

    let keys = FileKeyProvider::new(key_path);
    let store = EncryptedSnippetStore::open(root.join(DATA_FILE), &keys, config.max_token_age_secs)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    Ok(store)
}

/// Helper for tests to open a store rooted at a temp dir with an in-memory key.
#[cfg(test)]
pub async fn test_store(root: &std::path::Path) -> EncryptedSnippetStore {
    let keys = snip_storage::InMemoryKeyProvider::default();
    EncryptedSnippetStore::open(root.join(DATA_FILE), &keys, None)
        .await
        .expect("open test store")
}
