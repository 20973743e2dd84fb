use color_eyre::Result;
use snip_core::{Snippet, SnippetPatch, SnippetStore, StoreError};

use crate::{config, storage};

/// List snippets, optionally filtered by language.
pub async fn list(config: &config::Config, language: Option<String>) -> Result<()> {
    let store = storage::store_from_config(config).await?;
    let snippets = match language {
        Some(language) => store.list_by_language(&language).await,
        None => store.list_all().await,
    }
    .map_err(into_eyre)?;

    if snippets.is_empty() {
        println!("No snippets yet. Add one with `snip add <language> <code>`.");
        return Ok(());
    }
    for snippet in snippets {
        print_snippet(&snippet);
    }
    Ok(())
}

/// Print one snippet's decrypted code, suitable for piping.
pub async fn show(config: &config::Config, id: u64) -> Result<()> {
    let store = storage::store_from_config(config).await?;
    let snippet = store.get_by_id(id).await.map_err(into_eyre)?;
    println!("{}", snippet.code);
    Ok(())
}

pub async fn add(config: &config::Config, language: String, code: String) -> Result<()> {
    let store = storage::store_from_config(config).await?;
    let created = store.create(language, code).await.map_err(into_eyre)?;
    println!("Created snippet {} [{}]", created.id, created.language);
    Ok(())
}

pub async fn edit(
    config: &config::Config,
    id: u64,
    language: Option<String>,
    code: Option<String>,
) -> Result<()> {
    let store = storage::store_from_config(config).await?;
    let patch = SnippetPatch { language, code };
    let updated = store.update(id, patch).await.map_err(into_eyre)?;
    println!("Updated snippet {} [{}]", updated.id, updated.language);
    Ok(())
}

pub async fn remove(config: &config::Config, language: String) -> Result<()> {
    let store = storage::store_from_config(config).await?;
    let removed = store
        .delete_by_language(&language)
        .await
        .map_err(into_eyre)?;
    println!("Removed {} snippet(s) for {language}", removed.len());
    Ok(())
}

fn print_snippet(snippet: &Snippet) {
    println!("#{} [{}]", snippet.id, snippet.language);
    for line in snippet.code.lines() {
        println!("    {line}");
    }
}

fn into_eyre(err: StoreError) -> color_eyre::Report {
    color_eyre::eyre::eyre!(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_list_round_trips_through_real_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path()).await;

        let created = store
            .create("go".into(), "fmt.Println()".into())
            .await
            .expect("create");
        assert_eq!(created.id, 1);

        let listed = store.list_all().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].code, "fmt.Println()");
    }

    #[tokio::test]
    async fn remove_reports_not_found_for_absent_language() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path()).await;

        let err = store
            .delete_by_language("go")
            .await
            .expect_err("nothing stored");
        assert_eq!(
            err,
            StoreError::NoSuchLanguage {
                language: "go".into()
            }
        );
    }
}
