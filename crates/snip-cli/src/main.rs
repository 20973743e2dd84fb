mod cli;
mod config;
mod snippets;
mod storage;

use clap::Parser;
use color_eyre::Result;
use snip_core::SnippetStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::ConfigCommand;

/// Entry point wiring the CLI to the encrypted snippet store.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command.unwrap_or(cli::Command::List { language: None }) {
        cli::Command::List { language } => snippets::list(&config, language).await?,
        cli::Command::Show { id } => snippets::show(&config, id).await?,
        cli::Command::Add { language, code } => snippets::add(&config, language, code).await?,
        cli::Command::Edit {
            id,
            language,
            code,
        } => snippets::edit(&config, id, language, code).await?,
        cli::Command::Remove { language } => snippets::remove(&config, language).await?,
        cli::Command::Health => run_health_check(&config).await?,
        cli::Command::Version => print_version(),
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("snip {}", env!("CARGO_PKG_VERSION"));
}

/// Runs a quick round-trip through the encrypted store.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let store = storage::store_from_config(config).await?;
    run_store_health(&store).await?;
    println!("Storage: ok");
    Ok(())
}

async fn run_store_health<S: SnippetStore>(store: &S) -> Result<()> {
    const PROBE_LANGUAGE: &str = "snip-health-probe";
    const PROBE_CODE: &str = "ok";

    let created = store
        .create(PROBE_LANGUAGE.into(), PROBE_CODE.into())
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    let fetched = store
        .get_by_id(created.id)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    store
        .delete_by_language(PROBE_LANGUAGE)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;

    if fetched.code != PROBE_CODE {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;

    #[tokio::test]
    async fn health_check_with_test_store_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path()).await;
        run_store_health(&store)
            .await
            .expect("health check should succeed");
    }

    #[tokio::test]
    async fn health_check_leaves_no_probe_records_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path()).await;
        run_store_health(&store).await.expect("health check");

        let listed = store.list_all().await.expect("list");
        assert!(listed.is_empty());
    }
}
