use clap::{Parser, Subcommand};

/// CLI surface definition. One subcommand per store operation.
#[derive(Parser, Debug)]
#[command(
    name = "snip",
    about = "Encrypted-at-rest code snippet store",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to listing all snippets when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List snippets, optionally filtered by language (case-insensitive).
    List {
        language: Option<String>,
    },
    /// Print one snippet's decrypted code by id.
    Show {
        id: u64,
    },
    /// Store a new snippet.
    Add {
        language: String,
        code: String,
    },
    /// Edit a snippet's language and/or code.
    Edit {
        id: u64,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        code: Option<String>,
    },
    /// Remove every snippet for a language.
    Remove {
        language: String,
    },
    /// Run a health check against the encrypted store.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_list_when_missing_subcommand() {
        let cli = Cli::try_parse_from(["snip"]).expect("parse should succeed");
        assert_eq!(cli.command, None);
    }

    #[test]
    fn parses_list_with_language_filter() {
        let cli = Cli::try_parse_from(["snip", "list", "go"]).expect("parse should succeed");
        assert_eq!(
            cli.command,
            Some(Command::List {
                language: Some("go".into())
            })
        );
    }

    #[test]
    fn parses_add_with_language_and_code() {
        let cli = Cli::try_parse_from(["snip", "add", "go", "fmt.Println()"])
            .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Some(Command::Add {
                language: "go".into(),
                code: "fmt.Println()".into()
            })
        );
    }

    #[test]
    fn parses_edit_with_optional_fields() {
        let cli = Cli::try_parse_from(["snip", "edit", "3", "--code", "print()"])
            .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Some(Command::Edit {
                id: 3,
                language: None,
                code: Some("print()".into())
            })
        );
    }

    #[test]
    fn parses_config_init_subcommand() {
        let cli = Cli::try_parse_from(["snip", "config", "init"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Config(ConfigCommand::Init)));
    }
}
