use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "secret-store",
    about = "Field-level encrypted key-value documents",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print a freshly generated base64 key and exit.
    Keygen,
    /// Decrypt and print one property.
    Get {
        property: String,
        #[command(flatten)]
        document: DocumentArgs,
    },
    /// Encrypt a value and save it into the document.
    Set {
        property: String,
        value: String,
        #[command(flatten)]
        document: DocumentArgs,
    },
    /// List property names without decrypting them.
    List {
        #[command(flatten)]
        document: DocumentArgs,
    },
    /// Run an encrypt/decrypt round trip with the configured key.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentArgs {
    /// Document path; overrides the configured default.
    #[arg(long, short)]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
