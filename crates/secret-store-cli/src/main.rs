mod cli;
mod config;
mod storage;

use std::path::Path;

use crate::cli::{ConfigCommand, DocumentArgs};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use secret_store_core::{create_store, CryptoKey, KeyUsages};
use secret_store_storage::{encode_key, generate_key, save_store_file};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    dispatch(cli.command, config::load).await
}

/// Runs a command; `load_config` is only called by commands that read it.
async fn dispatch<F>(command: cli::Command, load_config: F) -> Result<()>
where
    F: FnOnce() -> Result<config::Config>,
{
    match command {
        cli::Command::Keygen => println!("{}", encode_key(&generate_key(KeyUsages::all()))),
        cli::Command::Version => print_version(),
        cli::Command::Get { property, document } => {
            run_get(&load_config()?, &property, document).await?
        }
        cli::Command::Set {
            property,
            value,
            document,
        } => run_set(&load_config()?, &property, value, document).await?,
        cli::Command::List { document } => run_list(&load_config()?, document).await?,
        cli::Command::Health => run_health_check(&load_config()?).await?,
        cli::Command::Config(ConfigCommand::Init) => init_config(&load_config()?)?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("secret-store {}", env!("CARGO_PKG_VERSION"));
}

async fn run_get(config: &config::Config, property: &str, document: DocumentArgs) -> Result<()> {
    let path = storage::document_path(config, document.file)?;
    let key = storage::resolve_key(config).await?;
    let (view, _) = storage::open_document(key, &path, false).await?;

    match view.get(property).await? {
        Some(value) => println!("{value}"),
        None => color_eyre::eyre::bail!("{property} is not set in {}", path.display()),
    }
    Ok(())
}

async fn run_set(
    config: &config::Config,
    property: &str,
    value: String,
    document: DocumentArgs,
) -> Result<()> {
    let path = storage::document_path(config, document.file)?;
    let key = storage::resolve_key(config).await?;
    set_in_document(key, &path, property, value).await?;
    info!(property, path = %path.display(), "value stored");
    Ok(())
}

async fn set_in_document(
    key: CryptoKey,
    path: &Path,
    property: &str,
    value: String,
) -> Result<()> {
    let (view, set) = storage::open_document(key, path, true).await?;
    set.set(property, value).await?;
    save_store_file(view.container(), path)?;
    Ok(())
}

async fn run_list(config: &config::Config, document: DocumentArgs) -> Result<()> {
    let path = storage::document_path(config, document.file)?;
    let key = storage::resolve_key(config).await?;
    let (view, _) = storage::open_document(key, &path, false).await?;
    for property in view.keys() {
        println!("{property}");
    }
    Ok(())
}

/// Encrypts and decrypts a sample value in memory with the configured key.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let key = storage::resolve_key(config).await?;
    run_store_health(key).await?;
    println!("Store: ok");
    Ok(())
}

async fn run_store_health(key: CryptoKey) -> Result<()> {
    let sample_key = "health/sample";
    let payload = "ok";
    let (view, set) = create_store(key, storage::cipher(), None, None)?;
    set.set(sample_key, payload).await?;
    let round_trip = view.get(sample_key).await?;

    if round_trip.as_deref() != Some(payload) {
        color_eyre::eyre::bail!("store round-trip failed");
    }
    if matches!(view.container().get(sample_key), Some(stored) if stored == payload) {
        return Err(eyre!("sample was stored as plaintext"));
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
