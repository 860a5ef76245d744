//! Convoke - conversation orchestration CLI
//!
#![doc = "Convoke - conversation orchestration CLI"]
#![doc = "Main entry point for the Convoke application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use convoke::chat;
use convoke::cli::{Cli, Commands};
use convoke::config::Config;
use convoke::engine::Engine;
use convoke::export::ExportFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    if let Some(path) = &cli.storage_path {
        tracing::info!(path = %path.display(), "using storage override from CLI");
        config.storage.path = Some(path.clone());
    }
    config.validate()?;

    match cli.command.unwrap_or(Commands::Chat { resume: None }) {
        Commands::Chat { resume } => {
            tracing::info!("starting interactive chat");
            let engine = Engine::init(&config).await?;
            chat::run_chat(engine, resume).await?;
            Ok(())
        }
        Commands::List => {
            let engine = Engine::init(&config).await?;
            for summary in engine.store.list_conversations().await {
                let marker = if summary.active { "*" } else { " " };
                println!(
                    "{} {}  {:>3} msgs  {}  {}",
                    marker,
                    summary.id,
                    summary.message_count,
                    summary.updated_at.format("%Y-%m-%d %H:%M"),
                    summary.title
                );
            }
            Ok(())
        }
        Commands::Export { id, format, output } => {
            let format: ExportFormat = format.parse().map_err(anyhow::Error::msg)?;
            let engine = Engine::init(&config).await?;
            let id = match id {
                Some(id) => id,
                None => engine.store.active_id().await,
            };
            let rendered = engine.store.export_conversation(&id, format).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    tracing::info!(path = %path.display(), "exported conversation");
                }
                None => println!("{}", rendered),
            }
            Ok(())
        }
        Commands::Delete { id } => {
            let engine = Engine::init(&config).await?;
            if engine.store.delete_conversation(&id).await? {
                println!("Deleted {}", id);
            } else {
                anyhow::bail!("no conversation {}", id);
            }
            Ok(())
        }
        Commands::Rename { id, title } => {
            let engine = Engine::init(&config).await?;
            if engine.store.rename_conversation(&id, title).await? {
                println!("Renamed {}", id);
            } else {
                anyhow::bail!("no conversation {}", id);
            }
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default = if verbose { "convoke=debug" } else { "convoke=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
