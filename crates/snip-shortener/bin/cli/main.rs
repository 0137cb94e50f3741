mod cli;

use crate::cli::{Command, LogFormat, CLI};
use anyhow::{bail, Context};
use clap::Parser;
use snip_shortener::{
    BatchItem, DeletionOutcome, RandomGenerator, Shortener, ShortenerService,
};
use snip_storage::{Repository, Storage};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::try_parse()?;
    init_tracing(&config)?;

    let storage = Storage::open(&config.storage_config())
        .await
        .context("failed to open storage")?;

    info!(
        backend = %storage.kind(),
        base_url = %config.base_url,
        log_format = %config.log_format,
        "snip started"
    );

    let service = ShortenerService::new(storage.clone(), RandomGenerator::new(), config.base_url);
    let result = run(&service, config.command).await;

    if let Err(err) = storage.close().await {
        warn!(error = %err, "failed to close storage");
    }

    result
}

fn init_tracing(config: &CLI) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    Ok(())
}

async fn run<S: Shortener>(service: &S, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Shorten { url, owner } => {
            let shortened = service.shorten(&url, &owner).await?;
            if !shortened.created {
                info!(id = %shortened.id, "url was already shortened");
            }
            println!("{}", shortened.short_url);
        }
        Command::Batch { urls, owner } => {
            let items = urls
                .into_iter()
                .enumerate()
                .map(|(index, target)| BatchItem {
                    correlation_id: index.to_string(),
                    target,
                })
                .collect();

            for item in service.shorten_batch(items, &owner).await? {
                println!("{}\t{}", item.correlation_id, item.short_url);
            }
        }
        Command::Expand { id } => {
            println!("{}", service.expand(&id).await?);
        }
        Command::List { owner } => {
            for url in service.user_urls(&owner).await? {
                println!("{}\t{}", url.short_url, url.original_url);
            }
        }
        Command::Delete { owner, ids } => {
            // the process exits right after, so the batch delete is awaited here
            match service.delete_urls(&owner, ids).await.wait().await {
                DeletionOutcome::Deleted(ids) => {
                    for id in ids {
                        println!("{id}");
                    }
                }
                DeletionOutcome::Nothing => info!(owner = %owner, "nothing to delete"),
                DeletionOutcome::Cancelled => bail!("deletion was cancelled"),
                DeletionOutcome::Failed { error, .. } => {
                    return Err(error).context("batch delete failed");
                }
            }
        }
        Command::Ping { timeout_ms } => {
            service
                .ping(Duration::from_millis(timeout_ms))
                .await
                .context("storage is not reachable")?;
            println!("ok");
        }
    }

    Ok(())
}
