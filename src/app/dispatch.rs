use crate::assistant::Assistant;
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::feedback::LogSurface;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::watch::FileWatcher;

/// Delay that lets freshly spawned loops tick once before probing them.
const WARMUP: Duration = Duration::from_millis(200);

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Run {
            file,
            document,
            debounce_ms,
        } => {
            let document = document.unwrap_or_else(|| document_id_for(&file));
            run_watch(config, file, document, Duration::from_millis(debounce_ms)).await
        }
        Commands::Health => print_health(config).await,
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
            println!("{rendered}");
            Ok(())
        }
    }
}

fn document_id_for(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

async fn run_watch(
    config: Config,
    file: PathBuf,
    document: String,
    debounce: Duration,
) -> Result<()> {
    let assistant = Arc::new(Assistant::new(config, Arc::new(LogSurface::new()))?);
    assistant.start()?;

    let cancel = CancellationToken::new();
    let watcher = FileWatcher::new(file.clone(), document.clone(), debounce);
    let watch_task = {
        let assistant = Arc::clone(&assistant);
        let cancel = cancel.clone();
        tokio::spawn(async move { watcher.run(&assistant, cancel).await })
    };

    println!("◆ draftwise watching {} as '{document}'", file.display());
    println!("   Press Ctrl-C to stop");

    let outcome = wait_for_stop(tokio::signal::ctrl_c(), watch_task, &cancel).await;
    if let Err(e) = &outcome {
        tracing::error!("file watcher failed: {e:#}");
    }
    assistant.shutdown().await;

    let stats = assistant.controller().stats();
    println!(
        "◆ stopped: {} analyses, {} feedback delivered, {} archived",
        assistant.engine().stats().completed,
        stats.delivered,
        stats.archived
    );
    outcome
}

/// Wait for the stop signal or for the watcher to end on its own, whichever
/// comes first, and leave the watcher cancelled either way.
async fn wait_for_stop(
    stop: impl Future<Output = std::io::Result<()>>,
    mut watch_task: JoinHandle<Result<()>>,
    cancel: &CancellationToken,
) -> Result<()> {
    let joined = tokio::select! {
        signal = stop => {
            if let Err(e) = signal {
                tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            }
            cancel.cancel();
            watch_task.await
        }
        joined = &mut watch_task => {
            cancel.cancel();
            joined
        }
    };
    joined.context("file watcher task ended abnormally")?
}

async fn print_health(config: Config) -> Result<()> {
    let assistant = Assistant::new(config, Arc::new(LogSurface::new()))?;
    assistant.start()?;
    tokio::time::sleep(WARMUP).await;

    let snapshot = assistant.health().await;
    assistant.shutdown().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("Failed to render health snapshot")?
    );
    Ok(())
}
