use crate::assistant::Assistant;
use crate::events::ContentChange;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;

const DISARMED: Duration = Duration::from_secs(86_400);

/// Turns filesystem notifications for one file into edits.
///
/// The parent directory is watched rather than the file itself, so editors
/// that save by writing a temp file and renaming it over the original are
/// still seen, as is a file that does not exist yet. Bursts of events are
/// debounced and the file is read once the burst settles; an edit is only
/// produced when the content actually changed.
pub struct FileWatcher {
    path: PathBuf,
    document_id: String,
    debounce: Duration,
    last: Option<String>,
}

impl FileWatcher {
    pub fn new(path: PathBuf, document_id: String, debounce: Duration) -> Self {
        Self {
            path,
            document_id,
            debounce,
            last: None,
        }
    }

    fn watch_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn concerns(&self, event: &Event) -> bool {
        !matches!(event.kind, EventKind::Access(_))
            && event
                .paths
                .iter()
                .any(|path| path.file_name() == self.path.file_name())
    }

    /// Read the file and return an edit if its content differs from the
    /// last observed content. A missing file yields nothing.
    async fn read_change(&mut self) -> Result<Option<ContentChange>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        if self.last.as_deref() == Some(content.as_str()) {
            return Ok(None);
        }
        self.last = Some(content.clone());
        Ok(Some(ContentChange::new(self.document_id.clone(), content)))
    }

    /// Emit the current content, then one edit per settled burst of
    /// modifications, until cancelled or the receiver goes away.
    pub async fn watch(
        mut self,
        edits: mpsc::Sender<ContentChange>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |event: notify::Result<Event>| {
                let _ = raw_tx.send(event);
            })
            .context("Failed to create file watcher")?;
        let dir = self.watch_dir().to_path_buf();
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        tracing::info!(path = %self.path.display(), document_id = %self.document_id, "watching file");

        if let Some(change) = self.read_change().await?
            && edits.send(change).await.is_err()
        {
            return Ok(());
        }

        let mut settle_deadline: Option<Instant> = None;
        loop {
            let settle_at = settle_deadline.unwrap_or_else(|| Instant::now() + DISARMED);
            tokio::select! {
                () = cancel.cancelled() => break,
                event = raw_rx.recv() => match event {
                    Some(Ok(event)) => {
                        if self.concerns(&event) {
                            tracing::trace!(kind = ?event.kind, "file event");
                            settle_deadline = Some(Instant::now() + self.debounce);
                        }
                    }
                    Some(Err(e)) => tracing::warn!(error = %e, "file watcher reported an error"),
                    None => anyhow::bail!("file watcher stopped delivering events"),
                },
                () = time::sleep_until(settle_at), if settle_deadline.is_some() => {
                    settle_deadline = None;
                    if let Some(change) = self.read_change().await? {
                        tracing::debug!(chars = change.content.chars().count(), "file changed");
                        if edits.send(change).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Forward every observed change into the assistant until cancelled.
    pub async fn run(self, assistant: &Assistant, cancel: CancellationToken) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(16);
        let watch = self.watch(tx, cancel);
        tokio::pin!(watch);
        loop {
            tokio::select! {
                result = &mut watch => return result,
                Some(change) = rx.recv() => assistant.submit_edit(change).await?,
            }
        }
    }
}
