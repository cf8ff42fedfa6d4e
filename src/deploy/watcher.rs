//! Polling watcher over the monitored deploy directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watches the deploy directory and signals every change.
pub struct DeployWatcher {
    dir: PathBuf,
    poll_interval: Duration,
    change_tx: mpsc::UnboundedSender<()>,
}

impl DeployWatcher {
    /// Returns the watcher and a receiver that yields once per change event.
    pub fn new(dir: &Path, poll_interval: Duration) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        (
            Self {
                dir: dir.to_path_buf(),
                poll_interval,
                change_tx,
            },
            change_rx,
        )
    }

    /// Start polling on notify's background thread.
    ///
    /// Returns `None` when the directory does not exist; nothing is watched
    /// and the receiver never yields.
    pub fn run(self) -> Result<Option<PollWatcher>, notify::Error> {
        if !self.dir.is_dir() {
            tracing::debug!(dir = %self.dir.display(), "Deploy directory missing, not watching");
            return Ok(None);
        }

        let tx = self.change_tx.clone();
        let mut watcher = PollWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove() {
                        tracing::debug!(paths = ?event.paths, "Deploy directory changed");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Deploy watch error: {:?}", e),
            },
            Config::default().with_poll_interval(self.poll_interval),
        )?;

        watcher.watch(&self.dir, RecursiveMode::Recursive)?;

        tracing::info!(
            dir = %self.dir.display(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "Deploy watcher started"
        );
        Ok(Some(watcher))
    }
}
