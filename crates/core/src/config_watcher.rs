use crate::config::MonitorConfig;
use crate::config_loader::ConfigLoader;
use anyhow::Result;
use notify::{Event, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

pub struct ConfigWatcher {
    tx: watch::Sender<MonitorConfig>,
}

impl ConfigWatcher {
    /// Creates a new configuration watcher with an initial configuration.
    ///
    /// Returns a tuple of the watcher and a receiver for configuration updates.
    #[must_use]
    pub fn new(initial_config: MonitorConfig) -> (Self, watch::Receiver<MonitorConfig>) {
        let (tx, rx) = watch::channel(initial_config);
        (Self { tx }, rx)
    }

    /// Watches the configuration file and publishes a fresh snapshot on every modification.
    ///
    /// Reloads never fail; malformed settings fall back to defaults inside the loader.
    ///
    /// # Errors
    ///
    /// Returns an error if file watching cannot be initiated or if the watcher task fails.
    pub async fn watch(&self, config_path: impl AsRef<Path>) -> Result<()> {
        let tx = self.tx.clone();
        let config_path: PathBuf = config_path.as_ref().to_path_buf();

        tokio::task::spawn_blocking(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            })?;

            watcher.watch(&config_path, RecursiveMode::NonRecursive)?;

            for event in notify_rx {
                if event.kind.is_modify() {
                    tracing::info!(path = %config_path.display(), "Config file changed, reloading");
                    let new_config = ConfigLoader::load_from(&config_path);
                    let changed = tx.send_if_modified(|current| {
                        if *current == new_config {
                            false
                        } else {
                            *current = new_config;
                            true
                        }
                    });
                    if changed {
                        tracing::info!("Config reloaded");
                    }
                }
            }

            Ok::<_, anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}
