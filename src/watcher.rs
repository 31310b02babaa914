use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, WeaverError};
use crate::stages::FileChange;

/// Poll interval for backends that fall back to polling.
const POLL_INTERVAL: Duration = Duration::from_millis(300);

/// How long a path must stay quiet before it is read and emitted.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
}

impl VaultWatcher {
    /// Watch `vault_path` recursively and send a [`FileChange`] for every
    /// markdown note that was created or modified, once it has stopped
    /// changing. The background thread exits when `sender`'s receiver is
    /// dropped or the watcher itself is dropped.
    pub fn start(vault_path: &Path, sender: mpsc::Sender<FileChange>) -> Result<Self> {
        Self::start_with_debounce(vault_path, sender, DEFAULT_DEBOUNCE)
    }

    pub fn start_with_debounce(
        vault_path: &Path,
        sender: mpsc::Sender<FileChange>,
        debounce: Duration,
    ) -> Result<Self> {
        if !vault_path.is_dir() {
            return Err(WeaverError::NotFound(vault_path.to_path_buf()));
        }

        // Backends report canonical paths on some platforms
        let vault = vault_path
            .canonicalize()
            .map_err(|e| WeaverError::io(vault_path, e))?;
        let (tx, rx) = mpsc::channel();

        let mut watcher =
            RecommendedWatcher::new(tx, Config::default().with_poll_interval(POLL_INTERVAL))?;
        watcher.watch(vault.as_path(), RecursiveMode::Recursive)?;
        log::info!("Watching vault: {}", vault.display());

        thread::spawn(move || {
            let mut pending_paths: HashMap<PathBuf, Instant> = HashMap::new();
            let tick = debounce / 2;

            loop {
                match rx.recv_timeout(tick) {
                    Ok(Ok(event)) => {
                        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                            continue;
                        }
                        let now = Instant::now();
                        for path in &event.paths {
                            if should_process_path(path, &vault) {
                                pending_paths.insert(path.clone(), now);
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        log::warn!("File watcher error: {}", e);
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }

                let now = Instant::now();
                let stable: Vec<PathBuf> = pending_paths
                    .iter()
                    .filter(|(_, last_event)| now.duration_since(**last_event) >= debounce)
                    .map(|(path, _)| path.clone())
                    .collect();

                for path in stable {
                    pending_paths.remove(&path);
                    if !path.is_file() {
                        continue;
                    }
                    match FileChange::from_path(&path) {
                        Ok(change) => {
                            log::info!("Detected change: {}", path.display());
                            if sender.send(change).is_err() {
                                log::debug!("[Watcher] Receiver dropped, stopping");
                                return;
                            }
                        }
                        Err(e) => log::warn!("Failed to read {}: {}", path.display(), e),
                    }
                }
            }
        });

        Ok(VaultWatcher { _watcher: watcher })
    }
}

/// Markdown notes outside hidden directories. Backups and atomic-write
/// temp files do not end in `.md` and are ignored.
pub fn should_process_path(path: &Path, vault_path: &Path) -> bool {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if extension != "md" {
        return false;
    }

    let relative = path.strip_prefix(vault_path).unwrap_or(path);
    !relative.components().any(|component| match component {
        std::path::Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}
