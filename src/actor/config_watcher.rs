//! Debounced config file watching.
//!
//! Edits to the config file are debounced and delivered to the core as
//! `ConfigUpdated` events. The settings UI applies its changes in
//! process and then writes the file; it calls [`ReloadSuppressor::arm`]
//! first so exactly one of (file-watch reload, in-process apply) runs
//! per change.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::{fs, thread};

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use tracing::{debug, info, warn};

use crate::actor::reactor::Event;
use crate::actor::Sender;
use crate::common::config::Config;

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Shared flag that swallows the next file-watch reload.
#[derive(Clone, Default)]
pub struct ReloadSuppressor {
    armed: Arc<AtomicBool>,
}

impl ReloadSuppressor {
    pub fn new() -> Self { Self::default() }

    /// Arm before programmatically writing the config file.
    pub fn arm(&self) { self.armed.store(true, Ordering::SeqCst); }

    fn consume(&self) -> bool { self.armed.swap(false, Ordering::SeqCst) }
}

pub struct ConfigWatcher;

impl ConfigWatcher {
    pub fn spawn(events_tx: Sender<Event>, config_path: PathBuf, suppressor: ReloadSuppressor) {
        thread::Builder::new()
            .name("config-watcher".to_string())
            .spawn(move || {
                if let Err(e) = Self::run(events_tx, config_path, suppressor) {
                    warn!("config-watcher: error: {e:?}");
                }
            })
            .expect("failed to spawn config-watcher thread");
    }

    fn run(
        events_tx: Sender<Event>,
        config_path: PathBuf,
        suppressor: ReloadSuppressor,
    ) -> notify::Result<()> {
        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer = new_debouncer(DEBOUNCE, move |res: DebounceEventResult| {
            if let Ok(events) = res {
                for event in events {
                    if event.kind == DebouncedEventKind::Any {
                        let _ = tx.send(event);
                    }
                }
            }
        })?;

        let watch_dir = config_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        debouncer.watcher().watch(&watch_dir, RecursiveMode::NonRecursive)?;
        info!("watching {:?}", watch_dir);

        while let Ok(event) = rx.recv() {
            let relevant = event.path == config_path
                || event.path.file_name().is_some_and(|n| Some(n) == config_path.file_name());
            if !relevant {
                continue;
            }
            if suppressor.consume() {
                debug!("config change applied in-process, skipping file reload");
                continue;
            }
            match fs::read_to_string(&config_path) {
                Ok(text) => {
                    info!("config file changed, reloading");
                    events_tx.send(Event::ConfigUpdated(Config::parse(&text)));
                }
                Err(e) => warn!(%e, "config file changed but could not be read"),
            }
        }

        Ok(())
    }
}
