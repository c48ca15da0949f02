use std::process;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::Parser;
use tatami::actor;
use tatami::actor::config_watcher::{ConfigWatcher, ReloadSuppressor};
use tatami::actor::interceptor::Interceptor;
use tatami::actor::reactor::{Action, Event, Reactor};
use tatami::common::config::{config_file, restore_file, Config, MAX_WORKSPACE, MIN_WORKSPACE};
use tatami::common::log;
use tatami::model::restore::RestoreSnapshot;
use tatami::sys::bridge::{CompositorBridge, RecordingBridge};
use tatami::sys::geometry::Rect;
use tatami::sys::process::StaticProcessTable;
use tatami::sys::screen::{Monitor, MonitorId};
use tracing::info;

#[derive(Parser)]
#[command(name = "tatami", about = "A tiling window manager with virtual workspaces")]
struct Cli {
    /// Switch to the given workspace (1-9) and exit.
    #[arg(long, value_name = "N")]
    focus_workspace: Option<u8>,

    /// Print every workspace that has windows, plus the current one.
    #[arg(long)]
    list_workspaces: bool,

    /// Path to the configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{e}");
            process::exit(0);
        }
        Err(e) => {
            eprint!("{e}");
            process::exit(1);
        }
    };

    log::init_logging();

    let config_path = cli.config.clone().unwrap_or_else(config_file);
    let config = if config_path.exists() {
        match Config::read(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    if cli.list_workspaces {
        for line in list_workspaces(&config) {
            println!("{line}");
        }
        process::exit(0);
    }

    if let Some(n) = cli.focus_workspace {
        if !(MIN_WORKSPACE..=MAX_WORKSPACE).contains(&n) {
            eprintln!("workspace number must be within 1-9");
            process::exit(1);
        }
        focus_workspace(config, n);
        process::exit(0);
    }

    run_daemon(config, config_path);
}

fn default_monitors() -> Vec<Monitor> {
    // Display enumeration is platform plumbing; the daemon adopts real
    // screens through ScreensChanged events once the bridge reports them.
    vec![Monitor::new(MonitorId::new(1), Rect::new(0.0, 0.0, 1920.0, 1080.0))]
}

fn build_reactor(config: Config) -> (Reactor, Arc<dyn CompositorBridge>) {
    let bridge: Arc<dyn CompositorBridge> = Arc::new(RecordingBridge::new());
    let process_table = Arc::new(StaticProcessTable::new());
    let reactor = Reactor::new(config, bridge.clone(), process_table, default_monitors())
        .with_restore_path(restore_file());
    (reactor, bridge)
}

/// Enqueue the switch, drain the queue, and let persistence record the
/// new active workspace.
fn focus_workspace(config: Config, n: u8) {
    let (mut reactor, _bridge) = build_reactor(config);
    reactor.startup();
    reactor.handle_event(Event::Command(Action::SwitchWorkspace(n)));
    // The event-driven persist is asynchronous; write once more before
    // exiting so the switch is durable.
    if let Err(e) = reactor.build_snapshot().save(&restore_file()) {
        eprintln!("failed to save workspace state: {e}");
        process::exit(1);
    }
}

fn list_workspaces(config: &Config) -> Vec<String> {
    let snapshot = RestoreSnapshot::load(&restore_file());
    let mut monitors: Vec<u32> = snapshot
        .active_workspaces
        .iter()
        .map(|&(m, _)| m)
        .chain(snapshot.entries.iter().map(|e| e.monitor))
        .collect();
    monitors.sort_unstable();
    monitors.dedup();
    if monitors.is_empty() {
        monitors.push(1);
    }

    let mut lines = Vec::new();
    for monitor in monitors {
        let current = snapshot
            .active_workspaces
            .iter()
            .find(|&&(m, _)| m == monitor)
            .map(|&(_, n)| n)
            .unwrap_or(MIN_WORKSPACE);
        for n in MIN_WORKSPACE..=MAX_WORKSPACE {
            let count = snapshot
                .entries
                .iter()
                .filter(|e| e.monitor == monitor && e.workspace == n)
                .count();
            if count == 0 && n != current {
                continue;
            }
            let marker = if n == current { " <- current" } else { "" };
            match config.workspace_names.get(&n) {
                Some(name) => lines.push(format!("Workspace {n} [{name}] ({count} windows){marker}")),
                None => lines.push(format!("Workspace {n} ({count} windows){marker}")),
            }
        }
    }
    lines
}

fn run_daemon(config: Config, config_path: std::path::PathBuf) {
    let (mut reactor, bridge) = build_reactor(config);
    let _interceptor = Interceptor::spawn(bridge, reactor.cloak.clone());

    let (events_tx, events_rx) = actor::channel();
    let suppressor = ReloadSuppressor::new();
    ConfigWatcher::spawn(events_tx.clone(), config_path, suppressor);

    reactor.startup();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("building the tokio runtime");
    runtime.block_on(async move {
        tokio::select! {
            _ = reactor.run(events_rx) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
            }
        }
    });
}
