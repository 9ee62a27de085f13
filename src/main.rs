//! Codex Status Watch CLI
//!
//! Follows the git status of CodexMonitor workspaces through the daemon and
//! prints a line every time the displayed status changes.

use clap::Parser;
use codex_status_watch::config::default_config_path;
use codex_status_watch::{
    DaemonClient, DaemonStatusSource, StatusSnapshot, StatusView, WatchConfig, WorkspaceId,
    WorkspaceStatusPoller,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Codex Status Watch - follow workspace git status via the CodexMonitor daemon
#[derive(Parser, Debug)]
#[command(name = "codex-status-watch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Daemon address (host:port)
    #[arg(long)]
    addr: Option<String>,

    /// Daemon auth token
    #[arg(long)]
    token: Option<String>,

    /// Poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Verbose output: show poller debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Workspace ids to watch; the first one is observed on startup, `:next` cycles
    #[arg(trailing_var_arg = true)]
    workspaces: Vec<String>,
}

/// A line typed on stdin
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Observe(WorkspaceId),
    /// Cycle to the next configured workspace
    Next,
    Deactivate,
    Refresh,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "" => None,
        ":none" => Some(Command::Deactivate),
        ":next" | ":n" => Some(Command::Next),
        ":refresh" | ":r" => Some(Command::Refresh),
        ":quit" | ":q" => Some(Command::Quit),
        id => Some(Command::Observe(WorkspaceId::new(id))),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config = resolve_config(&cli)?;
    info!("Daemon: {}", config.daemon_addr);

    let client = Arc::new(DaemonClient::from_config(&config));
    if let Err(e) = client.ping().await {
        warn!("Daemon at {} is not answering yet: {}", client.addr(), e);
    }

    let poller = WorkspaceStatusPoller::new(DaemonStatusSource::new(client), config.poller_config());

    // Read commands from stdin on a blocking thread
    let (command_tx, mut command_rx) = mpsc::channel::<Command>(32);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    let Some(command) = parse_command(&line) else {
                        continue;
                    };
                    if command_tx.blocking_send(command).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    eprintln!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    if !config.workspaces.is_empty() {
        let known: Vec<&str> = config.workspaces.iter().map(|id| id.as_str()).collect();
        info!("Configured workspaces: {}", known.join(", "));
    }

    let mut view = poller.observe(config.workspaces.first().cloned());
    print_status(&view, &view.status());

    loop {
        tokio::select! {
            Some(snapshot) = view.changed() => {
                print_status(&view, &snapshot);
            }
            command = command_rx.recv() => {
                match command {
                    Some(Command::Observe(id)) => {
                        view = poller.observe(Some(id));
                        print_status(&view, &view.status());
                    }
                    Some(Command::Next) => {
                        let current = view.workspace_id();
                        match next_workspace(&config.workspaces, current.as_ref()) {
                            Some(id) => {
                                view = poller.observe(Some(id));
                                print_status(&view, &view.status());
                            }
                            None => warn!("No workspaces configured"),
                        }
                    }
                    Some(Command::Deactivate) => {
                        view = poller.observe(None);
                        print_status(&view, &view.status());
                    }
                    Some(Command::Refresh) => poller.refresh(),
                    Some(Command::Quit) | None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    poller.shutdown();
    Ok(())
}

fn resolve_config(cli: &Cli) -> anyhow::Result<WatchConfig> {
    let mut config = match &cli.config {
        Some(path) => WatchConfig::load_from(path)?,
        None => {
            if let Some(path) = default_config_path() {
                info!("Config: {:?}", path);
            }
            WatchConfig::load()?
        }
    };

    if let Some(addr) = &cli.addr {
        config.daemon_addr = addr.clone();
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    if let Some(interval) = cli.interval_ms {
        config.poll_interval_ms = interval;
    }
    if let Some(timeout) = cli.timeout_ms {
        config.request_timeout_ms = timeout;
    }
    if !cli.workspaces.is_empty() {
        config.workspaces = cli.workspaces.iter().map(|id| WorkspaceId::new(id.as_str())).collect();
    }

    config.validate()?;
    Ok(config)
}

/// Workspace after `current` in the configured list, wrapping around.
fn next_workspace(workspaces: &[WorkspaceId], current: Option<&WorkspaceId>) -> Option<WorkspaceId> {
    let position = current.and_then(|id| workspaces.iter().position(|w| w == id));
    let next = match position {
        Some(index) => (index + 1) % workspaces.len(),
        None => 0,
    };
    workspaces.get(next).cloned()
}

fn format_status(workspace: Option<&WorkspaceId>, snapshot: &StatusSnapshot) -> String {
    let Some(workspace) = workspace else {
        return "(no workspace)".to_string();
    };
    let branch = if snapshot.branch_name.is_empty() {
        "-"
    } else {
        snapshot.branch_name.as_str()
    };
    let mut line = format!(
        "{} [{}] {} files ({} staged, {} unstaged) +{} -{}",
        workspace,
        branch,
        snapshot.files.len(),
        snapshot.staged_files.len(),
        snapshot.unstaged_files.len(),
        snapshot.total_additions,
        snapshot.total_deletions
    );
    if let Some(error) = &snapshot.error {
        line.push_str(&format!(" error: {}", error));
    }
    line
}

fn print_status(view: &StatusView, snapshot: &StatusSnapshot) {
    let timestamp = chrono::Local::now().format("%H:%M:%S");
    let line = format_status(view.workspace_id().as_ref(), snapshot);
    if let Err(e) = writeln!(io::stdout(), "{} {}", timestamp, line) {
        error!("Error writing stdout: {}", e);
    }
    let _ = io::stdout().flush();
}
