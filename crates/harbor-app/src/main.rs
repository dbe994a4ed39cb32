mod cli;
mod prefs;
mod targets;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use harbor_session::suggest::PrefixSuggestionEngine;
use harbor_session::{
    history::ShellHistorySource, pty::PtyTransportFactory, SessionDeps, SessionTuning,
    SurfaceCommand,
};
use harbor_workspace::{FileSnapshotStore, SnapshotStore, WorkspaceLimits, WorkspaceStore};

use crate::prefs::TomlPreferenceStore;
use crate::targets::ShellTargetResolver;

fn main() {
    let args = cli::parse();

    if args.list {
        println!("local\t{}", harbor_session::shell::detect_shell());
        return;
    }

    // Initialize logging
    let log_directive = args.log_level.as_deref().unwrap_or("harbor=info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "harbor=info".parse().unwrap()),
            ),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Harbor v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load config
    let config_path = match &args.config {
        Some(path) => PathBuf::from(path),
        None => match harbor_config::default_config_path() {
            Ok(path) => path,
            Err(e) => {
                warn!("no usable config path: {e}");
                PathBuf::from("harbor.toml")
            }
        },
    };
    let config = harbor_config::load_from_path(&config_path).unwrap_or_else(|e| {
        warn!("config load failed, using defaults: {e}");
        harbor_config::HarborConfig::default()
    });

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };
    runtime.block_on(run(args, config, config_path));
}

async fn run(args: cli::Args, config: harbor_config::HarborConfig, config_path: PathBuf) {
    let deps = SessionDeps {
        resolver: Arc::new(ShellTargetResolver),
        transports: Arc::new(PtyTransportFactory),
        suggestions: Arc::new(PrefixSuggestionEngine::default()),
        history: Arc::new(ShellHistorySource::default()),
        prefs: Arc::new(TomlPreferenceStore::new(
            config_path,
            config.editor_redirect.disabled,
        )),
    };
    let tuning = SessionTuning {
        suggest_debounce: Duration::from_millis(config.session.suggest_debounce_ms),
        integration_probe: Duration::from_secs(config.session.integration_probe_secs),
        history_cap: config.session.history_cap,
    };
    let limits = WorkspaceLimits {
        max_panes: config.workspace.max_panes,
        max_tabs: config.workspace.max_tabs,
    };
    let snapshots: Arc<dyn SnapshotStore> = match FileSnapshotStore::default_path() {
        Some(path) => Arc::new(FileSnapshotStore::new(path)),
        None => {
            warn!("no data directory, workspace layout will not persist");
            Arc::new(FileSnapshotStore::new("harbor-workspace.json"))
        }
    };

    let mut workspace = WorkspaceStore::new(
        limits,
        snapshots,
        deps,
        tuning,
        config.session.auto_connect,
    );
    workspace.restore();

    // The focused pane drives this binary; open a session against the
    // requested target if the restored layout came back empty.
    let tab_id = match workspace
        .focused_pane()
        .and_then(|p| workspace.panes().iter().find(|pane| &pane.id == p))
        .and_then(|pane| pane.active_tab.clone())
    {
        Some(existing) => existing,
        None => match workspace.open_tab(&args.target, None, true) {
            Some(id) => id,
            None => {
                eprintln!("could not open a tab for target '{}'", args.target);
                return;
            }
        },
    };

    let mut surface_rx = {
        let Some(controller) = workspace.controller_mut(&tab_id) else {
            eprintln!("no session for tab {tab_id}");
            return;
        };
        if !config.session.auto_connect {
            controller.connect();
        }
        match controller.take_surface_rx() {
            Some(rx) => rx,
            None => {
                eprintln!("session surface already claimed");
                return;
            }
        }
    };

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut stdin_buf = [0u8; 1024];
    let mut stdin_carry = Vec::new();
    let mut tick = tokio::time::interval(Duration::from_millis(16));

    loop {
        tokio::select! {
            read = stdin.read(&mut stdin_buf) => {
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let text = decode_stdin_chunk(&mut stdin_carry, &stdin_buf[..n]);
                        if !text.is_empty() {
                            if let Some(controller) = workspace.controller_mut(&tab_id) {
                                controller.handle_input(&text);
                            }
                        }
                    }
                }
            }
            command = surface_rx.recv() => {
                let Some(command) = command else { break };
                match command {
                    SurfaceCommand::Write(bytes) => {
                        if stdout.write_all(&bytes).await.is_err() {
                            break;
                        }
                        let _ = stdout.flush().await;
                    }
                    SurfaceCommand::OpenUrl(url) => info!("open externally: {url}"),
                    SurfaceCommand::ApplySuggestion(text) => {
                        info!("input line is now: {text}");
                    }
                    // Focus and selection are display concerns; nothing to
                    // do without an attached renderer.
                    _ => {}
                }
            }
            _ = tick.tick() => {
                workspace.drain_controllers();
            }
        }
    }

    if let Some(controller) = workspace.controller_mut(&tab_id) {
        controller.disconnect();
    }
    info!("Harbor shutting down");
}

/// Decode a stdin chunk, carrying an incomplete trailing UTF-8 sequence
/// over to the next read so multibyte input split across reads is not
/// mangled. Genuinely invalid bytes become replacement characters.
fn decode_stdin_chunk(carry: &mut Vec<u8>, chunk: &[u8]) -> String {
    carry.extend_from_slice(chunk);
    let mut out = String::new();
    loop {
        match std::str::from_utf8(carry) {
            Ok(text) => {
                out.push_str(text);
                carry.clear();
                break;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(std::str::from_utf8(&carry[..valid]).unwrap_or_default());
                match e.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        carry.drain(..valid + bad);
                    }
                    None => {
                        // Possible sequence start at the tail; hold it back.
                        carry.drain(..valid);
                        break;
                    }
                }
            }
        }
    }
    out
}
