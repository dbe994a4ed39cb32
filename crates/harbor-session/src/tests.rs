//! Integration tests for the session controller against mock
//! collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use harbor_common::TabId;
use harbor_protocol::BridgeEvent;

use crate::controller::{
    ConnectionStatus, EditorPromptChoice, IntegrationStatus, SessionController, SessionDeps,
    SessionTuning, SurfaceCommand,
};
use crate::history::HistorySource;
use crate::prefs::{MemoryPreferenceStore, PreferenceStore};
use crate::suggest::{SuggestContext, Suggestion, SuggestionEngine};
use crate::transport::{
    ConnectParams, TargetResolver, Transport, TransportError, TransportEvent, TransportFactory,
};

// ---------------------------------------------------------------------------
// Mock collaborators
// ---------------------------------------------------------------------------

struct StaticResolver {
    known: bool,
}

impl TargetResolver for StaticResolver {
    fn resolve(&self, _key: &str) -> Option<ConnectParams> {
        self.known.then(|| ConnectParams {
            program: "true".into(),
            args: vec![],
            env: vec![],
        })
    }
}

#[derive(Default)]
struct Shared {
    /// Each element is one `write` call.
    writes: Mutex<Vec<Vec<u8>>>,
    resizes: Mutex<Vec<(u16, u16)>>,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    open_count: AtomicUsize,
}

impl Shared {
    fn push_event(&self, ev: TransportEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(ev);
        }
    }

    fn last_write(&self) -> Vec<u8> {
        self.writes.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn all_writes(&self) -> Vec<u8> {
        self.writes.lock().unwrap().concat()
    }
}

struct MockTransport {
    shared: Arc<Shared>,
}

impl Transport for MockTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.shared.writes.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<(), TransportError> {
        self.shared.resizes.lock().unwrap().push((cols, rows));
        Ok(())
    }

    fn disconnect(&mut self) {}
}

struct MockFactory {
    shared: Arc<Shared>,
}

impl TransportFactory for MockFactory {
    fn open(
        &self,
        _params: &ConnectParams,
        _cols: u16,
        _rows: u16,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn Transport>, TransportError> {
        self.shared.open_count.fetch_add(1, Ordering::SeqCst);
        let _ = events.send(TransportEvent::Connected);
        *self.shared.events.lock().unwrap() = Some(events);
        Ok(Box::new(MockTransport {
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// Echoes the input back so tests can tell which computation produced a
/// result.
struct EchoEngine;

#[async_trait]
impl SuggestionEngine for EchoEngine {
    async fn suggest(&self, ctx: SuggestContext) -> Vec<Suggestion> {
        vec![Suggestion::new(format!("sug:{}", ctx.input))]
    }
}

struct CountingHistory {
    calls: AtomicUsize,
    lines: Vec<String>,
}

#[async_trait]
impl HistorySource for CountingHistory {
    async fn load(&self, _target_key: &str) -> Vec<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.lines.clone()
    }
}

struct Harness {
    controller: SessionController,
    shared: Arc<Shared>,
    history: Arc<CountingHistory>,
    prefs: Arc<MemoryPreferenceStore>,
    surface_rx: mpsc::UnboundedReceiver<SurfaceCommand>,
}

fn harness(known_target: bool) -> Harness {
    let shared = Arc::new(Shared::default());
    let history = Arc::new(CountingHistory {
        calls: AtomicUsize::new(0),
        lines: vec!["git status".into(), "ls -la".into()],
    });
    let prefs = Arc::new(MemoryPreferenceStore::default());
    let deps = SessionDeps {
        resolver: Arc::new(StaticResolver {
            known: known_target,
        }),
        transports: Arc::new(MockFactory {
            shared: Arc::clone(&shared),
        }),
        suggestions: Arc::new(EchoEngine),
        history: Arc::clone(&history) as Arc<dyn HistorySource>,
        prefs: Arc::clone(&prefs) as Arc<dyn PreferenceStore>,
    };
    let tuning = SessionTuning {
        suggest_debounce: Duration::from_millis(10),
        integration_probe: Duration::from_millis(25),
        history_cap: 500,
    };
    let mut controller =
        SessionController::new(TabId::new(), "test-target", deps, tuning, false);
    let surface_rx = controller.take_surface_rx().expect("surface rx");
    Harness {
        controller,
        shared,
        history,
        prefs,
        surface_rx,
    }
}

/// Connect and apply the `Connected` event.
fn connect(h: &mut Harness) {
    h.controller.connect();
    h.controller.drain();
    assert_eq!(h.controller.status(), ConnectionStatus::Connected);
}

async fn settle(h: &mut Harness) {
    tokio::time::sleep(Duration::from_millis(40)).await;
    h.controller.drain();
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_is_idempotent() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.connect();
    assert_eq!(h.shared.open_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_target_is_terminal_failure() {
    let mut h = harness(false);
    h.controller.connect();
    assert_eq!(h.controller.status(), ConnectionStatus::Failed);
}

#[tokio::test]
async fn connect_installs_shell_integration_with_echo_suppressed() {
    let mut h = harness(true);
    connect(&mut h);
    let written = String::from_utf8_lossy(&h.shared.all_writes()).into_owned();
    assert!(written.contains("stty -echo"));
    assert!(written.contains("__hb_osc"));
    assert!(written.contains("stty echo"));
    let off = written.find("stty -echo").unwrap();
    let script = written.find("__hb_osc").unwrap();
    assert!(off < script, "echo must be off before the script goes in");
}

#[tokio::test]
async fn history_loads_exactly_once_per_lifetime() {
    let mut h = harness(true);
    connect(&mut h);
    settle(&mut h).await;
    assert_eq!(h.controller.history(), &["ls -la", "git status"]);

    // Reconnect: the one-shot must not re-run.
    h.controller.disconnect();
    connect(&mut h);
    settle(&mut h).await;
    assert_eq!(h.history.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disconnect_reason_maps_to_failed() {
    let mut h = harness(true);
    connect(&mut h);
    h.shared.push_event(TransportEvent::Disconnected(Some("broken pipe".into())));
    h.controller.drain();
    assert_eq!(h.controller.status(), ConnectionStatus::Failed);
}

#[tokio::test]
async fn clean_disconnect_maps_to_disconnected() {
    let mut h = harness(true);
    connect(&mut h);
    h.shared.push_event(TransportEvent::Disconnected(None));
    h.controller.drain();
    assert_eq!(h.controller.status(), ConnectionStatus::Disconnected);
}

// ---------------------------------------------------------------------------
// Integration probe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn probe_degrades_to_warning_without_cwd_signal() {
    let mut h = harness(true);
    connect(&mut h);
    settle(&mut h).await;
    assert_eq!(h.controller.integration_status(), IntegrationStatus::Warning);
    // Soft degradation only: the session stays connected.
    assert_eq!(h.controller.status(), ConnectionStatus::Connected);
}

#[tokio::test]
async fn cwd_event_activates_integration_and_suppresses_probe() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller
        .handle_bridge_event(BridgeEvent::CwdChanged("/srv".into()));
    assert_eq!(h.controller.integration_status(), IntegrationStatus::Active);
    assert_eq!(h.controller.cwd(), Some("/srv"));

    // Even past the probe deadline the status must not regress.
    settle(&mut h).await;
    assert_eq!(h.controller.integration_status(), IntegrationStatus::Active);
}

#[tokio::test]
async fn integration_error_degrades_and_suppresses_probe() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_bridge_event(BridgeEvent::IntegrationError {
        reason: "hook clobbered".into(),
        details: None,
    });
    assert_eq!(h.controller.integration_status(), IntegrationStatus::Warning);
}

// ---------------------------------------------------------------------------
// Input reconstruction through the live path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn typed_bytes_forward_and_reconstruct() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("lsx");
    h.controller.handle_input("\u{8}");
    assert_eq!(h.controller.input_text(), "ls");
    h.controller.handle_input("\r");
    assert_eq!(h.controller.input_text(), "");
    // The submitted command lands at the head of the session history.
    assert_eq!(h.controller.history().first().map(String::as_str), Some("ls"));
    assert_eq!(h.shared.last_write(), b"\r");
}

#[tokio::test]
async fn resize_event_reaches_transport() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller
        .handle_bridge_event(BridgeEvent::Resized { cols: 132, rows: 50 });
    assert_eq!(h.shared.resizes.lock().unwrap().as_slice(), &[(132, 50)]);
}

#[tokio::test]
async fn transport_output_is_demuxed_to_surface_and_events() {
    use base64::Engine as _;
    let mut h = harness(true);
    connect(&mut h);
    let b64 = base64::engine::general_purpose::STANDARD.encode("/home/dev");
    let stream = format!("plain\x1b]7771;SetCwd;{b64}\x07text");
    h.shared.push_event(TransportEvent::Output(stream.into_bytes()));
    h.controller.drain();

    assert_eq!(h.controller.cwd(), Some("/home/dev"));
    // Find the Write command among surface traffic.
    let mut clean = Vec::new();
    while let Ok(cmd) = h.surface_rx.try_recv() {
        if let SurfaceCommand::Write(bytes) = cmd {
            clean.extend(bytes);
        }
    }
    assert_eq!(clean, b"plaintext");
}

// ---------------------------------------------------------------------------
// Control-modifier arming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn armed_control_is_single_shot() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("pin");
    h.controller.arm_control();
    assert!(h.controller.is_control_armed());

    h.controller.handle_input("c");
    assert_eq!(h.shared.last_write(), vec![0x03]);
    assert!(!h.controller.is_control_armed());
    // ETX aborts the line.
    assert_eq!(h.controller.input_text(), "");

    // The next character goes through literally.
    h.controller.handle_input("c");
    assert_eq!(h.shared.last_write(), b"c");
    assert_eq!(h.controller.input_text(), "c");
}

#[tokio::test]
async fn armed_eot_clears_pending_suggestions() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("gi");
    settle(&mut h).await;
    assert!(!h.controller.suggestions().is_empty());

    h.controller.arm_control();
    h.controller.handle_input("d");
    assert_eq!(h.shared.last_write(), vec![0x04]);
    assert!(h.controller.suggestions().is_empty());
}

#[tokio::test]
async fn armed_unmappable_char_forwards_literally() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.arm_control();
    h.controller.handle_input("1");
    assert_eq!(h.shared.last_write(), b"1");
    assert!(!h.controller.is_control_armed());
}

// ---------------------------------------------------------------------------
// Editor interception
// ---------------------------------------------------------------------------

#[tokio::test]
async fn editor_submission_raises_prompt_and_withholds_cr() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("nano /etc/hosts");
    h.controller.handle_input("\r");

    let prompt = h.controller.pending_editor_prompt().expect("prompt");
    assert_eq!(prompt.command, "nano");
    assert_eq!(prompt.path, "/etc/hosts");
    // The CR was never forwarded.
    assert_eq!(h.shared.last_write(), b"nano /etc/hosts");
}

#[tokio::test]
async fn interception_handles_line_and_cr_in_one_unit() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller
        .handle_bridge_event(BridgeEvent::CwdChanged("/var".into()));
    h.controller.handle_input("sudo vim +42 /var/log/app.log\r");

    let prompt = h.controller.pending_editor_prompt().expect("prompt");
    assert_eq!(prompt.command, "vim");
    assert_eq!(prompt.path, "/var/log/app.log");
    assert_eq!(prompt.cwd.as_deref(), Some("/var"));
    assert_eq!(h.shared.last_write(), b"sudo vim +42 /var/log/app.log");
}

#[tokio::test]
async fn open_externally_clears_the_remote_line() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("nano /etc/hosts\r");
    h.controller
        .resolve_editor_prompt(EditorPromptChoice::OpenExternally);

    assert_eq!(h.shared.last_write(), vec![0x15]);
    assert_eq!(h.controller.input_text(), "");
    assert!(h.controller.pending_editor_prompt().is_none());
}

#[tokio::test]
async fn continue_in_terminal_arms_one_shot_bypass() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("nano /etc/hosts\r");
    h.controller
        .resolve_editor_prompt(EditorPromptChoice::ContinueInTerminal);

    // Enter was resubmitted and forwarded this time.
    assert_eq!(h.shared.last_write(), b"\r");
    assert!(h.controller.pending_editor_prompt().is_none());

    // The bypass was consumed: the next editor submission prompts again.
    h.controller.handle_input("nano /etc/motd\r");
    assert!(h.controller.pending_editor_prompt().is_some());
}

#[tokio::test]
async fn suppress_permanently_is_one_way() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("nano /etc/hosts\r");
    h.controller
        .resolve_editor_prompt(EditorPromptChoice::SuppressPermanently);

    assert!(h.prefs.editor_redirect_disabled());
    assert_eq!(h.shared.last_write(), b"\r");

    // No prompt ever again.
    h.controller.handle_input("vim /tmp/x\r");
    assert!(h.controller.pending_editor_prompt().is_none());
}

#[tokio::test]
async fn ordinary_lines_pass_interception_untouched() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("ls -la /etc\r");
    assert!(h.controller.pending_editor_prompt().is_none());
    assert_eq!(h.shared.last_write(), b"ls -la /etc\r");
}

// ---------------------------------------------------------------------------
// Suggestion scheduling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_latest_computation_is_observable() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("x");
    h.controller.handle_input("y");
    settle(&mut h).await;
    assert_eq!(
        h.controller.suggestions(),
        &[Suggestion::new("sug:xy")],
        "only the second computation's output may be applied"
    );
}

#[tokio::test]
async fn stale_result_is_ignored_even_when_already_queued() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("x");
    // Let the first computation complete and queue its result...
    tokio::time::sleep(Duration::from_millis(40)).await;
    // ...then supersede it before the controller drains.
    h.controller.handle_input("y");
    h.controller.drain();
    assert!(
        h.controller.suggestions().is_empty(),
        "stale generation must not be applied"
    );

    settle(&mut h).await;
    assert_eq!(h.controller.suggestions(), &[Suggestion::new("sug:xy")]);
}

#[tokio::test]
async fn empty_buffer_clears_suggestions_without_background_work() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("g");
    settle(&mut h).await;
    assert!(!h.controller.suggestions().is_empty());

    h.controller.handle_input("\u{8}");
    // Immediate, no debounce wait.
    assert!(h.controller.suggestions().is_empty());
}

#[tokio::test]
async fn submission_clears_suggestion_list() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("ls");
    settle(&mut h).await;
    assert!(!h.controller.suggestions().is_empty());
    h.controller.handle_input("\r");
    assert!(h.controller.suggestions().is_empty());
}

#[tokio::test]
async fn accepting_a_suggestion_rewrites_the_line() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_input("git");
    settle(&mut h).await;
    h.controller.accept_suggestion(0);

    assert_eq!(h.controller.input_text(), "sug:git");
    let write = h.shared.last_write();
    assert_eq!(write[0], 0x15, "line is cleared before replacement");
    assert_eq!(&write[1..], b"sug:git");

    let mut applied = None;
    while let Ok(cmd) = h.surface_rx.try_recv() {
        if let SurfaceCommand::ApplySuggestion(text) = cmd {
            applied = Some(text);
        }
    }
    assert_eq!(applied.as_deref(), Some("sug:git"));
}

// ---------------------------------------------------------------------------
// Remaining bridge events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn command_lifecycle_tracked() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller
        .handle_bridge_event(BridgeEvent::CommandStarted("make -j8".into()));
    assert_eq!(h.controller.active_command().unwrap().text, "make -j8");

    h.controller.handle_bridge_event(BridgeEvent::CommandExited(2));
    assert!(h.controller.active_command().is_none());
    assert_eq!(h.controller.last_exit_code(), Some(2));
}

#[tokio::test]
async fn selection_state_follows_events() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller.handle_bridge_event(BridgeEvent::SelectionChanged {
        text: "some text".into(),
        has_selection: true,
    });
    assert_eq!(h.controller.selection(), Some("some text"));

    h.controller.handle_bridge_event(BridgeEvent::SelectionChanged {
        text: String::new(),
        has_selection: false,
    });
    assert_eq!(h.controller.selection(), None);
}

#[tokio::test]
async fn external_link_is_forwarded_to_surface() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller
        .handle_bridge_event(BridgeEvent::OpenExternalLink("https://docs.rs".into()));
    let mut url = None;
    while let Ok(cmd) = h.surface_rx.try_recv() {
        if let SurfaceCommand::OpenUrl(u) = cmd {
            url = Some(u);
        }
    }
    assert_eq!(url.as_deref(), Some("https://docs.rs"));
}

#[tokio::test]
async fn editor_command_entered_event_raises_prompt() {
    let mut h = harness(true);
    connect(&mut h);
    h.controller
        .handle_bridge_event(BridgeEvent::EditorCommandEntered("vi notes.md".into()));
    let prompt = h.controller.pending_editor_prompt().expect("prompt");
    assert_eq!(prompt.command, "vi");
    assert_eq!(prompt.path, "notes.md");
}
