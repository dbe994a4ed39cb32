//! Per-tab session controller.
//!
//! Owns one remote session end to end: transport lifecycle, interpretation
//! of the bridge event protocol, reconstruction of the line being typed,
//! editor-command interception, and debounced suggestion lookups.
//!
//! All observable state mutates on the caller's context. Background work
//! (transport I/O, the one-shot history load, the suggestion debounce, the
//! integration probe) reports back through per-controller channels which
//! [`SessionController::drain`] applies in FIFO order, so the embedder
//! only ever touches the controller from its single coordinating loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use harbor_common::TabId;
use harbor_protocol::bootstrap;
use harbor_protocol::{BridgeEvent, ProtocolDemux};

use crate::history::{self, HistorySource};
use crate::input::InputBuffer;
use crate::intercept;
use crate::prefs::PreferenceStore;
use crate::suggest::{SuggestContext, Suggestion, SuggestionEngine};
use crate::transport::{TargetResolver, Transport, TransportEvent, TransportFactory};

// ---------------------------------------------------------------------------
// Status machines
// ---------------------------------------------------------------------------

/// `idle → connecting → connected → {disconnected | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

/// `unknown → active` on the first cwd report, `unknown → warning` when
/// the probe fires first or an integration error arrives. Warning is a
/// soft degradation: raw I/O keeps working, only cwd-aware features may
/// be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationStatus {
    Unknown,
    Active,
    Warning,
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// The command currently running on the remote shell, as reported by the
/// integration channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub text: String,
}

/// A pending "open externally?" prompt raised by editor interception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorPrompt {
    pub command: String,
    pub path: String,
    pub cwd: Option<String>,
}

/// The three ways an editor prompt resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorPromptChoice {
    OpenExternally,
    ContinueInTerminal,
    SuppressPermanently,
}

/// Commands the controller sends to the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCommand {
    /// Raw bytes to draw (integration sequences already stripped).
    Write(Vec<u8>),
    /// Replace the displayed input line with this text.
    ApplySuggestion(String),
    Focus,
    SelectAll,
    ClearSelection,
    SubmitEnter,
    OpenUrl(String),
}

/// Completions and timer results marshaled back to the coordinating
/// context.
#[derive(Debug)]
enum SessionMsg {
    Suggestions {
        generation: u64,
        items: Vec<Suggestion>,
    },
    HistoryLoaded(Vec<String>),
    ProbeFired,
}

/// External collaborators, shared across controllers.
#[derive(Clone)]
pub struct SessionDeps {
    pub resolver: Arc<dyn TargetResolver>,
    pub transports: Arc<dyn TransportFactory>,
    pub suggestions: Arc<dyn SuggestionEngine>,
    pub history: Arc<dyn HistorySource>,
    pub prefs: Arc<dyn PreferenceStore>,
}

/// Timing knobs. Tests shorten these.
#[derive(Debug, Clone)]
pub struct SessionTuning {
    pub suggest_debounce: Duration,
    pub integration_probe: Duration,
    pub history_cap: usize,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            suggest_debounce: Duration::from_millis(120),
            integration_probe: Duration::from_secs(3),
            history_cap: 500,
        }
    }
}

/// Control codes that always abort the current line.
const ETX: u8 = 0x03;
const EOT: u8 = 0x04;
const SUB: u8 = 0x1a;
/// `Ctrl+U`, clear line.
const NAK: u8 = 0x15;

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct SessionController {
    id: TabId,
    target_key: String,
    deps: SessionDeps,
    tuning: SessionTuning,
    auto_connect: bool,

    status: ConnectionStatus,
    integration: IntegrationStatus,
    cwd: Option<String>,
    prompt_begin: Option<(u32, u32)>,
    prompt_end: Option<(u32, u32)>,
    active_command: Option<CommandRecord>,
    last_exit_code: Option<i32>,
    suggestions: Vec<Suggestion>,
    history: Vec<String>,
    history_started: bool,
    selection: Option<String>,
    selection_hint: Option<String>,
    pending_editor: Option<EditorPrompt>,
    ctrl_armed: bool,
    bypass_once: bool,
    input: InputBuffer,
    cols: u16,
    rows: u16,

    transport: Option<Box<dyn Transport>>,
    transport_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    demux: ProtocolDemux,

    msg_tx: mpsc::UnboundedSender<SessionMsg>,
    msg_rx: mpsc::UnboundedReceiver<SessionMsg>,
    surface_tx: mpsc::UnboundedSender<SurfaceCommand>,
    surface_rx: Option<mpsc::UnboundedReceiver<SurfaceCommand>>,

    suggest_generation: u64,
    suggest_task: Option<JoinHandle<()>>,
    probe_cancel: Option<CancellationToken>,
}

impl SessionController {
    pub fn new(
        id: TabId,
        target_key: impl Into<String>,
        deps: SessionDeps,
        tuning: SessionTuning,
        auto_connect: bool,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (surface_tx, surface_rx) = mpsc::unbounded_channel();
        Self {
            id,
            target_key: target_key.into(),
            deps,
            tuning,
            auto_connect,
            status: ConnectionStatus::Idle,
            integration: IntegrationStatus::Unknown,
            cwd: None,
            prompt_begin: None,
            prompt_end: None,
            active_command: None,
            last_exit_code: None,
            suggestions: Vec::new(),
            history: Vec::new(),
            history_started: false,
            selection: None,
            selection_hint: None,
            pending_editor: None,
            ctrl_armed: false,
            bypass_once: false,
            input: InputBuffer::new(),
            cols: 80,
            rows: 24,
            transport: None,
            transport_rx: None,
            demux: ProtocolDemux::new(),
            msg_tx,
            msg_rx,
            surface_tx,
            surface_rx: Some(surface_rx),
            suggest_generation: 0,
            suggest_task: None,
            probe_cancel: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &TabId {
        &self.id
    }

    pub fn target_key(&self) -> &str {
        &self.target_key
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn integration_status(&self) -> IntegrationStatus {
        self.integration
    }

    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    pub fn prompt_markers(&self) -> (Option<(u32, u32)>, Option<(u32, u32)>) {
        (self.prompt_begin, self.prompt_end)
    }

    pub fn active_command(&self) -> Option<&CommandRecord> {
        self.active_command.as_ref()
    }

    pub fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn selection_hint(&self) -> Option<&str> {
        self.selection_hint.as_deref()
    }

    pub fn pending_editor_prompt(&self) -> Option<&EditorPrompt> {
        self.pending_editor.as_ref()
    }

    pub fn is_control_armed(&self) -> bool {
        self.ctrl_armed
    }

    pub fn input_text(&self) -> &str {
        self.input.text()
    }

    /// The embedder takes this once to receive surface commands.
    pub fn take_surface_rx(&mut self) -> Option<mpsc::UnboundedReceiver<SurfaceCommand>> {
        self.surface_rx.take()
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Idempotent: a second call while a transport exists is a no-op.
    /// Missing connection parameters are terminal (`failed`); there is no
    /// automatic retry.
    pub fn connect(&mut self) {
        if self.transport.is_some() {
            return;
        }
        self.status = ConnectionStatus::Connecting;

        let Some(params) = self.deps.resolver.resolve(&self.target_key) else {
            warn!(target = %self.target_key, "no connection parameters for target");
            self.status = ConnectionStatus::Failed;
            return;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        match self
            .deps
            .transports
            .open(&params, self.cols, self.rows, tx)
        {
            Ok(transport) => {
                self.transport = Some(transport);
                self.transport_rx = Some(rx);
            }
            Err(e) => {
                warn!(target = %self.target_key, "transport open failed: {e}");
                self.status = ConnectionStatus::Failed;
            }
        }
    }

    /// Tear down the transport and cancel all background work. Safe to
    /// call repeatedly.
    pub fn disconnect(&mut self) {
        let had_transport = self.transport.is_some();
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect();
        }
        self.transport_rx = None;
        self.cancel_probe();
        if let Some(task) = self.suggest_task.take() {
            task.abort();
        }
        if had_transport {
            self.status = ConnectionStatus::Disconnected;
        }
    }

    // -----------------------------------------------------------------------
    // Message pump
    // -----------------------------------------------------------------------

    /// Apply everything the transport and background tasks have produced
    /// since the last call, in per-source FIFO order.
    pub fn drain(&mut self) {
        let mut transport_events = Vec::new();
        if let Some(rx) = self.transport_rx.as_mut() {
            while let Ok(ev) = rx.try_recv() {
                transport_events.push(ev);
            }
        }
        for ev in transport_events {
            self.on_transport_event(ev);
        }
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.apply_msg(msg);
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!(target = %self.target_key, "session connected");
                self.status = ConnectionStatus::Connected;
                self.install_shell_integration();
                self.start_history_load();
                self.start_probe();
            }
            TransportEvent::Output(bytes) => {
                let demuxed = self.demux.feed(&bytes);
                if !demuxed.output.is_empty() {
                    let _ = self.surface_tx.send(SurfaceCommand::Write(demuxed.output));
                }
                for ev in demuxed.events {
                    self.handle_bridge_event(ev);
                }
            }
            TransportEvent::Disconnected(reason) => {
                self.transport = None;
                self.transport_rx = None;
                self.cancel_probe();
                match reason {
                    Some(reason) => {
                        warn!(target = %self.target_key, "session failed: {reason}");
                        self.status = ConnectionStatus::Failed;
                    }
                    None => {
                        info!(target = %self.target_key, "session disconnected");
                        self.status = ConnectionStatus::Disconnected;
                    }
                }
            }
        }
    }

    fn apply_msg(&mut self, msg: SessionMsg) {
        match msg {
            SessionMsg::Suggestions { generation, items } => {
                // Results from a superseded computation are never applied.
                if generation == self.suggest_generation {
                    self.suggestions = items;
                }
            }
            SessionMsg::HistoryLoaded(lines) => {
                self.history = history::dedup_recent(lines, self.tuning.history_cap);
                debug!(count = self.history.len(), "history loaded");
            }
            SessionMsg::ProbeFired => {
                // Ignored once the integration has resolved either way.
                if self.integration == IntegrationStatus::Unknown {
                    warn!(target = %self.target_key, "no shell integration signal, degrading");
                    self.integration = IntegrationStatus::Warning;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Bridge events
    // -----------------------------------------------------------------------

    /// Dispatch purely on event kind. Each arm fully applies or the event
    /// was already dropped at decode time.
    pub fn handle_bridge_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::SessionReady => {
                if self.auto_connect {
                    self.connect();
                }
            }
            BridgeEvent::RawDataIn(text) => self.handle_input(&text),
            BridgeEvent::Resized { cols, rows } => {
                self.cols = cols;
                self.rows = rows;
                if let Some(transport) = self.transport.as_mut() {
                    if let Err(e) = transport.resize(cols, rows) {
                        warn!("resize failed: {e}");
                    }
                }
            }
            BridgeEvent::CwdChanged(path) => {
                self.cwd = Some(path);
                self.integration = IntegrationStatus::Active;
                self.cancel_probe();
            }
            BridgeEvent::PromptBegins { row, col } => self.prompt_begin = Some((row, col)),
            BridgeEvent::PromptEnds { row, col } => self.prompt_end = Some((row, col)),
            BridgeEvent::CommandStarted(text) => {
                self.active_command = Some(CommandRecord { text });
            }
            BridgeEvent::CommandExited(code) => {
                self.active_command = None;
                self.last_exit_code = Some(code);
            }
            BridgeEvent::IntegrationError { reason, details } => {
                warn!(reason, ?details, "shell integration error");
                self.integration = IntegrationStatus::Warning;
                self.cancel_probe();
            }
            BridgeEvent::SelectionChanged {
                text,
                has_selection,
            } => {
                self.selection = has_selection.then_some(text);
            }
            BridgeEvent::SelectionHint(message) => self.selection_hint = Some(message),
            BridgeEvent::OpenExternalLink(url) => {
                let _ = self.surface_tx.send(SurfaceCommand::OpenUrl(url));
            }
            BridgeEvent::EditorCommandEntered(line) => {
                if self.interception_enabled() {
                    if let Some(launch) = intercept::match_editor(&line) {
                        self.raise_editor_prompt(launch);
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Input path
    // -----------------------------------------------------------------------

    /// Live-typing path: forward bytes to the transport, mirror them into
    /// the reconstructed buffer, and drive suggestion scheduling. A line
    /// about to be submitted is first peeked for editor interception.
    pub fn handle_input(&mut self, text: &str) {
        if self.ctrl_armed {
            self.send_armed_control(text);
            return;
        }

        if self.interception_enabled() {
            if let Some(command) = self.input.peek(text) {
                if let Some(launch) = intercept::match_editor(&command) {
                    // Do not forward the carriage return: strip it, send
                    // the rest, and raise the prompt instead.
                    let stripped = text.trim_end_matches(['\r', '\n']);
                    if !stripped.is_empty() {
                        self.write_transport(stripped.as_bytes().to_vec());
                        self.input.replay(stripped);
                    }
                    self.raise_editor_prompt(launch);
                    return;
                }
            }
        }

        self.write_transport(text.as_bytes().to_vec());
        match self.input.replay(text) {
            Some(submitted) => {
                self.bypass_once = false;
                if !submitted.is_empty() {
                    self.remember_command(&submitted);
                }
                self.clear_suggestions();
            }
            None => self.schedule_suggestions(),
        }
    }

    /// Arm the control-modifier toggle; the next single-character input is
    /// converted to its control code and the arming is consumed.
    pub fn arm_control(&mut self) {
        self.ctrl_armed = true;
    }

    fn send_armed_control(&mut self, text: &str) {
        self.ctrl_armed = false;
        let Some(ch) = text.chars().next() else {
            return;
        };
        match control_code(ch) {
            Some(code) => {
                self.write_transport(vec![code]);
                if matches!(code, ETX | EOT | SUB) {
                    // These always abort the current line.
                    self.input.clear();
                    self.clear_suggestions();
                }
            }
            // Unmappable character: forward it literally.
            None => self.handle_input(text),
        }
    }

    // -----------------------------------------------------------------------
    // Editor interception
    // -----------------------------------------------------------------------

    fn interception_enabled(&self) -> bool {
        !self.bypass_once && !self.deps.prefs.editor_redirect_disabled()
    }

    fn raise_editor_prompt(&mut self, launch: intercept::EditorLaunch) {
        debug!(command = %launch.command, path = %launch.path, "editor command intercepted");
        self.pending_editor = Some(EditorPrompt {
            command: launch.command,
            path: launch.path,
            cwd: self.cwd.clone(),
        });
    }

    /// Resolve the pending prompt. No-op when none is pending.
    pub fn resolve_editor_prompt(&mut self, choice: EditorPromptChoice) {
        if self.pending_editor.take().is_none() {
            return;
        }
        match choice {
            EditorPromptChoice::OpenExternally => {
                // Clear the remote line and our reconstruction of it; the
                // embedder opens the file with the prompt it already read.
                self.write_transport(vec![NAK]);
                self.input.clear();
                self.clear_suggestions();
            }
            EditorPromptChoice::ContinueInTerminal => {
                self.bypass_once = true;
                self.handle_input("\r");
            }
            EditorPromptChoice::SuppressPermanently => {
                self.deps.prefs.disable_editor_redirect();
                self.handle_input("\r");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Suggestions
    // -----------------------------------------------------------------------

    fn schedule_suggestions(&mut self) {
        self.suggest_generation += 1;
        if let Some(task) = self.suggest_task.take() {
            task.abort();
        }
        if self.input.is_empty() {
            self.suggestions.clear();
            return;
        }

        let generation = self.suggest_generation;
        let engine = Arc::clone(&self.deps.suggestions);
        let tx = self.msg_tx.clone();
        let delay = self.tuning.suggest_debounce;
        let ctx = SuggestContext {
            input: self.input.text().to_string(),
            target_key: self.target_key.clone(),
            cwd: self.cwd.clone(),
            history: self.history.clone(),
        };
        self.suggest_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let items = engine.suggest(ctx).await;
            let _ = tx.send(SessionMsg::Suggestions { generation, items });
        }));
    }

    fn clear_suggestions(&mut self) {
        self.suggest_generation += 1;
        if let Some(task) = self.suggest_task.take() {
            task.abort();
        }
        self.suggestions.clear();
    }

    /// Replace the remote line with a suggestion: clear-line, send the
    /// text, and mirror it to the surface and the local buffer.
    pub fn accept_suggestion(&mut self, index: usize) {
        let Some(suggestion) = self.suggestions.get(index).cloned() else {
            return;
        };
        let mut bytes = vec![NAK];
        bytes.extend_from_slice(suggestion.text.as_bytes());
        self.write_transport(bytes);
        self.input.set_text(&suggestion.text);
        self.clear_suggestions();
        let _ = self
            .surface_tx
            .send(SurfaceCommand::ApplySuggestion(suggestion.text));
    }

    // -----------------------------------------------------------------------
    // Surface requests
    // -----------------------------------------------------------------------

    pub fn request_focus(&self) {
        let _ = self.surface_tx.send(SurfaceCommand::Focus);
    }

    pub fn request_select_all(&self) {
        let _ = self.surface_tx.send(SurfaceCommand::SelectAll);
    }

    pub fn request_clear_selection(&mut self) {
        self.selection = None;
        let _ = self.surface_tx.send(SurfaceCommand::ClearSelection);
    }

    pub fn request_submit_enter(&self) {
        let _ = self.surface_tx.send(SurfaceCommand::SubmitEnter);
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn install_shell_integration(&mut self) {
        self.write_transport(bootstrap::install_sequence().into_bytes());
    }

    fn start_history_load(&mut self) {
        // Once per controller lifetime.
        if self.history_started {
            return;
        }
        self.history_started = true;
        let source = Arc::clone(&self.deps.history);
        let key = self.target_key.clone();
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let lines = source.load(&key).await;
            let _ = tx.send(SessionMsg::HistoryLoaded(lines));
        });
    }

    fn start_probe(&mut self) {
        self.cancel_probe();
        let token = CancellationToken::new();
        let child = token.clone();
        let tx = self.msg_tx.clone();
        let delay = self.tuning.integration_probe;
        tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(SessionMsg::ProbeFired);
                }
            }
        });
        self.probe_cancel = Some(token);
    }

    fn cancel_probe(&mut self) {
        if let Some(token) = self.probe_cancel.take() {
            token.cancel();
        }
    }

    fn remember_command(&mut self, command: &str) {
        self.history.retain(|line| line != command);
        self.history.insert(0, command.to_string());
        self.history.truncate(self.tuning.history_cap);
    }

    fn write_transport(&mut self, bytes: Vec<u8>) {
        if let Some(transport) = self.transport.as_mut() {
            if let Err(e) = transport.write(&bytes) {
                warn!(target = %self.target_key, "transport write failed: {e}");
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Map a character to its control code: `a`–`z` → 0x01–0x1A, plus the
/// punctuation column of the ASCII control chart.
fn control_code(ch: char) -> Option<u8> {
    let ch = ch.to_ascii_lowercase();
    match ch {
        'a'..='z' => Some(ch as u8 - b'a' + 1),
        ' ' | '@' => Some(0x00),
        '[' => Some(0x1b),
        '\\' => Some(0x1c),
        ']' => Some(0x1d),
        '^' => Some(0x1e),
        '_' => Some(0x1f),
        '?' => Some(0x7f),
        _ => None,
    }
}
