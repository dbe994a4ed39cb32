//! Bridge event protocol between the rendering surface and the core.
//!
//! Events arrive as loosely-typed JSON envelopes (`{ kind, payload }`) and
//! are decoded exactly once, at this boundary, into the [`BridgeEvent`]
//! tagged union. Unknown or malformed envelopes decode to `None` and are
//! dropped by the caller; the protocol favors availability over strictness.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Raw event envelope as delivered by the rendering surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Closed set of events the core understands.
///
/// Each variant either fully updates controller state or is ignored;
/// no event is ever partially applied.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    SessionReady,
    RawDataIn(String),
    Resized { cols: u16, rows: u16 },
    CwdChanged(String),
    PromptBegins { row: u32, col: u32 },
    PromptEnds { row: u32, col: u32 },
    CommandStarted(String),
    CommandExited(i32),
    IntegrationError { reason: String, details: Option<String> },
    SelectionChanged { text: String, has_selection: bool },
    SelectionHint(String),
    OpenExternalLink(String),
    EditorCommandEntered(String),
}

impl BridgeEvent {
    /// Decode an envelope into a typed event. Returns `None` for unknown
    /// kinds or payloads missing required fields.
    pub fn decode(envelope: &Envelope) -> Option<BridgeEvent> {
        let p = &envelope.payload;
        let event = match envelope.kind.as_str() {
            "session-ready" => BridgeEvent::SessionReady,
            "raw-data-in" => BridgeEvent::RawDataIn(str_field(p, "data")?),
            "resized" => BridgeEvent::Resized {
                cols: u16::try_from(uint_field(p, "cols")?).ok()?,
                rows: u16::try_from(uint_field(p, "rows")?).ok()?,
            },
            "cwd-changed" => BridgeEvent::CwdChanged(str_field(p, "path")?),
            "prompt-begins" => BridgeEvent::PromptBegins {
                row: u32::try_from(uint_field(p, "row")?).ok()?,
                col: u32::try_from(uint_field(p, "col")?).ok()?,
            },
            "prompt-ends" => BridgeEvent::PromptEnds {
                row: u32::try_from(uint_field(p, "row")?).ok()?,
                col: u32::try_from(uint_field(p, "col")?).ok()?,
            },
            "command-started" => BridgeEvent::CommandStarted(str_field(p, "text")?),
            "command-exited" => {
                BridgeEvent::CommandExited(i32::try_from(int_field(p, "code")?).ok()?)
            }
            "integration-error" => BridgeEvent::IntegrationError {
                reason: str_field(p, "reason")?,
                details: str_field(p, "details"),
            },
            "selection-changed" => BridgeEvent::SelectionChanged {
                text: str_field(p, "text").unwrap_or_default(),
                has_selection: bool_field(p, "hasSelection")?,
            },
            "selection-hint" => BridgeEvent::SelectionHint(str_field(p, "message")?),
            "open-external-link" => BridgeEvent::OpenExternalLink(str_field(p, "url")?),
            "editor-command-entered" => BridgeEvent::EditorCommandEntered(str_field(p, "line")?),
            other => {
                trace!("dropping unknown bridge event kind: {other}");
                return None;
            }
        };
        Some(event)
    }
}

fn str_field(payload: &serde_json::Value, key: &str) -> Option<String> {
    payload.get(key)?.as_str().map(str::to_string)
}

fn uint_field(payload: &serde_json::Value, key: &str) -> Option<u64> {
    payload.get(key)?.as_u64()
}

fn int_field(payload: &serde_json::Value, key: &str) -> Option<i64> {
    payload.get(key)?.as_i64()
}

fn bool_field(payload: &serde_json::Value, key: &str) -> Option<bool> {
    payload.get(key)?.as_bool()
}
