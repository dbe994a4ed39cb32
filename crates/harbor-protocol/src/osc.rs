//! Demultiplexer for the private integration channel.
//!
//! The transport exposes a single byte stream, so shell state is carried
//! in-band as private OSC sequences (see [`crate::bootstrap`]). This module
//! extracts those sequences into [`BridgeEvent`]s and passes every other
//! byte through untouched, so colors, cursor movement and all other escape
//! sequences reach the display surface byte-for-byte.
//!
//! The demux is streaming: a sequence split across two reads is held back
//! until its terminator arrives.

use base64::Engine;
use tracing::trace;

use crate::event::BridgeEvent;

/// `ESC ] 7771 ;`
const MARKER: &[u8] = b"\x1b]7771;";

/// Upper bound on a held partial sequence. Anything longer is flushed to
/// the output verbatim rather than buffered forever (fail open).
const MAX_SEQUENCE: usize = 4096;

/// Result of one [`ProtocolDemux::feed`] call.
#[derive(Debug, Default)]
pub struct Demuxed {
    /// Bytes destined for the display surface.
    pub output: Vec<u8>,
    /// Integration events extracted from the stream, in receipt order.
    pub events: Vec<BridgeEvent>,
}

/// Streaming extractor for the private OSC channel.
#[derive(Debug, Default)]
pub struct ProtocolDemux {
    held: Vec<u8>,
}

impl ProtocolDemux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw transport output. Returns the clean display stream plus any
    /// complete integration events found in it.
    pub fn feed(&mut self, bytes: &[u8]) -> Demuxed {
        let mut data = std::mem::take(&mut self.held);
        data.extend_from_slice(bytes);

        let mut out = Demuxed::default();
        let mut i = 0;

        while i < data.len() {
            match find_subslice(&data[i..], MARKER) {
                Some(rel) => {
                    let start = i + rel;
                    out.output.extend_from_slice(&data[i..start]);
                    let body_start = start + MARKER.len();
                    match find_terminator(&data[body_start..]) {
                        Some((body_len, term_len)) => {
                            let body = &data[body_start..body_start + body_len];
                            if let Some(ev) = parse_body(body) {
                                out.events.push(ev);
                            }
                            i = body_start + body_len + term_len;
                        }
                        None => {
                            // Incomplete sequence at the tail of this read.
                            if data.len() - start > MAX_SEQUENCE {
                                trace!("oversized integration sequence, flushing verbatim");
                                out.output.extend_from_slice(&data[start..]);
                            } else {
                                self.held = data[start..].to_vec();
                            }
                            return out;
                        }
                    }
                }
                None => {
                    // No full marker; hold back a tail that could be the
                    // start of one.
                    let tail = &data[i..];
                    let keep = partial_marker_len(tail);
                    out.output.extend_from_slice(&tail[..tail.len() - keep]);
                    self.held = tail[tail.len() - keep..].to_vec();
                    return out;
                }
            }
        }
        out
    }
}

/// Locate the sequence terminator: BEL or ST (`ESC \`). Returns
/// `(body_len, terminator_len)`.
fn find_terminator(data: &[u8]) -> Option<(usize, usize)> {
    for (i, &b) in data.iter().enumerate() {
        if b == 0x07 {
            return Some((i, 1));
        }
        if b == 0x1b {
            if data.get(i + 1) == Some(&b'\\') {
                return Some((i, 2));
            }
            // Lone ESC at the end: terminator may be split across reads.
            if i + 1 == data.len() {
                return None;
            }
        }
    }
    None
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Length of the longest proper suffix of `data` that is a prefix of
/// [`MARKER`].
fn partial_marker_len(data: &[u8]) -> usize {
    let max = (MARKER.len() - 1).min(data.len());
    for k in (1..=max).rev() {
        if data[data.len() - k..] == MARKER[..k] {
            return k;
        }
    }
    0
}

/// Parse the `Op;payload` body of an integration sequence.
fn parse_body(body: &[u8]) -> Option<BridgeEvent> {
    let text = std::str::from_utf8(body).ok()?;
    let (op, payload) = match text.split_once(';') {
        Some((op, rest)) => (op, rest),
        None => (text, ""),
    };

    let event = match op {
        "SetCwd" => BridgeEvent::CwdChanged(decode_b64(payload)?),
        "ShellPromptBegins" => {
            let (row, col) = parse_coords(payload);
            BridgeEvent::PromptBegins { row, col }
        }
        "ShellPromptEnds" => {
            let (row, col) = parse_coords(payload);
            BridgeEvent::PromptEnds { row, col }
        }
        "CommandStarted" => BridgeEvent::CommandStarted(decode_b64(payload)?),
        "CommandExited" => BridgeEvent::CommandExited(payload.trim().parse().ok()?),
        other => {
            trace!("unknown integration op: {other}");
            return None;
        }
    };
    Some(event)
}

fn decode_b64(payload: &str) -> Option<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Prompt markers may carry `row;col`; the shell side usually cannot know
/// them, in which case they default to the origin and the surface layer
/// fills in real coordinates.
fn parse_coords(payload: &str) -> (u32, u32) {
    if let Some((r, c)) = payload.split_once(';') {
        if let (Ok(row), Ok(col)) = (r.trim().parse(), c.trim().parse()) {
            return (row, col);
        }
    }
    (0, 0)
}
