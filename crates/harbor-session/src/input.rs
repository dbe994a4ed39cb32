//! Client-side reconstruction of the line being typed on the remote shell.
//!
//! The remote echo is not observable as structured text, so the only way
//! to know what is logically on the current line is to replay the literal
//! bytes we send. The same replay rules back both the live-typing path
//! (which mutates the buffer) and a side-channel peek used to inspect a
//! submission before committing it.

const BACKSPACE: char = '\u{8}';
const DELETE: char = '\u{7f}';
const CTRL_U: char = '\u{15}';

const PASTE_BEGIN: &str = "\u{1b}[200~";
const PASTE_END: &str = "\u{1b}[201~";
// ESC itself is a control character and never lands in the buffer, so a
// pasted marker typically survives as its ESC-less residue.
const PASTE_BEGIN_RESIDUE: &str = "[200~";
const PASTE_END_RESIDUE: &str = "[201~";

/// Locally reconstructed input line.
#[derive(Debug, Clone, Default)]
pub struct InputBuffer {
    text: String,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Replace the buffer wholesale, e.g. after applying a suggestion.
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    /// Replay one unit of input. Returns the submitted command when the
    /// input contains a carriage return or newline; the buffer is cleared
    /// by submission.
    ///
    /// Rules:
    /// - backspace/delete remove the last character (no-op when empty);
    /// - `Ctrl+U` clears the buffer;
    /// - CR/LF submit the sanitized, trimmed buffer;
    /// - other control characters are not buffered (they still go to the
    ///   transport, that is the caller's concern);
    /// - everything else is appended verbatim.
    pub fn replay(&mut self, input: &str) -> Option<String> {
        let mut submitted = None;
        let mut prev = '\0';
        for ch in input.chars() {
            match ch {
                BACKSPACE | DELETE => {
                    self.text.pop();
                }
                CTRL_U => self.text.clear(),
                '\n' if prev == '\r' => {} // CRLF submits once
                '\r' | '\n' => {
                    submitted = Some(sanitize(&self.text));
                    self.text.clear();
                }
                c if (c as u32) < 0x20 => {}
                c => self.text.push(c),
            }
            prev = ch;
        }
        submitted
    }

    /// What would be submitted if `input` were replayed now. Does not
    /// mutate the buffer.
    pub fn peek(&self, input: &str) -> Option<String> {
        self.clone().replay(input)
    }
}

/// Strip bracketed-paste markers (whole sequences and their ESC-less
/// residue) and trim surrounding whitespace.
pub fn sanitize(raw: &str) -> String {
    let mut s = raw.replace(PASTE_BEGIN, "").replace(PASTE_END, "");
    s = s
        .replace(PASTE_BEGIN_RESIDUE, "")
        .replace(PASTE_END_RESIDUE, "");
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_backspace() {
        let mut buf = InputBuffer::new();
        assert_eq!(buf.replay("lsx"), None);
        assert_eq!(buf.replay("\u{8}"), None);
        assert_eq!(buf.replay("\r"), Some("ls".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn delete_byte_also_removes_last_char() {
        let mut buf = InputBuffer::new();
        buf.replay("ab\u{7f}");
        assert_eq!(buf.text(), "a");
    }

    #[test]
    fn backspace_on_empty_is_noop() {
        let mut buf = InputBuffer::new();
        buf.replay("\u{8}\u{8}");
        assert!(buf.is_empty());
    }

    #[test]
    fn ctrl_u_clears_the_line() {
        let mut buf = InputBuffer::new();
        buf.replay("git status");
        buf.replay("\u{15}");
        assert!(buf.is_empty());
    }

    #[test]
    fn bracketed_paste_markers_stripped_on_submit() {
        let mut buf = InputBuffer::new();
        buf.replay("\u{1b}[200~echo hi\u{1b}[201~");
        assert_eq!(buf.replay("\r"), Some("echo hi".to_string()));
    }

    #[test]
    fn paste_residue_without_esc_also_stripped() {
        // ESC is swallowed as a control char during replay, leaving only
        // the residue in the buffer.
        let mut buf = InputBuffer::new();
        for ch in "\u{1b}[200~echo hi\u{1b}[201~".chars() {
            buf.replay(&ch.to_string());
        }
        assert_eq!(buf.replay("\n"), Some("echo hi".to_string()));
    }

    #[test]
    fn submission_trims_whitespace() {
        let mut buf = InputBuffer::new();
        buf.replay("  ls -la  ");
        assert_eq!(buf.replay("\r"), Some("ls -la".to_string()));
    }

    #[test]
    fn other_control_chars_not_buffered() {
        let mut buf = InputBuffer::new();
        buf.replay("a\u{1}\u{2}b");
        assert_eq!(buf.text(), "ab");
    }

    #[test]
    fn peek_does_not_mutate() {
        let mut buf = InputBuffer::new();
        buf.replay("nano /etc/hosts");
        assert_eq!(buf.peek("\r"), Some("nano /etc/hosts".to_string()));
        assert_eq!(buf.text(), "nano /etc/hosts");
    }

    #[test]
    fn peek_without_cr_is_none() {
        let mut buf = InputBuffer::new();
        buf.replay("ls");
        assert_eq!(buf.peek("x"), None);
    }

    #[test]
    fn crlf_submits_once() {
        let mut buf = InputBuffer::new();
        assert_eq!(buf.replay("pwd\r\n"), Some("pwd".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn set_text_replaces_content() {
        let mut buf = InputBuffer::new();
        buf.replay("old");
        buf.set_text("new line");
        assert_eq!(buf.text(), "new line");
    }
}
