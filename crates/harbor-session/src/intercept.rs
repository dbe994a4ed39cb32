//! Editor command interception.
//!
//! When a line is about to be submitted, it is tokenized with shell-like
//! quoting rules and checked against a fixed set of interactive editors.
//! Any ambiguity fails open: the line is treated as ordinary input and
//! forwarded normally, never blocked.

/// Commands whose invocation we offer to redirect to an external editor.
const EDITOR_COMMANDS: &[&str] = &["vi", "vim", "nvim", "nano", "pico", "emacs", "micro"];

/// Editors whose `+cmd` positional arguments (`+42`, `+/pattern`) are not
/// file paths.
const PLUS_ARG_EDITORS: &[&str] = &["vim", "nvim"];

/// A matched editor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorLaunch {
    pub command: String,
    pub path: String,
}

/// Tokenize a command line honoring single quotes, double quotes, and
/// backslash escapes; whitespace outside quotes separates tokens.
/// Unterminated quoting yields whatever was accumulated (fail open).
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut has_token = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for ch in line.chars() {
        if escaped {
            current.push(ch);
            has_token = true;
            escaped = false;
            continue;
        }
        match ch {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => {
                in_single = !in_single;
                has_token = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                has_token = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

/// Check whether `line` invokes an interactive editor on a plausible path.
///
/// A leading `sudo` and its flags are stripped. Among the remaining
/// arguments, flags are skipped (and `+cmd` arguments for vim/nvim) unless
/// a `--` has switched to literal mode; the *last* plausible path-like
/// argument wins. Bare `-` and `http(s)://` URLs are never paths;
/// `file://` is unwrapped.
pub fn match_editor(line: &str) -> Option<EditorLaunch> {
    let tokens = tokenize(line);
    let mut idx = 0;

    if tokens.first().map(String::as_str) == Some("sudo") {
        idx = 1;
        while tokens.get(idx).is_some_and(|t| t.starts_with('-')) {
            idx += 1;
        }
    }

    let command = basename(tokens.get(idx)?);
    if !EDITOR_COMMANDS.contains(&command) {
        return None;
    }
    let skips_plus_args = PLUS_ARG_EDITORS.contains(&command);

    let mut path: Option<&str> = None;
    let mut literal = false;
    for token in &tokens[idx + 1..] {
        if !literal {
            if token == "--" {
                literal = true;
                continue;
            }
            if token.len() > 1 && token.starts_with('-') {
                continue;
            }
            if skips_plus_args && token.starts_with('+') {
                continue;
            }
        }
        if plausible_path(token) {
            path = Some(token);
        }
    }

    let path = path?;
    let path = path.strip_prefix("file://").unwrap_or(path);
    Some(EditorLaunch {
        command: command.to_string(),
        path: path.to_string(),
    })
}

fn basename(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

fn plausible_path(token: &str) -> bool {
    !token.is_empty()
        && token != "-"
        && !token.starts_with("http://")
        && !token.starts_with("https://")
}
