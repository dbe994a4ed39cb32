//! Shell integration bootstrap script.
//!
//! Installed once after connect, the script hooks bash and zsh lifecycle
//! points to emit a private escape-sequence channel inside the ordinary
//! terminal output stream. The client side ([`crate::osc`]) demultiplexes
//! it back out before bytes reach the display surface.

/// Private OSC code for the integration channel. Deliberately outside the
/// range of standardized OSC commands so it never collides with what
/// terminals already interpret.
pub const OSC_CODE: &str = "7771";

/// Operation names carried on the channel.
pub mod op {
    pub const SET_CWD: &str = "SetCwd";
    pub const PROMPT_BEGINS: &str = "ShellPromptBegins";
    pub const PROMPT_ENDS: &str = "ShellPromptEnds";
    pub const COMMAND_STARTED: &str = "CommandStarted";
    pub const COMMAND_EXITED: &str = "CommandExited";
}

/// The shell-agnostic bootstrap script. Path and command-line payloads are
/// base64 encoded so arbitrary bytes survive the text channel.
pub const BOOTSTRAP_SCRIPT: &str = r#"__hb_osc() { printf '\033]7771;%s;%s\007' "$1" "$2"; }
__hb_b64() { printf '%s' "$1" | base64 2>/dev/null | tr -d '\n'; }
__hb_cwd() { __hb_osc SetCwd "$(__hb_b64 "$PWD")"; }
__hb_preexec() { __hb_osc CommandStarted "$(__hb_b64 "$1")"; }
__hb_precmd() {
  __hb_osc CommandExited "$?"
  __hb_cwd
  __hb_osc ShellPromptBegins ''
}
__hb_prompt_end() { __hb_osc ShellPromptEnds ''; }
if [ -n "$ZSH_VERSION" ]; then
  autoload -Uz add-zsh-hook
  add-zsh-hook precmd __hb_precmd
  add-zsh-hook preexec __hb_preexec
elif [ -n "$BASH_VERSION" ]; then
  PROMPT_COMMAND="__hb_precmd${PROMPT_COMMAND:+;$PROMPT_COMMAND}"
  trap '__hb_preexec "$BASH_COMMAND"' DEBUG
fi
__hb_cwd
__hb_osc ShellPromptBegins ''"#;

/// Full byte sequence to write into the transport right after connecting.
///
/// Local echo is suppressed around the script so the injection does not
/// scribble over the user's terminal; the leading spaces keep the lines out
/// of shell history on `HISTCONTROL=ignorespace` setups.
pub fn install_sequence() -> String {
    let mut seq = String::from(" stty -echo\r");
    for line in BOOTSTRAP_SCRIPT.lines() {
        seq.push(' ');
        seq.push_str(line);
        seq.push('\r');
    }
    seq.push_str(" stty echo\r");
    seq
}
