//! Shell detection helpers for the local transport and history discovery.

/// Detect the user's default shell.
///
/// - On Unix: reads `SHELL`, falling back to `/bin/sh`.
/// - On Windows: reads `COMSPEC`, falling back to `cmd.exe`.
pub fn detect_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }

    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }

    #[cfg(not(any(unix, windows)))]
    {
        "/bin/sh".to_string()
    }
}

/// Command-line arguments for an interactive login session of the given
/// shell binary.
pub fn shell_args(shell: &str) -> Vec<String> {
    if shell.ends_with("zsh") || shell.ends_with("bash") {
        vec!["--login".to_string()]
    } else {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_shell_returns_non_empty() {
        assert!(!detect_shell().is_empty());
    }

    #[test]
    fn login_flag_for_zsh_and_bash() {
        assert_eq!(shell_args("/bin/zsh"), vec!["--login".to_string()]);
        assert_eq!(shell_args("/usr/bin/bash"), vec!["--login".to_string()]);
    }

    #[test]
    fn no_flags_for_other_shells() {
        assert!(shell_args("/usr/bin/fish").is_empty());
        assert!(shell_args("/bin/dash").is_empty());
    }
}
