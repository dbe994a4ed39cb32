//! Target key resolution for the standalone binary.

use harbor_session::{shell, ConnectParams, TargetResolver};

/// Resolves "local" to the user's default shell, or any absolute path to
/// that binary directly. Anything else is unknown.
pub struct ShellTargetResolver;

impl TargetResolver for ShellTargetResolver {
    fn resolve(&self, key: &str) -> Option<ConnectParams> {
        let program = if key == "local" {
            shell::detect_shell()
        } else if key.starts_with('/') && std::path::Path::new(key).exists() {
            key.to_string()
        } else {
            return None;
        };
        let args = shell::shell_args(&program);
        Some(ConnectParams {
            program,
            args,
            env: Vec::new(),
        })
    }
}
