//! Command history loading.
//!
//! A controller schedules exactly one background history load per
//! lifetime; the source reads the tail of the shell's history files and
//! the result is deduplicated preserving most-recent-first order.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

/// Loads raw history lines (oldest first, as they sit in the file) for a
/// target.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn load(&self, target_key: &str) -> Vec<String>;
}

/// Deduplicate history, keeping the most recent occurrence of each command
/// and returning most-recent-first, capped at `cap` lines.
pub fn dedup_recent(lines: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for line in lines.into_iter().rev() {
        let line = line.trim().to_string();
        if line.is_empty() || !seen.insert(line.clone()) {
            continue;
        }
        result.push(line);
        if result.len() == cap {
            break;
        }
    }
    result
}

/// Reads `~/.zsh_history` and `~/.bash_history` tails. Remote transports
/// would supply their own [`HistorySource`]; both feed the same
/// [`dedup_recent`] pass in the controller.
pub struct ShellHistorySource {
    /// Lines read from the tail of each file.
    pub tail: usize,
}

impl Default for ShellHistorySource {
    fn default() -> Self {
        Self { tail: 500 }
    }
}

#[async_trait]
impl HistorySource for ShellHistorySource {
    async fn load(&self, _target_key: &str) -> Vec<String> {
        let Some(home) = dirs::home_dir() else {
            return Vec::new();
        };
        let mut lines = Vec::new();
        for name in [".bash_history", ".zsh_history"] {
            lines.extend(read_tail(home.join(name), self.tail));
        }
        lines
    }
}

fn read_tail(path: PathBuf, tail: usize) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(&path) else {
        debug!("no history file at {}", path.display());
        return Vec::new();
    };
    let all: Vec<String> = content.lines().map(strip_zsh_extended).collect();
    let skip = all.len().saturating_sub(tail);
    all.into_iter().skip(skip).collect()
}

/// zsh extended history lines look like `: 1699999999:0;git status`.
fn strip_zsh_extended(line: &str) -> String {
    if line.starts_with(": ") {
        if let Some((_, cmd)) = line.split_once(';') {
            return cmd.to_string();
        }
    }
    line.to_string()
}
