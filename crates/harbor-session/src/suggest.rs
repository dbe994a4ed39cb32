//! Suggestion engine boundary.
//!
//! The controller defers ranking to an external engine; it only schedules
//! debounced lookups and applies results that are still current. The
//! bundled [`PrefixSuggestionEngine`] ranks the session's own history and
//! stands in wherever no remote document index is wired up.

use async_trait::async_trait;

/// One ranked completion for the current input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub description: Option<String>,
}

impl Suggestion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            description: None,
        }
    }
}

/// Everything the engine gets to work with.
#[derive(Debug, Clone)]
pub struct SuggestContext {
    pub input: String,
    pub target_key: String,
    pub cwd: Option<String>,
    pub history: Vec<String>,
}

#[async_trait]
pub trait SuggestionEngine: Send + Sync {
    async fn suggest(&self, ctx: SuggestContext) -> Vec<Suggestion>;
}

/// History-backed engine: prefix matches rank above substring matches,
/// order within each band follows the history (most recent first).
pub struct PrefixSuggestionEngine {
    pub limit: usize,
}

impl Default for PrefixSuggestionEngine {
    fn default() -> Self {
        Self { limit: 8 }
    }
}

#[async_trait]
impl SuggestionEngine for PrefixSuggestionEngine {
    async fn suggest(&self, ctx: SuggestContext) -> Vec<Suggestion> {
        let needle = ctx.input.trim();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut prefix = Vec::new();
        let mut substring = Vec::new();
        for line in &ctx.history {
            if line == needle {
                continue;
            }
            if line.starts_with(needle) {
                prefix.push(Suggestion::new(line.clone()));
            } else if line.contains(needle) {
                substring.push(Suggestion::new(line.clone()));
            }
        }
        prefix.extend(substring);
        prefix.truncate(self.limit);
        prefix
    }
}
