pub mod controller;
pub mod history;
pub mod input;
pub mod intercept;
pub mod prefs;
pub mod pty;
pub mod shell;
pub mod suggest;
pub mod transport;

#[cfg(test)]
mod tests;

pub use controller::{
    ConnectionStatus, EditorPrompt, EditorPromptChoice, IntegrationStatus, SessionController,
    SessionDeps, SessionTuning, SurfaceCommand,
};
pub use input::InputBuffer;
pub use prefs::{MemoryPreferenceStore, PreferenceStore};
pub use suggest::{SuggestContext, Suggestion, SuggestionEngine};
pub use transport::{
    ConnectParams, TargetResolver, Transport, TransportError, TransportEvent, TransportFactory,
};
