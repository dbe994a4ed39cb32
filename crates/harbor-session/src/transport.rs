//! Transport collaborator boundary.
//!
//! The core treats the transport as an opaque byte pipe: it can write,
//! resize, and disconnect; everything coming back (output, lifecycle)
//! arrives as [`TransportEvent`]s on a channel supplied when the transport
//! is opened. Events from one transport are strictly FIFO; nothing is
//! guaranteed across independent sessions. Reconnection after a failure is
//! never automatic.

use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open transport: {0}")]
    OpenFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to resize: {0}")]
    ResizeFailed(String),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Connection parameters produced by the target resolver. For the bundled
/// PTY transport this is a program to spawn; an SSH transport would carry
/// host material in the same shape.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Callbacks from a live transport, marshaled onto the coordinating
/// context through a channel.
#[derive(Debug)]
pub enum TransportEvent {
    Connected,
    Output(Vec<u8>),
    /// Clean close carries no reason; a reason marks a failure.
    Disconnected(Option<String>),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A live byte pipe to a remote (or local) shell. Exclusive to one session
/// controller; transports are never shared.
pub trait Transport: Send {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
    fn resize(&mut self, cols: u16, rows: u16) -> Result<(), TransportError>;
    fn disconnect(&mut self);
}

/// Opens transports. The factory pushes all subsequent events into the
/// channel it is handed, including the initial `Connected`.
pub trait TransportFactory: Send + Sync {
    fn open(
        &self,
        params: &ConnectParams,
        cols: u16,
        rows: u16,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

/// Resolves a target key to connection parameters. `None` means the target
/// is unknown or its credentials are gone, which is terminal for
/// `connect()`.
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, key: &str) -> Option<ConnectParams>;
}
