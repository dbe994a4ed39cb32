//! Local PTY transport built on the `portable-pty` crate.
//!
//! Spawns a shell inside a pseudo-terminal and pumps its output into the
//! session's event channel from a background reader thread. This is the
//! bundled [`Transport`] implementation; remote transports plug in through
//! the same trait.

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use tokio::sync::mpsc;
use tracing::debug;

use crate::transport::{
    ConnectParams, Transport, TransportError, TransportEvent, TransportFactory,
};

pub struct PtyTransport {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
}

impl PtyTransport {
    /// Spawn the program from `params` inside a PTY of the given size.
    ///
    /// `TERM` is always set to `xterm-256color`. The initial `Connected`
    /// event and all output are delivered through `events`; EOF on the
    /// reader produces a clean `Disconnected(None)`.
    pub fn open(
        params: &ConnectParams,
        cols: u16,
        rows: u16,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self, TransportError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&params.program);
        cmd.args(&params.args);
        cmd.env("TERM", "xterm-256color");
        for (key, value) in &params.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        let _ = events.send(TransportEvent::Connected);

        // Background thread reads the PTY and feeds the event channel; the
        // channel preserves per-session FIFO ordering.
        std::thread::Builder::new()
            .name("pty-reader".into())
            .spawn(move || {
                let mut buf = [0u8; 8192];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => {
                            let _ = events.send(TransportEvent::Disconnected(None));
                            break;
                        }
                        Ok(n) => {
                            if events
                                .send(TransportEvent::Output(buf[..n].to_vec()))
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("pty read ended: {e}");
                            let _ = events.send(TransportEvent::Disconnected(None));
                            break;
                        }
                    }
                }
            })
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        Ok(PtyTransport {
            master: pair.master,
            writer,
            child,
        })
    }
}

impl Transport for PtyTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<(), TransportError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TransportError::ResizeFailed(e.to_string()))
    }

    fn disconnect(&mut self) {
        let _ = self.child.kill();
    }
}

impl Drop for PtyTransport {
    fn drop(&mut self) {
        // Kill the child so the PTY fd closes and the reader thread exits
        // naturally. The process may have already exited.
        let _ = self.child.kill();
    }
}

/// Factory handing out [`PtyTransport`]s.
pub struct PtyTransportFactory;

impl TransportFactory for PtyTransportFactory {
    fn open(
        &self,
        params: &ConnectParams,
        cols: u16,
        rows: u16,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(PtyTransport::open(params, cols, rows, events)?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
