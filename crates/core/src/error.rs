//! Error taxonomy for the interpreter core.
//!
//! Three classes surface from the core: configuration errors (a session run
//! without an engine), cancellation (returned by cancellable stream
//! operations and absorbed by the run loop as ordinary completion), and
//! stream I/O failures tagged with the phase they occurred in. Engine
//! failures never appear here; the core only ever observes an engine's
//! status integer.

use std::fmt;
use std::io;

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Phase of session I/O in which a stream failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoPhase {
    /// Writing the line prefix at the top of a run-loop iteration.
    Prefix,
    /// Reading a line (or raw bytes) from the input stream.
    Read,
    /// An engine- or caller-initiated write to the output stream.
    Write,
    /// Writing the trailing newline when a run ends gracefully.
    Newline,
}

impl fmt::Display for IoPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoPhase::Prefix => write!(f, "prefix write"),
            IoPhase::Read => write!(f, "line read"),
            IoPhase::Write => write!(f, "write"),
            IoPhase::Newline => write!(f, "trailing newline write"),
        }
    }
}

/// Errors surfaced by sessions and their stream handles.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session was run without an engine attached.
    #[error("session has no associated engine")]
    NoEngine,

    /// The session's cancellation token fired before the operation finished.
    #[error("operation cancelled")]
    Cancelled,

    /// An underlying stream operation failed.
    #[error("{phase} failed: {source}")]
    Io {
        /// Which session I/O phase the failure belongs to.
        phase: IoPhase,
        /// The stream error itself.
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(phase: IoPhase, source: io::Error) -> Self {
        Error::Io { phase, source }
    }

    /// Whether a caller deciding to retry the whole run should treat this
    /// error as recoverable.
    ///
    /// Cancellation and timeouts are ordinary terminal conditions, and a
    /// failed trailing-newline write only means the output was already torn
    /// down. Network-class stream errors mean the transport is gone, and a
    /// missing engine cannot be fixed by retrying. Everything else defaults
    /// to recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::NoEngine => false,
            Error::Io {
                phase: IoPhase::Newline,
                ..
            } => true,
            Error::Io { source, .. } => !matches!(
                source.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
            ),
        }
    }
}

/// Recoverability for an optional error: the absence of an error is
/// recoverable.
pub fn is_recoverable(err: Option<&Error>) -> bool {
    err.is_none_or(Error::is_recoverable)
}
