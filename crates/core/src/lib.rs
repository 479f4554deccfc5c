//! shoal-core: a concurrency core for line-oriented interpreters.
//!
//! An interpreter is split into two components: a front-end [`Session`]
//! that reads lines, and a pluggable [`Engine`] that executes them. Any
//! number of sessions can share one engine through a cloned
//! [`EngineHandle`]; a lazily-started runner serializes each session's
//! calls while letting different sessions proceed concurrently, and every
//! submitted line yields exactly one status back to its submitter.
//!
//! Everything is cooperatively cancellable: sessions derive a child
//! [`CancellationToken`] per run, OS signals are translated (and optionally
//! remapped or suppressed) into that token, and the blocking read/write
//! wrappers in [`SessionIo`] respond to cancellation even when the
//! underlying stream never returns.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shoal_core::{EngineHandle, Registry, Session, engine_fn};
//!
//! let registry = Arc::new(Registry::new());
//! let engine = EngineHandle::new(engine_fn(|_token, line, io| async move {
//!     if line == "quit" {
//!         return 1;
//!     }
//!     let _ = io.write(format!("{line}\n").as_bytes()).await;
//!     0
//! }));
//!
//! let mut session = Session::new(registry)
//!     .engine(engine)
//!     .prefix("> ")
//!     .io(std::io::stdin(), std::io::stdout());
//! session.run().await?;
//! ```

pub use engine::{Engine, EngineHandle, EngineId, ExecFuture, engine_fn};
pub use error::{Error, IoPhase, Result, is_recoverable};
pub use io::{READ_CHUNK, SessionIo};
pub use registry::Registry;
pub use session::Session;
pub use signal::{Signal, SignalHandler, os_signals};

// Re-exported so engine implementations do not need their own tokio-util
// dependency for the `exec` signature.
pub use tokio_util::sync::CancellationToken;

mod dispatch;
mod engine;
mod error;
mod io;
mod registry;
mod runner;
mod session;
mod signal;
