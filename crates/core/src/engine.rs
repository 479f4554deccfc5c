//! Engine trait and sharing handles.
//!
//! An [`Engine`] is the pluggable command processor behind a session. The
//! core never inspects what an engine does with a line; it only routes lines
//! in and status integers out. Engines are shared between sessions through
//! an [`EngineHandle`], whose opaque [`EngineId`] is the registry key:
//! sessions share a runner exactly when they hold clones of the same handle,
//! independent of any equality the engine type itself defines.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

use crate::io::SessionIo;

/// Boxed future returned by [`Engine::exec`].
pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = i32> + Send + 'a>>;

/// A pluggable command processor.
///
/// `exec` is invoked once per submitted line with the submitting session's
/// cancellation token and stream handle, and returns a status integer: 0
/// means the session keeps reading, non-zero means it stops its run loop.
///
/// The core serializes calls within one session's stream but not across
/// sessions: an engine shared by several sessions may see concurrent `exec`
/// calls and is responsible for its own cross-session state safety.
pub trait Engine: Send + Sync {
    /// Execute one line.
    ///
    /// `io` is the submitting session's stream handle; a command may read
    /// further input or write output through it mid-execution. `token` is
    /// already cancelled when the session is shutting down, so long-running
    /// commands should check it at convenient points.
    fn exec<'a>(&'a self, token: CancellationToken, line: &'a str, io: SessionIo)
    -> ExecFuture<'a>;
}

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque identity of a shared engine, assigned when its handle is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EngineId(u64);

/// Cloneable handle pairing an engine with its registry identity.
///
/// Two handles created by separate [`EngineHandle::new`] calls are distinct
/// identities even when built from the same value; to share one runner,
/// share clones of one handle.
#[derive(Clone)]
pub struct EngineHandle {
    id: EngineId,
    engine: Arc<dyn Engine>,
}

impl EngineHandle {
    /// Wrap an engine in a new handle with a fresh identity.
    pub fn new(engine: impl Engine + 'static) -> Self {
        Self::from_arc(Arc::new(engine))
    }

    /// Wrap an already-shared engine in a new handle with a fresh identity.
    pub fn from_arc(engine: Arc<dyn Engine>) -> Self {
        Self {
            id: EngineId(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed)),
            engine,
        }
    }

    /// The registry identity of this handle.
    pub fn id(&self) -> EngineId {
        self.id
    }

    pub(crate) fn engine(&self) -> Arc<dyn Engine> {
        Arc::clone(&self.engine)
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle").field("id", &self.id).finish()
    }
}

/// Adapter turning an async closure into an [`Engine`].
///
/// Useful for tests and small one-off engines; the closure receives the
/// session token, the owned line, and the stream handle.
pub fn engine_fn<F, Fut>(f: F) -> impl Engine
where
    F: Fn(CancellationToken, String, SessionIo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = i32> + Send + 'static,
{
    FnEngine(f)
}

struct FnEngine<F>(F);

impl<F, Fut> Engine for FnEngine<F>
where
    F: Fn(CancellationToken, String, SessionIo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = i32> + Send + 'static,
{
    fn exec<'a>(
        &'a self,
        token: CancellationToken,
        line: &'a str,
        io: SessionIo,
    ) -> ExecFuture<'a> {
        Box::pin((self.0)(token, line.to_string(), io))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_from_one_clone_share_an_id() {
        let handle = EngineHandle::new(engine_fn(|_, _, _| async { 0 }));
        assert_eq!(handle.id(), handle.clone().id());
    }

    #[test]
    fn separate_handles_get_distinct_ids() {
        let engine: Arc<dyn Engine> = Arc::new(engine_fn(|_, _, _| async { 0 }));
        let a = EngineHandle::from_arc(Arc::clone(&engine));
        let b = EngineHandle::from_arc(engine);
        assert_ne!(a.id(), b.id());
    }
}
